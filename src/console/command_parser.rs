use anyhow::{anyhow, bail, Context, Result};

use crate::history::{HistoryId, SectionId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Add { section_id: SectionId, name: String },
    Template { section_id: SectionId, names: Vec<String> },
    Section { id: SectionId, name: String },
    Unsection { id: SectionId },
    Suggest { query: String, limit: i64 },
    List { limit: i64 },
    History { limit: i64 },
    Delete { ids: Vec<HistoryId> },
    Help,
    Exit,
}

pub struct CommandParser;

impl CommandParser {
    pub fn parse(input: &str) -> Result<Option<ConsoleCommand>> {
        let words = shellwords::split(input).map_err(|_| anyhow!("Unbalanced quotes in: {}", input))?;
        let Some((verb, args)) = words.split_first() else {
            return Ok(None);
        };

        let command = match verb.as_str() {
            "add" => {
                let (section_id, rest) = Self::section_and_rest(verb, args)?;
                ConsoleCommand::Add {
                    section_id,
                    name: rest.join(" "),
                }
            }
            "template" => {
                let (section_id, rest) = Self::section_and_rest(verb, args)?;
                ConsoleCommand::Template {
                    section_id,
                    names: rest.to_vec(),
                }
            }
            "section" => {
                let (id, rest) = Self::section_and_rest(verb, args)?;
                ConsoleCommand::Section { id, name: rest.join(" ") }
            }
            "unsection" => match args {
                [id] => ConsoleCommand::Unsection { id: Self::number("section id", id)? },
                _ => bail!("Usage: unsection <section_id>"),
            },
            "suggest" => match args {
                [] => bail!("Usage: suggest <query> [limit]"),
                [query] => ConsoleCommand::Suggest { query: query.clone(), limit: 0 },
                [query @ .., limit] => match limit.parse() {
                    Ok(limit) => ConsoleCommand::Suggest { query: query.join(" "), limit },
                    Err(_) => ConsoleCommand::Suggest { query: args.join(" "), limit: 0 },
                },
            },
            "list" => ConsoleCommand::List { limit: Self::optional_limit(args)? },
            "history" => ConsoleCommand::History { limit: Self::optional_limit(args)? },
            "delete" => {
                if args.is_empty() {
                    bail!("Usage: delete <id> [<id>...]");
                }
                let ids = args
                    .iter()
                    .map(|id| Self::number("history id", id))
                    .collect::<Result<Vec<_>>>()?;
                ConsoleCommand::Delete { ids }
            }
            "help" => ConsoleCommand::Help,
            "exit" | "quit" => ConsoleCommand::Exit,
            other => bail!("Unknown command: {} (try 'help')", other),
        };

        Ok(Some(command))
    }

    fn section_and_rest<'a>(verb: &str, args: &'a [String]) -> Result<(SectionId, &'a [String])> {
        match args {
            [id, rest @ ..] if !rest.is_empty() => Ok((Self::number("section id", id)?, rest)),
            _ => bail!("Usage: {} <section_id> <name>...", verb),
        }
    }

    fn optional_limit(args: &[String]) -> Result<i64> {
        match args {
            [] => Ok(0),
            [limit] => Self::number("limit", limit),
            _ => bail!("Expected at most one limit"),
        }
    }

    fn number(what: &str, raw: &str) -> Result<i64> {
        raw.parse()
            .with_context(|| format!("Invalid {}: {}", what, raw))
    }
}
