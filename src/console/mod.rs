mod command_parser;

use std::sync::Arc;

use anyhow::{Context, Result};
use colored::*;
use log::debug;
use rustyline::error::ReadlineError;
use rustyline::{Config, DefaultEditor, EditMode};
use serde::Serialize;

use self::command_parser::{CommandParser, ConsoleCommand};
use crate::config::CONFIG;
use crate::history::{HistoryError, HistoryRecord, HistoryStore, ItemUse};
use crate::suggest::{Suggester, Suggestion};

const HELP: &str = "\
add <section_id> <name>              record one use of an item name
template <section_id> <name>...      record a batch of uses at once
section <id> <name>                  name a section
unsection <id>                       forget a section
suggest <query> [limit]              ranked suggestions for a query
list [limit]                         most used names, no query
history [limit]                      raw history records with ids
delete <id> [<id>...]                remove history records
exit";

pub struct Console<S: HistoryStore + ?Sized> {
    editor: DefaultEditor,
    store: Arc<S>,
    suggester: Suggester<S>,
    json: bool,
}

impl<S: HistoryStore + ?Sized> Console<S> {
    pub fn new(store: Arc<S>, suggester: Suggester<S>, json: bool) -> Result<Self> {
        let config = Config::builder()
            .edit_mode(EditMode::Emacs)
            .auto_add_history(false)
            .build();
        let mut editor = DefaultEditor::with_config(config).context("Failed to start line editor")?;

        if let Some(path) = &CONFIG.history_file {
            if let Err(e) = editor.load_history(path) {
                debug!("No console history loaded from {}: {}", path.display(), e);
            }
        }

        Ok(Console {
            editor,
            store,
            suggester,
            json,
        })
    }

    pub async fn run(&mut self) -> Result<()> {
        loop {
            let line = match self.editor.readline(&format!("{} ", "items❯".bright_purple())) {
                Ok(line) => line,
                Err(ReadlineError::Interrupted) => continue,
                Err(ReadlineError::Eof) => break,
                Err(err) => return Err(anyhow::anyhow!("Error reading input: {}", err)),
            };

            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            self.editor.add_history_entry(line)?;

            let command = match CommandParser::parse(line) {
                Ok(Some(command)) => command,
                Ok(None) => continue,
                Err(e) => {
                    eprintln!("{} {}", "Error:".red(), e);
                    continue;
                }
            };

            if command == ConsoleCommand::Exit {
                break;
            }

            match self.execute(command).await {
                Ok(()) => {}
                Err(e) if e.is_retryable() => {
                    eprintln!("{} {} (safe to retry)", "Storage failure:".red(), e);
                }
                Err(e) => println!("{}", format!("Nothing to do: {}", e).yellow()),
            }
        }

        Ok(())
    }

    async fn execute(&self, command: ConsoleCommand) -> Result<(), HistoryError> {
        match command {
            ConsoleCommand::Add { section_id, name } => {
                self.store.record_use(&name, section_id).await?;
                println!("{} {}", "Recorded".green(), name);
            }
            ConsoleCommand::Template { section_id, names } => {
                let uses: Vec<ItemUse> = names.iter().map(|name| ItemUse::new(name.as_str(), section_id)).collect();
                self.store.record_uses(&uses).await?;
                println!("{} {} items", "Recorded".green(), uses.len());
            }
            ConsoleCommand::Section { id, name } => {
                self.store.put_section(id, &name).await?;
                println!("{} {} = {}", "Section".green(), id, name);
            }
            ConsoleCommand::Unsection { id } => {
                if self.store.remove_section(id).await? {
                    println!("{} {}", "Removed section".green(), id);
                } else {
                    println!("{}", format!("Section {} was not known", id).yellow());
                }
            }
            ConsoleCommand::Suggest { query, limit } => {
                let limit = if limit <= 0 { CONFIG.suggest_limit as i64 } else { limit };
                let suggestions = self.suggester.suggest(&query, limit).await?;
                self.print_suggestions(&suggestions);
            }
            ConsoleCommand::List { limit } => {
                let limit = if limit <= 0 { CONFIG.list_limit as i64 } else { limit };
                let suggestions = self.suggester.list_all(limit).await?;
                self.print_suggestions(&suggestions);
            }
            ConsoleCommand::History { limit } => {
                let limit = if limit <= 0 { CONFIG.list_limit } else { limit as usize };
                let records = self.store.fetch_candidates(limit).await?;
                self.print_records(&records);
            }
            ConsoleCommand::Delete { ids } => match ids.as_slice() {
                [id] => {
                    self.store.delete_one(*id).await?;
                    println!("{} {}", "Deleted".green(), id);
                }
                _ => {
                    let removed = self.store.delete_many(&ids).await?;
                    println!("{} {} of {}", "Deleted".green(), removed, ids.len());
                }
            },
            ConsoleCommand::Help => println!("{}", HELP),
            ConsoleCommand::Exit => {}
        }
        Ok(())
    }

    fn print_suggestions(&self, suggestions: &[Suggestion]) {
        if self.print_json(suggestions) {
            return;
        }
        if suggestions.is_empty() {
            println!("{}", "No suggestions".dimmed());
        }
        for suggestion in suggestions {
            println!(
                "{}  {}  {}",
                suggestion.name.bright_green(),
                section_label(&suggestion.last_section_name, suggestion.last_section_id).bright_blue(),
                format!("×{}", suggestion.usage_count).dimmed(),
            );
        }
    }

    fn print_records(&self, records: &[HistoryRecord]) {
        if self.print_json(records) {
            return;
        }
        for record in records {
            println!(
                "{:>6}  {}  {}  {}  {}",
                record.id.to_string().bright_yellow(),
                record.name.bright_green(),
                section_label(&record.last_section_name, record.last_section_id).bright_blue(),
                format!("×{}", record.usage_count).dimmed(),
                record.last_used_at.format("%Y-%m-%d %H:%M").to_string().dimmed(),
            );
        }
    }

    fn print_json<T: Serialize>(&self, rows: &[T]) -> bool {
        if !self.json {
            return false;
        }
        match serde_json::to_string_pretty(rows) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("{} {}", "Error:".red(), e),
        }
        true
    }
}

impl<S: HistoryStore + ?Sized> Drop for Console<S> {
    fn drop(&mut self) {
        if let Some(path) = &CONFIG.history_file {
            if let Err(e) = self.editor.save_history(path) {
                eprintln!("Warning: Failed to save console history: {}", e);
            }
        }
    }
}

fn section_label(name: &str, id: i64) -> String {
    if name.is_empty() {
        format!("[section {}]", id)
    } else {
        format!("[{}]", name)
    }
}
