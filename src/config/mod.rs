use lazy_static::lazy_static;
use log::warn;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::suggest::{DEFAULT_CANDIDATE_WINDOW, DEFAULT_LIST_LIMIT, DEFAULT_SUGGEST_LIMIT};

#[derive(Clone, Debug)]
pub struct Config {
    pub db_path: PathBuf,
    pub busy_timeout: Duration,
    pub candidate_window: usize,
    pub suggest_limit: usize,
    pub list_limit: usize,
    pub history_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            db_path: PathBuf::from("./shopping.db"),
            busy_timeout: Duration::from_millis(5000),
            candidate_window: DEFAULT_CANDIDATE_WINDOW,
            suggest_limit: DEFAULT_SUGGEST_LIMIT,
            list_limit: DEFAULT_LIST_LIMIT,
            history_file: dirs::home_dir().map(|home| home.join(".item_history_console")),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();

        let db_path = lookup("DB_PATH")
            .filter(|path| !path.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.db_path);

        let busy_timeout_ms = parse_or(&lookup, "DB_BUSY_TIMEOUT_MS", defaults.busy_timeout.as_millis() as u64);

        Config {
            db_path,
            busy_timeout: Duration::from_millis(busy_timeout_ms),
            candidate_window: parse_or(&lookup, "SUGGEST_CANDIDATE_WINDOW", defaults.candidate_window),
            suggest_limit: parse_or(&lookup, "SUGGEST_DEFAULT_LIMIT", defaults.suggest_limit),
            list_limit: parse_or(&lookup, "LIST_DEFAULT_LIMIT", defaults.list_limit),
            history_file: defaults.history_file,
        }
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + Copy + std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("Ignoring invalid {}={:?}, using {}", key, raw, default);
            default
        }),
        None => default,
    }
}

lazy_static! {
    pub static ref CONFIG: Arc<Config> = Arc::new(Config::from_env());
}
