mod config;
mod console;
mod history;
mod suggest;

use crate::config::CONFIG;
use crate::console::Console;
use crate::history::{HistoryStore, MemoryHistoryStore, SqliteHistoryStore};
use crate::suggest::Suggester;
use anyhow::{Context, Result};
use log::info;
use std::env;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    dotenv::dotenv().ok();

    let json = env::args().any(|arg| arg == "--json");

    // Throwaway session, nothing is written to disk
    if env::args().any(|arg| arg == "--memory") {
        info!("Using in-memory item history");
        return run_console(Arc::new(MemoryHistoryStore::new()), json).await;
    }

    let store = SqliteHistoryStore::open(&CONFIG.db_path, CONFIG.busy_timeout)
        .with_context(|| format!("Failed to open history database at {}", CONFIG.db_path.display()))?;
    info!("Item history opened at {}", CONFIG.db_path.display());

    run_console(Arc::new(store), json).await
}

async fn run_console<S: HistoryStore>(store: Arc<S>, json: bool) -> Result<()> {
    let suggester = Suggester::new(Arc::clone(&store)).with_candidate_window(CONFIG.candidate_window);
    let mut console = Console::new(store, suggester, json)?;
    console.run().await
}
