use log::info;
use rusqlite::Connection;

use super::Result;

pub fn create_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS sections (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS item_history (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            name_key TEXT NOT NULL UNIQUE,
            last_section_id INTEGER NOT NULL,
            usage_count INTEGER NOT NULL DEFAULT 1 CHECK (usage_count >= 1),
            last_used_at INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_item_history_popularity
            ON item_history(usage_count DESC, last_used_at DESC);
        ",
    )?;
    info!("Item history schema ready");
    Ok(())
}
