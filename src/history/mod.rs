//! Persistent index of every item name ever added to a list.
//!
//! One record exists per case-insensitive name. Writes only ever bump the
//! statistics of an existing record; the display name is fixed by the first
//! insert.

mod error;
mod memory;
mod schema;
mod sqlite;

pub use self::error::{HistoryError, Result};
pub use self::memory::MemoryHistoryStore;
pub use self::sqlite::SqliteHistoryStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

pub type HistoryId = i64;
pub type SectionId = i64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryRecord {
    pub id: HistoryId,
    pub name: String,
    pub last_section_id: SectionId,
    /// Empty when the section has since been removed.
    pub last_section_name: String,
    pub usage_count: i64,
    pub last_used_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemUse {
    pub name: String,
    pub section_id: SectionId,
}

impl ItemUse {
    pub fn new(name: impl Into<String>, section_id: SectionId) -> Self {
        ItemUse {
            name: name.into(),
            section_id,
        }
    }
}

/// Key that carries the uniqueness constraint. `None` for blank names.
pub fn canonical_key(name: &str) -> Option<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_lowercase())
    }
}

#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Insert-or-increment keyed on the canonical name. Atomic per name.
    async fn record_use_at(&self, name: &str, section_id: SectionId, at: DateTime<Utc>) -> Result<()>;

    async fn record_use(&self, name: &str, section_id: SectionId) -> Result<()> {
        self.record_use_at(name, section_id, Utc::now()).await
    }

    /// Records every use in one transaction with a shared timestamp.
    async fn record_uses(&self, uses: &[ItemUse]) -> Result<()>;

    /// Most used first, most recently used among equals.
    async fn fetch_candidates(&self, limit: usize) -> Result<Vec<HistoryRecord>>;

    async fn delete_one(&self, id: HistoryId) -> Result<()>;

    /// Best effort; returns how many of `ids` actually existed.
    async fn delete_many(&self, ids: &[HistoryId]) -> Result<usize>;

    async fn put_section(&self, id: SectionId, name: &str) -> Result<()>;

    async fn remove_section(&self, id: SectionId) -> Result<bool>;
}
