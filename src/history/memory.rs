use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{canonical_key, HistoryError, HistoryId, HistoryRecord, HistoryStore, ItemUse, Result, SectionId};

#[derive(Debug, Clone)]
struct Entry {
    id: HistoryId,
    name: String,
    last_section_id: SectionId,
    usage_count: i64,
    last_used_at: DateTime<Utc>,
}

#[derive(Default)]
struct State {
    next_id: HistoryId,
    entries: HashMap<String, Entry>,
    sections: HashMap<SectionId, String>,
}

impl State {
    fn upsert(&mut self, name: &str, section_id: SectionId, at: DateTime<Utc>) {
        let Some(key) = canonical_key(name) else {
            return;
        };
        if let Some(entry) = self.entries.get_mut(&key) {
            entry.last_section_id = section_id;
            entry.usage_count += 1;
            entry.last_used_at = at;
            return;
        }
        self.next_id += 1;
        self.entries.insert(
            key,
            Entry {
                id: self.next_id,
                name: name.trim().to_string(),
                last_section_id: section_id,
                usage_count: 1,
                last_used_at: at,
            },
        );
    }

    fn remove_id(&mut self, id: HistoryId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.id != id);
        self.entries.len() < before
    }
}

/// In-process store with the same merge semantics as the SQLite one.
#[derive(Default)]
pub struct MemoryHistoryStore {
    state: Mutex<State>,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| HistoryError::Worker("history state lock poisoned".to_string()))
    }
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn record_use_at(&self, name: &str, section_id: SectionId, at: DateTime<Utc>) -> Result<()> {
        self.lock()?.upsert(name, section_id, at);
        Ok(())
    }

    async fn record_uses(&self, uses: &[ItemUse]) -> Result<()> {
        let at = Utc::now();
        let mut state = self.lock()?;
        for item in uses {
            state.upsert(&item.name, item.section_id, at);
        }
        Ok(())
    }

    async fn fetch_candidates(&self, limit: usize) -> Result<Vec<HistoryRecord>> {
        let state = self.lock()?;
        let mut entries: Vec<&Entry> = state.entries.values().collect();
        entries.sort_by(|a, b| {
            b.usage_count
                .cmp(&a.usage_count)
                .then_with(|| b.last_used_at.cmp(&a.last_used_at))
                .then_with(|| b.id.cmp(&a.id))
        });

        Ok(entries
            .into_iter()
            .take(limit)
            .map(|entry| HistoryRecord {
                id: entry.id,
                name: entry.name.clone(),
                last_section_id: entry.last_section_id,
                last_section_name: state
                    .sections
                    .get(&entry.last_section_id)
                    .cloned()
                    .unwrap_or_default(),
                usage_count: entry.usage_count,
                last_used_at: entry.last_used_at,
            })
            .collect())
    }

    async fn delete_one(&self, id: HistoryId) -> Result<()> {
        if self.lock()?.remove_id(id) {
            Ok(())
        } else {
            Err(HistoryError::NotFound(id))
        }
    }

    async fn delete_many(&self, ids: &[HistoryId]) -> Result<usize> {
        let mut state = self.lock()?;
        Ok(ids.iter().filter(|id| state.remove_id(**id)).count())
    }

    async fn put_section(&self, id: SectionId, name: &str) -> Result<()> {
        self.lock()?.sections.insert(id, name.to_string());
        Ok(())
    }

    async fn remove_section(&self, id: SectionId) -> Result<bool> {
        Ok(self.lock()?.sections.remove(&id).is_some())
    }
}
