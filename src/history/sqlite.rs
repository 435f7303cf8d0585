use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::debug;
use rusqlite::{params, Connection, Row};

use super::schema;
use super::{canonical_key, HistoryError, HistoryId, HistoryRecord, HistoryStore, ItemUse, Result, SectionId};

const UPSERT_SQL: &str = "
    INSERT INTO item_history (name, name_key, last_section_id, usage_count, last_used_at)
    VALUES (?1, ?2, ?3, 1, ?4)
    ON CONFLICT(name_key) DO UPDATE SET
        last_section_id = excluded.last_section_id,
        usage_count = usage_count + 1,
        last_used_at = excluded.last_used_at
";

const CANDIDATES_SQL: &str = "
    SELECT h.id, h.name, h.last_section_id, COALESCE(s.name, ''), h.usage_count, h.last_used_at
    FROM item_history h
    LEFT JOIN sections s ON h.last_section_id = s.id
    ORDER BY h.usage_count DESC, h.last_used_at DESC, h.id DESC
    LIMIT ?1
";

/// SQLite-backed store. Blocking calls run on tokio's blocking pool.
#[derive(Clone)]
pub struct SqliteHistoryStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteHistoryStore {
    pub fn open(path: &Path, busy_timeout: Duration) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(busy_timeout)?;
        let mode: String = conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        debug!("Opened {} in {} journal mode", path.display(), mode);
        Self::from_connection(conn)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        schema::create_tables(&conn)?;
        Ok(SqliteHistoryStore {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| HistoryError::Worker("connection lock poisoned".to_string()))?;
            f(&mut guard)
        })
        .await
        .map_err(|e| HistoryError::Worker(e.to_string()))?
    }
}

fn upsert(conn: &Connection, name: &str, key: &str, section_id: SectionId, at: DateTime<Utc>) -> rusqlite::Result<()> {
    conn.execute(UPSERT_SQL, params![name, key, section_id, at.timestamp_millis()])?;
    Ok(())
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<HistoryRecord> {
    let last_used_ms: i64 = row.get(5)?;
    Ok(HistoryRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        last_section_id: row.get(2)?,
        last_section_name: row.get(3)?,
        usage_count: row.get(4)?,
        last_used_at: DateTime::<Utc>::from_timestamp_millis(last_used_ms).unwrap_or_default(),
    })
}

#[async_trait]
impl HistoryStore for SqliteHistoryStore {
    async fn record_use_at(&self, name: &str, section_id: SectionId, at: DateTime<Utc>) -> Result<()> {
        let Some(key) = canonical_key(name) else {
            debug!("Skipping blank item name");
            return Ok(());
        };
        let name = name.trim().to_string();

        self.with_conn(move |conn| {
            upsert(conn, &name, &key, section_id, at)?;
            debug!("Recorded use of {:?} in section {}", key, section_id);
            Ok(())
        })
        .await
    }

    async fn record_uses(&self, uses: &[ItemUse]) -> Result<()> {
        let batch: Vec<(String, String, SectionId)> = uses
            .iter()
            .filter_map(|u| canonical_key(&u.name).map(|key| (u.name.trim().to_string(), key, u.section_id)))
            .collect();
        if batch.is_empty() {
            return Ok(());
        }
        let at = Utc::now();

        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            for (name, key, section_id) in &batch {
                upsert(&tx, name, key, *section_id, at)?;
            }
            tx.commit()?;
            debug!("Recorded {} uses in one batch", batch.len());
            Ok(())
        })
        .await
    }

    async fn fetch_candidates(&self, limit: usize) -> Result<Vec<HistoryRecord>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare_cached(CANDIDATES_SQL)?;
            let records = stmt
                .query_map(params![limit], record_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(records)
        })
        .await
    }

    async fn delete_one(&self, id: HistoryId) -> Result<()> {
        self.with_conn(move |conn| {
            let removed = conn.execute("DELETE FROM item_history WHERE id = ?1", params![id])?;
            if removed == 0 {
                return Err(HistoryError::NotFound(id));
            }
            debug!("Deleted history item {}", id);
            Ok(())
        })
        .await
    }

    async fn delete_many(&self, ids: &[HistoryId]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let ids = ids.to_vec();

        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            let mut removed = 0;
            {
                let mut stmt = tx.prepare("DELETE FROM item_history WHERE id = ?1")?;
                for id in &ids {
                    removed += stmt.execute(params![id])?;
                }
            }
            tx.commit()?;
            debug!("Deleted {} of {} requested history items", removed, ids.len());
            Ok(removed)
        })
        .await
    }

    async fn put_section(&self, id: SectionId, name: &str) -> Result<()> {
        let name = name.to_string();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO sections (id, name) VALUES (?1, ?2)
                 ON CONFLICT(id) DO UPDATE SET name = excluded.name",
                params![id, name],
            )?;
            Ok(())
        })
        .await
    }

    async fn remove_section(&self, id: SectionId) -> Result<bool> {
        self.with_conn(move |conn| {
            let removed = conn.execute("DELETE FROM sections WHERE id = ?1", params![id])?;
            Ok(removed > 0)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn memory_store() -> SqliteHistoryStore {
        SqliteHistoryStore::open_in_memory().expect("open in-memory store")
    }

    #[tokio::test]
    async fn test_case_variants_collapse_into_one_record() {
        let store = memory_store();
        store.record_use("milk", 1).await.unwrap();
        store.record_use("MILK", 2).await.unwrap();
        store.record_use("mIlK", 3).await.unwrap();

        let records = store.fetch_candidates(10).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "milk");
        assert_eq!(records[0].usage_count, 3);
        assert_eq!(records[0].last_section_id, 3);
    }

    #[tokio::test]
    async fn test_update_keeps_id_and_refreshes_timestamp() {
        let store = memory_store();
        store.record_use_at("Bread", 1, at(0)).await.unwrap();
        let first = store.fetch_candidates(1).await.unwrap().remove(0);

        store.record_use_at("bread", 4, at(60)).await.unwrap();
        let second = store.fetch_candidates(1).await.unwrap().remove(0);

        assert_eq!(first.id, second.id);
        assert_eq!(second.name, "Bread");
        assert_eq!(second.usage_count, 2);
        assert_eq!(second.last_section_id, 4);
        assert_eq!(second.last_used_at, at(60));
    }

    #[tokio::test]
    async fn test_blank_names_are_ignored() {
        let store = memory_store();
        store.record_use("   ", 1).await.unwrap();
        store
            .record_uses(&[ItemUse::new("", 1), ItemUse::new("\t", 2)])
            .await
            .unwrap();
        assert!(store.fetch_candidates(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_candidates_order_by_usage_then_recency() {
        let store = memory_store();
        store.record_use_at("Eggs", 1, at(0)).await.unwrap();
        store.record_use_at("Butter", 1, at(10)).await.unwrap();
        store.record_use_at("Cheese", 1, at(5)).await.unwrap();
        store.record_use_at("Cheese", 1, at(6)).await.unwrap();

        let names: Vec<String> = store
            .fetch_candidates(10)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(names, vec!["Cheese", "Butter", "Eggs"]);

        assert_eq!(store.fetch_candidates(2).await.unwrap().len(), 2);
        assert!(store.fetch_candidates(0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_section_name_resolution_and_dangling_section() {
        let store = memory_store();
        store.put_section(7, "Dairy").await.unwrap();
        store.record_use("Yogurt", 7).await.unwrap();
        assert_eq!(store.fetch_candidates(1).await.unwrap()[0].last_section_name, "Dairy");

        store.put_section(7, "Fridge").await.unwrap();
        assert_eq!(store.fetch_candidates(1).await.unwrap()[0].last_section_name, "Fridge");

        assert!(store.remove_section(7).await.unwrap());
        assert!(!store.remove_section(7).await.unwrap());
        let record = store.fetch_candidates(1).await.unwrap().remove(0);
        assert_eq!(record.last_section_id, 7);
        assert_eq!(record.last_section_name, "");
    }

    #[tokio::test]
    async fn test_batch_counts_duplicates() {
        let store = memory_store();
        store
            .record_uses(&[
                ItemUse::new("Tomatoes", 2),
                ItemUse::new("Onions", 2),
                ItemUse::new("tomatoes", 3),
            ])
            .await
            .unwrap();

        let records = store.fetch_candidates(10).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].name, "Tomatoes");
        assert_eq!(records[0].usage_count, 2);
        assert_eq!(records[0].last_section_id, 3);
        assert_eq!(records[1].usage_count, 1);
    }

    #[tokio::test]
    async fn test_delete_one_missing_is_not_found() {
        let store = memory_store();
        store.record_use("Rice", 1).await.unwrap();
        let id = store.fetch_candidates(1).await.unwrap()[0].id;

        match store.delete_one(id + 100).await {
            Err(HistoryError::NotFound(missing)) => assert_eq!(missing, id + 100),
            other => panic!("Expected NotFound, got {:?}", other),
        }
        store.delete_one(id).await.unwrap();
        assert!(store.fetch_candidates(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_many_is_best_effort() {
        let store = memory_store();
        for name in ["Apples", "Pears", "Plums"] {
            store.record_use(name, 1).await.unwrap();
        }
        let records = store.fetch_candidates(10).await.unwrap();
        let keep = records.iter().find(|r| r.name == "Plums").unwrap().id;
        let doomed: Vec<HistoryId> = records.iter().filter(|r| r.id != keep).map(|r| r.id).collect();

        let mut ids = doomed.clone();
        ids.push(9_999);
        assert_eq!(store.delete_many(&ids).await.unwrap(), 2);
        assert_eq!(store.delete_many(&[]).await.unwrap(), 0);

        let left = store.fetch_candidates(10).await.unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].id, keep);
        assert_eq!(left[0].usage_count, 1);
    }

    #[tokio::test]
    async fn test_deleted_name_starts_fresh() {
        let store = memory_store();
        store.record_use("Flour", 1).await.unwrap();
        store.record_use("Flour", 1).await.unwrap();
        let id = store.fetch_candidates(1).await.unwrap()[0].id;
        store.delete_one(id).await.unwrap();

        store.record_use("FLOUR", 2).await.unwrap();
        let record = store.fetch_candidates(1).await.unwrap().remove(0);
        assert_ne!(record.id, id);
        assert_eq!(record.name, "FLOUR");
        assert_eq!(record.usage_count, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_tasks_do_not_lose_updates() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(SqliteHistoryStore::open(&dir.path().join("history.db"), Duration::from_secs(5)).unwrap());

        let mut handles = Vec::new();
        for i in 0..32 {
            let store = Arc::clone(&store);
            let name = if i % 2 == 0 { "Coffee" } else { "COFFEE" };
            handles.push(tokio::spawn(async move { store.record_use(name, i).await }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let records = store.fetch_candidates(10).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].usage_count, 32);
    }

    #[test]
    fn test_independent_connections_do_not_lose_updates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shared.db");
        SqliteHistoryStore::open(&path, Duration::from_secs(5)).unwrap();

        let threads: Vec<_> = (0..4)
            .map(|t| {
                let path = path.clone();
                std::thread::spawn(move || {
                    let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
                    let store = SqliteHistoryStore::open(&path, Duration::from_secs(10)).unwrap();
                    runtime.block_on(async {
                        for _ in 0..25 {
                            store.record_use(if t % 2 == 0 { "tea" } else { "Tea" }, t).await.unwrap();
                        }
                    });
                })
            })
            .collect();
        for thread in threads {
            thread.join().unwrap();
        }

        let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        let store = SqliteHistoryStore::open(&path, Duration::from_secs(5)).unwrap();
        let records = runtime.block_on(store.fetch_candidates(10)).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].usage_count, 100);
    }
}
