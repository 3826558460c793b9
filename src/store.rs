use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::Connection;
use thiserror::Error;

use crate::assemble::ScheduleRecord;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("serialize record: {0}")]
    Json(#[from] serde_json::Error),
}

/// `<root>/<district>/<subcollection>`, e.g. `govtdata/erode/PDFs`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionPath {
    pub root: String,
    pub district: String,
    pub subcollection: String,
}

impl CollectionPath {
    pub fn new(root: &str, district: &str, subcollection: &str) -> Self {
        Self {
            root: root.to_string(),
            district: district.to_string(),
            subcollection: subcollection.to_string(),
        }
    }
}

impl fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.root, self.district, self.subcollection)
    }
}

/// Receives finished records; returns the id the store assigned.
pub trait RecordSink {
    fn store(&mut self, collection: &CollectionPath, record: &ScheduleRecord)
        -> Result<String, StoreError>;
}

// ── SQLite document store ──

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }
        let conn =
            Connection::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        init_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn close(self) -> Result<()> {
        self.conn
            .close()
            .map_err(|(_, e)| anyhow::Error::from(e).context("Failed to close store"))
    }

    pub fn save_run(&self, run: &RunRow) -> Result<()> {
        self.conn.execute(
            "INSERT INTO runs
             (run_id, year, month, documents, failed_documents, records, skipped, store_errors)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            rusqlite::params![
                run.run_id,
                run.year,
                run.month,
                run.documents,
                run.failed_documents,
                run.records,
                run.skipped,
                run.store_errors,
            ],
        )?;
        Ok(())
    }

    /// Stored records, newest first, optionally limited to one district.
    pub fn fetch_records(
        &self,
        district: Option<&str>,
        limit: usize,
    ) -> Result<Vec<(String, ScheduleRecord)>> {
        let mut stmt = self.conn.prepare(
            "SELECT district, body FROM documents
             WHERE ?1 IS NULL OR district = ?1
             ORDER BY id DESC
             LIMIT ?2",
        )?;
        let rows = stmt
            .query_map(rusqlite::params![district, limit as i64], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(district, body)| -> Result<(String, ScheduleRecord)> {
                let record = serde_json::from_str(&body)
                    .with_context(|| format!("Corrupt document in {}", district))?;
                Ok((district, record))
            })
            .collect()
    }

    pub fn collection_counts(&self) -> Result<Vec<(String, usize)>> {
        let mut stmt = self.conn.prepare(
            "SELECT collection, COUNT(*) FROM documents GROUP BY collection ORDER BY collection",
        )?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn recent_runs(&self, limit: usize) -> Result<Vec<RunRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT run_id, year, month, documents, failed_documents, records, skipped, store_errors
             FROM runs ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt
            .query_map([limit as i64], |row| {
                Ok(RunRow {
                    run_id: row.get(0)?,
                    year: row.get(1)?,
                    month: row.get(2)?,
                    documents: row.get(3)?,
                    failed_documents: row.get(4)?,
                    records: row.get(5)?,
                    skipped: row.get(6)?,
                    store_errors: row.get(7)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

impl RecordSink for SqliteStore {
    fn store(
        &mut self,
        collection: &CollectionPath,
        record: &ScheduleRecord,
    ) -> Result<String, StoreError> {
        let body = serde_json::to_string(record)?;
        self.conn.execute(
            "INSERT INTO documents (collection, district, body) VALUES (?1, ?2, ?3)",
            rusqlite::params![collection.to_string(), collection.district, body],
        )?;
        Ok(self.conn.last_insert_rowid().to_string())
    }
}

fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS documents (
            id          INTEGER PRIMARY KEY,
            collection  TEXT NOT NULL,
            district    TEXT NOT NULL,
            body        TEXT NOT NULL,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_documents_collection ON documents(collection);
        CREATE INDEX IF NOT EXISTS idx_documents_district ON documents(district);

        CREATE TABLE IF NOT EXISTS runs (
            id               INTEGER PRIMARY KEY AUTOINCREMENT,
            run_id           TEXT NOT NULL,
            year             INTEGER NOT NULL,
            month            INTEGER NOT NULL,
            documents        INTEGER NOT NULL,
            failed_documents INTEGER NOT NULL,
            records          INTEGER NOT NULL,
            skipped          INTEGER NOT NULL,
            store_errors     INTEGER NOT NULL,
            finished_at      TEXT NOT NULL DEFAULT (datetime('now'))
        );
        ",
    )?;
    Ok(())
}

pub struct RunRow {
    pub run_id: String,
    pub year: i32,
    pub month: u32,
    pub documents: usize,
    pub failed_documents: usize,
    pub records: usize,
    pub skipped: usize,
    pub store_errors: usize,
}

// ── In-memory sink ──

/// Keeps every stored record in order; ids are sequence numbers.
#[cfg(test)]
#[derive(Default)]
pub struct MemorySink {
    pub stored: Vec<(CollectionPath, ScheduleRecord)>,
}

#[cfg(test)]
impl RecordSink for MemorySink {
    fn store(
        &mut self,
        collection: &CollectionPath,
        record: &ScheduleRecord,
    ) -> Result<String, StoreError> {
        self.stored.push((collection.clone(), record.clone()));
        Ok(self.stored.len().to_string())
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn record(site: &str) -> ScheduleRecord {
        ScheduleRecord {
            camp_day: "1st Monday (06-01-2025)".into(),
            session_time: "9:00 AM - 12:00 PM".into(),
            camp_site: site.into(),
            villages: "Anthiyur".into(),
            distance_km: 5.0,
            population: 1200,
            staff: "MO, SN".into(),
            source_document: "erode.pdf".into(),
        }
    }

    #[test]
    fn collection_path_display() {
        let c = CollectionPath::new("govtdata", "erode", "PDFs");
        assert_eq!(c.to_string(), "govtdata/erode/PDFs");
    }

    #[test]
    fn store_and_read_back() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let erode = CollectionPath::new("govtdata", "erode", "PDFs");
        let palani = CollectionPath::new("govtdata", "palani", "PDFs");

        let id1 = store.store(&erode, &record("PHC")).unwrap();
        let id2 = store.store(&erode, &record("School")).unwrap();
        store.store(&palani, &record("Temple")).unwrap();
        assert_ne!(id1, id2);

        let all = store.fetch_records(None, 10).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].1.camp_site, "Temple");

        let erode_only = store.fetch_records(Some("erode"), 10).unwrap();
        assert_eq!(erode_only.len(), 2);
        assert_eq!(erode_only[1].1, record("PHC"));

        let counts = store.collection_counts().unwrap();
        assert_eq!(
            counts,
            vec![
                ("govtdata/erode/PDFs".to_string(), 2),
                ("govtdata/palani/PDFs".to_string(), 1)
            ]
        );
        store.close().unwrap();
    }

    #[test]
    fn runs_round_trip() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .save_run(&RunRow {
                run_id: "run-1".into(),
                year: 2025,
                month: 1,
                documents: 3,
                failed_documents: 1,
                records: 20,
                skipped: 7,
                store_errors: 0,
            })
            .unwrap();
        let runs = store.recent_runs(5).unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].failed_documents, 1);
        assert_eq!(runs[0].records, 20);
    }

    #[test]
    fn runs_with_same_id_are_both_kept() {
        let store = SqliteStore::open_in_memory().unwrap();
        for records in [3, 4] {
            store
                .save_run(&RunRow {
                    run_id: "run-20250101-090000.000".into(),
                    year: 2025,
                    month: 1,
                    documents: 1,
                    failed_documents: 0,
                    records,
                    skipped: 0,
                    store_errors: 0,
                })
                .unwrap();
        }
        let runs = store.recent_runs(5).unwrap();
        let records: Vec<usize> = runs.iter().map(|r| r.records).collect();
        assert_eq!(records, vec![4, 3]);
    }

    #[test]
    fn memory_sink_ids_are_sequential() {
        let mut sink = MemorySink::default();
        let c = CollectionPath::new("govtdata", "erode", "PDFs");
        assert_eq!(sink.store(&c, &record("a")).unwrap(), "1");
        assert_eq!(sink.store(&c, &record("b")).unwrap(), "2");
        assert_eq!(sink.stored[1].1.camp_site, "b");
    }
}
