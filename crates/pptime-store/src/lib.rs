//! # pptime-store
//!
//! Registry of generated reports.
//!
//! [`SqliteReportStore`] keeps one row per materialized workbook in a
//! `reports` table; [`InMemoryReportStore`] offers the same contract for
//! tests and dry runs. Records are immutable once written.

use chrono::{DateTime, SecondsFormat, Utc};
use pptime_core::{ReportArtifact, ReportStore, StoreError};
use rusqlite::{params, Connection};
use std::path::Path;
use tracing::debug;

pub const SCHEMA_VERSION: i64 = 1;

/// SQLite-backed [`ReportStore`]
pub struct SqliteReportStore {
    conn: Connection,
}

impl SqliteReportStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(backend)?;
        let store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(backend)?;
        let store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    pub fn schema_version(&self) -> Result<i64, StoreError> {
        self.conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))
            .map_err(backend)
    }

    pub fn migrate(&self) -> Result<(), StoreError> {
        let current = self.schema_version()?;
        if current > SCHEMA_VERSION {
            return Err(StoreError::UnsupportedSchemaVersion {
                found: current,
                supported: SCHEMA_VERSION,
            });
        }

        if current < 1 {
            let sql = include_str!("../migrations/0001_reports.sql");
            self.conn.execute_batch(sql).map_err(backend)?;
            self.conn
                .execute("PRAGMA user_version = 1", [])
                .map_err(backend)?;
            debug!(version = 1, "report schema migrated");
        }

        Ok(())
    }

    /// Insert a record with an explicit creation time
    pub fn record_at(
        &mut self,
        file_path: &str,
        comment: &str,
        created_at: DateTime<Utc>,
    ) -> Result<ReportArtifact, StoreError> {
        self.conn
            .execute(
                "INSERT INTO reports (file_path, created_at, comment) VALUES (?1, ?2, ?3)",
                params![file_path, format_timestamp(created_at), comment],
            )
            .map_err(backend)?;
        let id = self.conn.last_insert_rowid();
        debug!(report_id = id, path = file_path, "report recorded");

        Ok(ReportArtifact {
            id,
            file_path: file_path.to_string(),
            created_at: parse_timestamp(&format_timestamp(created_at))?,
            comment: comment.to_string(),
        })
    }
}

impl ReportStore for SqliteReportStore {
    fn record(&mut self, file_path: &str, comment: &str) -> Result<ReportArtifact, StoreError> {
        self.record_at(file_path, comment, Utc::now())
    }

    fn list(&self) -> Result<Vec<ReportArtifact>, StoreError> {
        let mut statement = self
            .conn
            .prepare(
                "
                SELECT id, file_path, created_at, comment
                FROM reports
                ORDER BY created_at DESC, id DESC
                ",
            )
            .map_err(backend)?;

        let rows = statement
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })
            .map_err(backend)?;

        let mut artifacts = Vec::new();
        for row in rows {
            let (id, file_path, created_at, comment) = row.map_err(backend)?;
            artifacts.push(ReportArtifact {
                id,
                file_path,
                created_at: parse_timestamp(&created_at)?,
                comment,
            });
        }
        Ok(artifacts)
    }
}

/// Volatile [`ReportStore`] with the same ordering contract
#[derive(Debug, Default)]
pub struct InMemoryReportStore {
    records: Vec<ReportArtifact>,
}

impl InMemoryReportStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_at(
        &mut self,
        file_path: &str,
        comment: &str,
        created_at: DateTime<Utc>,
    ) -> ReportArtifact {
        let artifact = ReportArtifact {
            id: self.records.len() as i64 + 1,
            file_path: file_path.to_string(),
            created_at,
            comment: comment.to_string(),
        };
        self.records.push(artifact.clone());
        artifact
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl ReportStore for InMemoryReportStore {
    fn record(&mut self, file_path: &str, comment: &str) -> Result<ReportArtifact, StoreError> {
        Ok(self.record_at(file_path, comment, Utc::now()))
    }

    fn list(&self) -> Result<Vec<ReportArtifact>, StoreError> {
        let mut artifacts = self.records.clone();
        artifacts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(artifacts)
    }
}

fn backend(err: rusqlite::Error) -> StoreError {
    StoreError::Backend(Box::new(err))
}

// Fixed width so that text ordering in SQL matches time ordering
fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(value)
        .map(|timestamp| timestamp.with_timezone(&Utc))
        .map_err(|err| StoreError::Timestamp(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn ts(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 9, hour, 0, 0)
            .single()
            .expect("valid timestamp")
    }

    #[test]
    fn migration_sets_schema_version() {
        let store = SqliteReportStore::open_in_memory().unwrap();
        assert_eq!(store.schema_version().unwrap(), SCHEMA_VERSION);

        // idempotent
        store.migrate().unwrap();
        assert_eq!(store.schema_version().unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn newer_schema_is_refused() {
        let store = SqliteReportStore::open_in_memory().unwrap();
        store.conn.execute("PRAGMA user_version = 7", []).unwrap();

        let err = store.migrate().unwrap_err();
        assert!(matches!(
            err,
            StoreError::UnsupportedSchemaVersion {
                found: 7,
                supported: 1
            }
        ));
    }

    #[test]
    fn list_is_newest_first() {
        let mut store = SqliteReportStore::open_in_memory().unwrap();
        store.record_at("a.xlsx", "first", ts(8)).unwrap();
        store.record_at("c.xlsx", "third", ts(10)).unwrap();
        store.record_at("b.xlsx", "second", ts(9)).unwrap();

        let paths: Vec<String> = store
            .list()
            .unwrap()
            .into_iter()
            .map(|a| a.file_path)
            .collect();
        assert_eq!(paths, vec!["c.xlsx", "b.xlsx", "a.xlsx"]);
    }

    #[test]
    fn equal_timestamps_fall_back_to_id() {
        let mut store = SqliteReportStore::open_in_memory().unwrap();
        let first = store.record_at("a.xlsx", "x", ts(8)).unwrap();
        let second = store.record_at("b.xlsx", "x", ts(8)).unwrap();

        let ids: Vec<i64> = store.list().unwrap().iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![second.id, first.id]);
    }

    #[test]
    fn record_round_trips_fields() {
        let mut store = SqliteReportStore::open_in_memory().unwrap();
        let artifact = store
            .record("timereports/time_report_2024-03-09-07-05-01.xlsx", "March close")
            .unwrap();

        assert_eq!(store.list().unwrap(), vec![artifact]);
    }

    #[test]
    fn in_memory_store_orders_like_sqlite() {
        let mut store = InMemoryReportStore::new();
        store.record_at("a.xlsx", "x", ts(9));
        store.record_at("b.xlsx", "x", ts(11));
        store.record_at("c.xlsx", "x", ts(11));

        let paths: Vec<String> = store
            .list()
            .unwrap()
            .into_iter()
            .map(|a| a.file_path)
            .collect();
        assert_eq!(paths, vec!["c.xlsx", "b.xlsx", "a.xlsx"]);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn bad_timestamp_surfaces() {
        let store = SqliteReportStore::open_in_memory().unwrap();
        store
            .conn
            .execute(
                "INSERT INTO reports (file_path, created_at, comment) VALUES ('x', 'yesterday', '')",
                [],
            )
            .unwrap();

        assert!(matches!(store.list(), Err(StoreError::Timestamp(_))));
    }
}
