//! Storage module for the local journal of load runs
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, Result as SqlResult, Row};
use std::fs;
use std::path::Path;
use tracing::{debug, error};
use uuid::Uuid;

const HISTORY_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS load_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id TEXT NOT NULL UNIQUE,
    started_at TEXT NOT NULL,
    target_table TEXT NOT NULL,
    source TEXT NOT NULL,
    rows_inserted INTEGER NOT NULL,
    success BOOLEAN NOT NULL,
    duration_ms INTEGER,
    error TEXT
)"#;

const SELECT_COLUMNS: &str =
    "id, run_id, started_at, target_table, source, rows_inserted, success, duration_ms, error";

#[derive(Debug, Clone, PartialEq)]
pub struct LoadRecord {
    pub id: i64,
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub target_table: String,
    pub source: String,
    pub rows_inserted: i64,
    pub success: bool,
    pub duration_ms: Option<i64>,
    pub error: Option<String>,
}

impl LoadRecord {
    pub fn new(
        run_id: Uuid,
        started_at: DateTime<Utc>,
        target_table: String,
        source: String,
        rows_inserted: i64,
        error: Option<String>,
        duration_ms: Option<i64>,
    ) -> Self {
        Self {
            id: 0, // Will be set by database
            run_id,
            started_at,
            target_table,
            source,
            rows_inserted,
            success: error.is_none(),
            duration_ms,
            error,
        }
    }

    fn from_row(row: &Row) -> SqlResult<Self> {
        let run_id: String = row.get(1)?;
        let started_at: String = row.get(2)?;
        Ok(LoadRecord {
            id: row.get(0)?,
            run_id: Uuid::parse_str(&run_id).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
            })?,
            started_at: DateTime::parse_from_rfc3339(&started_at)
                .map(|t| t.with_timezone(&Utc))
                .map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
                })?,
            target_table: row.get(3)?,
            source: row.get(4)?,
            rows_inserted: row.get(5)?,
            success: row.get(6)?,
            duration_ms: row.get(7)?,
            error: row.get(8)?,
        })
    }
}

pub struct History {
    conn: Connection,
}

impl History {
    /// Opens (creating if needed) the history database at `path`
    pub fn open(path: &Path) -> SqlResult<Self> {
        debug!("Initializing load history at {:?}", path);
        if let Some(parent) = path.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                error!("Failed to create history directory {:?}: {}", parent, e);
            }
        }
        let conn = Connection::open(path)?;
        let history = Self { conn };
        history.init()?;
        Ok(history)
    }

    fn init(&self) -> SqlResult<()> {
        self.conn.execute(HISTORY_TABLE_SQL, [])?;
        Ok(())
    }

    /// Appends a load run and returns its row id
    pub fn record(&self, record: &LoadRecord) -> SqlResult<i64> {
        let result = self.conn.execute(
            "INSERT INTO load_history (run_id, started_at, target_table, source, rows_inserted, success, duration_ms, error)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            (
                record.run_id.to_string(),
                record.started_at.to_rfc3339_opts(SecondsFormat::Micros, true),
                &record.target_table,
                &record.source,
                record.rows_inserted,
                record.success,
                record.duration_ms,
                &record.error,
            ),
        );

        match result {
            Ok(_) => {
                let id = self.conn.last_insert_rowid();
                debug!("Recorded load run {} as history entry {}", record.run_id, id);
                Ok(id)
            }
            Err(e) => {
                error!("Failed to record load run {}: {}", record.run_id, e);
                Err(e)
            }
        }
    }

    /// The most recent runs, newest first
    pub fn recent(&self, count: usize) -> SqlResult<Vec<LoadRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM load_history ORDER BY started_at DESC, id DESC LIMIT ?1",
            SELECT_COLUMNS
        ))?;
        let records = stmt.query_map([count as i64], LoadRecord::from_row)?;
        records.collect()
    }

    /// All runs that loaded into `table`, newest first
    pub fn for_table(&self, table: &str) -> SqlResult<Vec<LoadRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM load_history WHERE target_table = ?1 ORDER BY started_at DESC, id DESC",
            SELECT_COLUMNS
        ))?;
        let records = stmt.query_map([table], LoadRecord::from_row)?;
        records.collect()
    }
}
