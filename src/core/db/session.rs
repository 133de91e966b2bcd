/// Session Module
///
/// `DatabaseManager` stores where to connect; `Session` is one scoped use of
/// that connection. A session begins a transaction when it opens and ends it
/// exactly once: committed when the scope succeeds, rolled back when it fails,
/// panics or is dropped unfinished.

use crate::core::db::connection::{Backend, ConnectionParams, Outcome, Target};
use crate::core::db::statement::{create_table_sql, rows_per_statement, TableName};
use crate::core::{Result, TabloadError};
use crate::dataset::Dataset;
use crate::source;
use std::cell::Cell;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Rows per INSERT statement unless configured otherwise
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Owns connection parameters and hands out one session at a time.
///
/// Constructing a manager never connects; `open` and `session` do.
#[derive(Debug)]
pub struct DatabaseManager {
    target: Target,
    page_size: usize,
    active: Cell<bool>,
}

impl DatabaseManager {
    /// Manager for a PostgreSQL server
    pub fn new(params: ConnectionParams) -> Self {
        Self::with_target(Target::Postgres(params))
    }

    /// Manager for a SQLite database file
    pub fn sqlite(path: impl Into<PathBuf>) -> Self {
        Self::with_target(Target::Sqlite(path.into()))
    }

    pub fn with_target(target: Target) -> Self {
        DatabaseManager {
            target,
            page_size: DEFAULT_PAGE_SIZE,
            active: Cell::new(false),
        }
    }

    /// Sets how many rows each INSERT statement carries (minimum 1)
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Whether a session from this manager is currently open
    pub fn is_active(&self) -> bool {
        self.active.get()
    }

    /// Connects and begins a transaction.
    ///
    /// # Errors
    ///
    /// `TabloadError::Session` if another session from this manager is still
    /// open, `TabloadError::Connection` if the database cannot be reached.
    pub fn open(&self) -> Result<Session<'_>> {
        if self.active.get() {
            return Err(TabloadError::Session(
                "a session is already open on this manager".to_string(),
            ));
        }

        let backend = self.target.connect()?;
        self.active.set(true);
        info!(target_db = %self.target, "session opened");

        Ok(Session {
            manager: self,
            backend: Some(backend),
        })
    }

    /// Runs `f` inside a session.
    ///
    /// `Ok` commits and `Err` rolls back; the closure's error is returned
    /// unchanged even if the rollback itself fails.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use tabload::core::db::{ConnectionParams, DatabaseManager};
    ///
    /// let manager = DatabaseManager::new(ConnectionParams::new("staging", "localhost", "postgres", "secret"));
    /// let inserted = manager.session(|s| {
    ///     let data = s.fetch_from_csv("database.csv", &["nome", "cpf"])?;
    ///     s.ensure_table(&data, "stg.people", &["VARCHAR(100)", "INTEGER"])?;
    ///     s.bulk_insert(&data, "stg.people")
    /// })?;
    /// # Ok::<(), tabload::core::TabloadError>(())
    /// ```
    pub fn session<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Session<'_>) -> Result<T>,
    {
        let mut session = self.open()?;
        match f(&mut session) {
            Ok(value) => {
                session.commit()?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback_err) = session.rollback() {
                    error!(error = %rollback_err, "rollback failed");
                }
                Err(e)
            }
        }
    }
}

/// One open connection and transaction borrowed from a `DatabaseManager`
pub struct Session<'m> {
    manager: &'m DatabaseManager,
    backend: Option<Box<dyn Backend>>,
}

impl<'m> Session<'m> {
    /// Commits the transaction and closes the connection
    pub fn commit(mut self) -> Result<()> {
        self.finalize(Outcome::Success)
    }

    /// Rolls the transaction back and closes the connection
    pub fn rollback(mut self) -> Result<()> {
        self.finalize(Outcome::Failure)
    }

    /// Single exit path for every way a session can end
    fn finalize(&mut self, outcome: Outcome) -> Result<()> {
        let result = match self.backend.take() {
            Some(backend) => backend.finish(outcome),
            None => Ok(()),
        };
        self.manager.active.set(false);

        match (&result, outcome) {
            (Ok(()), Outcome::Success) => info!("session committed"),
            (Ok(()), Outcome::Failure) => warn!("session rolled back"),
            (Err(e), _) => error!(error = %e, ?outcome, "failed to finish session"),
        }
        result
    }

    fn backend(&mut self) -> Result<&mut Box<dyn Backend>> {
        self.backend
            .as_mut()
            .ok_or_else(|| TabloadError::Session("session is already finished".to_string()))
    }

    /// Creates `table_name` unless it exists, pairing the dataset's column
    /// names with `column_types` by position.
    ///
    /// Only the column names of `dataset` are used. An existing table is left
    /// untouched even if its columns differ. A dataset without columns (such
    /// as an empty API response) has nothing to define and issues no SQL.
    pub fn ensure_table<S: AsRef<str>>(
        &mut self,
        dataset: &Dataset,
        table_name: &str,
        column_types: &[S],
    ) -> Result<()> {
        let table = TableName::parse(table_name)?;
        if dataset.column_count() == 0 || column_types.is_empty() {
            warn!(table = %table, "no column definitions; leaving table as is");
            return Ok(());
        }
        let backend = self.backend()?;
        let sql = create_table_sql(backend.dialect(), &table, dataset.columns(), column_types);
        debug!(table = %table, "ensuring table exists");
        backend.execute(&sql)
    }

    /// Inserts every row of `dataset` into `table_name`, in order.
    ///
    /// Rows go out in INSERT statements of at most `page_size` rows, fewer
    /// when the backend limits bound parameters per statement. On a database
    /// error the failure is logged and returned; the transaction is only
    /// rolled back when the session itself ends in failure.
    pub fn bulk_insert(&mut self, dataset: &Dataset, table_name: &str) -> Result<u64> {
        let table = TableName::parse(table_name)?;
        if dataset.is_empty() || dataset.column_count() == 0 {
            debug!(table = %table, "no rows to insert");
            return Ok(0);
        }

        let configured = self.manager.page_size;
        let backend = self.backend()?;
        let page_size = rows_per_statement(backend.dialect(), configured, dataset.column_count());
        if page_size < configured {
            debug!(table = %table, configured, page_size, "page size capped by parameter limit");
        }
        let mut inserted = 0u64;
        for page in dataset.rows().chunks(page_size) {
            match backend.insert_rows(&table, dataset.columns(), page) {
                Ok(count) => inserted += count,
                Err(e) => {
                    error!(table = %table, inserted, error = %e, "bulk insert failed");
                    return Err(e);
                }
            }
        }

        info!(table = %table, rows = inserted, "rows inserted");
        Ok(inserted)
    }

    /// POSTs `payload` as JSON to `url`; `Ok(None)` when the status is not 200
    pub fn fetch_from_api(&self, url: &str, payload: &serde_json::Value) -> Result<Option<Dataset>> {
        source::api::fetch(url, payload)
    }

    /// Reads a CSV file, keeping only `column_filter` (in its order) when non-empty
    pub fn fetch_from_csv<P: AsRef<Path>, S: AsRef<str>>(
        &self,
        path: P,
        column_filter: &[S],
    ) -> Result<Dataset> {
        source::csv::read(path, column_filter)
    }

    /// Runs a query inside the session's transaction
    pub fn query(&mut self, sql: &str) -> Result<Dataset> {
        self.backend()?.query(sql)
    }

    /// Executes statements inside the session's transaction
    pub fn execute(&mut self, sql: &str) -> Result<()> {
        self.backend()?.execute(sql)
    }
}

impl Drop for Session<'_> {
    fn drop(&mut self) {
        if self.backend.is_some() {
            warn!("session dropped without commit; rolling back");
            let _ = self.finalize(Outcome::Failure);
        }
    }
}
