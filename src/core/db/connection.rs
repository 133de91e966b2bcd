/// Connection Management Module
///
/// This module provides connection parameters and the `Backend` trait a
/// session drives. Each backend owns one live connection with one open
/// transaction, begun at connect time and finished exactly once.

use crate::core::db::statement::{insert_sql, SqlDialect, TableName};
use crate::core::{Result, TabloadError};
use crate::dataset::{Dataset, Value};
use postgres::{Client, NoTls, SimpleQueryMessage};
use rusqlite::types::{ToSqlOutput, ValueRef};
use rusqlite::{params_from_iter, Connection, OpenFlags, ToSql};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Conventional PostgreSQL port
pub const DEFAULT_PORT: u16 = 5432;

/// Parameters for a PostgreSQL connection.
///
/// Immutable once built; `Debug` never prints the password.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionParams {
    database: String,
    host: String,
    user: String,
    password: String,
    port: u16,
}

impl ConnectionParams {
    /// Creates parameters using the default port
    pub fn new(
        database: impl Into<String>,
        host: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        ConnectionParams {
            database: database.into(),
            host: host.into(),
            user: user.into(),
            password: password.into(),
            port: DEFAULT_PORT,
        }
    }

    /// Returns a copy with a different port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionParams")
            .field("database", &self.database)
            .field("host", &self.host)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("port", &self.port)
            .finish()
    }
}

/// Where a session connects to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Postgres(ConnectionParams),
    Sqlite(PathBuf),
}

impl Target {
    /// Opens a connection and begins its transaction
    pub fn connect(&self) -> Result<Box<dyn Backend>> {
        match self {
            Target::Postgres(params) => Ok(Box::new(PostgresBackend::connect(params)?)),
            Target::Sqlite(path) => Ok(Box::new(SqliteBackend::connect(path)?)),
        }
    }

    pub fn dialect(&self) -> SqlDialect {
        match self {
            Target::Postgres(_) => SqlDialect::Postgres,
            Target::Sqlite(_) => SqlDialect::Sqlite,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Postgres(p) => write!(f, "postgres://{}@{}:{}/{}", p.user, p.host, p.port, p.database),
            Target::Sqlite(path) => write!(f, "sqlite://{}", path.display()),
        }
    }
}

/// How a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
}

/// A live connection with an open transaction.
///
/// Every statement runs inside that transaction until `finish` commits or
/// rolls it back and closes the connection.
pub trait Backend {
    fn dialect(&self) -> SqlDialect;

    /// Executes one or more statements that return no rows
    fn execute(&mut self, sql: &str) -> Result<()>;

    /// Inserts `rows` with a single multi-row INSERT and returns the row count
    fn insert_rows(&mut self, table: &TableName, columns: &[String], rows: &[Vec<Value>]) -> Result<u64>;

    /// Runs a query and collects its result
    fn query(&mut self, sql: &str) -> Result<Dataset>;

    /// Commits on success, rolls back otherwise, then closes the connection
    fn finish(self: Box<Self>, outcome: Outcome) -> Result<()>;
}

/// PostgreSQL backend over the synchronous `postgres` client
pub struct PostgresBackend {
    client: Client,
}

impl PostgresBackend {
    pub fn connect(params: &ConnectionParams) -> Result<Self> {
        let mut client = postgres::Config::new()
            .dbname(&params.database)
            .host(&params.host)
            .user(&params.user)
            .password(&params.password)
            .port(params.port)
            .connect(NoTls)
            .map_err(|e| TabloadError::Connection(format!("{}: {}", params.host, e)))?;

        client
            .batch_execute("BEGIN")
            .map_err(|e| TabloadError::Connection(format!("failed to begin transaction: {}", e)))?;

        Ok(PostgresBackend { client })
    }
}

impl Backend for PostgresBackend {
    fn dialect(&self) -> SqlDialect {
        SqlDialect::Postgres
    }

    fn execute(&mut self, sql: &str) -> Result<()> {
        debug!(sql, "executing statement");
        self.client
            .batch_execute(sql)
            .map_err(TabloadError::query)
    }

    fn insert_rows(&mut self, table: &TableName, columns: &[String], rows: &[Vec<Value>]) -> Result<u64> {
        let stmt = insert_sql(SqlDialect::Postgres, table, columns, rows);
        self.client
            .execute(stmt.sql.as_str(), &[])
            .map_err(TabloadError::query)
    }

    fn query(&mut self, sql: &str) -> Result<Dataset> {
        let messages = self
            .client
            .simple_query(sql)
            .map_err(TabloadError::query)?;

        let mut columns: Vec<String> = Vec::new();
        let mut rows = Vec::new();
        for message in messages {
            if let SimpleQueryMessage::Row(row) = message {
                if columns.is_empty() {
                    columns = row.columns().iter().map(|c| c.name().to_string()).collect();
                }
                let values = (0..row.len())
                    .map(|i| Value::from(row.get(i)))
                    .collect();
                rows.push(values);
            }
        }
        Dataset::new(columns, rows)
    }

    fn finish(self: Box<Self>, outcome: Outcome) -> Result<()> {
        let PostgresBackend { mut client } = *self;
        let statement = match outcome {
            Outcome::Success => "COMMIT",
            Outcome::Failure => "ROLLBACK",
        };
        let finished = client.batch_execute(statement);
        let closed = client.close();
        finished.map_err(|e| TabloadError::Transaction(statement, e.to_string()))?;
        closed.map_err(|e| TabloadError::Connection(format!("failed to close connection: {}", e)))
    }
}

/// SQLite backend for local files
pub struct SqliteBackend {
    connection: Connection,
}

impl SqliteBackend {
    /// Opens (creating if needed) the database file and begins a transaction
    pub fn connect(path: &Path) -> Result<Self> {
        let connection = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
        )
        .map_err(|e| TabloadError::Connection(format!("{}: {}", path.display(), e)))?;

        connection
            .execute_batch("PRAGMA foreign_keys = ON; BEGIN;")
            .map_err(|e| TabloadError::Connection(format!("failed to begin transaction: {}", e)))?;

        Ok(SqliteBackend { connection })
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::Borrowed(match self {
            Value::Null => ValueRef::Null,
            Value::Bool(b) => ValueRef::Integer(*b as i64),
            Value::Integer(i) => ValueRef::Integer(*i),
            Value::Real(r) => ValueRef::Real(*r),
            Value::Text(t) => ValueRef::Text(t.as_bytes()),
        }))
    }
}

impl From<ValueRef<'_>> for Value {
    fn from(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(i) => Value::Integer(i),
            ValueRef::Real(r) => Value::Real(r),
            ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).to_string()),
            ValueRef::Blob(b) => Value::Text(format!("<BLOB: {} bytes>", b.len())),
        }
    }
}

impl Backend for SqliteBackend {
    fn dialect(&self) -> SqlDialect {
        SqlDialect::Sqlite
    }

    fn execute(&mut self, sql: &str) -> Result<()> {
        debug!(sql, "executing statement");
        self.connection
            .execute_batch(sql)
            .map_err(TabloadError::query)
    }

    fn insert_rows(&mut self, table: &TableName, columns: &[String], rows: &[Vec<Value>]) -> Result<u64> {
        let stmt = insert_sql(SqlDialect::Sqlite, table, columns, rows);
        self.connection
            .execute(&stmt.sql, params_from_iter(stmt.params.iter()))
            .map(|n| n as u64)
            .map_err(TabloadError::query)
    }

    fn query(&mut self, sql: &str) -> Result<Dataset> {
        let mut stmt = self
            .connection
            .prepare(sql)
            .map_err(|e| TabloadError::query(format!("Failed to prepare statement: {}", e)))?;

        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let column_count = stmt.column_count();

        let rows = stmt
            .query_map([], |row| {
                (0..column_count)
                    .map(|i| row.get_ref(i).map(Value::from))
                    .collect::<rusqlite::Result<Vec<_>>>()
            })
            .map_err(|e| TabloadError::query(format!("Query execution failed: {}", e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| TabloadError::query(format!("Result processing failed: {}", e)))?;

        Dataset::new(columns, rows)
    }

    fn finish(self: Box<Self>, outcome: Outcome) -> Result<()> {
        let statement = match outcome {
            Outcome::Success => "COMMIT",
            Outcome::Failure => "ROLLBACK",
        };
        let SqliteBackend { connection } = *self;
        let finished = connection.execute_batch(statement);
        let closed = connection.close().map_err(|(_, e)| e);
        finished.map_err(|e| TabloadError::Transaction(statement, e.to_string()))?;
        closed.map_err(|e| TabloadError::Connection(format!("failed to close connection: {}", e)))
    }
}
