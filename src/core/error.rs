/// Tabload Error Module
///
/// This module defines the error type shared by every layer of tabload:
/// sessions, statement execution, sources and configuration.
use thiserror::Error;

/// Comprehensive error type for tabload.
///
/// The variants follow the three failure kinds of a load run:
/// - opening a session (`Connection`, `Session`)
/// - running statements (`Query`, `Database`, `Postgres`, `Identifier`)
/// - fetching data (`Http`, `Request`, `Csv`, `Column`, `Dataset`)
///
/// plus configuration and I/O failures.
#[derive(Error, Debug)]
pub enum TabloadError {
    /// The database server was unreachable or rejected the credentials
    #[error("Connection error: {0}")]
    Connection(String),

    /// Session lifecycle misuse (e.g. opening a second session)
    #[error("Session error: {0}")]
    Session(String),

    /// A statement issued inside a session failed
    #[error("Query error: {0}")]
    Query(String),

    /// COMMIT or ROLLBACK failed while finishing a session
    #[error("Transaction error: {0} failed: {1}")]
    Transaction(&'static str, String),

    /// Errors raised by the SQLite driver
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Errors raised by the PostgreSQL driver
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] postgres::Error),

    /// Malformed table or column identifiers
    #[error("Identifier error: {0}")]
    Identifier(String),

    /// HTTP transport failures
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Request-level failures (bad URL, unexpected body)
    #[error("Request error: {0}")]
    Request(String),

    /// CSV parsing errors
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// A requested column does not exist in the dataset
    #[error("Column error: {0}")]
    Column(String),

    /// Data that cannot be shaped into a table
    #[error("Dataset error: {0}")]
    Dataset(String),

    /// Configuration loading and validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File system and I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding and decoding errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Longest driver message kept in a `Query` error
pub const MAX_QUERY_MESSAGE: usize = 512;

impl TabloadError {
    /// A `Query` error from a driver failure.
    ///
    /// Drivers may echo the whole statement back, which for a bulk INSERT can
    /// run to megabytes, so the message is cut at `MAX_QUERY_MESSAGE` chars.
    pub fn query(err: impl std::fmt::Display) -> Self {
        TabloadError::Query(truncate_message(err.to_string(), MAX_QUERY_MESSAGE))
    }
}

fn truncate_message(mut message: String, limit: usize) -> String {
    if let Some((cut, _)) = message.char_indices().nth(limit) {
        message.truncate(cut);
        message.push_str("...");
    }
    message
}

/// Type alias for Result to use TabloadError as the error type.
pub type Result<T> = std::result::Result<T, TabloadError>;
