/// Database Module
///
/// This module provides the database layer of tabload, organized into
/// focused submodules.
///
/// ## Architecture
///
/// - **Connection Management** (`connection.rs`): connection parameters and the
///   `Backend` trait with its PostgreSQL and SQLite implementations
/// - **Statement Generation** (`statement.rs`): CREATE TABLE / INSERT builders
///   and identifier escaping
/// - **Sessions** (`session.rs`): the scoped open/commit-or-rollback/close
///   lifecycle and the load operations issued inside it
///
/// ## Error Handling
///
/// All database operations use `TabloadError` for consistent error propagation.
pub mod connection;
pub mod session;
pub mod statement;

pub use connection::*;
pub use session::*;
pub use statement::*;
