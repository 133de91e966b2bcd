/// Core Module for tabload
///
/// This module contains the database session layer and the shared error
/// type used by sources, the loader and the CLI.

pub mod db;
pub mod error;

// Re-export commonly used types for convenience
pub use error::{Result, TabloadError};
