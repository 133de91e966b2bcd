//! Data sources a load can read from.
//!
//! Each source produces a [`Dataset`](crate::dataset::Dataset); the session
//! layer decides where it goes.

pub mod api;
pub mod csv;
