// Core infrastructure modules
pub mod core;

// Feature-specific modules
pub mod config;
pub mod dataset;
pub mod loader;
pub mod source;
pub mod storage;

#[cfg(test)]
mod test_utils;
