//! Runs one configured load: fetch, ensure the table, insert, finish.
use crate::config::{Config, SourceConfig};
use crate::core::db::DatabaseManager;
use crate::core::{Result, TabloadError};
use crate::dataset::Dataset;
use crate::source::csv::{self, CsvOptions};
use crate::storage::{History, LoadRecord};
use chrono::{DateTime, Utc};
use std::time::{Duration, Instant};
use tracing::{error, info, info_span, warn};
use uuid::Uuid;

/// Summary of a successful load
#[derive(Debug, Clone)]
pub struct LoadReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub table: String,
    pub source: String,
    pub rows_fetched: usize,
    pub rows_inserted: u64,
    pub duration: Duration,
}

/// Executes the load described by `config` in a single session.
///
/// Everything happens in one transaction: if fetching, table creation or
/// any insert fails, nothing is committed. When `[target] types` is empty
/// the table is expected to exist already. When `[history]` is enabled the
/// run is journaled whether it succeeds or not.
pub fn run(config: &Config) -> Result<LoadReport> {
    let run_id = Uuid::new_v4();
    let span = info_span!("load", %run_id);
    let _guard = span.enter();

    let started_at = Utc::now();
    let clock = Instant::now();
    let source = config.source.describe();
    info!(source = %source, table = %config.target.table, "starting load");

    let result = execute(config);
    let duration = clock.elapsed();

    if config.history.enabled {
        journal(config, run_id, started_at, &source, &result, duration);
    }

    let (rows_fetched, rows_inserted) = result?;
    info!(rows = rows_inserted, elapsed_ms = duration.as_millis() as u64, "load finished");
    Ok(LoadReport {
        run_id,
        started_at,
        table: config.target.table.clone(),
        source,
        rows_fetched,
        rows_inserted,
        duration,
    })
}

fn execute(config: &Config) -> Result<(usize, u64)> {
    let manager = DatabaseManager::with_target(config.database.target()?)
        .with_page_size(config.target.page_size());
    let table = config.target.table.as_str();

    manager.session(|session| {
        let dataset: Dataset = match &config.source {
            SourceConfig::Csv { path, columns, .. } => {
                let options = CsvOptions::default().with_delimiter(config.source.delimiter()?);
                csv::read_with_options(path, columns, &options)?
            }
            SourceConfig::Api { url, payload } => session
                .fetch_from_api(url, payload)?
                .ok_or_else(|| TabloadError::Request(format!("{} returned no dataset", url)))?,
        };

        if config.target.types.is_empty() {
            warn!(table, "no column types configured; assuming the table exists");
        } else {
            session.ensure_table(&dataset, table, &config.target.types)?;
        }

        let inserted = session.bulk_insert(&dataset, table)?;
        Ok((dataset.len(), inserted))
    })
}

fn journal(
    config: &Config,
    run_id: Uuid,
    started_at: DateTime<Utc>,
    source: &str,
    result: &Result<(usize, u64)>,
    duration: Duration,
) {
    let Some(path) = config.history.resolved_path() else {
        warn!("no location for load history; skipping");
        return;
    };

    let (rows, error) = match result {
        Ok((_, inserted)) => (*inserted as i64, None),
        Err(e) => (0, Some(e.to_string())),
    };
    let record = LoadRecord::new(
        run_id,
        started_at,
        config.target.table.clone(),
        source.to_string(),
        rows,
        error,
        Some(duration.as_millis() as i64),
    );

    if let Err(e) = History::open(&path).and_then(|history| history.record(&record)) {
        error!(path = %path.display(), error = %e, "failed to record load history");
    }
}
