//! Export driver: wires a directory-backed source, permissions and the
//! exporter from [`health_export_core`] into one run.

use std::path::Path;
use std::sync::Arc;

use health_export_core::config::Config;
use health_export_core::export::{ExportReport, Exporter};
use health_export_core::json_source::JsonDirSource;
use health_export_core::{Aggregator, HistoricalHealthData, RunStats, StaticPermissions};
use tracing::{info, warn};

pub mod error;
pub mod middleware;

pub use error::{CliError, CliResult};
pub use middleware::LoggingSource;

pub const LOG_LEVEL_ENV: &str = "HEALTH_EXPORT_LOG_LEVEL";
pub const DEFAULT_LOG_FILTER: &str = "info";

/// `HEALTH_EXPORT_LOG_LEVEL`, else `RUST_LOG`, else `info`.
pub fn log_filter_from<F>(mut get: F) -> String
where
    F: FnMut(&str) -> Option<String>,
{
    get(LOG_LEVEL_ENV)
        .or_else(|| get("RUST_LOG"))
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string())
}

/// What one run produced.
#[derive(Clone, Debug)]
pub struct ExportOutcome {
    pub export_id: String,
    pub stats: RunStats,
    pub report: ExportReport,
    pub requested_permissions: usize,
    pub date_range: String,
}

fn permissions_for(config: &Config) -> StaticPermissions {
    match &config.granted_types {
        Some(types) => StaticPermissions::from_type_ids(types),
        None => StaticPermissions::allow_all(),
    }
}

/// Aggregate every registered type from `config.source_dir` and write all
/// documents to `config.output_dir`.
///
/// Only a missing source directory is an error; per-type and per-file
/// failures are reported through [`ExportOutcome`].
pub async fn run_export(config: &Config) -> CliResult<ExportOutcome> {
    if !tokio::fs::try_exists(&config.source_dir).await? {
        return Err(CliError::SourceDirMissing(config.source_dir.clone()));
    }
    let window = config.window();
    info!(
        source = %config.source_dir.display(),
        output = %config.output_dir.display(),
        start = %window.start,
        end = %window.end,
        "starting export"
    );

    let source = LoggingSource::new(JsonDirSource::new(&config.source_dir));
    let aggregator = Aggregator::new(Arc::new(source))
        .with_permissions(Arc::new(permissions_for(config)))
        .with_max_concurrent_fetches(config.max_concurrent_fetches);

    let requested = aggregator.request_missing_permissions().await;
    if !requested.is_empty() {
        info!(count = requested.len(), "requested missing read permissions");
    }

    let (global, stats) = aggregator.fetch_all_with_stats(window).await;
    let historical = HistoricalHealthData::from_global(&global);

    let exporter = Exporter::new(&config.output_dir).with_file_names(config.file_names.clone());
    let mut report = exporter.export_all(&global, &historical, window).await;
    if config.write_schemas {
        report.merge(exporter.write_schemas().await);
    }
    if !report.is_complete() {
        warn!(failed = ?report.failed(), "some documents were not written");
    }

    Ok(ExportOutcome {
        export_id: exporter.export_id().to_string(),
        stats,
        report,
        requested_permissions: requested.len(),
        date_range: historical.date_range_label(),
    })
}

/// Write the rendered metrics exposition text.
pub async fn write_metrics(path: &Path, rendered: &str) -> CliResult<()> {
    tokio::fs::write(path, rendered).await?;
    Ok(())
}
