//! Metric names and recording helpers.
//!
//! Recording goes through the `metrics` facade; without an installed
//! recorder every call is a no-op.

use std::time::Duration;

use crate::aggregator::RunStats;
use crate::fetcher::FetchedRecords;

pub const FETCH_TOTAL: &str = "health_export_fetch_total";
pub const RECORDS_TOTAL: &str = "health_export_records_total";
pub const FETCH_DURATION_SECONDS: &str = "health_export_fetch_duration_seconds";
pub const RUN_DURATION_SECONDS: &str = "health_export_run_duration_seconds";
pub const RUN_RECORDS: &str = "health_export_run_records";
pub const WRITE_TOTAL: &str = "health_export_write_total";

pub fn record_fetch(type_id: &'static str, fetched: &FetchedRecords, elapsed: Duration) {
    metrics::counter!(FETCH_TOTAL, "type" => type_id, "outcome" => fetched.outcome()).increment(1);
    metrics::counter!(RECORDS_TOTAL, "type" => type_id).increment(fetched.count as u64);
    metrics::histogram!(FETCH_DURATION_SECONDS, "type" => type_id).record(elapsed.as_secs_f64());
}

pub fn record_run(stats: &RunStats) {
    metrics::histogram!(RUN_DURATION_SECONDS).record(stats.elapsed.as_secs_f64());
    metrics::gauge!(RUN_RECORDS).set(stats.total_records as f64);
}

pub fn record_write(ok: bool) {
    let outcome = if ok { "ok" } else { "failed" };
    metrics::counter!(WRITE_TOTAL, "outcome" => outcome).increment(1);
}
