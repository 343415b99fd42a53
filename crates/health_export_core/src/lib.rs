//! `HealthDataSource` trait and the aggregation/export pipeline built on it.
//!
//! Data flows Registry -> Fetcher -> Category/Global Aggregator ->
//! {Summarizer, Exporter}. Every fault below the global aggregator is
//! absorbed into zero-data results; see [`fetcher::FetchedRecords`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

pub mod aggregator;
pub mod config;
pub mod documents;
pub mod export;
pub mod fetcher;
pub mod json_source;
pub mod observability;
pub mod permissions;
pub mod record;
pub mod registry;
pub mod summarizer;
pub mod utils;

pub use aggregator::{Aggregator, CategoryResult, FetchWindow, GlobalResult, RunStats};
pub use fetcher::{FetchFault, FetchedRecords, RecordFetcher};
pub use permissions::{PermissionAuthority, StaticPermissions};
pub use record::{AttributeReader, AttributeValue, RawRecord};
pub use registry::{Category, RecordTypeConfig};
pub use summarizer::{DailySteps, HeartRateSample, HistoricalHealthData};

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("unsupported: {0}")]
    Unsupported(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("{0}")]
    Other(String),
}

/// Read access to the platform health store.
///
/// Implementations return every record of `type_id` whose start (or instant)
/// falls in `[start, end)`.
#[async_trait]
pub trait HealthDataSource: Send + Sync + 'static {
    async fn read_records(
        &self,
        type_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<RawRecord>, SourceError>;
}
