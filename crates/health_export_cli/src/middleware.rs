//! Logging wrapper around a [`HealthDataSource`].

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use health_export_core::{HealthDataSource, RawRecord, SourceError};
use tracing::debug;

/// Adds per-read debug logging to any source.
#[derive(Clone)]
pub struct LoggingSource<C: HealthDataSource> {
    inner: Arc<C>,
}

impl<C: HealthDataSource> LoggingSource<C> {
    pub fn new(source: C) -> Self {
        Self {
            inner: Arc::new(source),
        }
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }
}

#[async_trait::async_trait]
impl<C: HealthDataSource> HealthDataSource for LoggingSource<C> {
    async fn read_records(
        &self,
        type_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<RawRecord>, SourceError> {
        let started = Instant::now();
        debug!(type_id, %start, %end, "reading records");

        let result = self.inner.read_records(type_id, start, end).await;

        let duration = started.elapsed();
        match &result {
            Ok(records) => debug!(type_id, count = records.len(), ?duration, "read completed"),
            Err(e) => debug!(type_id, ?duration, error = %e, "read failed"),
        }
        result
    }
}
