//! Per-type fetcher.
//!
//! [`RecordFetcher::fetch`] never fails: any fault raised by the data source
//! for one type (including a panic) is logged and turned into a zero-count
//! [`FetchedRecords`]. This is what lets aggregation across dozens of
//! independently failing types run to completion.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use futures_util::FutureExt;
use tracing::{debug, warn};

use crate::permissions::PermissionAuthority;
use crate::record::RawRecord;
use crate::registry::RecordTypeConfig;
use crate::{HealthDataSource, SourceError, observability};

/// Why a fetch produced no data.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FetchFault {
    PermissionDenied,
    /// SDK, I/O or parse error for this type.
    Transient(String),
    /// The source rejects this type.
    Unsupported(String),
    /// The surrounding category aggregation faulted.
    Category(String),
}

impl FetchFault {
    pub fn label(&self) -> &'static str {
        match self {
            FetchFault::PermissionDenied => "permission_denied",
            FetchFault::Transient(_) => "transient",
            FetchFault::Unsupported(_) => "unsupported",
            FetchFault::Category(_) => "category",
        }
    }
}

impl From<&SourceError> for FetchFault {
    fn from(err: &SourceError) -> Self {
        match err {
            SourceError::PermissionDenied(_) => FetchFault::PermissionDenied,
            SourceError::Unsupported(msg) => FetchFault::Unsupported(msg.clone()),
            other => FetchFault::Transient(other.to_string()),
        }
    }
}

/// Result of fetching one type.
///
/// `count == records.len()` always holds; a permission-denied result has no
/// records.
#[derive(Clone, Debug, PartialEq)]
pub struct FetchedRecords {
    pub config: RecordTypeConfig,
    pub records: Vec<RawRecord>,
    pub count: usize,
    pub permission_denied: bool,
    pub fault: Option<FetchFault>,
}

impl FetchedRecords {
    pub fn with_records(config: RecordTypeConfig, records: Vec<RawRecord>) -> Self {
        Self {
            config,
            count: records.len(),
            records,
            permission_denied: false,
            fault: None,
        }
    }

    pub fn failed(config: RecordTypeConfig, fault: FetchFault) -> Self {
        Self {
            config,
            records: Vec::new(),
            count: 0,
            permission_denied: fault == FetchFault::PermissionDenied,
            fault: Some(fault),
        }
    }

    pub fn denied(config: RecordTypeConfig) -> Self {
        Self::failed(config, FetchFault::PermissionDenied)
    }

    pub fn has_data(&self) -> bool {
        self.count > 0
    }

    /// Outcome label used for metrics.
    pub fn outcome(&self) -> &'static str {
        match &self.fault {
            Some(fault) => fault.label(),
            None if self.has_data() => "ok",
            None => "empty",
        }
    }
}

#[derive(Clone)]
pub struct RecordFetcher {
    source: Arc<dyn HealthDataSource>,
    permissions: Option<Arc<dyn PermissionAuthority>>,
}

impl RecordFetcher {
    pub fn new(source: Arc<dyn HealthDataSource>) -> Self {
        Self {
            source,
            permissions: None,
        }
    }

    pub fn with_permissions(mut self, permissions: Arc<dyn PermissionAuthority>) -> Self {
        self.permissions = Some(permissions);
        self
    }

    pub fn permissions(&self) -> Option<&Arc<dyn PermissionAuthority>> {
        self.permissions.as_ref()
    }

    pub async fn fetch(
        &self,
        config: &RecordTypeConfig,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> FetchedRecords {
        let started = Instant::now();
        let fetched = self.fetch_inner(config, start, end).await;
        observability::record_fetch(config.type_id, &fetched, started.elapsed());
        fetched
    }

    async fn fetch_inner(
        &self,
        config: &RecordTypeConfig,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> FetchedRecords {
        // Authority faults are absorbed per type, like source faults.
        let guarded = async {
            if let Some(permissions) = &self.permissions {
                let granted = permissions.granted_capabilities().await;
                if !granted.contains(&config.read_capability()) {
                    return Ok(None);
                }
            }
            self.source
                .read_records(config.type_id, start, end)
                .await
                .map(Some)
        };
        match AssertUnwindSafe(guarded).catch_unwind().await {
            Ok(Ok(None)) => {
                debug!(type_id = config.type_id, "read capability not granted; skipping fetch");
                FetchedRecords::denied(*config)
            }
            Ok(Ok(Some(records))) => {
                let total = records.len();
                let records: Vec<RawRecord> = records
                    .into_iter()
                    .filter(|r| r.type_id == config.type_id)
                    .collect();
                if records.len() != total {
                    warn!(
                        type_id = config.type_id,
                        discarded = total - records.len(),
                        "source returned records of another type"
                    );
                }
                debug!(type_id = config.type_id, count = records.len(), "fetched records");
                FetchedRecords::with_records(*config, records)
            }
            Ok(Err(err)) => {
                warn!(type_id = config.type_id, error = %err, "fetch failed; recording zero records");
                FetchedRecords::failed(*config, FetchFault::from(&err))
            }
            Err(payload) => {
                let msg = panic_message(payload.as_ref());
                warn!(type_id = config.type_id, %msg, "fetch panicked; recording zero records");
                FetchedRecords::failed(*config, FetchFault::Transient(format!("fetch panicked: {msg}")))
            }
        }
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
