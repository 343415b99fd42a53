//! Category and global aggregation.
//!
//! A [`CategoryResult`] always holds one entry per registered type of its
//! category and a [`GlobalResult`] always holds every category, so
//! consumers can show "0 records" instead of "unknown".

use std::collections::{BTreeMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, NaiveDate, Utc};
use futures_util::StreamExt;
use futures_util::stream;
use tracing::{info, warn};

use crate::fetcher::{FetchFault, FetchedRecords, RecordFetcher, panic_message};
use crate::permissions::PermissionAuthority;
use crate::registry::{self, Category};
use crate::{HealthDataSource, observability, utils};

/// Display name -> fetch result, one entry per registered type.
pub type CategoryResult = BTreeMap<String, FetchedRecords>;

/// Category -> category result, one entry per category.
pub type GlobalResult = BTreeMap<Category, CategoryResult>;

pub const DEFAULT_HISTORY_START: NaiveDate = match NaiveDate::from_ymd_opt(2020, 1, 1) {
    Some(date) => date,
    None => panic!("invalid default history start"),
};

pub const DEFAULT_MAX_CONCURRENT_FETCHES: usize = 4;

/// The `[start, end)` range records are requested for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FetchWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl FetchWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// From `history_start` until now.
    pub fn since(history_start: DateTime<Utc>) -> Self {
        Self::new(history_start, Utc::now())
    }
}

impl Default for FetchWindow {
    fn default() -> Self {
        Self::since(utils::local_midnight(DEFAULT_HISTORY_START))
    }
}

/// Side observation of one global run.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RunStats {
    pub total_categories: usize,
    pub total_record_types: usize,
    pub total_records: usize,
    pub types_with_data: usize,
    pub types_permission_denied: usize,
    pub elapsed: Duration,
}

impl RunStats {
    pub fn from_global(global: &GlobalResult, elapsed: Duration) -> Self {
        let fetched = || global.values().flat_map(|c| c.values());
        Self {
            total_categories: global.len(),
            total_record_types: fetched().count(),
            total_records: fetched().map(|f| f.count).sum(),
            types_with_data: fetched().filter(|f| f.has_data()).count(),
            types_permission_denied: fetched().filter(|f| f.permission_denied).count(),
            elapsed,
        }
    }
}

/// Result used for a category whose aggregation faulted: every registered
/// type present with zero records.
pub fn fallback_category_result(category: Category, reason: &str) -> CategoryResult {
    registry::records_for_category(category)
        .iter()
        .map(|config| {
            (
                config.display_name.to_string(),
                FetchedRecords::failed(*config, FetchFault::Category(reason.to_string())),
            )
        })
        .collect()
}

/// Run `run` for every category in its own task. A task that faults is
/// replaced by [`fallback_category_result`].
pub(crate) async fn collect_categories<F, Fut>(run: F) -> GlobalResult
where
    F: Fn(Category) -> Fut,
    Fut: Future<Output = CategoryResult> + Send + 'static,
{
    let tasks: Vec<_> = Category::ALL
        .into_iter()
        .map(|category| (category, tokio::spawn(run(category))))
        .collect();

    let mut global = GlobalResult::new();
    for (category, handle) in tasks {
        let result = match handle.await {
            Ok(result) => result,
            Err(err) => {
                let reason = if err.is_panic() {
                    panic_message(err.into_panic().as_ref())
                } else {
                    err.to_string()
                };
                warn!(%category, %reason, "category aggregation faulted; substituting empty results");
                fallback_category_result(category, &reason)
            }
        };
        global.insert(category, result);
    }
    global
}

#[derive(Clone)]
pub struct Aggregator {
    fetcher: RecordFetcher,
    max_concurrent_fetches: usize,
}

impl Aggregator {
    pub fn new(source: Arc<dyn HealthDataSource>) -> Self {
        Self {
            fetcher: RecordFetcher::new(source),
            max_concurrent_fetches: DEFAULT_MAX_CONCURRENT_FETCHES,
        }
    }

    pub fn with_permissions(mut self, permissions: Arc<dyn PermissionAuthority>) -> Self {
        self.fetcher = self.fetcher.with_permissions(permissions);
        self
    }

    /// Per-category fetch concurrency; `1` fetches sequentially.
    pub fn with_max_concurrent_fetches(mut self, max: usize) -> Self {
        self.max_concurrent_fetches = max.max(1);
        self
    }

    pub fn fetcher(&self) -> &RecordFetcher {
        &self.fetcher
    }

    /// Ask the authority for every read capability it has not granted.
    /// Returns what was requested; the grant is observed on later fetches.
    pub async fn request_missing_permissions(&self) -> HashSet<String> {
        let Some(permissions) = self.fetcher.permissions() else {
            return HashSet::new();
        };
        let granted = permissions.granted_capabilities().await;
        let missing: HashSet<String> = crate::permissions::all_read_capabilities()
            .into_iter()
            .filter(|c| !granted.contains(c))
            .collect();
        if !missing.is_empty() {
            permissions.request_capabilities(missing.clone());
        }
        missing
    }

    pub async fn fetch_category(&self, category: Category, window: FetchWindow) -> CategoryResult {
        let configs = registry::records_for_category(category);
        let fetcher = self.fetcher.clone();
        stream::iter(configs.iter().copied())
            .map(move |config| {
                let fetcher = fetcher.clone();
                async move {
                    let fetched = fetcher.fetch(&config, window.start, window.end).await;
                    (config.display_name.to_string(), fetched)
                }
            })
            .buffer_unordered(self.max_concurrent_fetches)
            .collect()
            .await
    }

    pub async fn fetch_all(&self, window: FetchWindow) -> GlobalResult {
        self.fetch_all_with_stats(window).await.0
    }

    /// Aggregate every category; each runs in its own task so a fault in one
    /// cannot abort the run.
    pub async fn fetch_all_with_stats(&self, window: FetchWindow) -> (GlobalResult, RunStats) {
        let started = Instant::now();
        let this = self.clone();
        let global = collect_categories(move |category| {
            let this = this.clone();
            async move { this.fetch_category(category, window).await }
        })
        .await;

        let stats = RunStats::from_global(&global, started.elapsed());
        info!(
            categories = stats.total_categories,
            record_types = stats.total_record_types,
            records = stats.total_records,
            with_data = stats.types_with_data,
            permission_denied = stats.types_permission_denied,
            elapsed_ms = stats.elapsed.as_millis() as u64,
            "aggregation finished"
        );
        observability::record_run(&stats);
        (global, stats)
    }
}
