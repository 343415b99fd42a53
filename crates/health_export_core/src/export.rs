//! Writing documents to disk.
//!
//! Every destination file is written independently. A failed write is
//! logged and reported as `false` in the [`ExportReport`]; it never stops
//! the remaining files from being written.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use futures_util::future::join_all;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::aggregator::{CategoryResult, FetchWindow, GlobalResult};
use crate::documents::{
    CategoryDocument, DailyStepsDocument, HeartRateDocument, HistoricalDocument, SummaryDocument,
    document_schemas,
};
use crate::registry::Category;
use crate::summarizer::HistoricalHealthData;
use crate::{observability, utils};

pub const CATEGORY_FILE_SUFFIX: &str = "_data.json";
pub const SUMMARY_FILE_NAME: &str = "health_data_summary.json";
pub const DAILY_STEPS_FILE_NAME: &str = "daily_steps.json";
pub const HEART_RATE_FILE_NAME: &str = "heart_rate.json";
pub const HISTORICAL_FILE_NAME: &str = "historical_health_data.json";
pub const SCHEMA_DIR_NAME: &str = "schemas";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("failed to write {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// `activity_data.json`, `body_measurement_data.json`, ...
pub fn category_file_name(category: Category) -> String {
    format!("{}{}", category.file_stem(), CATEGORY_FILE_SUFFIX)
}

/// Pretty-printed JSON text for any document.
pub fn to_document<T: Serialize>(document: &T) -> Result<String, ExportError> {
    Ok(serde_json::to_string_pretty(document)?)
}

/// Category result straight to document text.
pub fn category_to_document(category: Category, result: &CategoryResult) -> Result<String, ExportError> {
    to_document(&CategoryDocument::build(category, result))
}

async fn try_write(text: &str, path: &Path) -> Result<(), ExportError> {
    tokio::fs::write(path, text)
        .await
        .map_err(|source| ExportError::Io {
            path: path.to_path_buf(),
            source,
        })
}

/// Write `text` to `path`. Returns `false` on any I/O failure.
pub async fn write_document(text: &str, path: &Path) -> bool {
    let ok = match try_write(text, path).await {
        Ok(()) => {
            debug!(path = %path.display(), bytes = text.len(), "document written");
            true
        }
        Err(err) => {
            warn!(error = %err, "document write failed");
            false
        }
    };
    observability::record_write(ok);
    ok
}

type WriteJob = (String, Result<String, ExportError>);

fn category_jobs(global: &GlobalResult) -> Vec<WriteJob> {
    global
        .iter()
        .map(|(category, result)| {
            (
                category_file_name(*category),
                category_to_document(*category, result),
            )
        })
        .collect()
}

/// Overridable names of the per-domain documents.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileNames {
    pub daily_steps: String,
    pub heart_rate: String,
    pub historical: String,
}

impl Default for FileNames {
    fn default() -> Self {
        Self {
            daily_steps: DAILY_STEPS_FILE_NAME.to_string(),
            heart_rate: HEART_RATE_FILE_NAME.to_string(),
            historical: HISTORICAL_FILE_NAME.to_string(),
        }
    }
}

/// File name -> whether it was written.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExportReport {
    pub results: BTreeMap<String, bool>,
}

impl ExportReport {
    pub fn succeeded(&self) -> usize {
        self.results.values().filter(|ok| **ok).count()
    }

    pub fn failed(&self) -> Vec<&str> {
        self.results
            .iter()
            .filter(|(_, ok)| !**ok)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.results.values().all(|ok| *ok)
    }

    pub fn merge(&mut self, other: ExportReport) {
        self.results.extend(other.results);
    }
}

pub struct Exporter {
    output_dir: PathBuf,
    file_names: FileNames,
    export_id: String,
}

impl Exporter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            file_names: FileNames::default(),
            export_id: Uuid::new_v4().to_string(),
        }
    }

    pub fn with_file_names(mut self, file_names: FileNames) -> Self {
        self.file_names = file_names;
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn export_id(&self) -> &str {
        &self.export_id
    }

    /// One document per category.
    pub async fn export_categories(&self, global: &GlobalResult) -> ExportReport {
        self.write_all(&self.output_dir, category_jobs(global)).await
    }

    /// Category documents, the global summary, and the steps, heart-rate and
    /// combined documents.
    pub async fn export_all(
        &self,
        global: &GlobalResult,
        historical: &HistoricalHealthData,
        window: FetchWindow,
    ) -> ExportReport {
        let exported_at = utils::format_timestamp(&chrono::Utc::now());
        let mut jobs = category_jobs(global);
        jobs.push((
            SUMMARY_FILE_NAME.to_string(),
            to_document(&SummaryDocument::build(global, window, &self.export_id, &exported_at)),
        ));
        jobs.push((
            self.file_names.daily_steps.clone(),
            to_document(&DailyStepsDocument::build(&historical.daily_steps)),
        ));
        jobs.push((
            self.file_names.heart_rate.clone(),
            to_document(&HeartRateDocument::build(&historical.heart_rate_samples)),
        ));
        jobs.push((
            self.file_names.historical.clone(),
            to_document(&HistoricalDocument::build(historical)),
        ));

        let report = self.write_all(&self.output_dir, jobs).await;
        info!(
            export_id = %self.export_id,
            written = report.succeeded(),
            failed = report.results.len() - report.succeeded(),
            dir = %self.output_dir.display(),
            "export finished"
        );
        report
    }

    /// JSON Schema for every document, under `<output>/schemas/`.
    pub async fn write_schemas(&self) -> ExportReport {
        let dir = self.output_dir.join(SCHEMA_DIR_NAME);
        let jobs = document_schemas()
            .into_iter()
            .map(|(name, schema)| (format!("{name}.schema.json"), to_document(&schema)))
            .collect();
        self.write_all(&dir, jobs).await
    }

    async fn write_all(
        &self,
        dir: &Path,
        jobs: Vec<WriteJob>,
    ) -> ExportReport {
        if let Err(err) = tokio::fs::create_dir_all(dir).await {
            warn!(dir = %dir.display(), error = %err, "could not create export directory");
        }
        let writes = jobs.into_iter().map(|(name, text)| async move {
            let ok = match text {
                Ok(text) => write_document(&text, &dir.join(&name)).await,
                Err(err) => {
                    warn!(file = %name, error = %err, "document serialization failed");
                    false
                }
            };
            (name, ok)
        });
        ExportReport {
            results: join_all(writes).await.into_iter().collect(),
        }
    }
}
