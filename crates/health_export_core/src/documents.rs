//! Exported document shapes.
//!
//! Every document is a plain serde struct so the on-disk format is fixed by
//! the types below; [`document_schemas`] publishes the matching JSON Schema.

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::aggregator::{CategoryResult, FetchWindow, GlobalResult};
use crate::record::{AttributeReader, RawRecord};
use crate::registry::Category;
use crate::summarizer::{DailySteps, HeartRateSample, HeartRateStats, HistoricalHealthData};
use crate::utils::{date_range_label, format_date, format_timestamp};

/// One file per category.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CategoryDocument {
    pub category: String,
    pub total_record_types: usize,
    pub total_records: usize,
    pub record_types: BTreeMap<String, RecordTypeDocument>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecordTypeDocument {
    pub display_name: String,
    pub category: String,
    pub total_records: usize,
    pub has_data: bool,
    pub is_permission_denied: bool,
    /// Present only when the type has records.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub records: Option<Vec<Value>>,
}

impl CategoryDocument {
    pub fn build(category: Category, result: &CategoryResult) -> Self {
        let record_types: BTreeMap<String, RecordTypeDocument> = result
            .iter()
            .map(|(name, fetched)| {
                let doc = RecordTypeDocument {
                    display_name: fetched.config.display_name.to_string(),
                    category: category.name().to_string(),
                    total_records: fetched.count,
                    has_data: fetched.has_data(),
                    is_permission_denied: fetched.permission_denied,
                    records: fetched
                        .has_data()
                        .then(|| fetched.records.iter().map(record_to_json).collect()),
                };
                (name.clone(), doc)
            })
            .collect();
        Self {
            category: category.name().to_string(),
            total_record_types: record_types.len(),
            total_records: record_types.values().map(|t| t.total_records).sum(),
            record_types,
        }
    }
}

/// Serialize one record: `recordType`, the temporal fields it has, then
/// every readable attribute. Unreadable attributes are left out.
pub fn record_to_json(record: &RawRecord) -> Value {
    let mut obj = Map::new();
    obj.insert("recordType".to_string(), Value::String(record.type_id.clone()));
    let temporal = [
        ("startTime", record.start_time),
        ("endTime", record.end_time),
        ("time", record.time),
    ];
    for (key, value) in temporal {
        if let Some(t) = value {
            obj.insert(key.to_string(), Value::String(format_timestamp(&t)));
        }
    }
    for (name, value) in record.list_attributes() {
        match value {
            Ok(v) => {
                obj.entry(name).or_insert(v);
            }
            Err(err) => tracing::debug!(type_id = %record.type_id, error = %err, "attribute omitted"),
        }
    }
    Value::Object(obj)
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CategorySummary {
    pub record_types: usize,
    pub total_records: usize,
    pub types_with_data: usize,
    pub types_with_permission_denied: usize,
}

impl CategorySummary {
    pub fn build(result: &CategoryResult) -> Self {
        Self {
            record_types: result.len(),
            total_records: result.values().map(|f| f.count).sum(),
            types_with_data: result.values().filter(|f| f.has_data()).count(),
            types_with_permission_denied: result.values().filter(|f| f.permission_denied).count(),
        }
    }
}

/// Global summary across categories.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SummaryDocument {
    pub export_id: String,
    pub exported_at: String,
    pub window_start: String,
    pub window_end: String,
    pub total_categories: usize,
    pub total_record_types: usize,
    pub total_records: usize,
    pub categories: BTreeMap<String, CategorySummary>,
}

impl SummaryDocument {
    pub fn build(
        global: &GlobalResult,
        window: FetchWindow,
        export_id: &str,
        exported_at: &str,
    ) -> Self {
        let categories: BTreeMap<String, CategorySummary> = global
            .iter()
            .map(|(category, result)| (category.name().to_string(), CategorySummary::build(result)))
            .collect();
        Self {
            export_id: export_id.to_string(),
            exported_at: exported_at.to_string(),
            window_start: format_timestamp(&window.start),
            window_end: format_timestamp(&window.end),
            total_categories: categories.len(),
            total_record_types: categories.values().map(|c| c.record_types).sum(),
            total_records: categories.values().map(|c| c.total_records).sum(),
            categories,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DailyStepsEntry {
    pub date: String,
    pub steps: u64,
    pub start_time: String,
    pub end_time: String,
}

impl From<&DailySteps> for DailyStepsEntry {
    fn from(day: &DailySteps) -> Self {
        Self {
            date: format_date(day.date),
            steps: day.total_steps,
            start_time: format_timestamp(&day.window_start),
            end_time: format_timestamp(&day.window_end),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DailyStepsDocument {
    pub total_days: usize,
    pub total_steps: u64,
    pub earliest_date: Option<String>,
    pub latest_date: Option<String>,
    pub date_range: String,
    pub daily_steps: Vec<DailyStepsEntry>,
}

impl DailyStepsDocument {
    pub fn build(days: &[DailySteps]) -> Self {
        let earliest = days.first().map(|d| d.date);
        let latest = days.last().map(|d| d.date);
        Self {
            total_days: days.len(),
            total_steps: days.iter().map(|d| d.total_steps).sum(),
            earliest_date: earliest.map(format_date),
            latest_date: latest.map(format_date),
            date_range: date_range_label(earliest, latest),
            daily_steps: days.iter().map(DailyStepsEntry::from).collect(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HeartRateEntry {
    pub time: String,
    pub bpm: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl From<&HeartRateSample> for HeartRateEntry {
    fn from(sample: &HeartRateSample) -> Self {
        Self {
            time: format_timestamp(&sample.time),
            bpm: sample.beats_per_minute,
            metadata: sample
                .metadata
                .as_ref()
                .and_then(|m| m.to_json("metadata").ok()),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HeartRateDocument {
    pub total_samples: usize,
    pub average_bpm: Option<f64>,
    pub min_bpm: Option<f64>,
    pub max_bpm: Option<f64>,
    pub earliest_sample: Option<String>,
    pub latest_sample: Option<String>,
    pub samples: Vec<HeartRateEntry>,
}

impl HeartRateDocument {
    pub fn build(samples: &[HeartRateSample]) -> Self {
        let stats = HeartRateStats::from_samples(samples);
        Self {
            total_samples: samples.len(),
            average_bpm: stats.map(|s| s.average),
            min_bpm: stats.map(|s| s.min),
            max_bpm: stats.map(|s| s.max),
            earliest_sample: samples.first().map(|s| format_timestamp(&s.time)),
            latest_sample: samples.last().map(|s| format_timestamp(&s.time)),
            samples: samples.iter().map(HeartRateEntry::from).collect(),
        }
    }
}

/// Combined steps and heart-rate document.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HistoricalDocument {
    pub total_days: usize,
    pub total_steps: u64,
    pub total_heart_rate_samples: usize,
    pub earliest_date: Option<String>,
    pub latest_date: Option<String>,
    pub date_range: String,
    pub average_heart_rate: Option<f64>,
    pub min_heart_rate: Option<f64>,
    pub max_heart_rate: Option<f64>,
    pub daily_steps: Vec<DailyStepsEntry>,
    pub heart_rate_samples: Vec<HeartRateEntry>,
    /// Display name -> record count for every other type with data.
    pub other_records: BTreeMap<String, usize>,
}

impl HistoricalDocument {
    pub fn build(data: &HistoricalHealthData) -> Self {
        let stats = data.heart_rate_stats();
        Self {
            total_days: data.daily_steps.len(),
            total_steps: data.total_steps,
            total_heart_rate_samples: data.total_heart_rate_samples,
            earliest_date: data.earliest_date.map(format_date),
            latest_date: data.latest_date.map(format_date),
            date_range: data.date_range_label(),
            average_heart_rate: stats.map(|s| s.average),
            min_heart_rate: stats.map(|s| s.min),
            max_heart_rate: stats.map(|s| s.max),
            daily_steps: data.daily_steps.iter().map(DailyStepsEntry::from).collect(),
            heart_rate_samples: data.heart_rate_samples.iter().map(HeartRateEntry::from).collect(),
            other_records: data
                .other_records
                .iter()
                .map(|(name, records)| (name.clone(), records.len()))
                .collect(),
        }
    }
}

/// Document name -> JSON Schema.
pub fn document_schemas() -> BTreeMap<&'static str, Value> {
    BTreeMap::from([
        ("category", schemars::schema_for!(CategoryDocument).to_value()),
        ("summary", schemars::schema_for!(SummaryDocument).to_value()),
        ("daily_steps", schemars::schema_for!(DailyStepsDocument).to_value()),
        ("heart_rate", schemars::schema_for!(HeartRateDocument).to_value()),
        ("historical", schemars::schema_for!(HistoricalDocument).to_value()),
    ])
}
