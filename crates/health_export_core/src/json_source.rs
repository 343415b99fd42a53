//! File-backed implementation of the [`HealthDataSource`](crate::HealthDataSource) trait.
//!
//! A source directory holds one `<TypeId>.json` file per record type, each a
//! JSON array of record objects. The keys `startTime`, `endTime` and `time`
//! are read as timestamps; every other key becomes an attribute.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use serde_json::Value;

use crate::record::{AttributeValue, RawRecord};
use crate::{HealthDataSource, SourceError, registry, utils};

const TEMPORAL_KEYS: [&str; 3] = ["startTime", "endTime", "time"];

/// Reads records from a directory of per-type JSON dumps.
#[derive(Clone, Debug)]
pub struct JsonDirSource {
    root: PathBuf,
}

impl JsonDirSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, type_id: &str) -> PathBuf {
        self.root.join(format!("{type_id}.json"))
    }

    /// Parse one per-type dump.
    pub fn parse_records(type_id: &str, bytes: &[u8]) -> Result<Vec<RawRecord>, SourceError> {
        let value: Value = serde_json::from_slice(bytes)?;
        let Value::Array(items) = value else {
            return Err(SourceError::InvalidState(format!(
                "{type_id}: expected a JSON array of records"
            )));
        };
        items
            .iter()
            .enumerate()
            .map(|(idx, item)| parse_record(type_id, idx, item))
            .collect()
    }
}

fn parse_record(type_id: &str, idx: usize, item: &Value) -> Result<RawRecord, SourceError> {
    let Some(obj) = item.as_object() else {
        return Err(SourceError::InvalidState(format!(
            "{type_id}[{idx}]: expected an object"
        )));
    };
    let timestamp = |key: &str| -> Result<Option<DateTime<FixedOffset>>, SourceError> {
        match obj.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => utils::parse_timestamp(s).map(Some).ok_or_else(|| {
                SourceError::InvalidState(format!("{type_id}[{idx}]: invalid {key} {s:?}"))
            }),
            Some(other) => Err(SourceError::InvalidState(format!(
                "{type_id}[{idx}]: {key} must be a string, got {other}"
            ))),
        }
    };

    let mut record = RawRecord::new(type_id);
    record.start_time = timestamp("startTime")?;
    record.end_time = timestamp("endTime")?;
    record.time = timestamp("time")?;
    record.attributes = obj
        .iter()
        .filter(|(k, _)| !TEMPORAL_KEYS.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), AttributeValue::from_json(v)))
        .collect();
    Ok(record)
}

#[async_trait]
impl HealthDataSource for JsonDirSource {
    async fn read_records(
        &self,
        type_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<RawRecord>, SourceError> {
        if end < start {
            return Err(SourceError::InvalidArgument(format!(
                "window end {end} precedes start {start}"
            )));
        }
        if registry::find_by_type_id(type_id).is_none() {
            return Err(SourceError::Unsupported(type_id.to_string()));
        }

        let path = self.path_for(type_id);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) if err.kind() == ErrorKind::PermissionDenied => {
                return Err(SourceError::PermissionDenied(path.display().to_string()));
            }
            Err(err) => return Err(err.into()),
        };

        let records = Self::parse_records(type_id, &bytes)?;
        Ok(records
            .into_iter()
            .filter(|r| {
                r.anchor_time()
                    .map(|t| {
                        let t = t.with_timezone(&Utc);
                        t >= start && t < end
                    })
                    .unwrap_or(false)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_records_splits_temporal_keys_from_attributes() {
        let body = br#"[{"startTime":"2024-03-01T08:00:00+01:00","endTime":"2024-03-01T08:30:00+01:00","count":120,"dataOrigin":"watch"}]"#;
        let records = JsonDirSource::parse_records("Steps", body).expect("parse");
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert!(r.start_time.is_some() && r.end_time.is_some() && r.time.is_none());
        assert_eq!(r.attribute("count"), Some(&AttributeValue::Integer(120)));
        assert!(r.attribute("startTime").is_none());
        assert_eq!(r.attributes.len(), 2);
    }

    #[test]
    fn parse_records_rejects_non_array() {
        let err = JsonDirSource::parse_records("Steps", br#"{"count":1}"#).unwrap_err();
        assert!(matches!(err, SourceError::InvalidState(_)));
    }

    #[test]
    fn parse_records_rejects_bad_timestamp() {
        let err = JsonDirSource::parse_records("Weight", br#"[{"time":"yesterday"}]"#).unwrap_err();
        assert!(err.to_string().contains("invalid time"));
    }

    #[test]
    fn parse_records_reports_malformed_json() {
        let err = JsonDirSource::parse_records("Weight", b"[{").unwrap_err();
        assert!(matches!(err, SourceError::Parse(_)));
    }

    #[test]
    fn path_for_uses_type_id() {
        let src = JsonDirSource::new("/data");
        assert_eq!(src.path_for("HeartRate"), PathBuf::from("/data/HeartRate.json"));
    }
}
