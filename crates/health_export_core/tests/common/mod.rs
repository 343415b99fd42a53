#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use health_export_core::{HealthDataSource, RawRecord, SourceError};

/// How the fake answers one type.
#[derive(Clone)]
pub enum Behavior {
    Records(Vec<RawRecord>),
    Denied,
    Fail(String),
    Panic(String),
}

/// In-memory source; types without a behavior return no records.
#[derive(Default)]
pub struct FakeSource {
    behaviors: HashMap<String, Behavior>,
    calls: Mutex<Vec<String>>,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, type_id: &str, behavior: Behavior) -> Self {
        self.behaviors.insert(type_id.to_string(), behavior);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl HealthDataSource for FakeSource {
    async fn read_records(
        &self,
        type_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<RawRecord>, SourceError> {
        self.calls.lock().unwrap().push(type_id.to_string());
        match self.behaviors.get(type_id) {
            None => Ok(Vec::new()),
            Some(Behavior::Records(records)) => Ok(records
                .iter()
                .filter(|r| {
                    r.anchor_time()
                        .map(|t| t.with_timezone(&Utc))
                        .is_some_and(|t| t >= start && t < end)
                })
                .cloned()
                .collect()),
            Some(Behavior::Denied) => Err(SourceError::PermissionDenied(type_id.to_string())),
            Some(Behavior::Fail(msg)) => Err(SourceError::Other(msg.clone())),
            Some(Behavior::Panic(msg)) => panic!("{msg}"),
        }
    }
}

pub fn ts(s: &str) -> DateTime<FixedOffset> {
    DateTime::parse_from_rfc3339(s).expect("timestamp")
}

pub fn utc(s: &str) -> DateTime<Utc> {
    ts(s).with_timezone(&Utc)
}

pub fn steps(start: &str, end: &str, count: i64) -> RawRecord {
    RawRecord::interval("Steps", ts(start), ts(end)).with_attribute("count", count)
}
