//! Steps and heart-rate specializations of the raw records.

use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset, NaiveDate};
use tracing::debug;

use crate::aggregator::{Aggregator, FetchWindow, GlobalResult};
use crate::record::{AttributeValue, RawRecord};
use crate::registry::{self, HEART_RATE_TYPE_ID, STEPS_TYPE_ID};
use crate::utils;

pub const STEPS_COUNT_ATTRIBUTE: &str = "count";
pub const HEART_RATE_SAMPLES_ATTRIBUTE: &str = "samples";
pub const SAMPLE_TIME_FIELD: &str = "time";
pub const SAMPLE_BPM_FIELD: &str = "beatsPerMinute";
pub const METADATA_ATTRIBUTE: &str = "metadata";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DailySteps {
    pub date: NaiveDate,
    pub total_steps: u64,
    pub window_start: DateTime<FixedOffset>,
    pub window_end: DateTime<FixedOffset>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct HeartRateSample {
    pub time: DateTime<FixedOffset>,
    pub beats_per_minute: f64,
    pub metadata: Option<AttributeValue>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HeartRateStats {
    pub average: f64,
    pub min: f64,
    pub max: f64,
}

impl HeartRateStats {
    pub fn from_samples(samples: &[HeartRateSample]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        let mut sum = 0.0;
        for s in samples {
            min = min.min(s.beats_per_minute);
            max = max.max(s.beats_per_minute);
            sum += s.beats_per_minute;
        }
        Some(Self {
            average: sum / samples.len() as f64,
            min,
            max,
        })
    }
}

/// Bucket step records by the device-local calendar date of their start.
///
/// Records without a start time or a non-negative `count` are skipped. Days with
/// no records are absent. Output is sorted by date.
pub fn summarize_steps(records: &[RawRecord]) -> Vec<DailySteps> {
    let mut days: BTreeMap<NaiveDate, DailySteps> = BTreeMap::new();
    for record in records {
        let Some(start) = record.start_time.or(record.time) else {
            debug!("step record without start time skipped");
            continue;
        };
        let Some(count) = record
            .attribute(STEPS_COUNT_ATTRIBUTE)
            .and_then(AttributeValue::as_i64)
            .and_then(|c| u64::try_from(c).ok())
        else {
            debug!("step record without usable count skipped");
            continue;
        };
        let end = record.end_time.unwrap_or(start).max(start);
        let date = utils::local_date(&start);
        days.entry(date)
            .and_modify(|day| {
                day.total_steps = day.total_steps.saturating_add(count);
                day.window_start = day.window_start.min(start);
                day.window_end = day.window_end.max(end);
            })
            .or_insert(DailySteps {
                date,
                total_steps: count,
                window_start: start,
                window_end: end,
            });
    }
    days.into_values().collect()
}

/// Flatten each heart-rate record's sample list into individual points,
/// sorted by time. Samples without a time or with a non-positive bpm are
/// skipped.
pub fn flatten_heart_rate(records: &[RawRecord]) -> Vec<HeartRateSample> {
    let mut samples: Vec<HeartRateSample> = records
        .iter()
        .flat_map(|record| {
            let metadata = record.attribute(METADATA_ATTRIBUTE).cloned();
            record
                .attribute(HEART_RATE_SAMPLES_ATTRIBUTE)
                .and_then(AttributeValue::as_list)
                .unwrap_or(&[])
                .iter()
                .filter_map(move |sample| {
                    let time = sample.get(SAMPLE_TIME_FIELD)?.as_instant()?;
                    let bpm = sample.get(SAMPLE_BPM_FIELD)?.as_f64()?;
                    (bpm.is_finite() && bpm > 0.0).then(|| HeartRateSample {
                        time,
                        beats_per_minute: bpm,
                        metadata: metadata.clone(),
                    })
                })
        })
        .collect();
    samples.sort_by(|a, b| a.time.cmp(&b.time));
    samples
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct HistoricalHealthData {
    pub daily_steps: Vec<DailySteps>,
    pub heart_rate_samples: Vec<HeartRateSample>,
    pub total_steps: u64,
    pub total_heart_rate_samples: usize,
    pub earliest_date: Option<NaiveDate>,
    pub latest_date: Option<NaiveDate>,
    /// Display name -> records, for every other type that returned data.
    pub other_records: BTreeMap<String, Vec<RawRecord>>,
}

impl HistoricalHealthData {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build from one global run. The date range covers steps and heart-rate
    /// only; other types do not contribute.
    pub fn from_global(global: &GlobalResult) -> Self {
        let daily_steps = summarize_steps(records_of(global, STEPS_TYPE_ID));
        let heart_rate_samples = flatten_heart_rate(records_of(global, HEART_RATE_TYPE_ID));

        let dates = daily_steps
            .iter()
            .map(|d| d.date)
            .chain(heart_rate_samples.iter().map(|s| utils::local_date(&s.time)));
        let (earliest_date, latest_date) = dates.fold((None, None), |(lo, hi), d| {
            (
                Some(lo.map_or(d, |lo: NaiveDate| lo.min(d))),
                Some(hi.map_or(d, |hi: NaiveDate| hi.max(d))),
            )
        });

        let other_records = global
            .values()
            .flat_map(|category| category.values())
            .filter(|f| {
                f.has_data()
                    && f.config.type_id != STEPS_TYPE_ID
                    && f.config.type_id != HEART_RATE_TYPE_ID
            })
            .map(|f| (f.config.display_name.to_string(), f.records.clone()))
            .collect();

        Self {
            total_steps: daily_steps
                .iter()
                .fold(0u64, |acc, d| acc.saturating_add(d.total_steps)),
            total_heart_rate_samples: heart_rate_samples.len(),
            daily_steps,
            heart_rate_samples,
            earliest_date,
            latest_date,
            other_records,
        }
    }

    /// Run a full aggregation and summarize it. Never fails; when nothing
    /// could be fetched the result is empty with no date bounds.
    pub async fn fetch(aggregator: &Aggregator, window: FetchWindow) -> Self {
        Self::from_global(&aggregator.fetch_all(window).await)
    }

    pub fn heart_rate_stats(&self) -> Option<HeartRateStats> {
        HeartRateStats::from_samples(&self.heart_rate_samples)
    }

    pub fn date_range_label(&self) -> String {
        utils::date_range_label(self.earliest_date, self.latest_date)
    }

    pub fn is_empty(&self) -> bool {
        self.daily_steps.is_empty()
            && self.heart_rate_samples.is_empty()
            && self.other_records.is_empty()
    }
}

fn records_of<'a>(global: &'a GlobalResult, type_id: &str) -> &'a [RawRecord] {
    registry::find_by_type_id(type_id)
        .and_then(|config| global.get(&config.category)?.get(config.display_name))
        .map(|fetched| fetched.records.as_slice())
        .unwrap_or(&[])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::fallback_category_result;
    use crate::fetcher::FetchedRecords;
    use crate::registry::Category;

    fn ts(s: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(s).expect("timestamp")
    }

    fn steps(start: &str, end: &str, count: i64) -> RawRecord {
        RawRecord::interval(STEPS_TYPE_ID, ts(start), ts(end)).with_attribute("count", count)
    }

    fn sample(time: &str, bpm: f64) -> AttributeValue {
        AttributeValue::Map(vec![
            ("time".into(), AttributeValue::Text(time.into())),
            ("beatsPerMinute".into(), AttributeValue::Real(bpm)),
        ])
    }

    fn heart_rate(samples: Vec<AttributeValue>) -> RawRecord {
        RawRecord::interval(
            HEART_RATE_TYPE_ID,
            ts("2024-03-01T08:00:00Z"),
            ts("2024-03-01T09:00:00Z"),
        )
        .with_attribute("samples", samples)
    }

    #[test]
    fn steps_are_bucketed_by_day_with_windows() {
        let records = vec![
            steps("2024-03-02T11:00:00Z", "2024-03-02T11:30:00Z", 30),
            steps("2024-03-01T11:00:00Z", "2024-03-01T11:02:00Z", 100),
            steps("2024-03-01T11:04:00Z", "2024-03-01T11:05:00Z", 50),
        ];
        let days = summarize_steps(&records);
        assert_eq!(days.len(), 2);
        assert_eq!(days[0].date, utils::local_date(&ts("2024-03-01T11:00:00Z")));
        assert_eq!(days[0].total_steps, 150);
        assert_eq!(days[0].window_start, ts("2024-03-01T11:00:00Z"));
        assert_eq!(days[0].window_end, ts("2024-03-01T11:05:00Z"));
        assert_eq!(days[1].date, utils::local_date(&ts("2024-03-02T11:00:00Z")));
        assert_eq!(days[1].total_steps, 30);
    }

    #[test]
    fn step_date_is_device_local() {
        // The 2nd in the record's own zone, 19:30 UTC on the 1st.
        let start = ts("2024-03-02T00:30:00+05:00");
        let records = vec![steps("2024-03-02T00:30:00+05:00", "2024-03-02T00:40:00+05:00", 10)];
        let days = summarize_steps(&records);
        assert_eq!(days[0].date, start.with_timezone(&chrono::Local).date_naive());
        assert_eq!(days[0].date, utils::local_date(&start.with_timezone(&chrono::Utc)));
    }

    #[test]
    fn step_totals_saturate() {
        let records = vec![
            steps("2024-03-01T11:00:00Z", "2024-03-01T11:01:00Z", i64::MAX),
            steps("2024-03-01T11:02:00Z", "2024-03-01T11:03:00Z", i64::MAX),
            steps("2024-03-01T11:04:00Z", "2024-03-01T11:05:00Z", i64::MAX),
        ];
        let days = summarize_steps(&records);
        assert_eq!(days.len(), 1);
        assert_eq!(days[0].total_steps, u64::MAX);
        let global = global_with(vec![(STEPS_TYPE_ID, records)]);
        assert_eq!(HistoricalHealthData::from_global(&global).total_steps, u64::MAX);
    }

    #[test]
    fn steps_without_count_are_skipped() {
        let records = vec![
            RawRecord::interval(STEPS_TYPE_ID, ts("2024-03-01T08:00:00Z"), ts("2024-03-01T09:00:00Z")),
            steps("2024-03-01T08:00:00Z", "2024-03-01T09:00:00Z", -5),
        ];
        assert!(summarize_steps(&records).is_empty());
    }

    #[test]
    fn heart_rate_samples_are_flattened_and_sorted() {
        let records = vec![
            heart_rate(vec![
                sample("2024-03-01T08:30:00Z", 80.0),
                sample("2024-03-01T08:10:00Z", 70.0),
                sample("2024-03-01T08:50:00Z", 90.0),
            ]),
            heart_rate(vec![sample("2024-03-01T08:05:00Z", 65.0)]),
        ];
        let samples = flatten_heart_rate(&records);
        assert_eq!(samples.len(), 4);
        let bpm: Vec<f64> = samples.iter().map(|s| s.beats_per_minute).collect();
        assert_eq!(bpm, vec![65.0, 70.0, 80.0, 90.0]);
    }

    #[test]
    fn invalid_heart_rate_samples_are_skipped() {
        let records = vec![heart_rate(vec![
            sample("2024-03-01T08:30:00Z", 0.0),
            sample("2024-03-01T08:31:00Z", f64::NAN),
            sample("garbage", 70.0),
            sample("2024-03-01T08:32:00Z", 72.0),
        ])];
        assert_eq!(flatten_heart_rate(&records).len(), 1);
    }

    #[test]
    fn heart_rate_metadata_is_attached() {
        let record = heart_rate(vec![sample("2024-03-01T08:30:00Z", 80.0)])
            .with_attribute("metadata", "watch");
        let samples = flatten_heart_rate(&[record]);
        assert_eq!(samples[0].metadata, Some(AttributeValue::Text("watch".into())));
    }

    #[test]
    fn stats_average_min_max() {
        let samples = flatten_heart_rate(&[heart_rate(vec![
            sample("2024-03-01T08:30:00Z", 60.0),
            sample("2024-03-01T08:31:00Z", 90.0),
        ])]);
        let stats = HeartRateStats::from_samples(&samples).expect("stats");
        assert_eq!(stats.average, 75.0);
        assert_eq!(stats.min, 60.0);
        assert_eq!(stats.max, 90.0);
        assert!(HeartRateStats::from_samples(&[]).is_none());
    }

    fn global_with(records: Vec<(&str, Vec<RawRecord>)>) -> GlobalResult {
        let mut global: GlobalResult = Category::ALL
            .into_iter()
            .map(|c| (c, fallback_category_result(c, "unused")))
            .collect();
        for (type_id, recs) in records {
            let config = *registry::find_by_type_id(type_id).expect("registered");
            global
                .get_mut(&config.category)
                .expect("category")
                .insert(config.display_name.to_string(), FetchedRecords::with_records(config, recs));
        }
        global
    }

    #[test]
    fn historical_combines_steps_heart_rate_and_others() {
        let weight = RawRecord::instant("Weight", ts("2019-06-01T08:00:00Z"))
            .with_attribute("weightKg", 70.5);
        let global = global_with(vec![
            (STEPS_TYPE_ID, vec![steps("2024-03-02T09:00:00Z", "2024-03-02T10:00:00Z", 500)]),
            (
                HEART_RATE_TYPE_ID,
                vec![heart_rate(vec![sample("2024-03-01T08:30:00Z", 60.0)])],
            ),
            ("Weight", vec![weight]),
        ]);
        let data = HistoricalHealthData::from_global(&global);
        assert_eq!(data.total_steps, 500);
        assert_eq!(data.total_heart_rate_samples, 1);
        let earliest = utils::local_date(&ts("2024-03-01T08:30:00Z"));
        let latest = utils::local_date(&ts("2024-03-02T09:00:00Z"));
        assert_eq!(data.earliest_date, Some(earliest));
        assert_eq!(data.latest_date, Some(latest));
        // Weight is older but does not widen the range.
        assert_eq!(data.other_records.keys().collect::<Vec<_>>(), vec!["Weight"]);
        assert_eq!(
            data.date_range_label(),
            utils::date_range_label(Some(earliest), Some(latest))
        );
    }

    #[test]
    fn historical_from_nothing_is_empty() {
        let data = HistoricalHealthData::from_global(&global_with(vec![]));
        assert!(data.is_empty());
        assert_eq!(data.earliest_date, None);
        assert_eq!(data.latest_date, None);
        assert_eq!(data.date_range_label(), "No data");
        assert!(data.heart_rate_stats().is_none());
    }
}
