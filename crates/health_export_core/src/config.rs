use std::path::PathBuf;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::aggregator::{DEFAULT_HISTORY_START, DEFAULT_MAX_CONCURRENT_FETCHES, FetchWindow};
use crate::export::{FileNames, SUMMARY_FILE_NAME, category_file_name};
use crate::registry::{self, Category};
use crate::utils;

pub const DEFAULT_OUTPUT_DIR: &str = "health_export";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} missing")]
    Missing(&'static str),
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub source_dir: PathBuf,
    pub output_dir: PathBuf,
    pub history_start: DateTime<Utc>,
    /// `None` means "now" at the time the window is built.
    pub end: Option<DateTime<Utc>>,
    pub max_concurrent_fetches: usize,
    /// `None` grants every registered type.
    pub granted_types: Option<Vec<String>>,
    pub file_names: FileNames,
    pub write_schemas: bool,
    pub metrics_file: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_with(|k| std::env::var(k).ok())
    }

    /// Testable helper that reads configuration values using the provided
    /// function instead of the process environment.
    pub fn from_env_with<F>(mut get: F) -> Result<Self, ConfigError>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let mut get = |k: &str| get(k).filter(|v| !v.trim().is_empty());

        let source_dir = get("HEALTH_EXPORT_SOURCE_DIR")
            .map(PathBuf::from)
            .ok_or(ConfigError::Missing("HEALTH_EXPORT_SOURCE_DIR"))?;
        let output_dir = get("HEALTH_EXPORT_OUTPUT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR));

        let history_start = match get("HEALTH_EXPORT_HISTORY_START") {
            Some(v) => parse_bound("HEALTH_EXPORT_HISTORY_START", v)?,
            None => utils::local_midnight(DEFAULT_HISTORY_START),
        };
        let end = get("HEALTH_EXPORT_END")
            .map(|v| parse_bound("HEALTH_EXPORT_END", v))
            .transpose()?;
        if let Some(end) = end.filter(|end| *end < history_start) {
            return Err(ConfigError::Invalid {
                key: "HEALTH_EXPORT_END",
                value: utils::format_timestamp(&end),
            });
        }

        let max_concurrent_fetches = match get("HEALTH_EXPORT_MAX_CONCURRENT_FETCHES") {
            Some(v) => match v.trim().parse::<usize>() {
                Ok(n) if n >= 1 => n,
                _ => {
                    return Err(ConfigError::Invalid {
                        key: "HEALTH_EXPORT_MAX_CONCURRENT_FETCHES",
                        value: v,
                    });
                }
            },
            None => DEFAULT_MAX_CONCURRENT_FETCHES,
        };

        let granted_types = get("HEALTH_EXPORT_GRANTED")
            .map(parse_granted)
            .transpose()?;

        let defaults = FileNames::default();
        let file_names = FileNames {
            daily_steps: get("HEALTH_EXPORT_DAILY_STEPS_FILE").unwrap_or(defaults.daily_steps),
            heart_rate: get("HEALTH_EXPORT_HEART_RATE_FILE").unwrap_or(defaults.heart_rate),
            historical: get("HEALTH_EXPORT_HISTORICAL_FILE").unwrap_or(defaults.historical),
        };
        validate_file_names(&file_names)?;

        let write_schemas = match get("HEALTH_EXPORT_WRITE_SCHEMAS") {
            Some(v) => parse_bool("HEALTH_EXPORT_WRITE_SCHEMAS", v)?,
            None => false,
        };
        let metrics_file = get("HEALTH_EXPORT_METRICS_FILE").map(PathBuf::from);

        Ok(Self {
            source_dir,
            output_dir,
            history_start,
            end,
            max_concurrent_fetches,
            granted_types,
            file_names,
            write_schemas,
            metrics_file,
        })
    }

    pub fn window(&self) -> FetchWindow {
        FetchWindow::new(self.history_start, self.end.unwrap_or_else(Utc::now))
    }
}

fn parse_bound(key: &'static str, value: String) -> Result<DateTime<Utc>, ConfigError> {
    utils::parse_date_bound(&value).ok_or(ConfigError::Invalid { key, value })
}

fn parse_bool(key: &'static str, value: String) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid { key, value }),
    }
}

/// Each per-domain name must be a bare file name that no other document uses.
fn validate_file_names(names: &FileNames) -> Result<(), ConfigError> {
    let mut taken: Vec<String> = Category::ALL
        .into_iter()
        .map(category_file_name)
        .chain([SUMMARY_FILE_NAME.to_string()])
        .collect();
    let overridable = [
        ("HEALTH_EXPORT_DAILY_STEPS_FILE", &names.daily_steps),
        ("HEALTH_EXPORT_HEART_RATE_FILE", &names.heart_rate),
        ("HEALTH_EXPORT_HISTORICAL_FILE", &names.historical),
    ];
    for (key, name) in overridable {
        let bare = !name.contains(['/', '\\']) && name != "." && name != "..";
        if !bare || taken.contains(name) {
            return Err(ConfigError::Invalid {
                key,
                value: name.clone(),
            });
        }
        taken.push(name.clone());
    }
    Ok(())
}

fn parse_granted(value: String) -> Result<Vec<String>, ConfigError> {
    let mut ids = Vec::new();
    for id in value.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        if registry::find_by_type_id(id).is_none() {
            return Err(ConfigError::Invalid {
                key: "HEALTH_EXPORT_GRANTED",
                value: id.to_string(),
            });
        }
        ids.push(id.to_string());
    }
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl FnMut(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn from_env_missing_source_dir() {
        let res = Config::from_env_with(env(&[("HEALTH_EXPORT_OUTPUT_DIR", "/tmp/out")]));
        assert_eq!(res, Err(ConfigError::Missing("HEALTH_EXPORT_SOURCE_DIR")));
    }

    #[test]
    fn from_env_defaults() {
        let cfg = Config::from_env_with(env(&[("HEALTH_EXPORT_SOURCE_DIR", "/data")])).expect("cfg");
        assert_eq!(cfg.source_dir, PathBuf::from("/data"));
        assert_eq!(cfg.output_dir, PathBuf::from(DEFAULT_OUTPUT_DIR));
        assert_eq!(cfg.history_start, utils::local_midnight(DEFAULT_HISTORY_START));
        assert_eq!(cfg.end, None);
        assert_eq!(cfg.max_concurrent_fetches, DEFAULT_MAX_CONCURRENT_FETCHES);
        assert_eq!(cfg.granted_types, None);
        assert_eq!(cfg.file_names, FileNames::default());
        assert!(!cfg.write_schemas);
        assert_eq!(cfg.metrics_file, None);
    }

    #[test]
    fn from_env_reads_values() {
        let cfg = Config::from_env_with(env(&[
            ("HEALTH_EXPORT_SOURCE_DIR", "/data"),
            ("HEALTH_EXPORT_OUTPUT_DIR", "/out"),
            ("HEALTH_EXPORT_HISTORY_START", "2023-01-01T00:00:00Z"),
            ("HEALTH_EXPORT_END", "2024-01-01T00:00:00Z"),
            ("HEALTH_EXPORT_MAX_CONCURRENT_FETCHES", "2"),
            ("HEALTH_EXPORT_GRANTED", "Steps, HeartRate"),
            ("HEALTH_EXPORT_HEART_RATE_FILE", "hr.json"),
            ("HEALTH_EXPORT_WRITE_SCHEMAS", "yes"),
            ("HEALTH_EXPORT_METRICS_FILE", "/out/metrics.prom"),
        ]))
        .expect("cfg");
        assert_eq!(cfg.max_concurrent_fetches, 2);
        assert_eq!(
            cfg.granted_types,
            Some(vec!["Steps".to_string(), "HeartRate".to_string()])
        );
        assert_eq!(cfg.file_names.heart_rate, "hr.json");
        assert_eq!(cfg.file_names.daily_steps, FileNames::default().daily_steps);
        assert!(cfg.write_schemas);
        let window = cfg.window();
        assert_eq!(utils::format_timestamp(&window.start), "2023-01-01T00:00:00Z");
        assert_eq!(utils::format_timestamp(&window.end), "2024-01-01T00:00:00Z");
    }

    #[test]
    fn rejects_zero_concurrency() {
        let err = Config::from_env_with(env(&[
            ("HEALTH_EXPORT_SOURCE_DIR", "/data"),
            ("HEALTH_EXPORT_MAX_CONCURRENT_FETCHES", "0"),
        ]))
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid { key: "HEALTH_EXPORT_MAX_CONCURRENT_FETCHES", .. }
        ));
    }

    #[test]
    fn rejects_unknown_granted_type() {
        let err = Config::from_env_with(env(&[
            ("HEALTH_EXPORT_SOURCE_DIR", "/data"),
            ("HEALTH_EXPORT_GRANTED", "Steps,Telepathy"),
        ]))
        .unwrap_err();
        assert_eq!(
            err,
            ConfigError::Invalid {
                key: "HEALTH_EXPORT_GRANTED",
                value: "Telepathy".into()
            }
        );
    }

    #[test]
    fn rejects_end_before_start() {
        let err = Config::from_env_with(env(&[
            ("HEALTH_EXPORT_SOURCE_DIR", "/data"),
            ("HEALTH_EXPORT_HISTORY_START", "2024-01-01T00:00:00Z"),
            ("HEALTH_EXPORT_END", "2023-01-01T00:00:00Z"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "HEALTH_EXPORT_END", .. }));
    }

    #[test]
    fn blank_values_count_as_unset() {
        let cfg = Config::from_env_with(env(&[
            ("HEALTH_EXPORT_SOURCE_DIR", "/data"),
            ("HEALTH_EXPORT_GRANTED", "  "),
        ]))
        .expect("cfg");
        assert_eq!(cfg.granted_types, None);
    }

    #[test]
    fn rejects_colliding_file_names() {
        let err = Config::from_env_with(env(&[
            ("HEALTH_EXPORT_SOURCE_DIR", "/data"),
            ("HEALTH_EXPORT_DAILY_STEPS_FILE", "heart_rate.json"),
        ]))
        .unwrap_err();
        assert_eq!(
            err,
            ConfigError::Invalid {
                key: "HEALTH_EXPORT_HEART_RATE_FILE",
                value: "heart_rate.json".into()
            }
        );

        let err = Config::from_env_with(env(&[
            ("HEALTH_EXPORT_SOURCE_DIR", "/data"),
            ("HEALTH_EXPORT_HISTORICAL_FILE", "activity_data.json"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "HEALTH_EXPORT_HISTORICAL_FILE", .. }));
    }

    #[test]
    fn rejects_file_names_with_separators() {
        for bad in ["../steps.json", "sub/steps.json", ".."] {
            let err = Config::from_env_with(env(&[
                ("HEALTH_EXPORT_SOURCE_DIR", "/data"),
                ("HEALTH_EXPORT_DAILY_STEPS_FILE", bad),
            ]))
            .unwrap_err();
            assert!(
                matches!(err, ConfigError::Invalid { key: "HEALTH_EXPORT_DAILY_STEPS_FILE", .. }),
                "{bad}"
            );
        }
    }
}
