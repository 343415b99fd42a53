//! Raw records as returned by a health data source.
//!
//! Records carry a small set of well-known temporal fields plus an ordered
//! list of named attributes. Exporters and summarizers read attributes through
//! [`AttributeReader`] rather than knowing the concrete shape of each type.

use chrono::{DateTime, FixedOffset};
use serde_json::{Map, Number, Value};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum AttributeError {
    #[error("attribute {0} not present")]
    Missing(String),
    #[error("attribute {0} holds a non-finite number")]
    NonFinite(String),
}

#[derive(Clone, Debug, PartialEq)]
pub enum AttributeValue {
    Null,
    Bool(bool),
    Integer(i64),
    Real(f64),
    Text(String),
    Instant(DateTime<FixedOffset>),
    List(Vec<AttributeValue>),
    Map(Vec<(String, AttributeValue)>),
}

impl AttributeValue {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            AttributeValue::Integer(i) => Some(*i),
            AttributeValue::Real(f) if f.is_finite() && f.fract() == 0.0 => Some(*f as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttributeValue::Integer(i) => Some(*i as f64),
            AttributeValue::Real(f) => Some(*f),
            _ => None,
        }
    }

    /// Instants are accepted either natively or as timestamp text.
    pub fn as_instant(&self) -> Option<DateTime<FixedOffset>> {
        match self {
            AttributeValue::Instant(t) => Some(*t),
            AttributeValue::Text(s) => crate::utils::parse_timestamp(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[AttributeValue]> {
        match self {
            AttributeValue::List(items) => Some(items),
            _ => None,
        }
    }

    /// Field lookup on a `Map` value.
    pub fn get(&self, name: &str) -> Option<&AttributeValue> {
        match self {
            AttributeValue::Map(fields) => fields.iter().find(|(k, _)| k == name).map(|(_, v)| v),
            _ => None,
        }
    }

    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => AttributeValue::Null,
            Value::Bool(b) => AttributeValue::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => AttributeValue::Integer(i),
                None => AttributeValue::Real(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => AttributeValue::Text(s.clone()),
            Value::Array(items) => AttributeValue::List(items.iter().map(Self::from_json).collect()),
            Value::Object(obj) => AttributeValue::Map(
                obj.iter()
                    .map(|(k, v)| (k.clone(), Self::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Convert to JSON. `name` is only used to label the error.
    pub fn to_json(&self, name: &str) -> Result<Value, AttributeError> {
        Ok(match self {
            AttributeValue::Null => Value::Null,
            AttributeValue::Bool(b) => Value::Bool(*b),
            AttributeValue::Integer(i) => Value::Number((*i).into()),
            AttributeValue::Real(f) => Number::from_f64(*f)
                .map(Value::Number)
                .ok_or_else(|| AttributeError::NonFinite(name.to_string()))?,
            AttributeValue::Text(s) => Value::String(s.clone()),
            AttributeValue::Instant(t) => Value::String(crate::utils::format_timestamp(t)),
            AttributeValue::List(items) => Value::Array(
                items
                    .iter()
                    .map(|v| v.to_json(name))
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            AttributeValue::Map(fields) => {
                let mut obj = Map::new();
                for (k, v) in fields {
                    obj.insert(k.clone(), v.to_json(name)?);
                }
                Value::Object(obj)
            }
        })
    }
}

impl From<i64> for AttributeValue {
    fn from(v: i64) -> Self {
        AttributeValue::Integer(v)
    }
}

impl From<f64> for AttributeValue {
    fn from(v: f64) -> Self {
        AttributeValue::Real(v)
    }
}

impl From<bool> for AttributeValue {
    fn from(v: bool) -> Self {
        AttributeValue::Bool(v)
    }
}

impl From<&str> for AttributeValue {
    fn from(v: &str) -> Self {
        AttributeValue::Text(v.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(v: String) -> Self {
        AttributeValue::Text(v)
    }
}

impl From<DateTime<FixedOffset>> for AttributeValue {
    fn from(v: DateTime<FixedOffset>) -> Self {
        AttributeValue::Instant(v)
    }
}

impl From<Vec<AttributeValue>> for AttributeValue {
    fn from(v: Vec<AttributeValue>) -> Self {
        AttributeValue::List(v)
    }
}

/// Read access to the named attributes of a record.
pub trait AttributeReader {
    fn attribute_names(&self) -> Vec<&str>;

    fn read_attribute(&self, name: &str) -> Result<Value, AttributeError>;

    /// Every attribute with its read outcome, in declaration order.
    fn list_attributes(&self) -> Vec<(String, Result<Value, AttributeError>)> {
        self.attribute_names()
            .into_iter()
            .map(|name| (name.to_string(), self.read_attribute(name)))
            .collect()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct RawRecord {
    pub type_id: String,
    pub start_time: Option<DateTime<FixedOffset>>,
    pub end_time: Option<DateTime<FixedOffset>>,
    /// Set for instantaneous records (weight, blood pressure, ...).
    pub time: Option<DateTime<FixedOffset>>,
    pub attributes: Vec<(String, AttributeValue)>,
}

impl RawRecord {
    pub fn new(type_id: impl Into<String>) -> Self {
        Self {
            type_id: type_id.into(),
            start_time: None,
            end_time: None,
            time: None,
            attributes: Vec::new(),
        }
    }

    pub fn interval(
        type_id: impl Into<String>,
        start: DateTime<FixedOffset>,
        end: DateTime<FixedOffset>,
    ) -> Self {
        Self {
            start_time: Some(start),
            end_time: Some(end),
            ..Self::new(type_id)
        }
    }

    pub fn instant(type_id: impl Into<String>, time: DateTime<FixedOffset>) -> Self {
        Self {
            time: Some(time),
            ..Self::new(type_id)
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.attributes.push((name.into(), value.into()));
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v)
    }

    /// The timestamp used for windowing: start time, else the instant.
    pub fn anchor_time(&self) -> Option<DateTime<FixedOffset>> {
        self.start_time.or(self.time)
    }
}

impl AttributeReader for RawRecord {
    fn attribute_names(&self) -> Vec<&str> {
        self.attributes.iter().map(|(k, _)| k.as_str()).collect()
    }

    fn read_attribute(&self, name: &str) -> Result<Value, AttributeError> {
        self.attribute(name)
            .ok_or_else(|| AttributeError::Missing(name.to_string()))?
            .to_json(name)
    }
}
