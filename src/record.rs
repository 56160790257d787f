//! Raw prediction records
//!
//! A [`Record`] is one client's raw feature values as submitted for
//! prediction: numeric fields plus the two `yes`/`no` categoricals.
//! The training target (`expenditure`) is never part of a record.

use crate::error::{CardspendError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Raw fields every prediction input must carry, in canonical order.
pub const REQUIRED_FIELDS: [&str; 10] = [
    "reports",
    "age",
    "income",
    "share",
    "owner",
    "selfemp",
    "dependents",
    "months",
    "majorcards",
    "active",
];

/// The categorical fields that get one-hot expanded.
pub const CATEGORICAL_FIELDS: [&str; 2] = ["owner", "selfemp"];

/// A `yes`/`no` categorical value. Parses case-insensitively.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YesNo {
    Yes,
    No,
}

impl YesNo {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "yes" => Some(YesNo::Yes),
            "no" => Some(YesNo::No),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            YesNo::Yes => "yes",
            YesNo::No => "no",
        }
    }
}

impl std::fmt::Display for YesNo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for YesNo {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for YesNo {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        YesNo::parse(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("expected \"yes\" or \"no\", got \"{s}\"")))
    }
}

/// One observation's raw feature values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub reports: u32,
    pub age: f64,
    pub income: f64,
    pub share: f64,
    pub owner: YesNo,
    pub selfemp: YesNo,
    pub dependents: u32,
    pub months: u32,
    pub majorcards: u32,
    pub active: u32,
}

impl Record {
    /// Build a record from a JSON field→value mapping.
    ///
    /// Required fields are checked before deserialization so the caller
    /// gets a schema error naming the first missing field rather than a
    /// generic parse error.
    pub fn from_json_value(value: &serde_json::Value) -> Result<Self> {
        let map = value
            .as_object()
            .ok_or_else(|| CardspendError::Data("expected a JSON object per record".to_string()))?;

        for field in REQUIRED_FIELDS {
            if !map.contains_key(field) {
                return Err(CardspendError::Schema {
                    field: field.to_string(),
                });
            }
        }

        serde_json::from_value(value.clone())
            .map_err(|e| CardspendError::Data(format!("invalid record: {e}")))
    }
}

/// Convert a batch of records into a raw DataFrame, one row per record,
/// columns in canonical field order. Row order matches input order.
pub fn records_to_df(records: &[Record]) -> Result<DataFrame> {
    let columns: Vec<Column> = vec![
        Series::new(
            "reports".into(),
            records.iter().map(|r| r.reports as f64).collect::<Vec<_>>(),
        )
        .into(),
        Series::new("age".into(), records.iter().map(|r| r.age).collect::<Vec<_>>()).into(),
        Series::new(
            "income".into(),
            records.iter().map(|r| r.income).collect::<Vec<_>>(),
        )
        .into(),
        Series::new(
            "share".into(),
            records.iter().map(|r| r.share).collect::<Vec<_>>(),
        )
        .into(),
        Series::new(
            "owner".into(),
            records.iter().map(|r| r.owner.as_str()).collect::<Vec<_>>(),
        )
        .into(),
        Series::new(
            "selfemp".into(),
            records.iter().map(|r| r.selfemp.as_str()).collect::<Vec<_>>(),
        )
        .into(),
        Series::new(
            "dependents".into(),
            records.iter().map(|r| r.dependents as f64).collect::<Vec<_>>(),
        )
        .into(),
        Series::new(
            "months".into(),
            records.iter().map(|r| r.months as f64).collect::<Vec<_>>(),
        )
        .into(),
        Series::new(
            "majorcards".into(),
            records.iter().map(|r| r.majorcards as f64).collect::<Vec<_>>(),
        )
        .into(),
        Series::new(
            "active".into(),
            records.iter().map(|r| r.active as f64).collect::<Vec<_>>(),
        )
        .into(),
    ];

    DataFrame::new(columns).map_err(|e| CardspendError::Data(e.to_string()))
}
