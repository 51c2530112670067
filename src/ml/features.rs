use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::PredictionError;

pub const DATE_TIME: &str = "DATE_TIME";
pub const HOUR: &str = "HOUR";
pub const DAY_OF_WEEK: &str = "DAY_OF_WEEK";
pub const MONTH: &str = "MONTH";

const DATE_TIME_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureValue {
    Number(f64),
    Text(String),
}

impl FeatureValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FeatureValue::Number(value) => Some(*value),
            FeatureValue::Text(_) => None,
        }
    }
}

/// Calendar fields derived from a request timestamp. Monday is day 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DerivedTimeFeatures {
    pub hour: u32,
    pub day_of_week: u32,
    pub month: u32,
}

impl From<NaiveDateTime> for DerivedTimeFeatures {
    fn from(timestamp: NaiveDateTime) -> Self {
        Self {
            hour: timestamp.hour(),
            day_of_week: timestamp.weekday().num_days_from_monday(),
            month: timestamp.month(),
        }
    }
}

/// A normalized request: feature name to scalar value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureRow {
    values: BTreeMap<String, FeatureValue>,
}

impl FeatureRow {
    pub fn get(&self, name: &str) -> Option<&FeatureValue> {
        self.values.get(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: FeatureValue) {
        self.values.insert(name.into(), value);
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Reduce and reorder the row to exactly `names`, all of which must be numeric.
    pub fn select(&self, names: &[&str]) -> Result<Vec<f64>, PredictionError> {
        names
            .iter()
            .map(|name| {
                let value = self
                    .get(name)
                    .ok_or_else(|| PredictionError::FeatureMissing(name.to_string()))?;
                value.as_number().ok_or_else(|| {
                    PredictionError::Validation(format!("feature {} must be numeric", name))
                })
            })
            .collect()
    }
}

pub fn parse_timestamp(raw: &str) -> Result<NaiveDateTime, PredictionError> {
    let raw = raw.trim();

    // Offsets keep the wall-clock time they were written in
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(raw) {
        return Ok(timestamp.naive_local());
    }

    for format in DATE_TIME_FORMATS {
        if let Ok(timestamp) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(timestamp);
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .ok_or_else(|| PredictionError::Validation(format!("invalid {} value: {:?}", DATE_TIME, raw)))
}

pub fn derive_time_features(value: &Value) -> Result<DerivedTimeFeatures, PredictionError> {
    let raw = value.as_str().ok_or_else(|| {
        PredictionError::Validation(format!("{} must be a date-time string", DATE_TIME))
    })?;

    parse_timestamp(raw).map(DerivedTimeFeatures::from)
}

/// Turn a request body into a feature row, replacing `DATE_TIME` with its
/// derived calendar fields.
pub fn normalize(body: &Value) -> Result<FeatureRow, PredictionError> {
    let object = match body {
        Value::Object(object) => object,
        Value::Array(_) => {
            return Err(PredictionError::Validation(
                "batch prediction is not supported; send a single JSON object".to_string(),
            ))
        }
        _ => {
            return Err(PredictionError::Validation(
                "request body must be a JSON object".to_string(),
            ))
        }
    };

    let mut row = FeatureRow::default();
    let mut derived = None;

    for (name, value) in object {
        if name == DATE_TIME {
            derived = Some(derive_time_features(value)?);
            continue;
        }

        let feature = match value {
            Value::Number(number) => number
                .as_f64()
                .map(FeatureValue::Number)
                .ok_or_else(|| PredictionError::Validation(format!("feature {} is out of range", name)))?,
            Value::String(text) => FeatureValue::Text(text.clone()),
            _ => {
                return Err(PredictionError::Validation(format!(
                    "feature {} must be a number or a string",
                    name
                )))
            }
        };
        row.insert(name.clone(), feature);
    }

    if let Some(time) = derived {
        row.insert(HOUR, FeatureValue::Number(time.hour as f64));
        row.insert(DAY_OF_WEEK, FeatureValue::Number(time.day_of_week as f64));
        row.insert(MONTH, FeatureValue::Number(time.month as f64));
    }

    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn derives_calendar_fields_from_iso_timestamp() {
        let time = derive_time_features(&json!("2023-05-15T14:30:00")).unwrap();
        assert_eq!(
            time,
            DerivedTimeFeatures { hour: 14, day_of_week: 0, month: 5 }
        );
    }

    #[test]
    fn derivation_is_deterministic() {
        let first = derive_time_features(&json!("2024-12-29 23:59:59")).unwrap();
        for _ in 0..10 {
            assert_eq!(derive_time_features(&json!("2024-12-29 23:59:59")).unwrap(), first);
        }
        // Sunday
        assert_eq!(first.day_of_week, 6);
        assert_eq!(first.month, 12);
    }

    #[test]
    fn accepts_common_timestamp_forms() {
        assert_eq!(parse_timestamp("2023-05-15").unwrap().hour(), 0);
        assert_eq!(parse_timestamp("2023-05-15 08:15").unwrap().minute(), 15);
        assert_eq!(parse_timestamp("2023-05-15T08:15:00.250").unwrap().hour(), 8);
        assert_eq!(parse_timestamp("2023-05-15T22:00:00+05:30").unwrap().hour(), 22);
        assert_eq!(parse_timestamp("2023-05-15T22:00:00Z").unwrap().hour(), 22);
    }

    #[test]
    fn rejects_unparseable_timestamps() {
        assert!(matches!(
            derive_time_features(&json!("yesterday")),
            Err(PredictionError::Validation(_))
        ));
        assert!(matches!(
            derive_time_features(&json!(1684161000)),
            Err(PredictionError::Validation(_))
        ));
    }

    #[test]
    fn normalize_replaces_date_time_with_derived_fields() {
        let row = normalize(&json!({
            "DATE_TIME": "2023-05-15T14:30:00",
            "LONGITUDE": 77.5,
            "HOUR": 3
        }))
        .unwrap();

        assert!(row.get(DATE_TIME).is_none());
        assert_eq!(row.get(HOUR), Some(&FeatureValue::Number(14.0)));
        assert_eq!(row.get(DAY_OF_WEEK), Some(&FeatureValue::Number(0.0)));
        assert_eq!(row.get(MONTH), Some(&FeatureValue::Number(5.0)));
        assert_eq!(row.len(), 4);
    }

    #[test]
    fn normalize_without_timestamp_keeps_fields() {
        let row = normalize(&json!({ "area_name": "Indiranagar", "AVERAGE_SPEED": 35 })).unwrap();
        assert_eq!(row.get("area_name"), Some(&FeatureValue::Text("Indiranagar".into())));
        assert_eq!(row.get("AVERAGE_SPEED"), Some(&FeatureValue::Number(35.0)));
        assert!(row.get(HOUR).is_none());
    }

    #[test]
    fn normalize_rejects_batches_and_non_objects() {
        let batch = normalize(&json!([{ "LONGITUDE": 1.0 }, { "LONGITUDE": 2.0 }]));
        assert!(matches!(batch, Err(PredictionError::Validation(msg)) if msg.contains("batch")));
        assert!(normalize(&json!("LONGITUDE")).is_err());
        assert!(normalize(&json!(null)).is_err());
    }

    #[test]
    fn normalize_rejects_non_scalar_values() {
        assert!(normalize(&json!({ "LONGITUDE": null })).is_err());
        assert!(normalize(&json!({ "LONGITUDE": [1, 2] })).is_err());
        assert!(normalize(&json!({ "LONGITUDE": true })).is_err());
    }

    #[test]
    fn select_reorders_and_reports_missing() {
        let row = normalize(&json!({ "B": 2, "A": 1, "C": 3 })).unwrap();
        assert_eq!(row.select(&["C", "A"]).unwrap(), vec![3.0, 1.0]);
        assert_eq!(
            row.select(&["A", "Z"]),
            Err(PredictionError::FeatureMissing("Z".into()))
        );
    }

    #[test]
    fn select_rejects_text_values() {
        let row = normalize(&json!({ "A": "fast" })).unwrap();
        assert!(matches!(row.select(&["A"]), Err(PredictionError::Validation(_))));
    }
}
