use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

use super::data::TrafficRecord;

/// Headline numbers over the filtered rows. Means are `None` when no rows
/// are selected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Kpis {
    pub total_traffic_volume: f64,
    pub average_speed: Option<f64>,
    pub average_congestion_level: Option<f64>,
}

pub fn compute(records: &[&TrafficRecord]) -> Kpis {
    Kpis {
        total_traffic_volume: records.iter().map(|r| r.traffic_volume).sum(),
        average_speed: rounded_mean(records.iter().map(|r| r.average_speed)),
        average_congestion_level: rounded_mean(records.iter().map(|r| r.congestion_level)),
    }
}

/// Mean rounded to two decimals; NaN (empty input) becomes `None`.
pub fn rounded_mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let values: Vec<f64> = values.collect();
    let mean = values.mean();
    if mean.is_nan() {
        None
    } else {
        Some(round2(mean))
    }
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
