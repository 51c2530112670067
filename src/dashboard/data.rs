use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use tracing::info;

/// One row of the traffic dataset. Column names follow the CSV header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrafficRecord {
    pub date: NaiveDate,
    pub area_name: String,
    #[serde(rename = "road/intersection_name")]
    pub road_name: String,
    pub traffic_volume: f64,
    pub average_speed: f64,
    pub congestion_level: f64,
    pub incident_reports: f64,
    pub environmental_impact: f64,
    pub road_capacity_utilization: f64,
    pub parking_usage: f64,
    pub traffic_signal_compliance: f64,
    pub pedestrian_and_cyclist_count: f64,
}

/// Values the sidebar controls can take, and their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardOptions {
    pub min_date: NaiveDate,
    pub max_date: NaiveDate,
    pub areas: Vec<String>,
    pub roads: Vec<String>,
}

#[derive(Debug)]
pub struct Dataset {
    records: Vec<TrafficRecord>,
    options: DashboardOptions,
}

impl Dataset {
    pub fn load(path: &str) -> Result<Self> {
        info!("Loading traffic dataset from {}", path);

        let file = File::open(path).with_context(|| format!("failed to open dataset {}", path))?;
        let dataset = Self::from_reader(file).with_context(|| format!("failed to load dataset {}", path))?;

        info!(
            records = dataset.records.len(),
            areas = dataset.options.areas.len(),
            roads = dataset.options.roads.len(),
            "Dataset loaded"
        );
        Ok(dataset)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::Reader::from_reader(reader);
        let mut records = Vec::new();
        for result in rdr.deserialize() {
            let record: TrafficRecord = result?;
            records.push(record);
        }

        Self::from_records(records)
    }

    pub fn from_records(records: Vec<TrafficRecord>) -> Result<Self> {
        let (Some(min_date), Some(max_date)) = (
            records.iter().map(|r| r.date).min(),
            records.iter().map(|r| r.date).max(),
        ) else {
            bail!("dataset contains no records");
        };

        let options = DashboardOptions {
            min_date,
            max_date,
            areas: unique_in_order(records.iter().map(|r| r.area_name.as_str())),
            roads: unique_in_order(records.iter().map(|r| r.road_name.as_str())),
        };

        Ok(Self { records, options })
    }

    pub fn records(&self) -> &[TrafficRecord] {
        &self.records
    }

    pub fn options(&self) -> &DashboardOptions {
        &self.options
    }
}

/// Distinct values in order of first appearance.
pub fn unique_in_order<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut unique: Vec<String> = Vec::new();
    for value in values {
        if !unique.iter().any(|seen| seen == value) {
            unique.push(value.to_string());
        }
    }
    unique
}
