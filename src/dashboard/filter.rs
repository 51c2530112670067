use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::data::{DashboardOptions, TrafficRecord};

/// Sidebar selection. A record is shown iff all three predicates hold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterState {
    pub date: NaiveDate,
    pub areas: BTreeSet<String>,
    pub roads: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Date(NaiveDate),
    Areas(BTreeSet<String>),
    Roads(BTreeSet<String>),
}

impl Predicate {
    pub fn matches(&self, record: &TrafficRecord) -> bool {
        match self {
            Predicate::Date(date) => record.date == *date,
            Predicate::Areas(areas) => areas.contains(&record.area_name),
            Predicate::Roads(roads) => roads.contains(&record.road_name),
        }
    }
}

impl FilterState {
    pub fn predicates(&self) -> [Predicate; 3] {
        [
            Predicate::Date(self.date),
            Predicate::Areas(self.areas.clone()),
            Predicate::Roads(self.roads.clone()),
        ]
    }

    pub fn apply<'a>(&self, records: &'a [TrafficRecord]) -> Vec<&'a TrafficRecord> {
        apply_predicates(records, &self.predicates())
    }
}

/// Narrow `records` by each predicate in turn.
pub fn apply_predicates<'a>(
    records: impl IntoIterator<Item = &'a TrafficRecord>,
    predicates: &[Predicate],
) -> Vec<&'a TrafficRecord> {
    records
        .into_iter()
        .filter(|record| predicates.iter().all(|p| p.matches(record)))
        .collect()
}

/// Wire form of the sidebar. Absent fields fall back to the sidebar
/// defaults; an explicit empty list selects nothing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterRequest {
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub areas: Option<Vec<String>>,
    #[serde(default)]
    pub roads: Option<Vec<String>>,
    #[serde(default)]
    pub radar_area: Option<String>,
}

impl FilterRequest {
    pub fn resolve(&self, options: &DashboardOptions) -> FilterState {
        FilterState {
            date: self.date.unwrap_or(options.min_date),
            areas: self
                .areas
                .as_ref()
                .unwrap_or(&options.areas)
                .iter()
                .cloned()
                .collect(),
            roads: self
                .roads
                .as_ref()
                .unwrap_or(&options.roads)
                .iter()
                .cloned()
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dashboard::data::fixtures::sample_dataset;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2022, 1, d).unwrap()
    }

    fn set(values: &[&str]) -> BTreeSet<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn default_request_selects_first_day_everywhere() {
        let dataset = sample_dataset();
        let state = FilterRequest::default().resolve(dataset.options());

        assert_eq!(state.date, day(1));
        let rows = state.apply(dataset.records());
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|r| r.date == day(1)));
    }

    #[test]
    fn date_must_match_exactly() {
        let dataset = sample_dataset();
        let state = FilterRequest {
            date: Some(day(3)),
            ..Default::default()
        }
        .resolve(dataset.options());

        assert!(state.apply(dataset.records()).is_empty());
    }

    #[test]
    fn area_and_road_sets_restrict_rows() {
        let dataset = sample_dataset();
        let state = FilterState {
            date: day(1),
            areas: set(&["Indiranagar", "Whitefield"]),
            roads: set(&["CMH Road", "Marathahalli Bridge", "Sony World Junction"]),
        };

        let roads: Vec<&str> = state
            .apply(dataset.records())
            .iter()
            .map(|r| r.road_name.as_str())
            .collect();
        assert_eq!(roads, vec!["CMH Road", "Marathahalli Bridge"]);
    }

    #[test]
    fn explicit_empty_selection_matches_nothing() {
        let dataset = sample_dataset();
        let state = FilterRequest {
            areas: Some(vec![]),
            ..Default::default()
        }
        .resolve(dataset.options());

        assert!(state.areas.is_empty());
        assert!(state.apply(dataset.records()).is_empty());
    }

    #[test]
    fn filtering_is_idempotent() {
        let dataset = sample_dataset();
        let state = FilterRequest {
            areas: Some(vec!["Indiranagar".into()]),
            ..Default::default()
        }
        .resolve(dataset.options());

        let once = state.apply(dataset.records());
        let twice = apply_predicates(once.iter().copied(), &state.predicates());
        assert_eq!(once, twice);
    }

    #[test]
    fn predicate_order_does_not_matter() {
        let dataset = sample_dataset();
        let state = FilterState {
            date: day(1),
            areas: set(&["Indiranagar", "Whitefield"]),
            roads: set(&["100 Feet Road", "Marathahalli Bridge"]),
        };
        let [date, areas, roads] = state.predicates();
        let expected = state.apply(dataset.records());

        let orders = [
            [&date, &areas, &roads],
            [&date, &roads, &areas],
            [&areas, &date, &roads],
            [&areas, &roads, &date],
            [&roads, &date, &areas],
            [&roads, &areas, &date],
        ];
        for order in orders {
            let mut rows: Vec<&TrafficRecord> = dataset.records().iter().collect();
            for predicate in order {
                rows = apply_predicates(rows, std::slice::from_ref(predicate));
            }
            assert_eq!(rows, expected);
        }
        assert_eq!(expected.len(), 2);
    }
}
