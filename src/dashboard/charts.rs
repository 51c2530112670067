use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;

use super::data::{unique_in_order, TrafficRecord};

const ROAD_AXIS: &str = "road/intersection_name";
const AREA_AXIS: &str = "area_name";
// Largest bubble diameter in px, as plotly express draws it
const BUBBLE_SIZE_MAX: f64 = 20.0;

type Column = fn(&TrafficRecord) -> f64;

/// Factors drawn on the radar chart, averaged per area.
pub const RADAR_FACTORS: [(&str, Column); 6] = [
    ("congestion_level", |r: &TrafficRecord| r.congestion_level),
    ("traffic_signal_compliance", |r: &TrafficRecord| r.traffic_signal_compliance),
    ("environmental_impact", |r: &TrafficRecord| r.environmental_impact),
    ("parking_usage", |r: &TrafficRecord| r.parking_usage),
    ("pedestrian_and_cyclist_count", |r: &TrafficRecord| r.pedestrian_and_cyclist_count),
    ("road_capacity_utilization", |r: &TrafficRecord| r.road_capacity_utilization),
];

/// A plotly figure: traces plus layout, drawn by the browser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chart {
    pub id: String,
    pub title: String,
    pub data: Vec<Value>,
    pub layout: Value,
}

impl Chart {
    fn new(id: &str, title: impl Into<String>, data: Vec<Value>, layout: Value) -> Self {
        let title = title.into();
        let mut layout = layout;
        layout["title"] = json!({ "text": title });

        Self {
            id: id.to_string(),
            title,
            data,
            layout,
        }
    }
}

/// Rows split by area, areas in order of first appearance.
fn by_area<'a>(records: &[&'a TrafficRecord]) -> Vec<(String, Vec<&'a TrafficRecord>)> {
    unique_in_order(records.iter().map(|r| r.area_name.as_str()))
        .into_iter()
        .map(|area| {
            let rows = records
                .iter()
                .copied()
                .filter(|r| r.area_name == area)
                .collect();
            (area, rows)
        })
        .collect()
}

fn axis_layout(x: &str, y: &str) -> Value {
    json!({
        "xaxis": { "title": { "text": x } },
        "yaxis": { "title": { "text": y } },
        "legend": { "title": { "text": AREA_AXIS } },
    })
}

fn road_series(records: &[&TrafficRecord], kind: &str, y: Column, extra: Value) -> Vec<Value> {
    by_area(records)
        .into_iter()
        .map(|(area, rows)| {
            let mut trace = json!({
                "type": kind,
                "name": area,
                "x": rows.iter().map(|r| r.road_name.as_str()).collect::<Vec<_>>(),
                "y": rows.iter().map(|r| y(r)).collect::<Vec<_>>(),
            });
            if let (Some(trace), Some(extra)) = (trace.as_object_mut(), extra.as_object()) {
                trace.extend(extra.clone());
            }
            trace
        })
        .collect()
}

pub fn bar_by_road(id: &str, title: &str, records: &[&TrafficRecord], y_name: &str, y: Column) -> Chart {
    let mut layout = axis_layout(ROAD_AXIS, y_name);
    layout["barmode"] = json!("relative");

    Chart::new(id, title, road_series(records, "bar", y, json!({})), layout)
}

pub fn line_by_road(id: &str, title: &str, records: &[&TrafficRecord], y_name: &str, y: Column) -> Chart {
    let data = road_series(records, "scatter", y, json!({ "mode": "lines" }));
    Chart::new(id, title, data, axis_layout(ROAD_AXIS, y_name))
}

pub fn box_by_road(id: &str, title: &str, records: &[&TrafficRecord], y_name: &str, y: Column) -> Chart {
    let mut layout = axis_layout(ROAD_AXIS, y_name);
    layout["boxmode"] = json!("group");

    Chart::new(id, title, road_series(records, "box", y, json!({})), layout)
}

/// Scatter whose marker area is proportional to traffic volume.
pub fn bubble_scatter(
    id: &str,
    title: &str,
    records: &[&TrafficRecord],
    (x_name, x): (&str, Column),
    (y_name, y): (&str, Column),
) -> Chart {
    let max_size = records
        .iter()
        .map(|r| r.traffic_volume)
        .fold(0.0_f64, f64::max);
    let sizeref = if max_size > 0.0 {
        2.0 * max_size / BUBBLE_SIZE_MAX.powi(2)
    } else {
        1.0
    };

    let data = by_area(records)
        .into_iter()
        .map(|(area, rows)| {
            json!({
                "type": "scatter",
                "mode": "markers",
                "name": area,
                "x": rows.iter().map(|r| x(r)).collect::<Vec<_>>(),
                "y": rows.iter().map(|r| y(r)).collect::<Vec<_>>(),
                "marker": {
                    "size": rows.iter().map(|r| r.traffic_volume).collect::<Vec<_>>(),
                    "sizemode": "area",
                    "sizeref": sizeref,
                },
            })
        })
        .collect();

    Chart::new(id, title, data, axis_layout(x_name, y_name))
}

/// Sum of traffic volume for every (area, road) cell.
pub fn density_heatmap(id: &str, title: &str, records: &[&TrafficRecord]) -> Chart {
    let roads = unique_in_order(records.iter().map(|r| r.road_name.as_str()));
    let areas = unique_in_order(records.iter().map(|r| r.area_name.as_str()));

    let mut z = vec![vec![0.0_f64; roads.len()]; areas.len()];
    for record in records {
        let row = areas.iter().position(|a| *a == record.area_name);
        let col = roads.iter().position(|r| *r == record.road_name);
        if let (Some(row), Some(col)) = (row, col) {
            z[row][col] += record.traffic_volume;
        }
    }

    let data = vec![json!({
        "type": "heatmap",
        "x": roads,
        "y": areas,
        "z": z,
        "colorscale": "Viridis",
        "colorbar": { "title": { "text": "sum of traffic_volume" } },
    })];
    let layout = json!({
        "xaxis": { "title": { "text": ROAD_AXIS } },
        "yaxis": { "title": { "text": AREA_AXIS } },
    });

    Chart::new(id, title, data, layout)
}

/// Per-area means of the radar factors, keyed by area in sorted order.
pub fn area_factor_means(records: &[&TrafficRecord]) -> BTreeMap<String, Vec<f64>> {
    let mut sums: BTreeMap<String, (Vec<f64>, usize)> = BTreeMap::new();
    for record in records {
        let (totals, count) = sums
            .entry(record.area_name.clone())
            .or_insert_with(|| (vec![0.0; RADAR_FACTORS.len()], 0));
        for (total, (_, column)) in totals.iter_mut().zip(RADAR_FACTORS.iter()) {
            *total += column(record);
        }
        *count += 1;
    }

    sums.into_iter()
        .map(|(area, (totals, count))| {
            let means = totals.into_iter().map(|t| t / count as f64).collect();
            (area, means)
        })
        .collect()
}

pub fn radar(id: &str, records: &[&TrafficRecord], area: Option<&str>) -> Chart {
    let means = area_factor_means(records);
    let selected = area.and_then(|a| means.get_key_value(a));

    let title = match selected {
        Some((name, _)) => format!("Traffic Factors for {}", name),
        None => "Traffic Factors".to_string(),
    };
    let data = selected
        .map(|(_, values)| {
            vec![json!({
                "type": "scatterpolar",
                "r": values,
                "theta": RADAR_FACTORS.iter().map(|(name, _)| *name).collect::<Vec<_>>(),
                "fill": "toself",
            })]
        })
        .unwrap_or_default();
    let layout = json!({
        "polar": { "radialaxis": { "visible": true, "range": [0, 100] } },
        "showlegend": false,
    });

    Chart::new(id, title, data, layout)
}

/// The nine dashboard views over the filtered rows.
pub fn dashboard_charts(records: &[&TrafficRecord], radar_area: Option<&str>) -> Vec<Chart> {
    vec![
        bar_by_road(
            "traffic_volume_by_road",
            "Traffic Volume by Road",
            records,
            "traffic_volume",
            |r| r.traffic_volume,
        ),
        line_by_road(
            "congestion_trend",
            "Congestion Level Trend",
            records,
            "congestion_level",
            |r| r.congestion_level,
        ),
        bubble_scatter(
            "incidents_vs_environment",
            "Incidents vs Environmental Impact",
            records,
            ("incident_reports", |r: &TrafficRecord| r.incident_reports),
            ("environmental_impact", |r: &TrafficRecord| r.environmental_impact),
        ),
        density_heatmap("traffic_density", "Traffic Density Heatmap", records),
        bubble_scatter(
            "volume_vs_capacity",
            "Traffic Volume vs. Road Capacity Utilization",
            records,
            ("road_capacity_utilization", |r: &TrafficRecord| r.road_capacity_utilization),
            ("traffic_volume", |r: &TrafficRecord| r.traffic_volume),
        ),
        bar_by_road(
            "parking_usage_by_road",
            "Parking Usage vs. Traffic Volume",
            records,
            "parking_usage",
            |r| r.parking_usage,
        ),
        radar("traffic_factors", records, radar_area),
        line_by_road(
            "pedestrian_cyclist_count",
            "Pedestrian & Cyclist Count Over Roads",
            records,
            "pedestrian_and_cyclist_count",
            |r| r.pedestrian_and_cyclist_count,
        ),
        box_by_road(
            "traffic_volume_distribution",
            "Traffic Volume Distribution Across Roads",
            records,
            "traffic_volume",
            |r| r.traffic_volume,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dashboard::data::fixtures::sample_dataset;
    use crate::dashboard::filter::FilterRequest;

    fn first_day() -> Vec<TrafficRecord> {
        let dataset = sample_dataset();
        FilterRequest::default()
            .resolve(dataset.options())
            .apply(dataset.records())
            .into_iter()
            .cloned()
            .collect()
    }

    #[test]
    fn builds_nine_charts() {
        let rows = first_day();
        let refs: Vec<&TrafficRecord> = rows.iter().collect();

        let charts = dashboard_charts(&refs, Some("Indiranagar"));
        assert_eq!(charts.len(), 9);

        let kinds: Vec<&str> = charts
            .iter()
            .map(|c| c.data.first().and_then(|t| t["type"].as_str()).unwrap_or(""))
            .collect();
        assert_eq!(
            kinds,
            vec!["bar", "scatter", "scatter", "heatmap", "scatter", "bar", "scatterpolar", "scatter", "box"]
        );
        assert_eq!(charts[0].layout["title"]["text"], "Traffic Volume by Road");
    }

    #[test]
    fn series_are_split_by_area() {
        let rows = first_day();
        let refs: Vec<&TrafficRecord> = rows.iter().collect();

        let chart = bar_by_road("v", "Volume", &refs, "traffic_volume", |r| r.traffic_volume);
        assert_eq!(chart.data.len(), 2);
        assert_eq!(chart.data[0]["name"], "Indiranagar");
        assert_eq!(chart.data[0]["x"], json!(["100 Feet Road", "CMH Road"]));
        assert_eq!(chart.data[0]["y"], json!([50590.0, 30825.0]));
        assert_eq!(chart.data[1]["name"], "Whitefield");
    }

    #[test]
    fn line_traces_draw_lines() {
        let rows = first_day();
        let refs: Vec<&TrafficRecord> = rows.iter().collect();

        let chart = line_by_road("c", "Congestion", &refs, "congestion_level", |r| r.congestion_level);
        assert!(chart.data.iter().all(|t| t["mode"] == "lines"));
    }

    #[test]
    fn heatmap_sums_cells() {
        let dataset = sample_dataset();
        let refs: Vec<&TrafficRecord> = dataset.records().iter().collect();

        let chart = density_heatmap("h", "Heat", &refs);
        let trace = &chart.data[0];
        assert_eq!(trace["y"][0], "Indiranagar");
        assert_eq!(trace["x"][0], "100 Feet Road");
        // Two days on the same cell add up
        assert_eq!(trace["z"][0][0], json!(90590.0));
        // Whitefield never reports CMH Road
        assert_eq!(trace["z"][1][1], json!(0.0));
    }

    #[test]
    fn bubble_sizes_follow_traffic_volume() {
        let rows = first_day();
        let refs: Vec<&TrafficRecord> = rows.iter().collect();

        let chart = bubble_scatter(
            "s",
            "Scatter",
            &refs,
            ("incident_reports", |r: &TrafficRecord| r.incident_reports),
            ("environmental_impact", |r: &TrafficRecord| r.environmental_impact),
        );
        let marker = &chart.data[0]["marker"];
        assert_eq!(marker["size"], json!([50590.0, 30825.0]));
        assert_eq!(marker["sizeref"], json!(2.0 * 50590.0 / 400.0));
    }

    #[test]
    fn radar_averages_six_factors_for_selected_area() {
        let dataset = sample_dataset();
        let refs: Vec<&TrafficRecord> = dataset.records().iter().collect();

        let means = area_factor_means(&refs);
        assert_eq!(means.keys().collect::<Vec<_>>(), vec!["Indiranagar", "Koramangala", "Whitefield"]);
        let indiranagar = &means["Indiranagar"];
        assert_eq!(indiranagar.len(), 6);
        // (100 + 100 + 90) / 3
        assert!((indiranagar[0] - 96.666_666).abs() < 1e-3);

        let chart = radar("r", &refs, Some("Koramangala"));
        assert_eq!(chart.title, "Traffic Factors for Koramangala");
        assert_eq!(chart.data[0]["theta"].as_array().unwrap().len(), 6);
        assert_eq!(chart.layout["polar"]["radialaxis"]["range"], json!([0, 100]));
        assert_eq!(chart.layout["showlegend"], json!(false));
    }

    #[test]
    fn radar_without_matching_area_is_empty() {
        let rows = first_day();
        let refs: Vec<&TrafficRecord> = rows.iter().collect();

        assert!(radar("r", &refs, Some("Koramangala")).data.is_empty());
        assert!(radar("r", &refs, None).data.is_empty());
        assert!(radar("r", &[], Some("Indiranagar")).data.is_empty());
    }

    #[test]
    fn charts_over_empty_selection_have_no_series() {
        let charts = dashboard_charts(&[], None);
        assert_eq!(charts.len(), 9);
        for chart in charts.iter().filter(|c| c.id != "traffic_density") {
            assert!(chart.data.is_empty(), "{} should be empty", chart.id);
        }
    }
}
