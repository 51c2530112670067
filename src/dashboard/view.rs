use serde::{Deserialize, Serialize};
use tracing::debug;

use super::charts::{self, area_factor_means, Chart};
use super::data::{Dataset, TrafficRecord};
use super::filter::{FilterRequest, FilterState};
use super::kpi::{self, Kpis};

/// Everything the page shows for one sidebar state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardView {
    pub filter: FilterState,
    pub kpis: Kpis,
    pub radar_areas: Vec<String>,
    pub radar_area: Option<String>,
    pub charts: Vec<Chart>,
    pub table: Vec<TrafficRecord>,
}

/// Recompute every view from the dataset. Nothing is cached between calls.
pub fn render(dataset: &Dataset, request: &FilterRequest) -> DashboardView {
    let filter = request.resolve(dataset.options());
    let rows = filter.apply(dataset.records());

    // The radar selector only offers areas left after filtering
    let radar_areas: Vec<String> = area_factor_means(&rows).into_keys().collect();
    let radar_area = match &request.radar_area {
        Some(area) if radar_areas.contains(area) => Some(area.clone()),
        _ => radar_areas.first().cloned(),
    };

    debug!(
        rows = rows.len(),
        date = %filter.date,
        radar_area = ?radar_area,
        "Rendering dashboard"
    );

    DashboardView {
        kpis: kpi::compute(&rows),
        charts: charts::dashboard_charts(&rows, radar_area.as_deref()),
        table: rows.into_iter().cloned().collect(),
        filter,
        radar_areas,
        radar_area,
    }
}
