use anyhow::Result;
use axum::{
    extract::{rejection::JsonRejection, State},
    response::Html,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::dashboard::data::DashboardOptions;
use crate::dashboard::{self, DashboardView, Dataset, FilterRequest};
use crate::error::DashboardError;

#[derive(Clone)]
pub struct DashboardServer {
    dataset: Arc<Dataset>,
}

impl DashboardServer {
    pub fn new(dataset: Arc<Dataset>) -> Self {
        Self { dataset }
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/", get(serve_dashboard))
            .route("/api/options", get(get_options))
            .route("/api/dashboard", post(render_dashboard))
            .route("/health", get(health))
            .layer(TraceLayer::new_for_http())
            .with_state(self.clone())
    }

    pub async fn start(&self, bind_address: &str) -> Result<()> {
        info!("Starting traffic dashboard on {}", bind_address);

        let listener = tokio::net::TcpListener::bind(bind_address).await?;
        info!("Dashboard server listening on http://{}", bind_address);

        axum::serve(listener, self.router()).await?;
        Ok(())
    }
}

// API Handlers
async fn serve_dashboard() -> Html<&'static str> {
    Html(include_str!("../../static/dashboard.html"))
}

async fn get_options(State(server): State<DashboardServer>) -> Json<DashboardOptions> {
    Json(server.dataset.options().clone())
}

async fn render_dashboard(
    State(server): State<DashboardServer>,
    payload: Result<Json<FilterRequest>, JsonRejection>,
) -> Result<Json<DashboardView>, DashboardError> {
    let Json(request) = payload.map_err(|e| DashboardError::BadRequest(e.body_text()))?;
    Ok(Json(dashboard::render(&server.dataset, &request)))
}

async fn health(State(server): State<DashboardServer>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "records": server.dataset.records().len(),
    }))
}
