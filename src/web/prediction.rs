use anyhow::Result;
use axum::{
    body::Bytes,
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::error::PredictionError;
use crate::ml::{LinearPrediction, MLEngine, PipelinePrediction};

#[derive(Clone)]
pub struct PredictionServer {
    ml_engine: Arc<MLEngine>,
}

impl PredictionServer {
    pub fn new(ml_engine: Arc<MLEngine>) -> Self {
        Self { ml_engine }
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/predict", post(predict_pipeline))
            .route("/predict_lr", post(predict_linear_regression))
            .route("/health", get(health))
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
            .with_state(self.clone())
    }

    pub async fn start(&self, bind_address: &str) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(bind_address).await?;
        info!("Prediction service listening on http://{}", bind_address);

        axum::serve(listener, self.router()).await?;
        Ok(())
    }
}

fn parse_body(body: &Bytes) -> Result<Value, PredictionError> {
    serde_json::from_slice(body)
        .map_err(|e| PredictionError::Validation(format!("invalid JSON body: {}", e)))
}

async fn predict_pipeline(
    State(server): State<PredictionServer>,
    body: Bytes,
) -> Result<Json<PipelinePrediction>, PredictionError> {
    let request = parse_body(&body)?;
    let prediction = server.ml_engine.predict_pipeline(&request)?;
    Ok(Json(prediction))
}

async fn predict_linear_regression(
    State(server): State<PredictionServer>,
    body: Bytes,
) -> Result<Json<LinearPrediction>, PredictionError> {
    let request = parse_body(&body)?;
    let prediction = server.ml_engine.predict_linear_regression(&request)?;
    Ok(Json(prediction))
}

async fn health(State(server): State<PredictionServer>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "pipeline_version": server.ml_engine.pipeline_version(),
        "linear_version": server.ml_engine.linear_version(),
    }))
}
