use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PredictionError {
    #[error("{0}")]
    Validation(String),

    #[error("missing required feature: {0}")]
    FeatureMissing(String),

    #[error("model inference failed: {0}")]
    ModelInference(String),
}

impl PredictionError {
    /// Every prediction failure is a client error on the wire; the mapping is
    /// kept per variant so a kind can be moved to another status on its own.
    pub fn status_code(&self) -> StatusCode {
        match self {
            PredictionError::Validation(_) => StatusCode::BAD_REQUEST,
            PredictionError::FeatureMissing(_) => StatusCode::BAD_REQUEST,
            PredictionError::ModelInference(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for PredictionError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        warn!(error = %self, status = status.as_u16(), "Prediction request rejected");

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[derive(Error, Debug)]
pub enum MLError {
    #[error("Model loading failed: {0}")]
    ModelLoadError(String),
}

#[derive(Error, Debug)]
pub enum DashboardError {
    #[error("Invalid filter request: {0}")]
    BadRequest(String),
}

impl IntoResponse for DashboardError {
    fn into_response(self) -> Response {
        let status = match &self {
            DashboardError::BadRequest(_) => StatusCode::BAD_REQUEST,
        };
        warn!(error = %self, "Dashboard request failed");

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
