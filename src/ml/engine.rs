use anyhow::Result;
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use super::features::{self, DAY_OF_WEEK, HOUR, MONTH};
use super::models::{LinearRegressionModel, PipelineModel};
use crate::config::PredictionConfig;
use crate::error::{MLError, PredictionError};

/// Input columns of the linear regression model, in the order it was trained on.
pub const LINEAR_FEATURES: [&str; 8] = [
    "LONGITUDE",
    "LATITUDE",
    "MINIMUM_SPEED",
    "MAXIMUM_SPEED",
    "AVERAGE_SPEED",
    HOUR,
    DAY_OF_WEEK,
    MONTH,
];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PipelinePrediction {
    pub traffic_volume: f64,
    pub congestion_level: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LinearPrediction {
    pub prediction: f64,
}

/// Both models, loaded once at startup and shared read-only by every request.
#[derive(Debug)]
pub struct MLEngine {
    pipeline: PipelineModel,
    linear: LinearRegressionModel,
}

impl MLEngine {
    pub async fn new(config: &PredictionConfig) -> Result<Self> {
        let pipeline = PipelineModel::load_from_file(&config.pipeline_model_path).await?;
        let linear = LinearRegressionModel::load_from_file(&config.linear_model_path).await?;

        let engine = Self::from_models(pipeline, linear)?;
        info!(
            pipeline_version = %engine.pipeline.version,
            linear_version = %engine.linear.version,
            "ML Engine initialized successfully"
        );

        Ok(engine)
    }

    pub fn from_models(pipeline: PipelineModel, linear: LinearRegressionModel) -> Result<Self, MLError> {
        if pipeline.targets.len() != 2 {
            return Err(MLError::ModelLoadError(format!(
                "pipeline must predict traffic volume and congestion level, found {} targets",
                pipeline.targets.len()
            )));
        }

        let declared: Vec<&str> = linear.feature_names.iter().map(String::as_str).collect();
        if declared != LINEAR_FEATURES {
            return Err(MLError::ModelLoadError(format!(
                "linear model features {:?} do not match {:?}",
                declared, LINEAR_FEATURES
            )));
        }

        Ok(Self { pipeline, linear })
    }

    pub fn pipeline_version(&self) -> &str {
        &self.pipeline.version
    }

    pub fn linear_version(&self) -> &str {
        &self.linear.version
    }

    pub fn predict_pipeline(&self, body: &Value) -> Result<PipelinePrediction, PredictionError> {
        let row = features::normalize(body)?;
        debug!(features = row.len(), "Running pipeline prediction");

        let output = self.pipeline.predict(std::slice::from_ref(&row))?;
        let traffic_volume = finite(output[(0, 0)], "traffic_volume")?;
        let congestion_level = finite(output[(0, 1)], "congestion_level")?;

        Ok(PipelinePrediction {
            traffic_volume,
            congestion_level,
        })
    }

    pub fn predict_linear_regression(&self, body: &Value) -> Result<LinearPrediction, PredictionError> {
        let row = features::normalize(body)?;
        let vector = row.select(&LINEAR_FEATURES)?;
        debug!(?vector, "Running linear regression prediction");

        let x = DMatrix::from_row_slice(1, vector.len(), &vector);
        let output = self.linear.predict(&x)?;

        Ok(LinearPrediction {
            prediction: finite(output[0], "prediction")?,
        })
    }
}

fn finite(value: f64, target: &str) -> Result<f64, PredictionError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(PredictionError::ModelInference(format!(
            "model produced a non-finite {}",
            target
        )))
    }
}
