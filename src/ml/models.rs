use anyhow::{Context, Result};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info};

use super::features::{FeatureRow, FeatureValue};
use crate::error::{MLError, PredictionError};

fn default_version() -> String {
    "unversioned".to_string()
}

/// On-disk form of a single-output linear regression model.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LinearRegressionArtifact {
    #[serde(default = "default_version")]
    pub version: String,
    pub feature_names: Vec<String>,
    pub coefficients: Vec<f64>,
    pub intercept: f64,
}

// Simple linear regression model using nalgebra
#[derive(Debug, Clone)]
pub struct LinearRegressionModel {
    pub version: String,
    pub feature_names: Vec<String>,
    pub coefficients: DVector<f64>,
    pub intercept: f64,
}

impl LinearRegressionModel {
    pub fn from_artifact(artifact: LinearRegressionArtifact) -> Result<Self, MLError> {
        if artifact.feature_names.is_empty() {
            return Err(MLError::ModelLoadError(
                "linear model declares no features".to_string(),
            ));
        }
        if artifact.coefficients.len() != artifact.feature_names.len() {
            return Err(MLError::ModelLoadError(format!(
                "linear model has {} coefficients for {} features",
                artifact.coefficients.len(),
                artifact.feature_names.len()
            )));
        }

        Ok(Self {
            version: artifact.version,
            feature_names: artifact.feature_names,
            coefficients: DVector::from_vec(artifact.coefficients),
            intercept: artifact.intercept,
        })
    }

    pub async fn load_from_file(path: &str) -> Result<Self> {
        info!("Loading linear regression model from {}", path);

        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read linear model {}", path))?;
        let artifact: LinearRegressionArtifact = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse linear model {}", path))?;

        Ok(Self::from_artifact(artifact)?)
    }

    /// One scalar per row of `x`; columns must follow `feature_names`.
    pub fn predict(&self, x: &DMatrix<f64>) -> Result<DVector<f64>, PredictionError> {
        if x.ncols() != self.coefficients.len() {
            return Err(PredictionError::ModelInference(format!(
                "expected {} features, got {}",
                self.coefficients.len(),
                x.ncols()
            )));
        }

        Ok(x * &self.coefficients + DVector::from_element(x.nrows(), self.intercept))
    }
}

/// Preprocessing step applied to one named input column.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FeatureTransform {
    Numeric { name: String, mean: f64, scale: f64 },
    Categorical { name: String, categories: Vec<String> },
}

impl FeatureTransform {
    pub fn name(&self) -> &str {
        match self {
            FeatureTransform::Numeric { name, .. } => name,
            FeatureTransform::Categorical { name, .. } => name,
        }
    }

    pub fn width(&self) -> usize {
        match self {
            FeatureTransform::Numeric { .. } => 1,
            FeatureTransform::Categorical { categories, .. } => categories.len(),
        }
    }

    fn encode_into(&self, value: &FeatureValue, out: &mut Vec<f64>) -> Result<(), PredictionError> {
        match (self, value) {
            (FeatureTransform::Numeric { mean, scale, .. }, FeatureValue::Number(x)) => {
                let scale = if *scale == 0.0 { 1.0 } else { *scale };
                out.push((x - mean) / scale);
            }
            (FeatureTransform::Categorical { categories, .. }, FeatureValue::Text(text)) => {
                // Unknown categories encode to all zeros
                out.extend(categories.iter().map(|c| if c == text { 1.0 } else { 0.0 }));
            }
            (FeatureTransform::Numeric { name, .. }, FeatureValue::Text(_)) => {
                return Err(PredictionError::Validation(format!(
                    "feature {} must be numeric",
                    name
                )));
            }
            (FeatureTransform::Categorical { name, .. }, FeatureValue::Number(_)) => {
                return Err(PredictionError::Validation(format!(
                    "feature {} must be a string",
                    name
                )));
            }
        }
        Ok(())
    }
}

/// On-disk form of the preprocessing + multi-output regression pipeline.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineArtifact {
    #[serde(default = "default_version")]
    pub version: String,
    pub features: Vec<FeatureTransform>,
    pub targets: Vec<String>,
    pub coefficients: Vec<Vec<f64>>,
    pub intercepts: Vec<f64>,
}

#[derive(Debug, Clone)]
pub struct PipelineModel {
    pub version: String,
    pub features: Vec<FeatureTransform>,
    pub targets: Vec<String>,
    // targets x encoded width
    pub weights: DMatrix<f64>,
    pub intercepts: DVector<f64>,
}

impl PipelineModel {
    pub fn from_artifact(artifact: PipelineArtifact) -> Result<Self, MLError> {
        let width: usize = artifact.features.iter().map(FeatureTransform::width).sum();
        if width == 0 {
            return Err(MLError::ModelLoadError(
                "pipeline declares no encoded features".to_string(),
            ));
        }
        if artifact.targets.is_empty() {
            return Err(MLError::ModelLoadError("pipeline declares no targets".to_string()));
        }
        if artifact.coefficients.len() != artifact.targets.len()
            || artifact.intercepts.len() != artifact.targets.len()
        {
            return Err(MLError::ModelLoadError(format!(
                "pipeline has {} targets but {} coefficient rows and {} intercepts",
                artifact.targets.len(),
                artifact.coefficients.len(),
                artifact.intercepts.len()
            )));
        }
        if let Some(row) = artifact.coefficients.iter().find(|row| row.len() != width) {
            return Err(MLError::ModelLoadError(format!(
                "coefficient row has {} entries, encoded width is {}",
                row.len(),
                width
            )));
        }

        let mut seen = HashSet::new();
        for feature in &artifact.features {
            if !seen.insert(feature.name()) {
                return Err(MLError::ModelLoadError(format!(
                    "feature {} declared twice",
                    feature.name()
                )));
            }
        }

        let flat: Vec<f64> = artifact.coefficients.iter().flatten().copied().collect();
        let weights = DMatrix::from_row_slice(artifact.targets.len(), width, &flat);

        Ok(Self {
            version: artifact.version,
            features: artifact.features,
            targets: artifact.targets,
            weights,
            intercepts: DVector::from_vec(artifact.intercepts),
        })
    }

    pub async fn load_from_file(path: &str) -> Result<Self> {
        info!("Loading pipeline model from {}", path);

        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read pipeline model {}", path))?;
        let artifact: PipelineArtifact = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse pipeline model {}", path))?;

        Ok(Self::from_artifact(artifact)?)
    }

    pub fn feature_names(&self) -> impl Iterator<Item = &str> {
        self.features.iter().map(FeatureTransform::name)
    }

    /// Apply the preprocessing stage. The row must carry exactly the
    /// pipeline's features.
    pub fn encode(&self, row: &FeatureRow) -> Result<Vec<f64>, PredictionError> {
        if let Some(unexpected) = row
            .names()
            .find(|name| !self.feature_names().any(|f| f == *name))
        {
            return Err(PredictionError::Validation(format!(
                "unexpected feature: {}",
                unexpected
            )));
        }

        let mut encoded = Vec::with_capacity(self.weights.ncols());
        for feature in &self.features {
            let value = row
                .get(feature.name())
                .ok_or_else(|| PredictionError::FeatureMissing(feature.name().to_string()))?;
            feature.encode_into(value, &mut encoded)?;
        }

        Ok(encoded)
    }

    /// rows x targets
    pub fn predict(&self, rows: &[FeatureRow]) -> Result<DMatrix<f64>, PredictionError> {
        debug!("Running pipeline inference on {} rows", rows.len());

        let mut output = Vec::with_capacity(rows.len() * self.targets.len());
        for row in rows {
            let x = DVector::from_vec(self.encode(row)?);
            let y = &self.weights * x + &self.intercepts;
            output.extend(y.iter().copied());
        }

        Ok(DMatrix::from_row_slice(rows.len(), self.targets.len(), &output))
    }
}
