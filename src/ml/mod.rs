pub mod engine;
pub mod features;
pub mod models;

pub use engine::{LinearPrediction, MLEngine, PipelinePrediction};
