pub mod dashboard;
pub mod prediction;

pub use dashboard::DashboardServer;
pub use prediction::PredictionServer;
