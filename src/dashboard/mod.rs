pub mod charts;
pub mod data;
pub mod filter;
pub mod kpi;
pub mod view;

pub use data::Dataset;
pub use filter::FilterRequest;
pub use view::{render, DashboardView};
