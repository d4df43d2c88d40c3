pub mod cache;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod fetch;
pub mod load;
pub mod publish;
pub mod render;
pub mod reshape;
pub mod st53;
pub mod types;

pub use config::DashboardConfig;
pub use dashboard::{Dashboard, ViewRequest};
pub use error::DashboardError;
pub use types::{DateRange, FlowType, Month, Observation, OperatorSchemeObservation, Unit};
