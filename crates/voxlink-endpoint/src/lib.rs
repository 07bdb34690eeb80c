pub mod config;
pub mod detector;
pub mod energy;

pub use config::EndpointConfig;
pub use detector::{EndpointDetector, EndpointEvent};
pub use energy::EnergyMeter;
