pub mod config;
pub mod error;
pub mod types;

pub use config::{Config, EpThresholds, Policy, RatioThresholds};
pub use error::{DiscoveryError, Result, Severity};
pub use types::*;
