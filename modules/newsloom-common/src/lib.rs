pub mod config;
pub mod error;
pub mod types;

pub use config::{Config, MonitorConfig, TierConfig};
pub use error::NewsloomError;
pub use types::*;
