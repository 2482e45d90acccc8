//! Versioned YAML configuration with `AUTHGATE_` environment overrides.

pub mod logging;
pub mod types;

pub use logging::LoggingConfig;
pub use types::*;
