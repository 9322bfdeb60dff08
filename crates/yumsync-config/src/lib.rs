pub mod config;
pub mod error;

pub use config::{Config, StatsdConfig, DEFAULT_MAX_WORKERS, DEFAULT_SCRATCH_DIR};
pub use error::{ConfigError, Result};
