mod loader;
mod types;
mod validate;

pub use loader::{load_config, load_config_from_str};
pub use types::*;
pub use validate::{normalize_languages, validate_config};

use thiserror::Error;

use crate::error::{Classify, ErrorKind};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl Classify for ConfigError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Configuration
    }
}
