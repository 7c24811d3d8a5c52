//! Error types for statecap

use thiserror::Error;

/// Result type alias using the statecap Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while loading, validating or resolving scenarios and config
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Scenario parse error: {0}")]
    ScenarioParse(#[from] serde_yaml::Error),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Config serialize error: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    #[error("Invalid scenario '{name}': {reason}")]
    InvalidScenario { name: String, reason: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid location '{location}': {reason}")]
    InvalidLocation { location: String, reason: String },

    #[error("Scenario not found: {0}")]
    ScenarioNotFound(String),
}

impl Error {
    pub(crate) fn invalid_scenario(name: &str, reason: impl Into<String>) -> Self {
        Error::InvalidScenario {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}
