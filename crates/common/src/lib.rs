//! statecap common library
//!
//! Scenario model, configuration and outcome types shared by the runner and
//! the CLI.

pub mod config;
pub mod error;
pub mod location;
pub mod scenario;
pub mod types;

pub use config::{BrowserSettings, HarnessConfig, LaunchSettings, TimeoutSettings};
pub use error::{Error, Result};
pub use scenario::{ArtifactSpec, Condition, Scenario, Step, Viewport, WaitState};
pub use types::*;

/// Default config file name, looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "statecap.toml";
