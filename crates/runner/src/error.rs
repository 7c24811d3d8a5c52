//! Error types for the scenario runner

use thiserror::Error;

use crate::browser::DriverError;

/// Failures that are not attributable to a scenario step
#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("Browser not found. Install Chrome/Chromium or set browser.executable")]
    BrowserNotFound,

    #[error("Browser failed to launch: {0}")]
    Launch(String),

    #[error("Browser launch timed out after {0} ms")]
    LaunchTimeout(u64),

    #[error("Invalid scenario: {0}")]
    Scenario(#[from] statecap_common::Error),

    #[error("Browser driver error: {0}")]
    Driver(#[from] DriverError),

    #[error("Visual comparison: {0}")]
    Visual(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

pub type RunnerResult<T> = Result<T, RunnerError>;
