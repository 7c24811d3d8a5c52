//! Harness configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::scenario::Viewport;

/// Harness configuration, loaded from TOML
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Browser launch configuration
    pub browser: BrowserSettings,

    /// Default timeouts applied when a step does not set its own
    pub timeouts: TimeoutSettings,
}

/// Browser launch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserSettings {
    /// Path to a Chrome/Chromium binary (None = auto-detect)
    pub executable: Option<PathBuf>,

    /// Run without a visible window
    pub headless: bool,

    /// Pass --no-sandbox (needed in most containers)
    pub no_sandbox: bool,

    /// Extra command-line arguments for the browser
    pub args: Vec<String>,

    /// How long to wait for the browser process to come up
    pub launch_timeout_ms: u64,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            executable: None,
            headless: true,
            no_sandbox: true,
            args: vec![
                "--disable-gpu".to_string(),
                "--disable-dev-shm-usage".to_string(),
                "--disable-extensions".to_string(),
                "--hide-scrollbars".to_string(),
            ],
            launch_timeout_ms: 20_000,
        }
    }
}

/// Default timeout budgets
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutSettings {
    /// Budget for a navigation to reach load-complete
    pub navigation_ms: u64,

    /// Budget for selector and text waits
    pub selector_ms: u64,

    /// Interval between condition probes
    pub poll_interval_ms: u64,
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        Self {
            navigation_ms: 30_000,
            selector_ms: 30_000,
            poll_interval_ms: 100,
        }
    }
}

impl TimeoutSettings {
    pub fn navigation(&self) -> Duration {
        Duration::from_millis(self.navigation_ms)
    }

    pub fn selector(&self) -> Duration {
        Duration::from_millis(self.selector_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Everything an engine needs to open one session
#[derive(Debug, Clone)]
pub struct LaunchSettings {
    pub browser: BrowserSettings,
    pub viewport: Viewport,
}

impl HarnessConfig {
    /// Load configuration from file, falling back to defaults when absent
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = toml::from_str(&content)?;
            config.validate()?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject budgets that would make every wait fail or spin
    pub fn validate(&self) -> Result<()> {
        if self.timeouts.navigation_ms == 0 {
            return Err(Error::InvalidConfig("timeouts.navigation_ms must be > 0".into()));
        }
        if self.timeouts.selector_ms == 0 {
            return Err(Error::InvalidConfig("timeouts.selector_ms must be > 0".into()));
        }
        if self.timeouts.poll_interval_ms == 0 {
            return Err(Error::InvalidConfig("timeouts.poll_interval_ms must be > 0".into()));
        }
        if self.browser.launch_timeout_ms == 0 {
            return Err(Error::InvalidConfig("browser.launch_timeout_ms must be > 0".into()));
        }
        Ok(())
    }

    /// Launch settings for a scenario with the given viewport
    pub fn launch_settings(&self, viewport: Viewport) -> LaunchSettings {
        LaunchSettings {
            browser: self.browser.clone(),
            viewport,
        }
    }
}
