//! Declarative YAML scenario definitions

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::types::CaptureRegion;

/// A complete scenario parsed from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Unique name for this scenario
    pub name: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Tags for filtering scenarios
    #[serde(default)]
    pub tags: Vec<String>,

    /// Application location: a URL or a filesystem path
    #[serde(default)]
    pub app: Option<String>,

    /// Viewport size for the browser
    #[serde(default)]
    pub viewport: Viewport,

    /// Steps to execute in order
    pub steps: Vec<Step>,

    /// Condition that must hold right before the capture
    #[serde(default)]
    pub expect: Option<Condition>,

    /// Where the screenshot goes
    pub artifact: ArtifactSpec,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

/// Artifact descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactSpec {
    /// Destination of the screenshot
    pub path: PathBuf,
}

/// A single step in a scenario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    /// Load a URL; omitted means the scenario's application location
    Navigate {
        #[serde(default)]
        url: Option<String>,
        #[serde(default)]
        timeout_ms: Option<u64>,
    },

    /// Execute a script against the page's document
    Evaluate { script: String },

    /// Set the value of an input element
    Fill {
        selector: String,
        value: String,
        #[serde(default)]
        timeout_ms: Option<u64>,
    },

    /// Click an element
    Click {
        selector: String,
        #[serde(default)]
        timeout_ms: Option<u64>,
    },

    /// Wait for an element to exist
    WaitForSelector {
        selector: String,
        #[serde(default)]
        state: WaitState,
        /// Only elements whose text contains this substring count
        #[serde(default)]
        has_text: Option<String>,
        #[serde(default)]
        timeout_ms: Option<u64>,
    },

    /// Wait until a substring disappears from an element's text
    WaitForTextAbsence {
        selector: String,
        text: String,
        #[serde(default)]
        timeout_ms: Option<u64>,
    },

    /// Wait for a fixed amount of time (use sparingly)
    Sleep { ms: u64 },

    /// Take the screenshot
    Capture {
        #[serde(default)]
        selector: Option<String>,
        #[serde(default)]
        full_page: bool,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitState {
    /// Present in the document
    #[default]
    Attached,
    /// Present and rendered with a non-empty box
    Visible,
}

/// A DOM condition a wait suspends on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "condition", rename_all = "snake_case")]
pub enum Condition {
    Present {
        selector: String,
        #[serde(default)]
        state: WaitState,
        #[serde(default)]
        has_text: Option<String>,
        #[serde(default)]
        timeout_ms: Option<u64>,
    },
    TextAbsent {
        selector: String,
        text: String,
        #[serde(default)]
        timeout_ms: Option<u64>,
    },
}

impl Condition {
    /// A plain "selector is attached" condition
    pub fn present(selector: impl Into<String>) -> Self {
        Condition::Present {
            selector: selector.into(),
            state: WaitState::Attached,
            has_text: None,
            timeout_ms: None,
        }
    }

    pub fn selector(&self) -> &str {
        match self {
            Condition::Present { selector, .. } | Condition::TextAbsent { selector, .. } => selector,
        }
    }

    pub fn timeout_ms(&self) -> Option<u64> {
        match self {
            Condition::Present { timeout_ms, .. } | Condition::TextAbsent { timeout_ms, .. } => {
                *timeout_ms
            }
        }
    }

    /// Text an element must contain to match at all
    pub fn text_filter(&self) -> Option<&str> {
        match self {
            Condition::Present { has_text, .. } => has_text.as_deref(),
            Condition::TextAbsent { .. } => None,
        }
    }

    pub fn label(&self) -> String {
        match self {
            Condition::Present {
                selector,
                state: WaitState::Visible,
                ..
            } => format!("visible:{}", selector),
            Condition::Present { selector, .. } => format!("present:{}", selector),
            Condition::TextAbsent { selector, text, .. } => {
                format!("text-absent:{}:{}", selector, text)
            }
        }
    }
}

impl Step {
    /// Short label used in logs and failure reports
    pub fn label(&self) -> String {
        match self {
            Step::Navigate { url: Some(url), .. } => format!("navigate:{}", url),
            Step::Navigate { url: None, .. } => "navigate:app".to_string(),
            Step::Evaluate { .. } => "evaluate".to_string(),
            Step::Fill { selector, .. } => format!("fill:{}", selector),
            Step::Click { selector, .. } => format!("click:{}", selector),
            Step::WaitForSelector { selector, .. } => format!("wait_for_selector:{}", selector),
            Step::WaitForTextAbsence { selector, text, .. } => {
                format!("wait_for_text_absence:{}:{}", selector, text)
            }
            Step::Sleep { ms } => format!("sleep:{}ms", ms),
            Step::Capture { selector: Some(s), .. } => format!("capture:{}", s),
            Step::Capture { full_page: true, .. } => "capture:full-page".to_string(),
            Step::Capture { .. } => "capture:viewport".to_string(),
        }
    }

    /// The wait condition of a wait step
    pub fn condition(&self) -> Option<Condition> {
        match self {
            Step::WaitForSelector {
                selector,
                state,
                has_text,
                timeout_ms,
            } => Some(Condition::Present {
                selector: selector.clone(),
                state: *state,
                has_text: has_text.clone(),
                timeout_ms: *timeout_ms,
            }),
            Step::WaitForTextAbsence {
                selector,
                text,
                timeout_ms,
            } => Some(Condition::TextAbsent {
                selector: selector.clone(),
                text: text.clone(),
                timeout_ms: *timeout_ms,
            }),
            _ => None,
        }
    }

    /// Capture region of a capture step
    pub fn capture_region(&self) -> Option<CaptureRegion> {
        match self {
            Step::Capture {
                selector,
                full_page,
            } => Some(CaptureRegion::from_step(selector.as_deref(), *full_page)),
            _ => None,
        }
    }

    fn selector(&self) -> Option<&str> {
        match self {
            Step::Fill { selector, .. }
            | Step::Click { selector, .. }
            | Step::WaitForSelector { selector, .. }
            | Step::WaitForTextAbsence { selector, .. } => Some(selector),
            Step::Capture { selector, .. } => selector.as_deref(),
            _ => None,
        }
    }

    fn timeout_ms(&self) -> Option<u64> {
        match self {
            Step::Navigate { timeout_ms, .. }
            | Step::Fill { timeout_ms, .. }
            | Step::Click { timeout_ms, .. }
            | Step::WaitForSelector { timeout_ms, .. }
            | Step::WaitForTextAbsence { timeout_ms, .. } => *timeout_ms,
            _ => None,
        }
    }
}

impl Scenario {
    /// Parse a scenario from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(Error::from)
    }

    /// Parse a scenario from a YAML file
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(Error::ScenarioNotFound(path.display().to_string()));
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Load all scenarios from a directory
    pub fn load_all(dir: &Path) -> Result<Vec<(PathBuf, Self)>> {
        let mut scenarios = Vec::new();

        for entry in walkdir::WalkDir::new(dir)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.path()
                    .extension()
                    .map(|ext| ext == "yaml" || ext == "yml")
                    .unwrap_or(false)
            })
        {
            let scenario = Self::from_file(entry.path())?;
            scenarios.push((entry.path().to_path_buf(), scenario));
        }

        Ok(scenarios)
    }

    /// Index of the capture step (always the last one once validated)
    pub fn capture_index(&self) -> Option<usize> {
        self.steps
            .iter()
            .position(|s| matches!(s, Step::Capture { .. }))
    }

    /// Structural validation using the scenario's own application location
    pub fn validate(&self) -> Result<()> {
        self.validate_with_app(self.app.as_deref())
    }

    /// Structural validation with an externally supplied application location
    pub fn validate_with_app(&self, app: Option<&str>) -> Result<()> {
        let name = self.name.as_str();

        if name.trim().is_empty() {
            return Err(Error::invalid_scenario(name, "name must not be empty"));
        }
        if self.steps.is_empty() {
            return Err(Error::invalid_scenario(name, "scenario has no steps"));
        }

        let captures = self
            .steps
            .iter()
            .filter(|s| matches!(s, Step::Capture { .. }))
            .count();
        if captures != 1 {
            return Err(Error::invalid_scenario(
                name,
                format!("expected exactly one capture step, found {}", captures),
            ));
        }
        if !matches!(self.steps.last(), Some(Step::Capture { .. })) {
            return Err(Error::invalid_scenario(name, "the capture step must be last"));
        }

        if !self.steps.iter().any(|s| matches!(s, Step::Navigate { .. })) {
            return Err(Error::invalid_scenario(name, "scenario never navigates"));
        }
        let needs_app = self
            .steps
            .iter()
            .any(|s| matches!(s, Step::Navigate { url: None, .. }));
        if needs_app && app.map(str::trim).unwrap_or("").is_empty() {
            return Err(Error::invalid_scenario(
                name,
                "a navigate step has no url and no application location is set",
            ));
        }

        for (index, step) in self.steps.iter().enumerate() {
            if let Some(selector) = step.selector() {
                if selector.trim().is_empty() {
                    return Err(Error::invalid_scenario(
                        name,
                        format!("step {} has an empty selector", index),
                    ));
                }
            }
            if step.timeout_ms() == Some(0) {
                return Err(Error::invalid_scenario(
                    name,
                    format!("step {} has a zero timeout", index),
                ));
            }
            match step {
                Step::Evaluate { script } if script.trim().is_empty() => {
                    return Err(Error::invalid_scenario(
                        name,
                        format!("step {} has an empty script", index),
                    ));
                }
                Step::WaitForTextAbsence { text, .. } if text.is_empty() => {
                    return Err(Error::invalid_scenario(
                        name,
                        format!("step {} waits for the absence of an empty string", index),
                    ));
                }
                _ => {}
            }
        }

        if let Some(expect) = &self.expect {
            if expect.selector().trim().is_empty() {
                return Err(Error::invalid_scenario(name, "expect has an empty selector"));
            }
            if expect.timeout_ms() == Some(0) {
                return Err(Error::invalid_scenario(name, "expect has a zero timeout"));
            }
        }

        if self.artifact.path.file_name().is_none() {
            return Err(Error::invalid_scenario(
                name,
                format!("artifact path '{}' has no file name", self.artifact.path.display()),
            ));
        }
        if self.viewport.width == 0 || self.viewport.height == 0 {
            return Err(Error::invalid_scenario(name, "viewport must be non-empty"));
        }

        Ok(())
    }

    /// Filter scenarios by tag
    pub fn filter_by_tag<'a>(scenarios: &'a [Self], tag: &str) -> Vec<&'a Self> {
        scenarios
            .iter()
            .filter(|s| s.tags.iter().any(|t| t == tag))
            .collect()
    }
}
