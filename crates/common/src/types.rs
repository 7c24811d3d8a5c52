//! Run outcome types shared by the runner and the CLI

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Failure taxonomy for a scenario step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The target location did not finish loading within its budget
    NavigationTimeout,
    /// A referenced selector never appeared
    ElementNotFound,
    /// A wait condition never became true although its element was present
    ConditionNotMet,
    /// An injected script raised
    ScriptError,
    /// The screenshot primitive could not produce the artifact
    CaptureFailure,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::NavigationTimeout => write!(f, "NavigationTimeout"),
            FailureKind::ElementNotFound => write!(f, "ElementNotFound"),
            FailureKind::ConditionNotMet => write!(f, "ConditionNotMet"),
            FailureKind::ScriptError => write!(f, "ScriptError"),
            FailureKind::CaptureFailure => write!(f, "CaptureFailure"),
        }
    }
}

/// What a capture covers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CaptureRegion {
    /// The visible viewport
    Viewport,
    /// The whole scrollable page
    FullPage,
    /// The bounding box of the first element matching a selector
    Element { selector: String },
}

impl CaptureRegion {
    pub fn from_step(selector: Option<&str>, full_page: bool) -> Self {
        match selector {
            Some(selector) => CaptureRegion::Element {
                selector: selector.to_string(),
            },
            None if full_page => CaptureRegion::FullPage,
            None => CaptureRegion::Viewport,
        }
    }
}

impl std::fmt::Display for CaptureRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaptureRegion::Viewport => write!(f, "viewport"),
            CaptureRegion::FullPage => write!(f, "full-page"),
            CaptureRegion::Element { selector } => write!(f, "element {}", selector),
        }
    }
}

/// A screenshot written by a successful run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    pub path: PathBuf,
    pub region: CaptureRegion,
    /// Pixel width of the decoded image
    pub width: u32,
    /// Pixel height of the decoded image
    pub height: u32,
    pub size_bytes: u64,
    /// SHA-256 of the file contents, hex encoded
    pub sha256: String,
}

/// The first broken expectation of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepFailure {
    /// Zero-based index of the failing step
    pub step_index: usize,
    /// Short label of the failing step, e.g. `click:#main-nav a`
    pub step: String,
    pub kind: FailureKind,
    pub reason: String,
}

impl std::fmt::Display for StepFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "step {} ({}) failed with {}: {}",
            self.step_index, self.step, self.kind, self.reason
        )
    }
}

/// Terminal result of a scenario run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Success(Artifact),
    Failure(StepFailure),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    pub fn artifact(&self) -> Option<&Artifact> {
        match self {
            Outcome::Success(artifact) => Some(artifact),
            Outcome::Failure(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&StepFailure> {
        match self {
            Outcome::Success(_) => None,
            Outcome::Failure(failure) => Some(failure),
        }
    }
}

/// Timing of one executed step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepReport {
    pub index: usize,
    pub step: String,
    pub success: bool,
    pub duration_ms: u64,
}

/// Diagnostic record of a whole run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub scenario: String,
    pub engine: String,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub duration_ms: u64,
    pub steps: Vec<StepReport>,
    pub outcome: Outcome,
}
