//! Browser engine seam
//!
//! The runner never talks to a browser directly. An engine launches one page
//! per session; the page driver exposes the handful of primitives a scenario
//! needs: navigate, evaluate, probe, fill, click, screenshot, close.

use async_trait::async_trait;
use thiserror::Error;

use statecap_common::{CaptureRegion, LaunchSettings};

/// Errors raised by a page driver
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DriverError {
    /// No element matches the selector
    #[error("no element matches '{0}'")]
    NotFound(String),

    /// Navigation failed or did not reach load-complete
    #[error("navigation failed: {0}")]
    Navigation(String),

    /// An injected script threw
    #[error("script error: {0}")]
    Script(String),

    /// The screenshot primitive failed
    #[error("capture failed: {0}")]
    Capture(String),

    /// The browser could not be started
    #[error("launch failed: {0}")]
    Launch(String),

    /// Transport-level failure talking to the browser
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The page was already closed
    #[error("page is closed")]
    Closed,
}

pub type DriverResult<T> = Result<T, DriverError>;

/// Snapshot of the first element matching a selector
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ElementProbe {
    /// `textContent` of the element
    pub text: String,
    /// Rendered with a non-empty box and not hidden by style
    pub visible: bool,
}

/// Starts browser sessions
#[async_trait]
pub trait BrowserEngine: Send + Sync {
    /// Launch a browser and open one blank page
    async fn launch(&self, settings: &LaunchSettings) -> DriverResult<Box<dyn PageDriver>>;

    /// Engine name for logs and reports
    fn name(&self) -> &'static str;
}

/// One live page in a launched browser
#[async_trait]
pub trait PageDriver: Send {
    /// Load a URL and return once the load event fired
    async fn navigate(&mut self, url: &str) -> DriverResult<()>;

    /// Run a script against the document, returning its JSON-converted value
    async fn evaluate(&mut self, script: &str) -> DriverResult<serde_json::Value>;

    /// Look at the first element matching `selector` (and containing
    /// `has_text`, when given), if any
    async fn probe(
        &mut self,
        selector: &str,
        has_text: Option<&str>,
    ) -> DriverResult<Option<ElementProbe>>;

    /// Set the value of the first input matching `selector`
    async fn fill(&mut self, selector: &str, value: &str) -> DriverResult<()>;

    /// Click the first element matching `selector`
    async fn click(&mut self, selector: &str) -> DriverResult<()>;

    /// Capture a PNG of the given region
    async fn screenshot(&mut self, region: &CaptureRegion) -> DriverResult<Vec<u8>>;

    /// Shut the browser down. Must be safe to call more than once.
    async fn close(&mut self) -> DriverResult<()>;
}
