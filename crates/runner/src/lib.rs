//! statecap scenario runner
//!
//! Drives a headless browser through a declarative scenario and captures a
//! screenshot artifact once the page reaches the expected state:
//! - Opens one browser session per run and always releases it
//! - Executes steps strictly in order, suspending on each wait with a bound
//! - Writes the artifact atomically, only on the success path
//! - Compares artifacts for idempotence checks
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  ScenarioRunner                                             │
//! │    ├── Session::open(engine) -> Box<dyn PageDriver>         │
//! │    ├── steps: navigate | evaluate | fill | click            │
//! │    │          wait_for_selector | wait_for_text_absence     │
//! │    │          sleep | capture                               │
//! │    ├── wait::suspend(condition, policy) -> WaitOutcome      │
//! │    ├── artifact::write_artifact(path, png) -> Artifact      │
//! │    └── Session::close()                                     │
//! ├─────────────────────────────────────────────────────────────┤
//! │  BrowserEngine                                              │
//! │    ├── ChromiumEngine  (chromiumoxide, CDP)                 │
//! │    └── FakeEngine      (scripted in-process DOM)            │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod artifact;
pub mod browser;
pub mod chromium;
pub mod error;
pub mod fake;
pub mod runner;
pub mod session;
pub mod visual;
pub mod wait;

pub use browser::{BrowserEngine, DriverError, DriverResult, ElementProbe, PageDriver};
pub use chromium::ChromiumEngine;
pub use error::{RunnerError, RunnerResult};
pub use fake::FakeEngine;
pub use runner::{RunOverrides, ScenarioRunner};
pub use session::Session;
pub use visual::{CompareOptions, VisualDiff};
