//! Scenario runner: session lifecycle, step sequencing, wait discipline and
//! artifact capture

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use statecap_common::location::resolve_url;
use statecap_common::{
    Artifact, CaptureRegion, Condition, FailureKind, HarnessConfig, Outcome, RunReport, Scenario,
    Step, StepFailure, StepReport,
};

use crate::artifact::write_artifact;
use crate::browser::{BrowserEngine, DriverError, PageDriver};
use crate::error::RunnerResult;
use crate::session::Session;
use crate::wait::{suspend, Observation, WaitOutcome, WaitPolicy};

/// Per-run replacements for scenario fields
#[derive(Debug, Clone, Default)]
pub struct RunOverrides {
    /// Application location used instead of `scenario.app`
    pub app: Option<String>,
    /// Artifact destination used instead of `scenario.artifact.path`
    pub artifact: Option<PathBuf>,
}

/// Why a step failed, before it is tagged with its index
#[derive(Debug)]
struct Fail {
    kind: FailureKind,
    reason: String,
}

impl Fail {
    fn new(kind: FailureKind, reason: impl Into<String>) -> Self {
        Self {
            kind,
            reason: reason.into(),
        }
    }

    /// Map a driver error, using `fallback` for transport-level failures
    fn driver(err: DriverError, fallback: FailureKind) -> Self {
        let kind = match &err {
            DriverError::NotFound(_) => FailureKind::ElementNotFound,
            DriverError::Navigation(_) => FailureKind::NavigationTimeout,
            DriverError::Script(_) => FailureKind::ScriptError,
            DriverError::Capture(_) => FailureKind::CaptureFailure,
            DriverError::Launch(_) | DriverError::Protocol(_) | DriverError::Closed => fallback,
        };
        Self::new(kind, err.to_string())
    }
}

/// Everything a step needs besides the page
struct StepContext<'a> {
    scenario: &'a Scenario,
    urls: &'a [Option<String>],
    artifact_path: &'a Path,
}

/// Runs scenarios, one fresh browser session per run
pub struct ScenarioRunner {
    engine: Arc<dyn BrowserEngine>,
    config: HarnessConfig,
}

impl ScenarioRunner {
    pub fn new(engine: Arc<dyn BrowserEngine>, config: HarnessConfig) -> Self {
        Self { engine, config }
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Run a scenario as declared
    pub async fn run(&self, scenario: &Scenario) -> RunnerResult<Outcome> {
        let report = self
            .run_with_overrides(scenario, &RunOverrides::default())
            .await?;
        Ok(report.outcome)
    }

    /// Run a scenario with per-run overrides and return the full report.
    ///
    /// `Err` means the run never got to execute steps (invalid scenario,
    /// browser unavailable). Every step failure is `Ok` with a
    /// `Outcome::Failure`.
    pub async fn run_with_overrides(
        &self,
        scenario: &Scenario,
        overrides: &RunOverrides,
    ) -> RunnerResult<RunReport> {
        let app = overrides.app.as_deref().or(scenario.app.as_deref());
        scenario.validate_with_app(app)?;

        // resolve every location up front so a typo fails before launch
        let urls = scenario
            .steps
            .iter()
            .map(|step| match step {
                Step::Navigate { url, .. } => resolve_url(app, url.as_deref()).map(Some),
                _ => Ok(None),
            })
            .collect::<statecap_common::Result<Vec<_>>>()?;

        let artifact_path = overrides
            .artifact
            .clone()
            .unwrap_or_else(|| scenario.artifact.path.clone());

        let started_at = chrono::Utc::now();
        let start = Instant::now();
        info!("Running scenario '{}' ({} steps)", scenario.name, scenario.steps.len());

        let settings = self.config.launch_settings(scenario.viewport);
        let mut session = Session::open(self.engine.as_ref(), &settings).await?;
        let engine = session.engine().to_string();

        let ctx = StepContext {
            scenario,
            urls: &urls,
            artifact_path: &artifact_path,
        };
        let mut steps = Vec::with_capacity(scenario.steps.len());
        let result = match session.page() {
            Ok(page) => self.execute(page, &ctx, &mut steps).await,
            Err(e) => Err(StepFailure {
                step_index: 0,
                step: scenario.steps[0].label(),
                kind: FailureKind::NavigationTimeout,
                reason: e.to_string(),
            }),
        };

        // released on every path, success or failure
        session.close().await;

        let outcome = match result {
            Ok(artifact) => {
                info!("✓ {} -> {}", scenario.name, artifact.path.display());
                Outcome::Success(artifact)
            }
            Err(failure) => {
                warn!("✗ {} - {}", scenario.name, failure);
                Outcome::Failure(failure)
            }
        };

        Ok(RunReport {
            scenario: scenario.name.clone(),
            engine,
            started_at,
            duration_ms: start.elapsed().as_millis() as u64,
            steps,
            outcome,
        })
    }

    async fn execute(
        &self,
        page: &mut dyn PageDriver,
        ctx: &StepContext<'_>,
        reports: &mut Vec<StepReport>,
    ) -> Result<Artifact, StepFailure> {
        for (index, step) in ctx.scenario.steps.iter().enumerate() {
            let label = step.label();
            let started = Instant::now();
            debug!("Step {}: {}", index, label);

            let result = self.execute_step(page, ctx, index, step).await;
            let duration_ms = started.elapsed().as_millis() as u64;
            reports.push(StepReport {
                index,
                step: label.clone(),
                success: result.is_ok(),
                duration_ms,
            });

            match result {
                Ok(Some(artifact)) => {
                    info!("✓ step {} {} ({} ms)", index, label, duration_ms);
                    return Ok(artifact);
                }
                Ok(None) => info!("✓ step {} {} ({} ms)", index, label, duration_ms),
                Err((step_label, fail)) => {
                    warn!("✗ step {} {} - {}: {}", index, step_label, fail.kind, fail.reason);
                    return Err(StepFailure {
                        step_index: index,
                        step: step_label,
                        kind: fail.kind,
                        reason: fail.reason,
                    });
                }
            }
        }

        // validation guarantees a trailing capture step
        let last = ctx.scenario.steps.len().saturating_sub(1);
        Err(StepFailure {
            step_index: last,
            step: ctx
                .scenario
                .steps
                .get(last)
                .map(Step::label)
                .unwrap_or_default(),
            kind: FailureKind::CaptureFailure,
            reason: "scenario ended without a capture".to_string(),
        })
    }

    /// Execute one step. Failures carry the label to report, which differs
    /// from the step label for the terminal `expect` condition.
    async fn execute_step(
        &self,
        page: &mut dyn PageDriver,
        ctx: &StepContext<'_>,
        index: usize,
        step: &Step,
    ) -> Result<Option<Artifact>, (String, Fail)> {
        let tag = |fail: Fail| (step.label(), fail);
        let timeouts = &self.config.timeouts;

        match step {
            Step::Navigate { timeout_ms, .. } => {
                let url = ctx.urls[index].as_deref().unwrap_or("about:blank");
                let budget = timeout_ms
                    .map(Duration::from_millis)
                    .unwrap_or_else(|| timeouts.navigation());
                self.navigate(page, url, budget).await.map_err(tag)?;
                Ok(None)
            }
            Step::Evaluate { script } => {
                page.evaluate(script)
                    .await
                    .map_err(|e| tag(Fail::driver(e, FailureKind::ScriptError)))?;
                Ok(None)
            }
            Step::Fill {
                selector,
                value,
                timeout_ms,
            } => {
                self.await_element(page, selector, *timeout_ms)
                    .await
                    .map_err(tag)?;
                page.fill(selector, value)
                    .await
                    .map_err(|e| tag(Fail::driver(e, FailureKind::ElementNotFound)))?;
                Ok(None)
            }
            Step::Click {
                selector,
                timeout_ms,
            } => {
                self.await_element(page, selector, *timeout_ms)
                    .await
                    .map_err(tag)?;
                page.click(selector)
                    .await
                    .map_err(|e| tag(Fail::driver(e, FailureKind::ElementNotFound)))?;
                Ok(None)
            }
            Step::WaitForSelector { .. } | Step::WaitForTextAbsence { .. } => {
                if let Some(condition) = step.condition() {
                    self.await_condition(page, &condition).await.map_err(tag)?;
                }
                Ok(None)
            }
            Step::Sleep { ms } => {
                tokio::time::sleep(Duration::from_millis(*ms)).await;
                Ok(None)
            }
            Step::Capture {
                selector,
                full_page,
            } => {
                if let Some(expect) = &ctx.scenario.expect {
                    self.await_condition(page, expect)
                        .await
                        .map_err(|fail| (format!("expect:{}", expect.label()), fail))?;
                }
                let region = CaptureRegion::from_step(selector.as_deref(), *full_page);
                let artifact = self
                    .capture(page, region, ctx.artifact_path)
                    .await
                    .map_err(tag)?;
                Ok(Some(artifact))
            }
        }
    }

    async fn navigate(
        &self,
        page: &mut dyn PageDriver,
        url: &str,
        budget: Duration,
    ) -> Result<(), Fail> {
        match tokio::time::timeout(budget, page.navigate(url)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(Fail::driver(e, FailureKind::NavigationTimeout)),
            Err(_) => Err(Fail::new(
                FailureKind::NavigationTimeout,
                format!("{} did not finish loading within {} ms", url, budget.as_millis()),
            )),
        }
    }

    fn policy(&self, timeout_ms: Option<u64>) -> WaitPolicy {
        let timeouts = &self.config.timeouts;
        WaitPolicy::new(
            timeout_ms
                .map(Duration::from_millis)
                .unwrap_or_else(|| timeouts.selector()),
            timeouts.poll_interval(),
        )
    }

    /// Suspend until `selector` matches, for Fill, Click and element Capture
    async fn await_element(
        &self,
        page: &mut dyn PageDriver,
        selector: &str,
        timeout_ms: Option<u64>,
    ) -> Result<(), Fail> {
        let mut condition = Condition::present(selector);
        if let Condition::Present { timeout_ms: t, .. } = &mut condition {
            *t = timeout_ms;
        }
        self.await_condition(page, &condition).await
    }

    async fn await_condition(
        &self,
        page: &mut dyn PageDriver,
        condition: &Condition,
    ) -> Result<(), Fail> {
        let policy = self.policy(condition.timeout_ms());
        let outcome = suspend(page, condition, policy)
            .await
            .map_err(|e| Fail::driver(e, FailureKind::ElementNotFound))?;

        match outcome {
            WaitOutcome::Satisfied { elapsed } => {
                debug!("{} satisfied after {} ms", condition.label(), elapsed.as_millis());
                Ok(())
            }
            WaitOutcome::TimedOut {
                elapsed,
                ever_seen,
                last,
            } => Err(timeout_failure(condition, elapsed, ever_seen, &last)),
        }
    }

    async fn capture(
        &self,
        page: &mut dyn PageDriver,
        region: CaptureRegion,
        path: &Path,
    ) -> Result<Artifact, Fail> {
        if let CaptureRegion::Element { selector } = &region {
            self.await_element(page, selector, None).await?;
        }

        let bytes = page.screenshot(&region).await.map_err(|e| match e {
            // the wait just saw it, so it detached in between
            DriverError::NotFound(selector) => Fail::new(
                FailureKind::CaptureFailure,
                format!("'{}' detached from the document before capture", selector),
            ),
            other => Fail::driver(other, FailureKind::CaptureFailure),
        })?;

        write_artifact(path, region, &bytes)
            .map_err(|e| Fail::new(FailureKind::CaptureFailure, e.to_string()))
    }
}

fn timeout_failure(
    condition: &Condition,
    elapsed: Duration,
    ever_seen: bool,
    last: &Observation,
) -> Fail {
    let ms = elapsed.as_millis();
    let selector = condition.selector();

    if !ever_seen {
        let what = match condition.text_filter() {
            Some(text) => format!("no element matched '{}' containing '{}'", selector, text),
            None => format!("no element matched '{}'", selector),
        };
        return Fail::new(FailureKind::ElementNotFound, format!("{} within {} ms", what, ms));
    }

    let reason = match (condition, last) {
        (Condition::TextAbsent { text, .. }, _) => format!(
            "'{}' still contains '{}' after {} ms",
            selector, text, ms
        ),
        (Condition::Present { .. }, Observation::Present(probe)) if !probe.visible => {
            format!("'{}' is present but not visible after {} ms", selector, ms)
        }
        (Condition::Present { .. }, Observation::Missing) => format!(
            "'{}' appeared and then detached; absent at {} ms",
            selector, ms
        ),
        (Condition::Present { .. }, _) => {
            format!("'{}' did not reach the expected state within {} ms", selector, ms)
        }
    };
    Fail::new(FailureKind::ConditionNotMet, reason)
}
