//! Run a scenario against headless Chromium

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use tracing::debug;

use statecap_common::{HarnessConfig, Outcome, RunReport, Scenario};
use statecap_runner::{ChromiumEngine, RunOverrides, RunnerError, ScenarioRunner};

use crate::output::{
    print_error, print_list, print_success, print_value, short_hash, OutputFormat,
};

#[derive(Args)]
pub struct RunArgs {
    /// Scenario file (YAML)
    #[arg(required = true)]
    pub scenario: PathBuf,

    /// Application location (path or URL), replaces the scenario's `app`
    #[arg(long)]
    pub app: Option<String>,

    /// Artifact destination, replaces the scenario's artifact path
    #[arg(short, long)]
    pub out: Option<PathBuf>,

    /// Also write the run report as JSON to this file
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Show the browser window
    #[arg(long)]
    pub headed: bool,
}

/// Returns whether the scenario succeeded
pub async fn execute(args: RunArgs, mut config: HarnessConfig, format: OutputFormat) -> Result<bool> {
    let scenario = Scenario::from_file(&args.scenario)
        .with_context(|| format!("loading scenario {}", args.scenario.display()))?;
    debug!(
        "Loaded scenario '{}' from {} ({} steps)",
        scenario.name,
        args.scenario.display(),
        scenario.steps.len()
    );

    if args.headed {
        config.browser.headless = false;
    }
    if !ChromiumEngine::available(&config.launch_settings(scenario.viewport)) {
        return Err(RunnerError::BrowserNotFound.into());
    }

    let runner = ScenarioRunner::new(Arc::new(ChromiumEngine::new()), config);
    let overrides = RunOverrides {
        app: args.app,
        artifact: args.out,
    };
    let report = runner.run_with_overrides(&scenario, &overrides).await?;

    if let Some(path) = &args.report {
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(path, json)
            .with_context(|| format!("writing report {}", path.display()))?;
    }

    print_report(&report, format);
    Ok(report.outcome.is_success())
}

fn print_report(report: &RunReport, format: OutputFormat) {
    if format.is_structured() {
        print_value(report, format);
        return;
    }

    print_list(&report.steps, format);
    match &report.outcome {
        Outcome::Success(artifact) => print_success(&format!(
            "{}: captured {} ({}x{}, sha256 {}) -> {} in {} ms",
            report.scenario,
            artifact.region,
            artifact.width,
            artifact.height,
            short_hash(&artifact.sha256),
            artifact.path.display(),
            report.duration_ms
        )),
        Outcome::Failure(failure) => print_error(&format!("{}: {}", report.scenario, failure)),
    }
}
