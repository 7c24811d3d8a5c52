//! Scenario runs against the scripted in-process engine.
//!
//! Timed tests run on a paused tokio clock, so multi-second waits and
//! timeouts complete instantly.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use test_case::test_case;

use statecap_common::{
    CaptureRegion, Condition, FailureKind, HarnessConfig, Outcome, Scenario, Step, WaitState,
};
use statecap_runner::fake::{Effect, FakeDocument, FakeElement, FakeEvent};
use statecap_runner::visual::{self, CompareOptions};
use statecap_runner::{FakeEngine, RunOverrides, RunnerError, ScenarioRunner};

const APP: &str = "file:///srv/app/index.html";
const NAV: &str = r#"#main-nav a[data-view="dashboard-view"]"#;
const HEADING: &str = r#"h1, h2, h3, [role="heading"]"#;
const SUBMIT: &str = "button[type='submit']";
const TABLE: &str = "#inventory-status-table";

fn bundled(name: &str) -> Scenario {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../../scenarios")
        .join(format!("{}.yaml", name));
    Scenario::from_file(&path).unwrap()
}

fn overrides(dir: &TempDir) -> RunOverrides {
    RunOverrides {
        app: Some(APP.to_string()),
        artifact: Some(artifact_path(dir)),
    }
}

fn artifact_path(dir: &TempDir) -> PathBuf {
    dir.path().join("verification").join("verification.png")
}

fn runner(engine: &FakeEngine) -> ScenarioRunner {
    ScenarioRunner::new(Arc::new(engine.clone()), HarnessConfig::default())
}

/// The dashboard before login: app shell hidden, auth form shown
fn shell(with_nav: bool) -> FakeDocument {
    let doc = FakeDocument::new()
        .with("#app-container", FakeElement::new("").hidden())
        .with("#auth-container", FakeElement::new("Iniciar sesión"));
    if with_nav {
        doc.with(NAV, FakeElement::new("Dashboard"))
    } else {
        doc
    }
}

fn dashboard_engine(with_nav: bool) -> FakeEngine {
    FakeEngine::new()
        .page(APP, shell(with_nav))
        .on_script(
            "app-container",
            vec![Effect::show("#app-container"), Effect::hide("#auth-container")],
        )
        .on_click(
            NAV,
            vec![
                Effect::insert(".content-view", FakeElement::new("Dashboard").sized(960, 540)),
                Effect::insert(".content-view h2", FakeElement::new("Dashboard"))
                    .after(Duration::from_millis(250)),
            ],
        )
}

fn login_engine(table_settles: bool) -> FakeEngine {
    let mut on_submit = vec![
        Effect::hide("#auth-container"),
        Effect::insert(HEADING, FakeElement::new("Dashboard")).after(Duration::from_millis(400)),
        Effect::insert(TABLE, FakeElement::new("Cargando...")).after(Duration::from_millis(400)),
    ];
    if table_settles {
        on_submit.push(
            Effect::set_text(TABLE, "Stock OK: 12 items").after(Duration::from_millis(3_000)),
        );
    }

    FakeEngine::new()
        .page(
            APP,
            FakeDocument::new()
                .with("#auth-container", FakeElement::new("Iniciar sesión"))
                .with("#login-email", FakeElement::new(""))
                .with("#login-password", FakeElement::new(""))
                .with(SUBMIT, FakeElement::new("Entrar")),
        )
        .on_click(SUBMIT, on_submit)
}

#[tokio::test(start_paused = true)]
async fn dashboard_element_scenario_captures_content_view() {
    let dir = TempDir::new().unwrap();
    let engine = dashboard_engine(true);

    let report = runner(&engine)
        .run_with_overrides(&bundled("dashboard-element"), &overrides(&dir))
        .await
        .unwrap();

    let artifact = match &report.outcome {
        Outcome::Success(artifact) => artifact,
        Outcome::Failure(failure) => panic!("unexpected failure: {}", failure),
    };
    assert_eq!((artifact.width, artifact.height), (960, 540));
    assert_eq!(
        artifact.region,
        CaptureRegion::Element {
            selector: ".content-view".to_string()
        }
    );
    assert_eq!(artifact.path, artifact_path(&dir));
    assert!(artifact.size_bytes > 0);

    let written = std::fs::read(&artifact.path).unwrap();
    assert_eq!(written.len() as u64, artifact.size_bytes);
    assert_eq!(report.engine, "fake");
    assert_eq!(report.steps.len(), 5);
    assert!(report.steps.iter().all(|s| s.success));
    assert_eq!(engine.open_sessions(), 0);
    assert_eq!(engine.launched_sessions(), 1);
}

#[tokio::test(start_paused = true)]
async fn missing_nav_link_fails_at_click() {
    let dir = TempDir::new().unwrap();
    let engine = dashboard_engine(false);

    let report = runner(&engine)
        .run_with_overrides(&bundled("dashboard-element"), &overrides(&dir))
        .await
        .unwrap();

    let failure = report.outcome.failure().unwrap();
    assert_eq!(failure.step_index, 2);
    assert_eq!(failure.kind, FailureKind::ElementNotFound);
    assert_eq!(failure.step, format!("click:{}", NAV));
    assert!(failure.reason.contains(NAV));

    assert!(!artifact_path(&dir).exists());
    assert!(!engine.events().contains(&FakeEvent::Click(NAV.to_string())));
    assert_eq!(report.steps.len(), 3);
    assert!(!report.steps[2].success);
    assert_eq!(engine.open_sessions(), 0);
}

#[tokio::test(start_paused = true)]
async fn failed_run_leaves_stale_artifact_untouched() {
    let dir = TempDir::new().unwrap();
    let path = artifact_path(&dir);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, b"stale").unwrap();

    let engine = dashboard_engine(false);
    let outcome = runner(&engine)
        .run_with_overrides(&bundled("dashboard-element"), &overrides(&dir))
        .await
        .unwrap()
        .outcome;

    assert!(!outcome.is_success());
    assert_eq!(std::fs::read(&path).unwrap(), b"stale");
    // no temp files left beside it either
    assert_eq!(std::fs::read_dir(path.parent().unwrap()).unwrap().count(), 1);
}

#[tokio::test(start_paused = true)]
async fn repeated_runs_produce_identical_artifacts() {
    let first_dir = TempDir::new().unwrap();
    let second_dir = TempDir::new().unwrap();
    let engine = dashboard_engine(true);
    let runner = runner(&engine);
    let scenario = bundled("dashboard-element");

    let first = runner
        .run_with_overrides(&scenario, &overrides(&first_dir))
        .await
        .unwrap()
        .outcome;
    let second = runner
        .run_with_overrides(&scenario, &overrides(&second_dir))
        .await
        .unwrap()
        .outcome;

    let (a, b) = (first.artifact().unwrap(), second.artifact().unwrap());
    assert_eq!(a.sha256, b.sha256);

    let diff = visual::compare(&a.path, &b.path, &CompareOptions::default()).unwrap();
    assert!(diff.matches);
    assert_eq!(engine.launched_sessions(), 2);
    assert_eq!(engine.open_sessions(), 0);
}

#[tokio::test(start_paused = true)]
async fn click_effects_land_before_next_wait_probes() {
    let dir = TempDir::new().unwrap();
    let engine = dashboard_engine(true);

    let outcome = runner(&engine)
        .run_with_overrides(&bundled("dashboard-element"), &overrides(&dir))
        .await
        .unwrap()
        .outcome;
    assert!(outcome.is_success());

    let click = engine.position(&FakeEvent::Click(NAV.to_string())).unwrap();
    let probe = engine
        .position(&FakeEvent::Probe(".content-view h2".to_string()))
        .unwrap();
    assert!(click < probe);
}

#[tokio::test(start_paused = true)]
async fn wait_before_click_never_sees_its_element() {
    let dir = TempDir::new().unwrap();
    let engine = dashboard_engine(true);
    let mut scenario = bundled("dashboard-element");
    scenario.steps.swap(2, 3);

    let outcome = runner(&engine)
        .run_with_overrides(&scenario, &overrides(&dir))
        .await
        .unwrap()
        .outcome;

    let failure = outcome.failure().unwrap();
    assert_eq!(failure.step_index, 2);
    assert_eq!(failure.kind, FailureKind::ElementNotFound);
    assert!(engine.position(&FakeEvent::Click(NAV.to_string())).is_none());
}

#[tokio::test(start_paused = true)]
async fn login_scenario_waits_for_inventory_then_captures_viewport() {
    let dir = TempDir::new().unwrap();
    let engine = login_engine(true);

    let report = runner(&engine)
        .run_with_overrides(&bundled("dashboard-login"), &overrides(&dir))
        .await
        .unwrap();

    let artifact = report.outcome.artifact().unwrap();
    assert_eq!(artifact.region, CaptureRegion::Viewport);
    assert_eq!((artifact.width, artifact.height), (1280, 720));
    assert_eq!(report.steps.len(), 9);

    let events = engine.events();
    let email = events
        .iter()
        .position(|e| {
            *e == FakeEvent::Fill {
                selector: "#login-email".to_string(),
                value: "test@test.com".to_string(),
            }
        })
        .unwrap();
    let submit = engine.position(&FakeEvent::Click(SUBMIT.to_string())).unwrap();
    assert!(email < submit);
    assert_eq!(engine.open_sessions(), 0);
}

#[tokio::test(start_paused = true)]
async fn inventory_stuck_loading_is_condition_not_met() {
    let dir = TempDir::new().unwrap();
    let engine = login_engine(false);

    let outcome = runner(&engine)
        .run_with_overrides(&bundled("dashboard-login"), &overrides(&dir))
        .await
        .unwrap()
        .outcome;

    let failure = outcome.failure().unwrap();
    assert_eq!(failure.step_index, 6);
    assert_eq!(failure.kind, FailureKind::ConditionNotMet);
    assert!(failure.reason.contains("Cargando..."));
    assert!(!artifact_path(&dir).exists());
    assert_eq!(engine.open_sessions(), 0);
}

#[test_case(FakeDocument::new().load_delay(Duration::from_secs(60)), true ; "load never completes")]
#[test_case(FakeDocument::new(), false ; "unknown location")]
#[tokio::test(start_paused = true)]
async fn navigation_failures_are_navigation_timeouts(document: FakeDocument, register: bool) {
    let dir = TempDir::new().unwrap();
    let engine = if register {
        dashboard_engine(true).page(APP, document)
    } else {
        dashboard_engine(true).page("file:///elsewhere.html", document)
    };
    let mut overrides = overrides(&dir);
    if !register {
        overrides.app = Some("file:///srv/missing/index.html".to_string());
    }

    let outcome = runner(&engine)
        .run_with_overrides(&bundled("dashboard-element"), &overrides)
        .await
        .unwrap()
        .outcome;

    let failure = outcome.failure().unwrap();
    assert_eq!(failure.step_index, 0);
    assert_eq!(failure.kind, FailureKind::NavigationTimeout);
    assert_eq!(engine.open_sessions(), 0);
}

#[tokio::test(start_paused = true)]
async fn throwing_script_is_script_error() {
    let dir = TempDir::new().unwrap();
    let engine = FakeEngine::new()
        .page(APP, shell(true))
        .script_throws(
            "app-container",
            "TypeError: Cannot read properties of null (reading 'classList')",
        );

    let outcome = runner(&engine)
        .run_with_overrides(&bundled("dashboard-element"), &overrides(&dir))
        .await
        .unwrap()
        .outcome;

    let failure = outcome.failure().unwrap();
    assert_eq!(failure.step_index, 1);
    assert_eq!(failure.kind, FailureKind::ScriptError);
    assert!(failure.reason.contains("classList"));
}

#[tokio::test(start_paused = true)]
async fn element_detached_at_capture_is_capture_failure() {
    let dir = TempDir::new().unwrap();
    let engine = dashboard_engine(true).detach_on_capture(".content-view");

    let outcome = runner(&engine)
        .run_with_overrides(&bundled("dashboard-element"), &overrides(&dir))
        .await
        .unwrap()
        .outcome;

    let failure = outcome.failure().unwrap();
    assert_eq!(failure.step_index, 4);
    assert_eq!(failure.kind, FailureKind::CaptureFailure);
    assert!(!artifact_path(&dir).exists());
    assert_eq!(engine.open_sessions(), 0);
}

#[tokio::test(start_paused = true)]
async fn missing_fill_target_is_element_not_found() {
    let dir = TempDir::new().unwrap();
    let engine = FakeEngine::new()
        .page(
            APP,
            FakeDocument::new()
                .with("#auth-container", FakeElement::new("Iniciar sesión"))
                .with("#login-password", FakeElement::new(""))
                .with(SUBMIT, FakeElement::new("Entrar")),
        );

    let outcome = runner(&engine)
        .run_with_overrides(&bundled("dashboard-login"), &overrides(&dir))
        .await
        .unwrap()
        .outcome;

    let failure = outcome.failure().unwrap();
    assert_eq!(failure.step_index, 2);
    assert_eq!(failure.kind, FailureKind::ElementNotFound);
    assert!(failure.reason.contains("#login-email"));
    assert!(engine
        .events()
        .iter()
        .all(|e| !matches!(e, FakeEvent::Fill { .. })));
    assert!(!artifact_path(&dir).exists());
    assert_eq!(engine.open_sessions(), 0);
}

#[tokio::test(start_paused = true)]
async fn capture_target_never_present_is_element_not_found() {
    let dir = TempDir::new().unwrap();
    // the heading shows up but its panel never does
    let engine = FakeEngine::new()
        .page(APP, shell(true))
        .on_click(
            NAV,
            vec![Effect::insert(".content-view h2", FakeElement::new("Dashboard"))],
        );

    let outcome = runner(&engine)
        .run_with_overrides(&bundled("dashboard-element"), &overrides(&dir))
        .await
        .unwrap()
        .outcome;

    let failure = outcome.failure().unwrap();
    assert_eq!(failure.step_index, 4);
    assert_eq!(failure.kind, FailureKind::ElementNotFound);
    assert!(engine
        .events()
        .iter()
        .all(|e| !matches!(e, FakeEvent::Screenshot(_))));
    assert!(!artifact_path(&dir).exists());
    assert_eq!(engine.open_sessions(), 0);
}

#[tokio::test(start_paused = true)]
async fn unmet_expectation_fails_at_capture_index() {
    let dir = TempDir::new().unwrap();
    let engine = dashboard_engine(true);
    let mut scenario = bundled("dashboard-element");
    scenario.expect = Some(Condition::Present {
        selector: "#auth-container".to_string(),
        state: WaitState::Visible,
        has_text: None,
        timeout_ms: Some(1_000),
    });

    let outcome = runner(&engine)
        .run_with_overrides(&scenario, &overrides(&dir))
        .await
        .unwrap()
        .outcome;

    let failure = outcome.failure().unwrap();
    assert_eq!(failure.step_index, 4);
    assert_eq!(failure.step, "expect:visible:#auth-container");
    assert_eq!(failure.kind, FailureKind::ConditionNotMet);
    assert!(engine
        .events()
        .iter()
        .all(|e| !matches!(e, FakeEvent::Screenshot(_))));
}

#[tokio::test]
async fn launch_failure_is_an_infrastructure_error() {
    let dir = TempDir::new().unwrap();
    let engine = dashboard_engine(true).fail_launch("chrome exited with status 127");

    let result = runner(&engine)
        .run_with_overrides(&bundled("dashboard-element"), &overrides(&dir))
        .await;

    assert!(matches!(result, Err(RunnerError::Launch(ref msg)) if msg.contains("127")));
    assert_eq!(engine.launched_sessions(), 0);
    assert!(!artifact_path(&dir).exists());
}

#[tokio::test]
async fn invalid_scenario_never_launches() {
    let engine = dashboard_engine(true);
    // no app location and a url-less navigate
    let mut scenario = bundled("dashboard-element");
    scenario.app = None;

    let result = runner(&engine).run(&scenario).await;
    assert!(matches!(result, Err(RunnerError::Scenario(_))));

    let mut scenario = bundled("dashboard-element");
    scenario.steps.push(Step::Sleep { ms: 10 });
    let result = runner(&engine).run(&scenario).await;
    assert!(matches!(result, Err(RunnerError::Scenario(_))));

    assert_eq!(engine.launched_sessions(), 0);
}

#[tokio::test]
#[ignore = "needs a local Chrome/Chromium"]
async fn chromium_captures_local_page() {
    use statecap_runner::ChromiumEngine;

    let dir = TempDir::new().unwrap();
    let html = dir.path().join("index.html");
    std::fs::write(
        &html,
        r##"<html><body>
<div id="app-container" class="hidden"></div>
<nav id="main-nav"><a href="#" data-view="dashboard-view"
  onclick="document.body.insertAdjacentHTML('beforeend',
  '<div class=&quot;content-view&quot; style=&quot;width:300px;height:200px&quot;><h2>Dashboard</h2></div>')">Dashboard</a></nav>
<div id="auth-container"></div>
</body></html>"##,
    )
    .unwrap();

    let runner = ScenarioRunner::new(Arc::new(ChromiumEngine::new()), HarnessConfig::default());
    let overrides = RunOverrides {
        app: Some(html.display().to_string()),
        artifact: Some(dir.path().join("out.png")),
    };
    let outcome = runner
        .run_with_overrides(&bundled("dashboard-element"), &overrides)
        .await
        .unwrap()
        .outcome;

    let artifact = outcome.artifact().unwrap();
    assert_eq!((artifact.width, artifact.height), (300, 200));
}
