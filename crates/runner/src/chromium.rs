//! Chromium engine over the DevTools protocol
//!
//! Each launch starts a fresh headless Chromium with a throwaway profile,
//! spawns the CDP handler task and opens one blank page sized to the
//! scenario viewport. Closing shuts the browser down and reaps the process;
//! `chromiumoxide::Browser` kills its child on drop as a last resort.

use std::path::PathBuf;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::error::CdpError;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use statecap_common::{CaptureRegion, LaunchSettings};

use crate::browser::{BrowserEngine, DriverError, DriverResult, ElementProbe, PageDriver};

/// Detect an installed Chrome or Chromium browser.
///
/// Checks common installation paths on macOS and Linux and returns the first
/// executable found.
pub fn detect_browser() -> Option<PathBuf> {
    browser_candidate_paths().into_iter().find(|p| p.exists())
}

fn browser_candidate_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    #[cfg(target_os = "macos")]
    {
        paths.push(PathBuf::from(
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        ));
        paths.push(PathBuf::from(
            "/Applications/Chromium.app/Contents/MacOS/Chromium",
        ));
    }

    #[cfg(target_os = "linux")]
    {
        paths.push(PathBuf::from("/usr/bin/google-chrome"));
        paths.push(PathBuf::from("/usr/bin/google-chrome-stable"));
        paths.push(PathBuf::from("/usr/bin/chromium-browser"));
        paths.push(PathBuf::from("/usr/bin/chromium"));
        paths.push(PathBuf::from("/usr/local/bin/chromium"));
        paths.push(PathBuf::from("/snap/bin/chromium"));
    }

    paths
}

/// Headless Chromium via chromiumoxide
#[derive(Debug, Clone, Default)]
pub struct ChromiumEngine;

impl ChromiumEngine {
    pub fn new() -> Self {
        Self
    }

    /// Whether an executable is configured or can be found
    pub fn available(settings: &LaunchSettings) -> bool {
        settings
            .browser
            .executable
            .as_ref()
            .map(|p| p.exists())
            .unwrap_or_else(|| detect_browser().is_some())
    }

    fn config(settings: &LaunchSettings, profile: &std::path::Path) -> DriverResult<BrowserConfig> {
        let browser = &settings.browser;
        let mut builder = BrowserConfig::builder()
            .window_size(settings.viewport.width, settings.viewport.height)
            .user_data_dir(profile);

        if !browser.headless {
            builder = builder.with_head();
        }
        if browser.no_sandbox {
            builder = builder.no_sandbox();
        }
        for arg in &browser.args {
            builder = builder.arg(arg.as_str());
        }
        if let Some(executable) = browser.executable.clone().or_else(detect_browser) {
            builder = builder.chrome_executable(executable);
        }

        builder.build().map_err(DriverError::Launch)
    }
}

#[async_trait]
impl BrowserEngine for ChromiumEngine {
    async fn launch(&self, settings: &LaunchSettings) -> DriverResult<Box<dyn PageDriver>> {
        let profile = tempfile::Builder::new()
            .prefix("statecap-profile-")
            .tempdir()
            .map_err(|e| DriverError::Launch(format!("cannot create profile dir: {}", e)))?;
        let config = Self::config(settings, profile.path())?;

        info!("Launching headless Chromium...");
        let (mut browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| DriverError::Launch(e.to_string()))?;

        // The handler pumps CDP messages; nothing works unless it runs.
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("CDP handler event error: {}", e);
                }
            }
            debug!("CDP handler loop ended");
        });

        let page = match open_page(&browser, settings).await {
            Ok(page) => page,
            Err(e) => {
                let _ = browser.close().await;
                let _ = browser.wait().await;
                handler_task.abort();
                return Err(e);
            }
        };

        info!("Chromium launched");
        Ok(Box::new(ChromiumPage {
            browser: Some(browser),
            page,
            handler_task,
            _profile: profile,
        }))
    }

    fn name(&self) -> &'static str {
        "chromium"
    }
}

async fn open_page(browser: &Browser, settings: &LaunchSettings) -> DriverResult<Page> {
    let page = browser
        .new_page("about:blank")
        .await
        .map_err(|e| DriverError::Launch(format!("cannot open page: {}", e)))?;

    let metrics = SetDeviceMetricsOverrideParams::builder()
        .width(settings.viewport.width as i64)
        .height(settings.viewport.height as i64)
        .device_scale_factor(1.0)
        .mobile(false)
        .build()
        .map_err(DriverError::Launch)?;
    page.execute(metrics)
        .await
        .map_err(|e| DriverError::Launch(format!("cannot set viewport: {}", e)))?;

    Ok(page)
}

struct ChromiumPage {
    browser: Option<Browser>,
    page: Page,
    handler_task: JoinHandle<()>,
    _profile: tempfile::TempDir,
}

impl ChromiumPage {
    fn ensure_open(&self) -> DriverResult<()> {
        if self.browser.is_some() {
            Ok(())
        } else {
            Err(DriverError::Closed)
        }
    }

    /// Evaluate an expression with Runtime.evaluate, awaiting promises
    async fn eval(&self, expression: String) -> DriverResult<serde_json::Value> {
        let params = EvaluateParams::builder()
            .expression(expression)
            .await_promise(true)
            .return_by_value(true)
            .build()
            .map_err(DriverError::Protocol)?;

        let result = self.page.evaluate_expression(params).await.map_err(|e| match e {
            CdpError::JavascriptException(details) => DriverError::Script(format!("{:?}", details)),
            other => DriverError::Protocol(other.to_string()),
        })?;

        Ok(result.value().cloned().unwrap_or(serde_json::Value::Null))
    }
}

fn js_string(value: &str) -> String {
    // serializing a &str cannot fail
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
}

fn probe_script(selector: &str, has_text: Option<&str>) -> String {
    let filter = match has_text {
        Some(text) => js_string(text),
        None => "null".to_string(),
    };
    format!(
        r#"(() => {{
  const needle = {filter};
  const el = Array.from(document.querySelectorAll({selector}))
    .find(e => needle === null || (e.textContent || '').includes(needle));
  if (!el) return null;
  const rect = el.getBoundingClientRect();
  const style = window.getComputedStyle(el);
  const visible = rect.width > 0 && rect.height > 0
    && style.visibility !== 'hidden' && style.display !== 'none';
  return {{ text: el.textContent || '', visible }};
}})()"#,
        filter = filter,
        selector = js_string(selector),
    )
}

fn fill_script(selector: &str, value: &str) -> String {
    format!(
        r#"(() => {{
  const el = document.querySelector({selector});
  if (!el) return false;
  el.focus();
  el.value = {value};
  el.dispatchEvent(new Event('input', {{ bubbles: true }}));
  el.dispatchEvent(new Event('change', {{ bubbles: true }}));
  return true;
}})()"#,
        selector = js_string(selector),
        value = js_string(value),
    )
}

#[async_trait]
impl PageDriver for ChromiumPage {
    async fn navigate(&mut self, url: &str) -> DriverResult<()> {
        self.ensure_open()?;
        debug!("Navigating to {}", url);
        self.page
            .goto(url)
            .await
            .map_err(|e| DriverError::Navigation(format!("{}: {}", url, e)))?;
        Ok(())
    }

    async fn evaluate(&mut self, script: &str) -> DriverResult<serde_json::Value> {
        self.ensure_open()?;
        self.eval(script.to_string()).await
    }

    async fn probe(
        &mut self,
        selector: &str,
        has_text: Option<&str>,
    ) -> DriverResult<Option<ElementProbe>> {
        self.ensure_open()?;
        let value = self.eval(probe_script(selector, has_text)).await.map_err(|e| match e {
            // querySelectorAll throws on a malformed selector
            DriverError::Script(msg) => DriverError::NotFound(format!("{} ({})", selector, msg)),
            other => other,
        })?;

        if value.is_null() {
            return Ok(None);
        }
        Ok(Some(ElementProbe {
            text: value
                .get("text")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
            visible: value.get("visible").and_then(|v| v.as_bool()).unwrap_or(false),
        }))
    }

    async fn fill(&mut self, selector: &str, value: &str) -> DriverResult<()> {
        self.ensure_open()?;
        let filled = self.eval(fill_script(selector, value)).await?;
        if filled.as_bool() == Some(true) {
            Ok(())
        } else {
            Err(DriverError::NotFound(selector.to_string()))
        }
    }

    async fn click(&mut self, selector: &str) -> DriverResult<()> {
        self.ensure_open()?;
        let element = self
            .page
            .find_element(selector)
            .await
            .map_err(|_| DriverError::NotFound(selector.to_string()))?;
        element
            .click()
            .await
            .map_err(|e| DriverError::Protocol(format!("click on '{}' failed: {}", selector, e)))?;
        Ok(())
    }

    async fn screenshot(&mut self, region: &CaptureRegion) -> DriverResult<Vec<u8>> {
        self.ensure_open()?;
        match region {
            CaptureRegion::Viewport | CaptureRegion::FullPage => self
                .page
                .screenshot(
                    ScreenshotParams::builder()
                        .format(CaptureScreenshotFormat::Png)
                        .full_page(matches!(region, CaptureRegion::FullPage))
                        .build(),
                )
                .await
                .map_err(|e| DriverError::Capture(e.to_string())),
            CaptureRegion::Element { selector } => {
                let element = self
                    .page
                    .find_element(selector.as_str())
                    .await
                    .map_err(|_| DriverError::NotFound(selector.clone()))?;
                element
                    .screenshot(CaptureScreenshotFormat::Png)
                    .await
                    .map_err(|e| DriverError::Capture(format!("{}: {}", selector, e)))
            }
        }
    }

    async fn close(&mut self) -> DriverResult<()> {
        let Some(mut browser) = self.browser.take() else {
            return Ok(());
        };

        let result = match browser.close().await {
            Ok(_) => Ok(()),
            Err(e) => {
                warn!("Graceful browser close failed, killing: {}", e);
                if let Some(Err(kill_err)) = browser.kill().await {
                    warn!("Failed to kill browser: {}", kill_err);
                }
                Err(DriverError::Protocol(e.to_string()))
            }
        };
        if let Err(e) = browser.wait().await {
            warn!("Failed to reap browser process: {}", e);
        }
        self.handler_task.abort();
        result
    }
}

impl Drop for ChromiumPage {
    fn drop(&mut self) {
        self.handler_task.abort();
    }
}
