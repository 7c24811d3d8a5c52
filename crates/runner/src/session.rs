//! Browser session ownership
//!
//! A [`Session`] is one launched browser plus its page, owned by exactly one
//! scenario run. `open` acquires it and `close` releases it. Dropping an
//! unclosed session is a bug in the caller and is logged; the Chromium driver
//! additionally kills its child process on drop so a panic cannot leak it.

use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use statecap_common::LaunchSettings;

use crate::browser::{BrowserEngine, DriverError, PageDriver};
use crate::error::{RunnerError, RunnerResult};

pub struct Session {
    page: Option<Box<dyn PageDriver>>,
    engine: &'static str,
    opened_at: Instant,
}

impl Session {
    /// Launch a browser through `engine`, bounded by the launch timeout
    pub async fn open(engine: &dyn BrowserEngine, settings: &LaunchSettings) -> RunnerResult<Self> {
        let budget = settings.browser.launch_timeout_ms;
        info!(
            "Opening {} session ({}x{})",
            engine.name(),
            settings.viewport.width,
            settings.viewport.height
        );

        let launched =
            tokio::time::timeout(Duration::from_millis(budget), engine.launch(settings)).await;

        let page = match launched {
            Ok(Ok(page)) => page,
            Ok(Err(DriverError::Launch(msg))) => return Err(RunnerError::Launch(msg)),
            Ok(Err(e)) => return Err(RunnerError::Driver(e)),
            Err(_) => return Err(RunnerError::LaunchTimeout(budget)),
        };

        Ok(Self {
            page: Some(page),
            engine: engine.name(),
            opened_at: Instant::now(),
        })
    }

    /// The page this session drives
    pub fn page(&mut self) -> Result<&mut dyn PageDriver, DriverError> {
        match self.page.as_mut() {
            Some(page) => Ok(&mut **page),
            None => Err(DriverError::Closed),
        }
    }

    pub fn engine(&self) -> &'static str {
        self.engine
    }

    /// Release the browser. Close errors are logged, never propagated.
    pub async fn close(mut self) {
        if let Some(mut page) = self.page.take() {
            match page.close().await {
                Ok(()) => debug!("Browser closed cleanly"),
                Err(e) => warn!("Error closing {} session: {}", self.engine, e),
            }
            info!(
                "Closed {} session after {} ms",
                self.engine,
                self.opened_at.elapsed().as_millis()
            );
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.page.is_some() {
            warn!("{} session dropped without close()", self.engine);
        }
    }
}
