//! In-process browser engine with a scripted DOM
//!
//! `FakeEngine` stands in for a real browser in tests. Pages are
//! registered by URL as flat maps from selector to element; selectors are
//! matched literally, there is no CSS engine. Clicks and scripts trigger
//! registered [`Effect`]s, optionally delayed, which mutate the live
//! document. Every driver call is recorded so tests can assert ordering, and
//! open sessions are counted so tests can assert release.

use std::collections::{BTreeMap, HashMap};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use image::{ImageOutputFormat, Rgba, RgbaImage};
use parking_lot::Mutex;
use tokio::time::Instant;

use statecap_common::{CaptureRegion, LaunchSettings, Viewport};

use crate::browser::{BrowserEngine, DriverError, DriverResult, ElementProbe, PageDriver};

/// One element of a fake document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeElement {
    pub text: String,
    pub value: String,
    pub visible: bool,
    pub width: u32,
    pub height: u32,
}

impl FakeElement {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            value: String::new(),
            visible: true,
            width: 100,
            height: 20,
        }
    }

    pub fn sized(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }
}

/// A page definition: initial elements plus load behavior
#[derive(Debug, Clone, Default)]
pub struct FakeDocument {
    elements: BTreeMap<String, FakeElement>,
    load_delay: Duration,
    scroll_height: Option<u32>,
}

impl FakeDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, selector: impl Into<String>, element: FakeElement) -> Self {
        self.elements.insert(selector.into(), element);
        self
    }

    /// Delay before the load event fires
    pub fn load_delay(mut self, delay: Duration) -> Self {
        self.load_delay = delay;
        self
    }

    /// Document height used by full-page captures
    pub fn scroll_height(mut self, height: u32) -> Self {
        self.scroll_height = Some(height);
        self
    }
}

/// A DOM mutation triggered by a click or a script
#[derive(Debug, Clone)]
pub enum Effect {
    Insert { selector: String, element: FakeElement },
    Remove { selector: String },
    SetText { selector: String, text: String },
    SetVisible { selector: String, visible: bool },
    /// Apply the inner effect once `delay` has passed
    After { delay: Duration, effect: Box<Effect> },
}

impl Effect {
    pub fn insert(selector: impl Into<String>, element: FakeElement) -> Self {
        Effect::Insert {
            selector: selector.into(),
            element,
        }
    }

    pub fn remove(selector: impl Into<String>) -> Self {
        Effect::Remove {
            selector: selector.into(),
        }
    }

    pub fn set_text(selector: impl Into<String>, text: impl Into<String>) -> Self {
        Effect::SetText {
            selector: selector.into(),
            text: text.into(),
        }
    }

    pub fn show(selector: impl Into<String>) -> Self {
        Effect::SetVisible {
            selector: selector.into(),
            visible: true,
        }
    }

    pub fn hide(selector: impl Into<String>) -> Self {
        Effect::SetVisible {
            selector: selector.into(),
            visible: false,
        }
    }

    pub fn after(self, delay: Duration) -> Self {
        Effect::After {
            delay,
            effect: Box::new(self),
        }
    }
}

/// A recorded driver call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FakeEvent {
    Navigate(String),
    Evaluate(String),
    Probe(String),
    Fill { selector: String, value: String },
    Click(String),
    Screenshot(CaptureRegion),
    Close,
}

#[derive(Debug, Clone)]
enum ScriptBehavior {
    Effects(Vec<Effect>),
    Throw(String),
}

#[derive(Default)]
struct Registry {
    pages: HashMap<String, FakeDocument>,
    clicks: HashMap<String, Vec<Effect>>,
    scripts: Vec<(String, ScriptBehavior)>,
    detach_on_capture: Vec<String>,
    launch_error: Option<String>,
}

#[derive(Default)]
struct Shared {
    registry: Mutex<Registry>,
    events: Mutex<Vec<FakeEvent>>,
    open: AtomicUsize,
    launched: AtomicUsize,
}

/// Scripted in-process engine
#[derive(Clone, Default)]
pub struct FakeEngine {
    shared: Arc<Shared>,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a document served at `url`
    pub fn page(self, url: impl Into<String>, document: FakeDocument) -> Self {
        self.shared.registry.lock().pages.insert(url.into(), document);
        self
    }

    /// Effects applied when `selector` is clicked
    pub fn on_click(self, selector: impl Into<String>, effects: Vec<Effect>) -> Self {
        self.shared
            .registry
            .lock()
            .clicks
            .insert(selector.into(), effects);
        self
    }

    /// Effects applied by any evaluated script containing `fragment`
    pub fn on_script(self, fragment: impl Into<String>, effects: Vec<Effect>) -> Self {
        self.shared
            .registry
            .lock()
            .scripts
            .push((fragment.into(), ScriptBehavior::Effects(effects)));
        self
    }

    /// Any evaluated script containing `fragment` throws `message`
    pub fn script_throws(self, fragment: impl Into<String>, message: impl Into<String>) -> Self {
        self.shared
            .registry
            .lock()
            .scripts
            .push((fragment.into(), ScriptBehavior::Throw(message.into())));
        self
    }

    /// The element detaches between the last probe and an element capture
    pub fn detach_on_capture(self, selector: impl Into<String>) -> Self {
        self.shared
            .registry
            .lock()
            .detach_on_capture
            .push(selector.into());
        self
    }

    /// Every launch fails with `message`
    pub fn fail_launch(self, message: impl Into<String>) -> Self {
        self.shared.registry.lock().launch_error = Some(message.into());
        self
    }

    /// Sessions launched and not yet closed
    pub fn open_sessions(&self) -> usize {
        self.shared.open.load(Ordering::SeqCst)
    }

    /// Sessions launched in total
    pub fn launched_sessions(&self) -> usize {
        self.shared.launched.load(Ordering::SeqCst)
    }

    /// Every driver call so far, across sessions
    pub fn events(&self) -> Vec<FakeEvent> {
        self.shared.events.lock().clone()
    }

    /// Position of the first event equal to `event`
    pub fn position(&self, event: &FakeEvent) -> Option<usize> {
        self.shared.events.lock().iter().position(|e| e == event)
    }
}

#[async_trait]
impl BrowserEngine for FakeEngine {
    async fn launch(&self, settings: &LaunchSettings) -> DriverResult<Box<dyn PageDriver>> {
        if let Some(msg) = self.shared.registry.lock().launch_error.clone() {
            return Err(DriverError::Launch(msg));
        }
        self.shared.launched.fetch_add(1, Ordering::SeqCst);
        self.shared.open.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakePage {
            shared: Arc::clone(&self.shared),
            viewport: settings.viewport,
            document: None,
            pending: Vec::new(),
            closed: false,
        }))
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

struct LiveDocument {
    elements: BTreeMap<String, FakeElement>,
    scroll_height: Option<u32>,
}

impl LiveDocument {
    fn apply(&mut self, effect: Effect) {
        match effect {
            Effect::Insert { selector, element } => {
                self.elements.insert(selector, element);
            }
            Effect::Remove { selector } => {
                self.elements.remove(&selector);
            }
            Effect::SetText { selector, text } => {
                if let Some(el) = self.elements.get_mut(&selector) {
                    el.text = text;
                }
            }
            Effect::SetVisible { selector, visible } => {
                if let Some(el) = self.elements.get_mut(&selector) {
                    el.visible = visible;
                }
            }
            // queued by FakePage::apply
            Effect::After { .. } => {}
        }
    }
}

struct FakePage {
    shared: Arc<Shared>,
    viewport: Viewport,
    document: Option<LiveDocument>,
    pending: Vec<(Instant, Effect)>,
    closed: bool,
}

impl FakePage {
    fn record(&self, event: FakeEvent) {
        self.shared.events.lock().push(event);
    }

    fn ensure_open(&self) -> DriverResult<()> {
        if self.closed {
            Err(DriverError::Closed)
        } else {
            Ok(())
        }
    }

    fn apply(&mut self, effect: Effect) {
        match effect {
            Effect::After { delay, effect } => {
                self.pending.push((Instant::now() + delay, *effect));
            }
            effect => {
                if let Some(doc) = self.document.as_mut() {
                    doc.apply(effect);
                }
            }
        }
    }

    fn apply_due(&mut self) {
        let now = Instant::now();
        let (due, later): (Vec<_>, Vec<_>) =
            self.pending.drain(..).partition(|(at, _)| *at <= now);
        self.pending = later;
        for (_, effect) in due {
            self.apply(effect);
        }
    }

    fn element(&self, selector: &str) -> Option<&FakeElement> {
        self.document.as_ref()?.elements.get(selector)
    }

    /// Deterministic image whose colour depends on the rendered state
    fn render(&self, width: u32, height: u32) -> DriverResult<Vec<u8>> {
        let mut seed: u32 = 0x811c_9dc5;
        if let Some(doc) = &self.document {
            for (selector, el) in &doc.elements {
                for b in selector.bytes().chain(el.text.bytes()).chain(el.value.bytes()) {
                    seed = (seed ^ b as u32).wrapping_mul(0x0100_0193);
                }
            }
        }
        let [r, g, b, _] = seed.to_le_bytes();
        let img = RgbaImage::from_pixel(width, height, Rgba([r, g, b, 255]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageOutputFormat::Png)
            .map_err(|e| DriverError::Capture(e.to_string()))?;
        Ok(out.into_inner())
    }
}

#[async_trait]
impl PageDriver for FakePage {
    async fn navigate(&mut self, url: &str) -> DriverResult<()> {
        self.ensure_open()?;
        self.record(FakeEvent::Navigate(url.to_string()));

        let document = self.shared.registry.lock().pages.get(url).cloned();
        let Some(document) = document else {
            return Err(DriverError::Navigation(format!(
                "net::ERR_FILE_NOT_FOUND at {}",
                url
            )));
        };

        if !document.load_delay.is_zero() {
            tokio::time::sleep(document.load_delay).await;
        }
        self.pending.clear();
        self.document = Some(LiveDocument {
            elements: document.elements,
            scroll_height: document.scroll_height,
        });
        Ok(())
    }

    async fn evaluate(&mut self, script: &str) -> DriverResult<serde_json::Value> {
        self.ensure_open()?;
        self.apply_due();
        self.record(FakeEvent::Evaluate(script.to_string()));

        let behavior = self
            .shared
            .registry
            .lock()
            .scripts
            .iter()
            .find(|(fragment, _)| script.contains(fragment.as_str()))
            .map(|(_, behavior)| behavior.clone());

        match behavior {
            Some(ScriptBehavior::Throw(message)) => Err(DriverError::Script(message)),
            Some(ScriptBehavior::Effects(effects)) => {
                for effect in effects {
                    self.apply(effect);
                }
                Ok(serde_json::Value::Null)
            }
            None => Ok(serde_json::Value::Null),
        }
    }

    async fn probe(
        &mut self,
        selector: &str,
        has_text: Option<&str>,
    ) -> DriverResult<Option<ElementProbe>> {
        self.ensure_open()?;
        self.apply_due();
        self.record(FakeEvent::Probe(selector.to_string()));

        let matched = self
            .element(selector)
            .filter(|el| has_text.map(|t| el.text.contains(t)).unwrap_or(true));
        Ok(matched.map(|el| ElementProbe {
            text: el.text.clone(),
            visible: el.visible && el.width > 0 && el.height > 0,
        }))
    }

    async fn fill(&mut self, selector: &str, value: &str) -> DriverResult<()> {
        self.ensure_open()?;
        self.apply_due();
        self.record(FakeEvent::Fill {
            selector: selector.to_string(),
            value: value.to_string(),
        });

        let el = self
            .document
            .as_mut()
            .and_then(|doc| doc.elements.get_mut(selector))
            .ok_or_else(|| DriverError::NotFound(selector.to_string()))?;
        el.value = value.to_string();
        Ok(())
    }

    async fn click(&mut self, selector: &str) -> DriverResult<()> {
        self.ensure_open()?;
        self.apply_due();
        self.record(FakeEvent::Click(selector.to_string()));

        if self.element(selector).is_none() {
            return Err(DriverError::NotFound(selector.to_string()));
        }
        let effects = self
            .shared
            .registry
            .lock()
            .clicks
            .get(selector)
            .cloned()
            .unwrap_or_default();
        for effect in effects {
            self.apply(effect);
        }
        Ok(())
    }

    async fn screenshot(&mut self, region: &CaptureRegion) -> DriverResult<Vec<u8>> {
        self.ensure_open()?;
        self.apply_due();
        self.record(FakeEvent::Screenshot(region.clone()));

        let (width, height) = match region {
            CaptureRegion::Viewport => (self.viewport.width, self.viewport.height),
            CaptureRegion::FullPage => {
                let scroll = self
                    .document
                    .as_ref()
                    .and_then(|d| d.scroll_height)
                    .unwrap_or(self.viewport.height);
                (self.viewport.width, scroll.max(self.viewport.height))
            }
            CaptureRegion::Element { selector } => {
                let detached = self
                    .shared
                    .registry
                    .lock()
                    .detach_on_capture
                    .iter()
                    .any(|s| s == selector);
                if detached {
                    return Err(DriverError::Capture(format!(
                        "node for '{}' is detached from the document",
                        selector
                    )));
                }
                let el = self
                    .element(selector)
                    .ok_or_else(|| DriverError::NotFound(selector.clone()))?;
                if el.width == 0 || el.height == 0 {
                    return Err(DriverError::Capture(format!(
                        "'{}' has an empty bounding box",
                        selector
                    )));
                }
                (el.width, el.height)
            }
        };
        self.render(width, height)
    }

    async fn close(&mut self) -> DriverResult<()> {
        if !self.closed {
            self.closed = true;
            self.record(FakeEvent::Close);
            self.shared.open.fetch_sub(1, Ordering::SeqCst);
        }
        Ok(())
    }
}
