//! Scripted in-memory driver
//!
//! Stands in for a browser session when exercising flows: elements are
//! registered per locator up front, every interaction is appended to a
//! journal, and clones share state so a test can inspect the driver after
//! handing it to the runner.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::driver::{Driver, ElementHandle, WindowHandle};
use crate::error::{FlowError, FlowResult};
use crate::locator::Locator;

/// An element the mock page contains
#[derive(Debug, Clone)]
pub struct MockElement {
    text: String,
    displayed: bool,
    appears_at: Option<Instant>,
    links_to: Option<String>,
}

impl MockElement {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            displayed: true,
            appears_at: None,
            links_to: None,
        }
    }

    pub fn hidden(mut self) -> Self {
        self.displayed = false;
        self
    }

    /// Not attached to the page until `delay` from now
    pub fn appearing_after(mut self, delay: Duration) -> Self {
        self.appears_at = Some(Instant::now() + delay);
        self
    }

    /// Clicking loads `url` in the current window
    pub fn linking_to(mut self, url: impl Into<String>) -> Self {
        self.links_to = Some(url.into());
        self
    }

    fn attached(&self) -> bool {
        self.appears_at.map_or(true, |at| Instant::now() >= at)
    }
}

#[derive(Debug)]
struct MockWindow {
    handle: WindowHandle,
    url: String,
}

#[derive(Debug, Default)]
struct MockState {
    elements: HashMap<Locator, Vec<MockElement>>,
    windows: Vec<MockWindow>,
    current: usize,
    journal: Vec<String>,
    closed: bool,
    fail_navigation: bool,
    fail_close: bool,
    latency: Option<Duration>,
}

impl MockState {
    fn resolve(&self, element: &ElementHandle) -> FlowResult<&MockElement> {
        let (key, index) = element
            .id()
            .rsplit_once('#')
            .and_then(|(key, idx)| idx.parse::<usize>().ok().map(|i| (key, i)))
            .ok_or_else(|| FlowError::Driver(format!("unknown element handle {}", element.id())))?;

        self.elements
            .iter()
            .find(|(loc, _)| loc.to_string() == key)
            .and_then(|(_, els)| els.get(index))
            .ok_or_else(|| FlowError::StaleElement(element.id().to_string()))
    }

    fn ensure_open(&self) -> FlowResult<()> {
        if self.closed {
            Err(FlowError::Driver("invalid session id: session closed".to_string()))
        } else {
            Ok(())
        }
    }
}

#[derive(Debug, Clone)]
pub struct MockDriver {
    state: Arc<Mutex<MockState>>,
}

impl MockDriver {
    /// A session with a single window at `about:blank`
    pub fn new() -> Self {
        let state = MockState {
            windows: vec![MockWindow {
                handle: WindowHandle::new("window-0"),
                url: "about:blank".to_string(),
            }],
            ..Default::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub fn with_element(self, locator: Locator, element: MockElement) -> Self {
        self.state.lock().elements.entry(locator).or_default().push(element);
        self
    }

    /// `count` visible elements with empty text
    pub fn with_elements(self, locator: Locator, count: usize) -> Self {
        {
            let mut state = self.state.lock();
            let els = state.elements.entry(locator).or_default();
            els.extend(std::iter::repeat(MockElement::new("")).take(count));
        }
        self
    }

    /// An additional window, e.g. a tab opened by a link
    pub fn with_window(self, url: impl Into<String>) -> Self {
        {
            let mut state = self.state.lock();
            let handle = WindowHandle::new(format!("window-{}", state.windows.len()));
            state.windows.push(MockWindow { handle, url: url.into() });
        }
        self
    }

    pub fn failing_navigation(self) -> Self {
        self.state.lock().fail_navigation = true;
        self
    }

    /// Every element lookup stalls for `latency`, like a browser busy loading
    pub fn with_latency(self, latency: Duration) -> Self {
        self.state.lock().latency = Some(latency);
        self
    }

    pub fn failing_close(self) -> Self {
        self.state.lock().fail_close = true;
        self
    }

    /// Interactions so far, e.g. `click id=login-button`
    pub fn journal(&self) -> Vec<String> {
        self.state.lock().journal.clone()
    }

    pub fn count_calls(&self, prefix: &str) -> usize {
        self.state.lock().journal.iter().filter(|e| e.starts_with(prefix)).count()
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    pub fn text_of(&self, element: &ElementHandle) -> Option<String> {
        self.state.lock().resolve(element).ok().map(|e| e.text.clone())
    }

    fn log(&self, entry: String) {
        self.state.lock().journal.push(entry);
    }

    fn label(element: &ElementHandle) -> &str {
        element.id().rsplit_once('#').map_or(element.id(), |(key, _)| key)
    }
}

impl Default for MockDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Driver for MockDriver {
    async fn navigate(&self, url: &str) -> FlowResult<()> {
        let mut state = self.state.lock();
        state.ensure_open()?;
        if state.fail_navigation {
            return Err(FlowError::Driver(format!("unknown error: net::ERR_NAME_NOT_RESOLVED at {}", url)));
        }
        let current = state.current;
        state.windows[current].url = url.to_string();
        state.journal.push(format!("navigate {}", url));
        Ok(())
    }

    async fn refresh(&self) -> FlowResult<()> {
        self.state.lock().ensure_open()?;
        self.log("refresh".to_string());
        Ok(())
    }

    async fn current_url(&self) -> FlowResult<String> {
        let state = self.state.lock();
        state.ensure_open()?;
        Ok(state.windows[state.current].url.clone())
    }

    async fn maximize_window(&self) -> FlowResult<()> {
        self.state.lock().ensure_open()?;
        self.log("maximize".to_string());
        Ok(())
    }

    async fn set_implicit_wait(&self, timeout: Duration) -> FlowResult<()> {
        self.log(format!("implicit_wait {}ms", timeout.as_millis()));
        Ok(())
    }

    async fn find_elements(&self, locator: &Locator) -> FlowResult<Vec<ElementHandle>> {
        let latency = self.state.lock().latency;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let state = self.state.lock();
        state.ensure_open()?;
        let handles = state
            .elements
            .get(locator)
            .map(|els| {
                els.iter()
                    .enumerate()
                    .filter(|(_, el)| el.attached())
                    .map(|(i, _)| ElementHandle::new(format!("{}#{}", locator, i)))
                    .collect()
            })
            .unwrap_or_default();
        Ok(handles)
    }

    async fn click(&self, element: &ElementHandle) -> FlowResult<()> {
        let mut state = self.state.lock();
        state.ensure_open()?;
        let target = state.resolve(element)?.links_to.clone();
        if let Some(url) = target {
            let current = state.current;
            state.windows[current].url = url;
        }
        state.journal.push(format!("click {}", Self::label(element)));
        Ok(())
    }

    async fn send_keys(&self, element: &ElementHandle, text: &str) -> FlowResult<()> {
        let mut state = self.state.lock();
        state.ensure_open()?;
        state.resolve(element)?;
        state.journal.push(format!("send_keys {} {}", Self::label(element), text));
        Ok(())
    }

    async fn text(&self, element: &ElementHandle) -> FlowResult<String> {
        let state = self.state.lock();
        state.ensure_open()?;
        Ok(state.resolve(element)?.text.clone())
    }

    async fn is_displayed(&self, element: &ElementHandle) -> FlowResult<bool> {
        let state = self.state.lock();
        state.ensure_open()?;
        Ok(state.resolve(element)?.displayed)
    }

    async fn window_handles(&self) -> FlowResult<Vec<WindowHandle>> {
        let state = self.state.lock();
        state.ensure_open()?;
        Ok(state.windows.iter().map(|w| w.handle.clone()).collect())
    }

    async fn current_window(&self) -> FlowResult<WindowHandle> {
        let state = self.state.lock();
        state.ensure_open()?;
        Ok(state.windows[state.current].handle.clone())
    }

    async fn switch_to_window(&self, window: &WindowHandle) -> FlowResult<()> {
        let mut state = self.state.lock();
        state.ensure_open()?;
        let index = state
            .windows
            .iter()
            .position(|w| &w.handle == window)
            .ok_or_else(|| FlowError::Driver(format!("no such window: {}", window)))?;
        state.current = index;
        state.journal.push(format!("switch_to_window {}", window));
        Ok(())
    }

    async fn close(&self) -> FlowResult<()> {
        let mut state = self.state.lock();
        if state.closed {
            return Ok(());
        }
        state.closed = true;
        state.journal.push("close".to_string());
        if state.fail_close {
            return Err(FlowError::Driver("session already gone".to_string()));
        }
        Ok(())
    }
}
