//! `Driver` implementation over a W3C WebDriver session

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use thirtyfour::error::WebDriverError;
use thirtyfour::{By, ChromiumLikeCapabilities, DesiredCapabilities, WebDriver, WebElement};
use tracing::{debug, info};

use flowcheck_core::{Driver, ElementHandle, FlowError, FlowResult, Locator, WindowHandle};

use crate::error::{SessionError, SessionResult};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Browser {
    #[default]
    Chrome,
    Firefox,
    Edge,
}

impl Browser {
    pub fn as_str(&self) -> &'static str {
        match self {
            Browser::Chrome => "chrome",
            Browser::Firefox => "firefox",
            Browser::Edge => "edge",
        }
    }
}

impl FromStr for Browser {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "chrome" | "chromium" => Ok(Browser::Chrome),
            "firefox" => Ok(Browser::Firefox),
            "edge" | "msedge" => Ok(Browser::Edge),
            other => Err(SessionError::UnsupportedBrowser(other.to_string())),
        }
    }
}

/// Configuration for opening a session
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// WebDriver endpoint, e.g. `http://127.0.0.1:4444`
    pub server_url: String,

    /// Browser to request
    pub browser: Browser,

    /// Run without a visible window
    pub headless: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:4444".to_string(),
            browser: Browser::Chrome,
            headless: false,
        }
    }
}

/// Elements handed out by a session, keyed by their W3C element id.
///
/// The browser returns the same id for the same element on every lookup, so
/// polling a page holds one entry per distinct element however often it is
/// queried. Entries are dropped whenever the page or window changes and
/// handles from the old page then fail as stale.
struct ElementRegistry<E> {
    elements: Mutex<HashMap<String, E>>,
}

impl<E: Clone> ElementRegistry<E> {
    fn new() -> Self {
        Self {
            elements: Mutex::new(HashMap::new()),
        }
    }

    fn register(&self, id: String, element: E) -> ElementHandle {
        let handle = ElementHandle::new(id.clone());
        self.elements.lock().insert(id, element);
        handle
    }

    fn lookup(&self, handle: &ElementHandle) -> FlowResult<E> {
        self.elements
            .lock()
            .get(handle.id())
            .cloned()
            .ok_or_else(|| FlowError::StaleElement(handle.id().to_string()))
    }

    fn clear(&self) {
        self.elements.lock().clear();
    }

    fn len(&self) -> usize {
        self.elements.lock().len()
    }
}

/// A live browser session
pub struct WebDriverSession {
    driver: WebDriver,
    elements: ElementRegistry<WebElement>,
    closed: AtomicBool,
}

impl WebDriverSession {
    /// Open a new session against `config.server_url`
    pub async fn connect(config: &SessionConfig) -> SessionResult<Self> {
        info!(
            "Opening {} session at {}{}",
            config.browser.as_str(),
            config.server_url,
            if config.headless { " (headless)" } else { "" }
        );

        let driver = match config.browser {
            Browser::Chrome => {
                let mut caps = DesiredCapabilities::chrome();
                if config.headless {
                    caps.set_headless()?;
                }
                WebDriver::new(config.server_url.as_str(), caps).await?
            }
            Browser::Edge => {
                let mut caps = DesiredCapabilities::edge();
                if config.headless {
                    caps.set_headless()?;
                }
                WebDriver::new(config.server_url.as_str(), caps).await?
            }
            Browser::Firefox => {
                let mut caps = DesiredCapabilities::firefox();
                if config.headless {
                    caps.set_headless()?;
                }
                WebDriver::new(config.server_url.as_str(), caps).await?
            }
        };

        Ok(Self {
            driver,
            elements: ElementRegistry::new(),
            closed: AtomicBool::new(false),
        })
    }

    /// Elements currently addressable through handles
    pub fn registered_elements(&self) -> usize {
        self.elements.len()
    }

    fn register(&self, element: WebElement) -> ElementHandle {
        self.elements.register(element.element_id().to_string(), element)
    }

    fn lookup(&self, handle: &ElementHandle) -> FlowResult<WebElement> {
        self.elements.lookup(handle)
    }

    fn forget_elements(&self) {
        self.elements.clear();
    }
}

fn by(locator: &Locator) -> By {
    match locator {
        Locator::Id(v) => By::Id(v.as_str()),
        Locator::ClassName(v) => By::ClassName(v.as_str()),
        Locator::Css(v) => By::Css(v.as_str()),
        Locator::XPath(v) => By::XPath(v.as_str()),
        Locator::LinkText(v) => By::LinkText(v.as_str()),
        Locator::Name(v) => By::Name(v.as_str()),
    }
}

fn driver_err(e: WebDriverError) -> FlowError {
    match e {
        WebDriverError::StaleElementReference(info) | WebDriverError::NoSuchElement(info) => {
            FlowError::StaleElement(info.value.message)
        }
        other => FlowError::Driver(other.to_string()),
    }
}

#[async_trait]
impl Driver for WebDriverSession {
    async fn navigate(&self, url: &str) -> FlowResult<()> {
        debug!("goto {}", url);
        self.forget_elements();
        self.driver.goto(url).await.map_err(driver_err)
    }

    async fn refresh(&self) -> FlowResult<()> {
        self.forget_elements();
        self.driver.refresh().await.map_err(driver_err)
    }

    async fn current_url(&self) -> FlowResult<String> {
        let url = self.driver.current_url().await.map_err(driver_err)?;
        Ok(url.to_string())
    }

    async fn maximize_window(&self) -> FlowResult<()> {
        self.driver.maximize_window().await.map_err(driver_err)
    }

    async fn set_implicit_wait(&self, timeout: Duration) -> FlowResult<()> {
        self.driver
            .set_implicit_wait_timeout(timeout)
            .await
            .map_err(driver_err)
    }

    async fn find_elements(&self, locator: &Locator) -> FlowResult<Vec<ElementHandle>> {
        let found = self.driver.find_all(by(locator)).await.map_err(driver_err)?;
        Ok(found.into_iter().map(|el| self.register(el)).collect())
    }

    async fn click(&self, element: &ElementHandle) -> FlowResult<()> {
        self.lookup(element)?.click().await.map_err(driver_err)
    }

    async fn send_keys(&self, element: &ElementHandle, text: &str) -> FlowResult<()> {
        self.lookup(element)?.send_keys(text).await.map_err(driver_err)
    }

    async fn text(&self, element: &ElementHandle) -> FlowResult<String> {
        self.lookup(element)?.text().await.map_err(driver_err)
    }

    async fn is_displayed(&self, element: &ElementHandle) -> FlowResult<bool> {
        self.lookup(element)?.is_displayed().await.map_err(driver_err)
    }

    async fn window_handles(&self) -> FlowResult<Vec<WindowHandle>> {
        let windows = self.driver.windows().await.map_err(driver_err)?;
        Ok(windows.into_iter().map(|w| WindowHandle::new(w.to_string())).collect())
    }

    async fn current_window(&self) -> FlowResult<WindowHandle> {
        let window = self.driver.window().await.map_err(driver_err)?;
        Ok(WindowHandle::new(window.to_string()))
    }

    async fn switch_to_window(&self, window: &WindowHandle) -> FlowResult<()> {
        self.forget_elements();
        self.driver
            .switch_to_window(thirtyfour::WindowHandle::from(window.id().to_string()))
            .await
            .map_err(driver_err)
    }

    async fn close(&self) -> FlowResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        info!("Closing browser session");
        self.forget_elements();
        self.driver.clone().quit().await.map_err(driver_err)
    }
}
