//! Browser driver interface
//!
//! Steps never talk to a concrete browser client. They receive a `&dyn Driver`
//! for the live session; `flowcheck-webdriver` implements it over WebDriver and
//! `mock::MockDriver` implements it in memory.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::error::{FlowError, FlowResult};
use crate::locator::Locator;

/// Opaque reference to an element found in the current page
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementHandle(String);

impl ElementHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn id(&self) -> &str {
        &self.0
    }
}

/// Opaque reference to a browser window or tab
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WindowHandle(String);

impl WindowHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn id(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WindowHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A live browser session
#[async_trait]
pub trait Driver: Send + Sync {
    async fn navigate(&self, url: &str) -> FlowResult<()>;

    async fn refresh(&self) -> FlowResult<()>;

    async fn current_url(&self) -> FlowResult<String>;

    async fn maximize_window(&self) -> FlowResult<()>;

    /// Server-side implicit wait applied to every element lookup
    async fn set_implicit_wait(&self, timeout: Duration) -> FlowResult<()>;

    /// All elements matching `locator`; empty when nothing matches
    async fn find_elements(&self, locator: &Locator) -> FlowResult<Vec<ElementHandle>>;

    /// First element matching `locator`
    async fn find_element(&self, locator: &Locator) -> FlowResult<ElementHandle> {
        self.find_elements(locator)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| FlowError::NotFound(locator.clone()))
    }

    async fn click(&self, element: &ElementHandle) -> FlowResult<()>;

    async fn send_keys(&self, element: &ElementHandle, text: &str) -> FlowResult<()>;

    async fn text(&self, element: &ElementHandle) -> FlowResult<String>;

    async fn is_displayed(&self, element: &ElementHandle) -> FlowResult<bool>;

    async fn window_handles(&self) -> FlowResult<Vec<WindowHandle>>;

    async fn current_window(&self) -> FlowResult<WindowHandle>;

    async fn switch_to_window(&self, window: &WindowHandle) -> FlowResult<()>;

    /// End the session. Calls after the first are no-ops.
    async fn close(&self) -> FlowResult<()>;
}

/// W3C WebDriver key code points for `send_keys`
pub mod keys {
    pub const NULL: char = '\u{E000}';
    pub const TAB: char = '\u{E004}';
    pub const RETURN: char = '\u{E006}';
    pub const ENTER: char = '\u{E007}';
    pub const SHIFT: char = '\u{E008}';
    pub const CONTROL: char = '\u{E009}';
    pub const ALT: char = '\u{E00A}';
    pub const ESCAPE: char = '\u{E00C}';
    pub const COMMAND: char = '\u{E03D}';

    /// Press `keys` together; the trailing NULL releases held modifiers.
    pub fn chord(keys: &[char]) -> String {
        let mut out: String = keys.iter().collect();
        out.push(NULL);
        out
    }

    /// Resolve a key name as written in flow files (`control`, `return`, ...).
    /// Single characters map to themselves.
    pub fn from_name(name: &str) -> Option<char> {
        let key = match name.to_ascii_lowercase().as_str() {
            "tab" => TAB,
            "return" => RETURN,
            "enter" => ENTER,
            "shift" => SHIFT,
            "control" | "ctrl" => CONTROL,
            "alt" => ALT,
            "escape" | "esc" => ESCAPE,
            "command" | "cmd" | "meta" => COMMAND,
            _ => {
                let mut chars = name.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => c,
                    _ => return None,
                }
            }
        };
        Some(key)
    }
}
