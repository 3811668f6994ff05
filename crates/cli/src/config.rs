//! Harness configuration (`flowcheck.toml`)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use flowcheck_core::{keys, RunnerConfig};
use flowcheck_webdriver::{Browser, DriverProcessConfig, SessionConfig};

/// Default config file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "flowcheck.toml";

/// Top-level harness configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Site under test and credentials
    pub target: TargetConfig,

    /// Details typed into the checkout form
    pub checkout: CheckoutConfig,

    /// Browser session settings
    pub browser: BrowserConfig,

    /// Wait and timeout bounds
    pub waits: WaitConfig,

    /// Report output
    pub output: OutputConfig,

    /// Extra `${name}` values for YAML flows
    pub vars: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    pub base_url: String,
    pub username: String,
    pub password: String,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.saucedemo.com/".to_string(),
            username: "standard_user".to_string(),
            password: "secret_sauce".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckoutConfig {
    pub first_name: String,
    pub last_name: String,
    pub postal_code: String,

    /// Inventory button to click; a random one when unset
    pub item_index: Option<usize>,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            first_name: "Baraa".to_string(),
            last_name: "Hussien".to_string(),
            postal_code: "12345".to_string(),
            item_index: None,
        }
    }
}

/// Modifier held while pressing RETURN on a link to open it in a new tab
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TabModifier {
    #[default]
    Command,
    Control,
}

impl TabModifier {
    pub fn key(&self) -> char {
        match self {
            TabModifier::Command => keys::COMMAND,
            TabModifier::Control => keys::CONTROL,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// WebDriver endpoint; ignored when `driver_binary` is set
    pub webdriver_url: String,

    pub kind: Browser,

    pub headless: bool,

    /// Maximize the window during session setup
    pub maximize: bool,

    /// Server-side implicit wait in milliseconds; zero leaves all waiting
    /// to the harness
    pub implicit_wait_ms: u64,

    pub new_tab_modifier: TabModifier,

    /// Spawn and manage this driver binary instead of using `webdriver_url`
    pub driver_binary: Option<PathBuf>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            webdriver_url: "http://127.0.0.1:4444".to_string(),
            kind: Browser::Chrome,
            headless: false,
            maximize: true,
            implicit_wait_ms: 0,
            new_tab_modifier: TabModifier::default(),
            driver_binary: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WaitConfig {
    pub timeout_ms: u64,
    pub poll_interval_ms: u64,
    pub step_timeout_ms: Option<u64>,
    pub run_timeout_ms: Option<u64>,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            poll_interval_ms: 250,
            step_timeout_ms: Some(60_000),
            run_timeout_ms: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("test-results"),
        }
    }
}

impl HarnessConfig {
    /// Load from `path`, or defaults when the file does not exist
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Invalid config {}", path.display()))?;

        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Apply `FLOWCHECK_*` overrides from the process environment
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(v) = lookup("FLOWCHECK_BASE_URL") {
            self.target.base_url = v;
        }
        if let Some(v) = lookup("FLOWCHECK_USERNAME") {
            self.target.username = v;
        }
        if let Some(v) = lookup("FLOWCHECK_PASSWORD") {
            self.target.password = v;
        }
        if let Some(v) = lookup("FLOWCHECK_WEBDRIVER_URL") {
            self.browser.webdriver_url = v;
        }
        if let Some(v) = lookup("FLOWCHECK_HEADLESS") {
            self.browser.headless = parse_bool(&v)
                .with_context(|| format!("FLOWCHECK_HEADLESS: expected a boolean, got '{}'", v))?;
        }
        Ok(())
    }

    pub fn runner_config(&self) -> RunnerConfig {
        RunnerConfig {
            start_url: Some(self.target.base_url.clone()),
            maximize_window: self.browser.maximize,
            implicit_wait: (self.browser.implicit_wait_ms > 0)
                .then(|| Duration::from_millis(self.browser.implicit_wait_ms)),
            wait_timeout: Duration::from_millis(self.waits.timeout_ms),
            poll_interval: Duration::from_millis(self.waits.poll_interval_ms),
            step_timeout: self.waits.step_timeout_ms.map(Duration::from_millis),
            run_timeout: self.waits.run_timeout_ms.map(Duration::from_millis),
        }
    }

    /// Session settings, pointed at `server_url`
    pub fn session_config(&self, server_url: &str) -> SessionConfig {
        SessionConfig {
            server_url: server_url.to_string(),
            browser: self.browser.kind,
            headless: self.browser.headless,
        }
    }

    /// Managed driver settings, when `browser.driver_binary` is set
    pub fn driver_process(&self) -> Option<DriverProcessConfig> {
        self.browser.driver_binary.as_ref().map(|binary| DriverProcessConfig {
            binary_path: binary.clone(),
            ..Default::default()
        })
    }

    /// Variables visible to `${name}` in YAML flows
    pub fn flow_vars(&self) -> HashMap<String, String> {
        let mut vars: HashMap<String, String> = self
            .vars
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        vars.insert("base_url".to_string(), self.target.base_url.clone());
        vars.insert("username".to_string(), self.target.username.clone());
        vars.insert("password".to_string(), self.target.password.clone());
        vars
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
