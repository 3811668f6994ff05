//! Declarative YAML flow files

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::driver::{keys, Driver};
use crate::error::{FlowError, FlowResult};
use crate::locator::Locator;
use crate::step::{Flow, Step, StepAction, StepContext};
use crate::waiter::{Condition, ElementWaiter};

static VAR_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid variable pattern"));

/// A complete flow parsed from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowSpec {
    /// Unique name for this flow
    pub name: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Tags for filtering flows
    #[serde(default)]
    pub tags: Vec<String>,

    /// Navigated to before the first step
    #[serde(default)]
    pub start_url: Option<String>,

    /// Steps; executed in priority order, not file order
    pub steps: Vec<StepSpec>,
}

/// A single step in a flow file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepSpec {
    pub name: String,

    pub priority: i32,

    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(default)]
    pub fatal: bool,

    #[serde(default)]
    pub requires: Vec<String>,

    #[serde(default)]
    pub timeout_ms: Option<u64>,

    pub actions: Vec<ActionSpec>,
}

fn default_enabled() -> bool {
    true
}

/// One driver interaction inside a step
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ActionSpec {
    /// Load a URL in the current window
    Navigate { url: String },

    /// Reload the current page
    Refresh,

    /// Click the first visible match
    Click {
        locator: Locator,
        #[serde(default)]
        timeout_ms: Option<u64>,
    },

    /// Type text into the first visible match
    Type { locator: Locator, text: String },

    /// Press keys together on an element, e.g. `[control, return]`
    Press { locator: Locator, keys: Vec<String> },

    /// Wait for a condition on a locator
    Wait {
        locator: Locator,
        #[serde(default)]
        condition: Condition,
        #[serde(default)]
        timeout_ms: Option<u64>,
    },

    /// Compare the text of the first visible match
    AssertText {
        locator: Locator,
        #[serde(default)]
        equals: Option<String>,
        #[serde(default)]
        contains: Option<String>,
    },

    /// Expect a visible match
    AssertVisible { locator: Locator },

    /// Expect at least `at_least` matches
    AssertCount { locator: Locator, at_least: usize },

    /// Expect the current URL to contain a fragment
    AssertUrl { contains: String },

    /// Switch to the window at `index` in handle order
    SwitchWindow { index: usize },

    /// Log a message
    Log { message: String },
}

impl ActionSpec {
    fn interpolate(&self, vars: &HashMap<String, String>) -> FlowResult<Self> {
        let s = |value: &str| interpolate(value, vars);
        let action = match self {
            ActionSpec::Navigate { url } => ActionSpec::Navigate { url: s(url)? },
            ActionSpec::Type { locator, text } => ActionSpec::Type {
                locator: locator.clone(),
                text: s(text)?,
            },
            ActionSpec::AssertText { locator, equals, contains } => ActionSpec::AssertText {
                locator: locator.clone(),
                equals: equals.as_deref().map(s).transpose()?,
                contains: contains.as_deref().map(s).transpose()?,
            },
            ActionSpec::AssertUrl { contains } => ActionSpec::AssertUrl { contains: s(contains)? },
            ActionSpec::Log { message } => ActionSpec::Log { message: s(message)? },
            ActionSpec::Press { locator, keys: names } => {
                // reject unknown key names when the flow is built, not mid-run
                for name in names {
                    if keys::from_name(name).is_none() {
                        return Err(FlowError::Configuration(format!("unknown key '{}'", name)));
                    }
                }
                ActionSpec::Press {
                    locator: locator.clone(),
                    keys: names.clone(),
                }
            }
            other => other.clone(),
        };
        Ok(action)
    }

    async fn execute(&self, driver: &dyn Driver, ctx: &mut StepContext) -> FlowResult<()> {
        match self {
            ActionSpec::Navigate { url } => driver.navigate(url).await,
            ActionSpec::Refresh => driver.refresh().await,
            ActionSpec::Click { locator, timeout_ms } => {
                let waiter = bounded(ctx, *timeout_ms);
                let element = waiter.wait_for_element(driver, locator, Condition::Visible).await?;
                driver.click(&element).await
            }
            ActionSpec::Type { locator, text } => ctx.type_text(driver, locator, text).await,
            ActionSpec::Press { locator, keys: names } => {
                let chord: Vec<char> = names.iter().filter_map(|n| keys::from_name(n)).collect();
                let element = ctx.element(driver, locator).await?;
                driver.send_keys(&element, &keys::chord(&chord)).await
            }
            ActionSpec::Wait { locator, condition, timeout_ms } => {
                bounded(ctx, *timeout_ms).wait_for(driver, locator, *condition).await?;
                Ok(())
            }
            ActionSpec::AssertText { locator, equals, contains } => {
                let text = ctx.text_of(driver, locator).await?;
                let label = format!("text of {}", locator);
                if let Some(expected) = equals {
                    ctx.assertions().expect_equal(text.as_str(), expected.as_str(), &label)?;
                }
                if let Some(fragment) = contains {
                    let holds = text.contains(fragment.as_str());
                    ctx.assertions()
                        .expect_true(holds, &format!("{} contains {:?} (was {:?})", label, fragment, text))?;
                }
                Ok(())
            }
            ActionSpec::AssertVisible { locator } => {
                // only "never became visible" is an assertion; driver failures propagate
                let visible = match ctx.waiter().wait_for(driver, locator, Condition::Visible).await {
                    Ok(_) => true,
                    Err(FlowError::ElementNotReady { .. }) => false,
                    Err(e) => return Err(e),
                };
                ctx.assertions()
                    .expect_true(visible, &format!("{} is visible", locator))
            }
            ActionSpec::AssertCount { locator, at_least } => {
                let condition = Condition::CountAtLeast(*at_least);
                let found = match ctx.waiter().wait_for(driver, locator, condition).await {
                    Ok(elements) => elements.len(),
                    Err(FlowError::ElementNotReady { .. }) => driver.find_elements(locator).await?.len(),
                    Err(e) => return Err(e),
                };
                ctx.assertions().expect_true(
                    found >= *at_least,
                    &format!("{} matches at least {} (found {})", locator, at_least, found),
                )
            }
            ActionSpec::AssertUrl { contains } => {
                let url = driver.current_url().await?;
                ctx.assertions()
                    .expect_true(url.contains(contains.as_str()), &format!("url {:?} contains {:?}", url, contains))
            }
            ActionSpec::SwitchWindow { index } => {
                let index = *index;
                let handles = ctx
                    .waiter()
                    .until(&format!("window #{}", index), move || async move {
                        let handles = driver.window_handles().await?;
                        Ok((handles.len() > index).then_some(handles))
                    })
                    .await?;
                driver.switch_to_window(&handles[index]).await
            }
            ActionSpec::Log { message } => {
                info!("[FLOW LOG] {}", message);
                Ok(())
            }
        }
    }
}

fn bounded(ctx: &StepContext, timeout_ms: Option<u64>) -> ElementWaiter {
    match timeout_ms {
        Some(ms) => ctx.waiter().with_timeout(Duration::from_millis(ms)),
        None => *ctx.waiter(),
    }
}

/// Replace `${name}` with values from `vars`
pub fn interpolate(value: &str, vars: &HashMap<String, String>) -> FlowResult<String> {
    if let Some(missing) = VAR_PATTERN
        .captures_iter(value)
        .map(|c| c[1].to_string())
        .find(|name| !vars.contains_key(name))
    {
        return Err(FlowError::Configuration(format!("undefined variable '{}'", missing)));
    }

    Ok(VAR_PATTERN
        .replace_all(value, |c: &regex::Captures| vars[&c[1]].clone())
        .into_owned())
}

/// Runs a step's actions in order
struct ScriptedAction {
    actions: Vec<ActionSpec>,
}

#[async_trait]
impl StepAction for ScriptedAction {
    async fn run(&self, driver: &dyn Driver, ctx: &mut StepContext) -> FlowResult<()> {
        for action in &self.actions {
            debug!("{}: {:?}", ctx.step_name(), action);
            action.execute(driver, ctx).await?;
        }
        Ok(())
    }
}

impl FlowSpec {
    /// Parse a flow spec from YAML string
    pub fn from_yaml(yaml: &str) -> FlowResult<Self> {
        serde_yaml::from_str(yaml).map_err(FlowError::from)
    }

    /// Parse a flow spec from a YAML file
    pub fn from_file(path: &Path) -> FlowResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
            .map_err(|e| FlowError::SpecParse(format!("{}: {}", path.display(), e)))
    }

    /// Load all flow specs from a file or, recursively, a directory
    pub fn load_all(path: &Path) -> FlowResult<Vec<Self>> {
        if path.is_file() {
            return Ok(vec![Self::from_file(path)?]);
        }

        let mut specs = Vec::new();

        for entry in walkdir::WalkDir::new(path)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.path()
                    .extension()
                    .map(|ext| ext == "yaml" || ext == "yml")
                    .unwrap_or(false)
            })
        {
            specs.push(Self::from_file(entry.path())?);
        }

        Ok(specs)
    }

    /// Filter specs by tag
    pub fn filter_by_tag<'a>(specs: &'a [Self], tag: &str) -> Vec<&'a Self> {
        specs.iter().filter(|s| s.tags.iter().any(|t| t == tag)).collect()
    }

    /// Start URL with variables substituted
    pub fn resolved_start_url(&self, vars: &HashMap<String, String>) -> FlowResult<Option<String>> {
        self.start_url.as_deref().map(|u| interpolate(u, vars)).transpose()
    }

    /// Build a runnable flow, substituting `${var}` references from `vars`
    pub fn to_flow(&self, vars: &HashMap<String, String>) -> FlowResult<Flow> {
        let mut steps = Vec::with_capacity(self.steps.len());

        for spec in &self.steps {
            let actions = spec
                .actions
                .iter()
                .map(|a| a.interpolate(vars))
                .collect::<FlowResult<Vec<_>>>()?;

            let mut step = Step::from_arc(spec.name.clone(), spec.priority, Arc::new(ScriptedAction { actions }))
                .enabled(spec.enabled);
            if spec.fatal {
                step = step.fatal();
            }
            for required in &spec.requires {
                step = step.requires(required.clone());
            }
            if let Some(ms) = spec.timeout_ms {
                step = step.timeout(Duration::from_millis(ms));
            }
            steps.push(step);
        }

        Flow::new(self.name.clone(), steps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockDriver, MockElement};
    use crate::report::StepStatus;
    use crate::runner::{FlowRunner, RunnerConfig};

    const CHECKOUT_FLOW: &str = r#"
name: checkout-smoke
description: Log in and buy one item
tags:
  - smoke
start_url: ${base_url}
steps:
  - name: login
    priority: 1
    fatal: true
    actions:
      - action: type
        locator: { id: user-name }
        text: ${username}
      - action: click
        locator: { id: login-button }
  - name: checkout
    priority: 2
    actions:
      - action: wait
        locator: { class_name: complete-header }
        condition: present
      - action: assert_text
        locator: { class_name: complete-header }
        equals: Thank you for your order!
  - name: without_items
    priority: 3
    enabled: false
    actions:
      - action: assert_count
        locator: { id: error-message-container }
        at_least: 1
"#;

    fn vars() -> HashMap<String, String> {
        HashMap::from([
            ("base_url".to_string(), "https://www.saucedemo.com/".to_string()),
            ("username".to_string(), "standard_user".to_string()),
        ])
    }

    #[test]
    fn test_parse_flow_spec() {
        let spec = FlowSpec::from_yaml(CHECKOUT_FLOW).unwrap();
        assert_eq!(spec.name, "checkout-smoke");
        assert_eq!(spec.steps.len(), 3);
        assert!(!spec.steps[2].enabled);
        assert!(matches!(
            spec.steps[1].actions[0],
            ActionSpec::Wait { condition: Condition::Present, .. }
        ));
    }

    #[test]
    fn test_interpolation() {
        assert_eq!(interpolate("${username}!", &vars()).unwrap(), "standard_user!");
        assert!(matches!(interpolate("${password}", &vars()), Err(FlowError::Configuration(_))));
        assert_eq!(interpolate("no vars", &vars()).unwrap(), "no vars");
    }

    #[test]
    fn test_to_flow_rejects_unknown_variable() {
        let spec = FlowSpec::from_yaml(CHECKOUT_FLOW).unwrap();
        assert!(spec.to_flow(&HashMap::new()).is_err());
    }

    #[test]
    fn test_unknown_key_rejected() {
        let yaml = r#"
name: keys
steps:
  - name: open
    priority: 1
    actions:
      - action: press
        locator: { id: about_sidebar_link }
        keys: [hyper, return]
"#;
        let spec = FlowSpec::from_yaml(yaml).unwrap();
        assert!(matches!(spec.to_flow(&HashMap::new()), Err(FlowError::Configuration(_))));
    }

    #[test]
    fn test_load_all_and_filter() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("checkout.yaml"), CHECKOUT_FLOW).unwrap();
        std::fs::write(
            dir.path().join("menu.yml"),
            "name: menu\ntags: [nav]\nsteps: []\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let specs = FlowSpec::load_all(dir.path()).unwrap();
        assert_eq!(specs.len(), 2);
        assert_eq!(FlowSpec::filter_by_tag(&specs, "smoke").len(), 1);
    }

    #[tokio::test]
    async fn test_scripted_flow_runs_against_mock() {
        let spec = FlowSpec::from_yaml(CHECKOUT_FLOW).unwrap();
        let flow = spec.to_flow(&vars()).unwrap();

        let driver = MockDriver::new()
            .with_element(Locator::id("user-name"), MockElement::new(""))
            .with_element(Locator::id("login-button"), MockElement::new("Login"))
            .with_element(Locator::class("complete-header"), MockElement::new("Thank you!"));

        let runner = FlowRunner::new(RunnerConfig {
            start_url: spec.resolved_start_url(&vars()).unwrap(),
            wait_timeout: Duration::from_millis(100),
            poll_interval: Duration::from_millis(10),
            ..Default::default()
        });
        let report = runner.run(&flow, driver.clone()).await;

        assert_eq!(
            report.statuses(),
            vec![StepStatus::Passed, StepStatus::Failed, StepStatus::Skipped]
        );
        let msg = report.steps[1].message.as_deref().unwrap();
        assert!(msg.contains("Thank you!"));
        assert!(msg.contains("Thank you for your order!"));
        assert_eq!(driver.journal()[0], "navigate https://www.saucedemo.com/");
        assert!(driver.journal().contains(&"send_keys id=user-name standard_user".to_string()));
    }

    const NAVIGATION_FLOW: &str = r#"
name: navigation
start_url: ${base_url}
steps:
  - name: browse
    priority: 1
    actions:
      - action: navigate
        url: ${base_url}inventory.html
      - action: refresh
      - action: assert_url
        contains: inventory.html
  - name: about_tab
    priority: 2
    actions:
      - action: press
        locator: { id: about_sidebar_link }
        keys: [control, return]
      - action: switch_window
        index: 1
      - action: assert_url
        contains: saucelabs
      - action: switch_window
        index: 0
      - action: log
        message: back on ${username}'s inventory
"#;

    #[tokio::test]
    async fn test_navigation_actions() {
        let spec = FlowSpec::from_yaml(NAVIGATION_FLOW).unwrap();
        let flow = spec.to_flow(&vars()).unwrap();
        let driver = MockDriver::new()
            .with_window("https://saucelabs.com/")
            .with_element(Locator::id("about_sidebar_link"), MockElement::new("About"));

        let runner = FlowRunner::new(RunnerConfig {
            start_url: spec.resolved_start_url(&vars()).unwrap(),
            wait_timeout: Duration::from_millis(100),
            poll_interval: Duration::from_millis(10),
            ..Default::default()
        });
        let report = runner.run(&flow, driver.clone()).await;

        assert_eq!(report.statuses(), vec![StepStatus::Passed, StepStatus::Passed]);
        let journal = driver.journal();
        assert_eq!(
            &journal[..3],
            [
                "navigate https://www.saucedemo.com/",
                "navigate https://www.saucedemo.com/inventory.html",
                "refresh",
            ]
        );
        assert_eq!(driver.count_calls("send_keys id=about_sidebar_link"), 1);
        assert_eq!(
            &journal[4..6],
            ["switch_to_window window-1", "switch_to_window window-0"]
        );
    }

    #[tokio::test]
    async fn test_switch_window_waits_for_tab() {
        let flow = FlowSpec::from_yaml(NAVIGATION_FLOW).unwrap().to_flow(&vars()).unwrap();
        // the link never opens a second window
        let driver = MockDriver::new().with_element(Locator::id("about_sidebar_link"), MockElement::new("About"));

        let report = FlowRunner::new(RunnerConfig {
            wait_timeout: Duration::from_millis(50),
            poll_interval: Duration::from_millis(10),
            ..Default::default()
        })
        .run(&flow, driver)
        .await;

        let about = &report.steps[1];
        assert_eq!(about.status, StepStatus::Failed);
        assert!(about.message.as_deref().unwrap().contains("window #1"));
    }

    const ASSERTIONS_FLOW: &str = r#"
name: inventory-checks
steps:
  - name: inventory
    priority: 1
    actions:
      - action: assert_visible
        locator: { class_name: inventory_list }
      - action: assert_count
        locator: { css: .btn_inventory }
        at_least: 6
"#;

    fn assertions_runner() -> FlowRunner {
        FlowRunner::new(RunnerConfig {
            wait_timeout: Duration::from_millis(200),
            poll_interval: Duration::from_millis(10),
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn test_assert_count_waits_for_late_elements() {
        let flow = FlowSpec::from_yaml(ASSERTIONS_FLOW).unwrap().to_flow(&vars()).unwrap();
        let mut driver = MockDriver::new().with_element(Locator::class("inventory_list"), MockElement::new(""));
        for _ in 0..6 {
            driver = driver.with_element(
                Locator::css(".btn_inventory"),
                MockElement::new("Add to cart").appearing_after(Duration::from_millis(50)),
            );
        }

        let report = assertions_runner().run(&flow, driver).await;

        assert_eq!(report.statuses(), vec![StepStatus::Passed]);
        assert_eq!(report.steps[0].assertions.len(), 2);
    }

    #[tokio::test]
    async fn test_assert_count_reports_found_count() {
        let flow = FlowSpec::from_yaml(ASSERTIONS_FLOW).unwrap().to_flow(&vars()).unwrap();
        let driver = MockDriver::new()
            .with_element(Locator::class("inventory_list"), MockElement::new(""))
            .with_elements(Locator::css(".btn_inventory"), 2);

        let report = assertions_runner().run(&flow, driver).await;

        let msg = report.steps[0].message.as_deref().unwrap();
        assert_eq!(report.steps[0].status, StepStatus::Failed);
        assert!(msg.contains("at least 6 (found 2)"), "{}", msg);
    }

    #[tokio::test]
    async fn test_hidden_element_fails_assert_visible() {
        let flow = FlowSpec::from_yaml(ASSERTIONS_FLOW).unwrap().to_flow(&vars()).unwrap();
        let driver = MockDriver::new().with_element(Locator::class("inventory_list"), MockElement::new("").hidden());

        let report = assertions_runner().run(&flow, driver).await;

        let step = &report.steps[0];
        assert_eq!(step.status, StepStatus::Failed);
        assert!(step.message.as_deref().unwrap().contains("class=inventory_list is visible"));
        assert_eq!(step.assertions.len(), 1);
        assert!(!step.assertions[0].passed);
    }

    #[tokio::test]
    async fn test_driver_failure_is_not_an_assertion() {
        let flow = FlowSpec::from_yaml(ASSERTIONS_FLOW).unwrap().to_flow(&vars()).unwrap();
        let driver = MockDriver::new().with_element(Locator::class("inventory_list"), MockElement::new(""));
        driver.close().await.unwrap();

        let report = assertions_runner().run(&flow, driver).await;

        let step = &report.steps[0];
        assert_eq!(step.status, StepStatus::Failed);
        assert!(step.message.as_deref().unwrap().contains("session closed"));
        // surfaced as the driver error, not recorded as a failed expectation
        assert!(step.assertions.is_empty());
    }
}
