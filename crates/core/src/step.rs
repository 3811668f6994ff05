//! Steps and flows

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::assertions::AssertionCollector;
use crate::driver::{Driver, ElementHandle};
use crate::error::{FlowError, FlowResult};
use crate::locator::Locator;
use crate::waiter::{Condition, ElementWaiter};

/// The body of a step
#[async_trait]
pub trait StepAction: Send + Sync {
    async fn run(&self, driver: &dyn Driver, ctx: &mut StepContext) -> FlowResult<()>;
}

/// State handed to a step while it runs
pub struct StepContext {
    step: String,
    waiter: ElementWaiter,
    assertions: AssertionCollector,
}

impl StepContext {
    pub fn new(step: impl Into<String>, waiter: ElementWaiter) -> Self {
        Self {
            step: step.into(),
            waiter,
            assertions: AssertionCollector::new(),
        }
    }

    pub fn step_name(&self) -> &str {
        &self.step
    }

    pub fn waiter(&self) -> &ElementWaiter {
        &self.waiter
    }

    pub fn assertions(&mut self) -> &mut AssertionCollector {
        &mut self.assertions
    }

    pub fn into_assertions(self) -> AssertionCollector {
        self.assertions
    }

    /// First visible element for `locator`
    pub async fn element(&self, driver: &dyn Driver, locator: &Locator) -> FlowResult<ElementHandle> {
        self.waiter
            .wait_for_element(driver, locator, Condition::Visible)
            .await
    }

    pub async fn click(&self, driver: &dyn Driver, locator: &Locator) -> FlowResult<()> {
        let element = self.element(driver, locator).await?;
        driver.click(&element).await
    }

    pub async fn type_text(&self, driver: &dyn Driver, locator: &Locator, text: &str) -> FlowResult<()> {
        let element = self.element(driver, locator).await?;
        driver.send_keys(&element, text).await
    }

    pub async fn text_of(&self, driver: &dyn Driver, locator: &Locator) -> FlowResult<String> {
        let element = self.element(driver, locator).await?;
        driver.text(&element).await
    }
}

/// One named, prioritized action in a flow
#[derive(Clone)]
pub struct Step {
    name: String,
    priority: i32,
    enabled: bool,
    fatal: bool,
    requires: Vec<String>,
    timeout: Option<Duration>,
    action: Arc<dyn StepAction>,
}

impl Step {
    pub fn new(name: impl Into<String>, priority: i32, action: impl StepAction + 'static) -> Self {
        Self::from_arc(name, priority, Arc::new(action))
    }

    pub fn from_arc(name: impl Into<String>, priority: i32, action: Arc<dyn StepAction>) -> Self {
        Self {
            name: name.into(),
            priority,
            enabled: true,
            fatal: false,
            requires: Vec::new(),
            timeout: None,
            action,
        }
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn disabled(self) -> Self {
        self.enabled(false)
    }

    /// A failure of this step aborts the run
    pub fn fatal(mut self) -> Self {
        self.fatal = true;
        self
    }

    /// Run only if `step` passed earlier in the flow
    pub fn requires(mut self, step: impl Into<String>) -> Self {
        self.requires.push(step.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_fatal(&self) -> bool {
        self.fatal
    }

    pub fn requirements(&self) -> &[String] {
        &self.requires
    }

    pub fn step_timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn action(&self) -> &Arc<dyn StepAction> {
        &self.action
    }
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Step")
            .field("name", &self.name)
            .field("priority", &self.priority)
            .field("enabled", &self.enabled)
            .field("fatal", &self.fatal)
            .field("requires", &self.requires)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// A validated, priority-ordered list of steps
#[derive(Debug, Clone)]
pub struct Flow {
    name: String,
    steps: Vec<Step>,
}

impl Flow {
    /// Order `steps` by priority.
    ///
    /// Fails when the flow name is empty or holds a path separator (it names
    /// the report file), when two steps share a priority or a name, or when
    /// a step requires a step that does not exist or does not run before it.
    pub fn new(name: impl Into<String>, mut steps: Vec<Step>) -> FlowResult<Self> {
        let name = name.into();
        if name.trim().is_empty() || name.contains(['/', '\\']) {
            return Err(FlowError::Configuration(format!(
                "invalid flow name '{}': must be non-empty and contain no path separators",
                name
            )));
        }

        let mut priorities: HashMap<i32, &str> = HashMap::new();
        let mut names = HashSet::new();
        for step in &steps {
            if step.name.trim().is_empty() {
                return Err(FlowError::Configuration(format!(
                    "step with priority {} has an empty name",
                    step.priority
                )));
            }
            if let Some(other) = priorities.insert(step.priority, &step.name) {
                return Err(FlowError::Configuration(format!(
                    "steps '{}' and '{}' share priority {}",
                    other, step.name, step.priority
                )));
            }
            if !names.insert(step.name.as_str()) {
                return Err(FlowError::Configuration(format!("duplicate step name '{}'", step.name)));
            }
        }

        let by_name: HashMap<&str, i32> = steps.iter().map(|s| (s.name.as_str(), s.priority)).collect();
        for step in &steps {
            for required in &step.requires {
                match by_name.get(required.as_str()) {
                    None => {
                        return Err(FlowError::Configuration(format!(
                            "step '{}' requires missing step '{}'",
                            step.name, required
                        )))
                    }
                    Some(p) if *p >= step.priority => {
                        return Err(FlowError::Configuration(format!(
                            "step '{}' requires '{}', which does not run before it",
                            step.name, required
                        )))
                    }
                    Some(_) => {}
                }
            }
        }

        steps.sort_by_key(|s| s.priority);
        Ok(Self { name, steps })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn step(&self, name: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Noop;

    #[async_trait]
    impl StepAction for Noop {
        async fn run(&self, _driver: &dyn Driver, _ctx: &mut StepContext) -> FlowResult<()> {
            Ok(())
        }
    }

    #[test]
    fn test_orders_by_priority() {
        let flow = Flow::new(
            "shop",
            vec![
                Step::new("checkout", 4, Noop),
                Step::new("login", 1, Noop),
                Step::new("add_item", 2, Noop),
            ],
        )
        .unwrap();

        let names: Vec<&str> = flow.steps().iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["login", "add_item", "checkout"]);
    }

    #[test]
    fn test_duplicate_priority_rejected() {
        let err = Flow::new("shop", vec![Step::new("a", 1, Noop), Step::new("b", 1, Noop)]).unwrap_err();
        assert!(matches!(err, FlowError::Configuration(ref m) if m.contains("share priority 1")));
    }

    #[test]
    fn test_flow_name_must_be_a_plain_name() {
        for name in ["", "  ", "../escaped", "nested/flow", "c:\\flows\\x"] {
            let err = Flow::new(name, vec![Step::new("a", 1, Noop)]).unwrap_err();
            assert!(matches!(err, FlowError::Configuration(ref m) if m.contains("invalid flow name")), "{:?}", name);
        }
        assert!(Flow::new("saucedemo-smoke", vec![Step::new("a", 1, Noop)]).is_ok());
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let err = Flow::new("shop", vec![Step::new("a", 1, Noop), Step::new("a", 2, Noop)]).unwrap_err();
        assert!(matches!(err, FlowError::Configuration(_)));
    }

    #[test]
    fn test_requirements_validated() {
        let missing = Flow::new("shop", vec![Step::new("reset", 8, Noop).requires("add_item")]);
        assert!(matches!(missing, Err(FlowError::Configuration(ref m)) if m.contains("missing step")));

        let later = Flow::new(
            "shop",
            vec![Step::new("reset", 1, Noop).requires("add_item"), Step::new("add_item", 2, Noop)],
        );
        assert!(matches!(later, Err(FlowError::Configuration(_))));

        let ok = Flow::new(
            "shop",
            vec![Step::new("add_item", 2, Noop), Step::new("reset", 8, Noop).requires("add_item")],
        );
        assert!(ok.is_ok());
    }

    #[test]
    fn test_builder_flags() {
        let step = Step::new("without_items", 5, Noop).disabled().fatal();
        assert!(!step.is_enabled());
        assert!(step.is_fatal());
        assert!(format!("{:?}", step).contains("without_items"));
    }
}
