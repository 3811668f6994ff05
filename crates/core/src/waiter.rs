//! Condition-based waits
//!
//! Fixed sleeps break as soon as page load latency changes. Every wait in a
//! flow goes through `ElementWaiter`, which polls the driver until a
//! condition holds and gives up after a bounded timeout.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::time::{sleep, timeout};
use tracing::debug;

use crate::driver::{Driver, ElementHandle};
use crate::error::{FlowError, FlowResult};
use crate::locator::Locator;

/// What must hold for a locator before a wait succeeds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    /// At least one element is attached to the page
    Present,
    /// At least one matching element is displayed
    #[default]
    Visible,
    /// At least `n` elements are attached
    CountAtLeast(usize),
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Present => f.write_str("present"),
            Condition::Visible => f.write_str("visible"),
            Condition::CountAtLeast(n) => write!(f, "at least {} present", n),
        }
    }
}

/// Polls the driver until a condition holds or the timeout elapses
#[derive(Debug, Clone, Copy)]
pub struct ElementWaiter {
    timeout: Duration,
    poll_interval: Duration,
}

impl Default for ElementWaiter {
    fn default() -> Self {
        Self::new(Self::DEFAULT_TIMEOUT, Self::DEFAULT_POLL_INTERVAL)
    }
}

impl ElementWaiter {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

    pub fn new(timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            timeout,
            // a zero interval would spin the driver
            poll_interval: poll_interval.max(Duration::from_millis(1)),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Same polling interval, different bound
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        Self::new(timeout, self.poll_interval)
    }

    /// Wait until `condition` holds for `locator`.
    ///
    /// Returns the elements that satisfied the condition: all matches for
    /// `Present` and `CountAtLeast`, only the displayed ones for `Visible`.
    pub async fn wait_for(
        &self,
        driver: &dyn Driver,
        locator: &Locator,
        condition: Condition,
    ) -> FlowResult<Vec<ElementHandle>> {
        let result = self
            .until(&format!("{} {}", locator, condition), move || {
                check_condition(driver, locator, condition)
            })
            .await;

        match result {
            Err(FlowError::Timeout { waited_ms, .. }) => Err(FlowError::ElementNotReady {
                locator: locator.clone(),
                condition,
                waited_ms,
            }),
            other => other,
        }
    }

    /// Wait for the first element satisfying `condition`
    pub async fn wait_for_element(
        &self,
        driver: &dyn Driver,
        locator: &Locator,
        condition: Condition,
    ) -> FlowResult<ElementHandle> {
        self.wait_for(driver, locator, condition)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| FlowError::NotFound(locator.clone()))
    }

    /// Poll `check` until it yields `Some`.
    ///
    /// Transient driver errors count as "not yet"; anything else propagates.
    /// Each check is bounded by the time left and the final sleep is clamped,
    /// so the call returns within `timeout` plus scheduling jitter
    /// even when the driver itself stalls.
    pub async fn until<T, F, Fut>(&self, what: &str, mut check: F) -> FlowResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = FlowResult<Option<T>>>,
    {
        let start = Instant::now();
        let mut attempts = 0usize;

        loop {
            attempts += 1;
            let remaining = self.timeout.saturating_sub(start.elapsed());
            let outcome = match timeout(remaining, check()).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    return Err(FlowError::Timeout {
                        what: what.to_string(),
                        waited_ms: start.elapsed().as_millis() as u64,
                    })
                }
            };

            match outcome {
                Ok(Some(value)) => {
                    debug!("{} satisfied after {} attempt(s)", what, attempts);
                    return Ok(value);
                }
                Ok(None) => {}
                Err(e) if e.is_transient() => {
                    debug!("Transient error while waiting for {}: {}", what, e);
                }
                Err(e) => return Err(e),
            }

            let elapsed = start.elapsed();
            if elapsed >= self.timeout {
                return Err(FlowError::Timeout {
                    what: what.to_string(),
                    waited_ms: elapsed.as_millis() as u64,
                });
            }

            sleep(self.poll_interval.min(self.timeout - elapsed)).await;
        }
    }
}

async fn check_condition(
    driver: &dyn Driver,
    locator: &Locator,
    condition: Condition,
) -> FlowResult<Option<Vec<ElementHandle>>> {
    let elements = driver.find_elements(locator).await?;

    let satisfied = match condition {
        Condition::Present => (!elements.is_empty()).then_some(elements),
        Condition::CountAtLeast(n) => (elements.len() >= n).then_some(elements),
        Condition::Visible => {
            let mut visible = Vec::new();
            for element in elements {
                // an element detached between lookup and check is just not visible yet
                match driver.is_displayed(&element).await {
                    Ok(true) => visible.push(element),
                    Ok(false) => {}
                    Err(e) if e.is_transient() => {}
                    Err(e) => return Err(e),
                }
            }
            (!visible.is_empty()).then_some(visible)
        }
    };

    Ok(satisfied)
}
