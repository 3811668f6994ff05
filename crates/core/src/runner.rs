//! Sequential flow runner
//!
//! Executes one step at a time against a single driver session. Step
//! failures are recorded, not propagated; only fatal steps, setup failures
//! and cancellation stop the run early. The session is closed on every path.

use futures::FutureExt;
use std::any::Any;
use std::collections::HashSet;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::driver::Driver;
use crate::error::{FlowError, FlowResult};
use crate::report::{RunOutcome, RunReport, SkipReason, StepResult};
use crate::step::{Flow, Step, StepContext};
use crate::waiter::ElementWaiter;

/// Configuration for the flow runner
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Navigated to before the first step
    pub start_url: Option<String>,

    /// Maximize the browser window during setup
    pub maximize_window: bool,

    /// Server-side implicit wait applied during setup
    pub implicit_wait: Option<Duration>,

    /// Bound for element waits inside steps
    pub wait_timeout: Duration,

    /// Interval between wait checks
    pub poll_interval: Duration,

    /// Default bound for a whole step; a step's own timeout wins
    pub step_timeout: Option<Duration>,

    /// Checked between steps; exceeding it aborts the run
    pub run_timeout: Option<Duration>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            start_url: None,
            maximize_window: false,
            implicit_wait: None,
            wait_timeout: ElementWaiter::DEFAULT_TIMEOUT,
            poll_interval: ElementWaiter::DEFAULT_POLL_INTERVAL,
            step_timeout: None,
            run_timeout: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunState {
    NotStarted,
    Running { cursor: usize },
    Completed,
    Aborted,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::NotStarted => f.write_str("not started"),
            RunState::Running { cursor } => write!(f, "running step #{}", cursor + 1),
            RunState::Completed => f.write_str("completed"),
            RunState::Aborted => f.write_str("aborted"),
        }
    }
}

/// Runs flows step by step
pub struct FlowRunner {
    config: RunnerConfig,
    cancel: CancellationToken,
}

impl FlowRunner {
    pub fn new(config: RunnerConfig) -> Self {
        Self {
            config,
            cancel: CancellationToken::new(),
        }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Cancelling this token aborts the run before the next step starts
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    fn waiter(&self) -> ElementWaiter {
        ElementWaiter::new(self.config.wait_timeout, self.config.poll_interval)
    }

    /// Validate `steps` into a flow and run it.
    ///
    /// A configuration error is returned before any step executes; the
    /// driver is closed on that path too.
    pub async fn run_steps<D: Driver>(&self, name: &str, steps: Vec<Step>, driver: D) -> FlowResult<RunReport> {
        match Flow::new(name, steps) {
            Ok(flow) => Ok(self.run(&flow, driver).await),
            Err(e) => {
                if let Err(close_err) = driver.close().await {
                    warn!("Failed to close session after configuration error: {}", close_err);
                }
                Err(e)
            }
        }
    }

    /// Run every step of `flow` in priority order and close the session
    pub async fn run<D: Driver>(&self, flow: &Flow, driver: D) -> RunReport {
        let run_id = Uuid::new_v4();
        let started_at = chrono::Utc::now();
        let start = Instant::now();
        let mut state = RunState::NotStarted;

        info!("Running flow '{}' ({} step(s), run {})", flow.name(), flow.len(), run_id);

        let mut abort_reason = match self.setup(&driver).await {
            Ok(()) => None,
            Err(e) => {
                error!("Session setup failed: {}", e);
                Some(format!("session setup failed: {}", e))
            }
        };

        let mut results = Vec::with_capacity(flow.len());
        let mut passed: HashSet<&str> = HashSet::new();

        for (cursor, step) in flow.steps().iter().enumerate() {
            transition(&mut state, RunState::Running { cursor });

            if abort_reason.is_none() {
                abort_reason = self.interrupted(start);
            }

            if abort_reason.is_some() {
                results.push(StepResult::skipped(step.name(), step.priority(), SkipReason::Aborted));
                continue;
            }

            if !step.is_enabled() {
                info!("- {} (disabled)", step.name());
                results.push(StepResult::skipped(step.name(), step.priority(), SkipReason::Disabled));
                continue;
            }

            if let Some(dep) = step.requirements().iter().find(|r| !passed.contains(r.as_str())) {
                info!("- {} (requires '{}')", step.name(), dep);
                results.push(StepResult::skipped(
                    step.name(),
                    step.priority(),
                    SkipReason::DependencyNotPassed(dep.clone()),
                ));
                continue;
            }

            let result = self.execute(step, &driver).await;
            if result.is_failed() {
                error!("✗ {} - {}", step.name(), result.message.as_deref().unwrap_or("unknown error"));
                if step.is_fatal() {
                    abort_reason = Some(format!("fatal step '{}' failed", step.name()));
                }
            } else {
                info!("✓ {} ({} ms)", step.name(), result.elapsed_ms);
                passed.insert(step.name());
            }
            results.push(result);
        }

        let outcome = match abort_reason {
            Some(reason) => {
                transition(&mut state, RunState::Aborted);
                warn!("Run aborted: {}", reason);
                RunOutcome::Aborted { reason }
            }
            None => {
                transition(&mut state, RunState::Completed);
                RunOutcome::Completed
            }
        };

        let teardown_error = match driver.close().await {
            Ok(()) => None,
            Err(e) => {
                warn!("Failed to close session: {}", e);
                Some(e.to_string())
            }
        };

        let report = RunReport {
            run_id,
            flow: flow.name().to_string(),
            started_at,
            duration_ms: start.elapsed().as_millis() as u64,
            outcome,
            steps: results,
            teardown_error,
        };

        let summary = report.summary();
        info!(
            "Flow results: {} passed, {} failed, {} skipped ({} ms)",
            summary.passed, summary.failed, summary.skipped, report.duration_ms
        );

        report
    }

    async fn setup<D: Driver>(&self, driver: &D) -> FlowResult<()> {
        if let Some(url) = &self.config.start_url {
            debug!("Navigating to {}", url);
            driver.navigate(url).await?;
        }
        if self.config.maximize_window {
            driver.maximize_window().await?;
        }
        if let Some(timeout) = self.config.implicit_wait {
            driver.set_implicit_wait(timeout).await?;
        }
        Ok(())
    }

    fn interrupted(&self, start: Instant) -> Option<String> {
        if self.cancel.is_cancelled() {
            return Some("run cancelled".to_string());
        }
        match self.config.run_timeout {
            Some(limit) if start.elapsed() >= limit => {
                Some(format!("run exceeded {} ms", limit.as_millis()))
            }
            _ => None,
        }
    }

    async fn execute<D: Driver>(&self, step: &Step, driver: &D) -> StepResult {
        debug!("Executing step: {} (priority {})", step.name(), step.priority());

        let mut ctx = StepContext::new(step.name(), self.waiter());
        let start = Instant::now();

        let outcome = {
            let body = AssertUnwindSafe(step.action().run(driver, &mut ctx)).catch_unwind();
            let guarded = async {
                match body.await {
                    Ok(result) => result,
                    Err(panic) => Err(FlowError::Driver(format!("step panicked: {}", panic_message(&*panic)))),
                }
            };

            match step.step_timeout().or(self.config.step_timeout) {
                Some(limit) => match tokio::time::timeout(limit, guarded).await {
                    Ok(result) => result,
                    Err(_) => Err(FlowError::Timeout {
                        what: format!("step '{}'", step.name()),
                        waited_ms: limit.as_millis() as u64,
                    }),
                },
                None => guarded.await,
            }
        };

        let elapsed_ms = start.elapsed().as_millis() as u64;
        let assertions = ctx.into_assertions();
        let soft_failures = assertions.failure_summary();
        let records = assertions.into_records();

        match (outcome, soft_failures) {
            (Ok(()), None) => StepResult::passed(step.name(), step.priority(), elapsed_ms, records),
            (Ok(()), Some(summary)) => {
                StepResult::failed(step.name(), step.priority(), format!("Assertion failed: {}", summary), elapsed_ms, records)
            }
            (Err(e), _) => StepResult::failed(step.name(), step.priority(), e.to_string(), elapsed_ms, records),
        }
    }
}

fn transition(state: &mut RunState, next: RunState) {
    debug!("Run state: {} -> {}", state, next);
    *state = next;
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
