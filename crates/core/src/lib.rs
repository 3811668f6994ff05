//! flowcheck core
//!
//! This crate provides the pieces of a deterministic UI-flow test harness:
//! - An ordered, validated list of named steps (`Flow`)
//! - A sequential runner that isolates step failures (`FlowRunner`)
//! - Condition-based element waits instead of fixed sleeps (`ElementWaiter`)
//! - Per-step assertion bookkeeping (`AssertionCollector`)
//! - Declarative YAML flow files (`FlowSpec`)
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         FlowRunner                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  run(flow, driver) -> RunReport                             │
//! │    ├── setup: navigate(start_url), maximize_window()        │
//! │    ├── for step in flow (priority order)                    │
//! │    │     ├── disabled / aborted / dependency -> Skipped     │
//! │    │     ├── action.run(&driver, &mut StepContext)          │
//! │    │     │     ├── ElementWaiter::wait_for(locator, cond)   │
//! │    │     │     └── AssertionCollector::expect_*()           │
//! │    │     └── fatal failure -> Aborted                       │
//! │    └── teardown: driver.close()                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod assertions;
pub mod driver;
pub mod error;
pub mod locator;
pub mod mock;
pub mod report;
pub mod runner;
pub mod spec;
pub mod step;
pub mod waiter;

pub use assertions::{AssertionCollector, AssertionRecord};
pub use driver::{keys, Driver, ElementHandle, WindowHandle};
pub use error::{FlowError, FlowResult};
pub use locator::Locator;
pub use report::{RunOutcome, RunReport, RunSummary, SkipReason, StepResult, StepStatus};
pub use runner::{FlowRunner, RunnerConfig};
pub use spec::FlowSpec;
pub use step::{Flow, Step, StepAction, StepContext};
pub use waiter::{Condition, ElementWaiter};
