//! flowcheck CLI
//!
//! Configuration loading, the built-in flows, flow selection and report
//! output behind the `flowcheck` binary.

pub mod config;
pub mod flows;
pub mod output;
pub mod run;

pub use config::HarnessConfig;
pub use flows::PlannedFlow;
