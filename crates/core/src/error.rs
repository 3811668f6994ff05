//! Error types for flow execution

use thiserror::Error;

use crate::locator::Locator;
use crate::waiter::Condition;

#[derive(Error, Debug)]
pub enum FlowError {
    #[error("Invalid flow configuration: {0}")]
    Configuration(String),

    #[error("Element not ready: {locator} not {condition} after {waited_ms} ms")]
    ElementNotReady {
        locator: Locator,
        condition: Condition,
        waited_ms: u64,
    },

    #[error("Assertion failed: {label}: {message}")]
    Assertion { label: String, message: String },

    #[error("Element not found: {0}")]
    NotFound(Locator),

    #[error("Stale element: {0}")]
    StaleElement(String),

    #[error("Timeout waiting for: {what} ({waited_ms} ms)")]
    Timeout { what: String, waited_ms: u64 },

    #[error("Driver error: {0}")]
    Driver(String),

    #[error("Flow spec parse error: {0}")]
    SpecParse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl FlowError {
    /// Errors a wait may see while the page is still settling
    pub fn is_transient(&self) -> bool {
        matches!(self, FlowError::NotFound(_) | FlowError::StaleElement(_))
    }
}

pub type FlowResult<T> = Result<T, FlowError>;
