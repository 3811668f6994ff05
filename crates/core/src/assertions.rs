//! Per-step assertion bookkeeping

use serde::{Deserialize, Serialize};
use std::fmt::Debug;

use crate::error::{FlowError, FlowResult};

/// Outcome of one expectation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssertionRecord {
    pub label: String,
    pub passed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Records every expectation a step makes.
///
/// `expect_*` raise on failure so the step can bail out with `?`; `check_*`
/// only record, and the runner still fails the step afterwards.
#[derive(Debug, Default)]
pub struct AssertionCollector {
    records: Vec<AssertionRecord>,
}

impl AssertionCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn expect_equal<T>(&mut self, actual: &T, expected: &T, label: &str) -> FlowResult<()>
    where
        T: PartialEq + Debug + ?Sized,
    {
        if self.check_equal(actual, expected, label) {
            Ok(())
        } else {
            Err(self.failure(label))
        }
    }

    pub fn expect_true(&mut self, condition: bool, label: &str) -> FlowResult<()> {
        if self.check_true(condition, label) {
            Ok(())
        } else {
            Err(self.failure(label))
        }
    }

    pub fn check_equal<T>(&mut self, actual: &T, expected: &T, label: &str) -> bool
    where
        T: PartialEq + Debug + ?Sized,
    {
        let passed = actual == expected;
        let message = (!passed).then(|| format!("expected {:?}, got {:?}", expected, actual));
        self.record(label, passed, message);
        passed
    }

    pub fn check_true(&mut self, condition: bool, label: &str) -> bool {
        let message = (!condition).then(|| "expected condition to hold".to_string());
        self.record(label, condition, message);
        condition
    }

    pub fn records(&self) -> &[AssertionRecord] {
        &self.records
    }

    pub fn failures(&self) -> impl Iterator<Item = &AssertionRecord> {
        self.records.iter().filter(|r| !r.passed)
    }

    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }

    /// One line per failed expectation, `label: message`
    pub fn failure_summary(&self) -> Option<String> {
        let lines: Vec<String> = self
            .failures()
            .map(|r| format!("{}: {}", r.label, r.message.as_deref().unwrap_or("failed")))
            .collect();
        (!lines.is_empty()).then(|| lines.join("; "))
    }

    pub fn into_records(self) -> Vec<AssertionRecord> {
        self.records
    }

    fn record(&mut self, label: &str, passed: bool, message: Option<String>) {
        self.records.push(AssertionRecord {
            label: label.to_string(),
            passed,
            message,
        });
    }

    fn failure(&self, label: &str) -> FlowError {
        let message = self
            .records
            .last()
            .and_then(|r| r.message.clone())
            .unwrap_or_default();
        FlowError::Assertion {
            label: label.to_string(),
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expect_equal_carries_both_values() {
        let mut collector = AssertionCollector::new();
        let err = collector
            .expect_equal("Thank you!", "Thank you for your order!", "order confirmation")
            .unwrap_err();

        let msg = err.to_string();
        assert!(msg.contains("order confirmation"));
        assert!(msg.contains("Thank you!"));
        assert!(msg.contains("Thank you for your order!"));
        assert_eq!(collector.records().len(), 1);
        assert!(collector.has_failures());
    }

    #[test]
    fn test_passing_expectations_are_recorded() {
        let mut collector = AssertionCollector::new();
        collector.expect_equal(&3, &3, "count").unwrap();
        collector.expect_true(true, "visible").unwrap();

        assert_eq!(collector.records().len(), 2);
        assert!(!collector.has_failures());
        assert!(collector.failure_summary().is_none());
    }

    #[test]
    fn test_soft_checks_do_not_raise() {
        let mut collector = AssertionCollector::new();
        assert!(!collector.check_true(false, "badge cleared"));
        assert!(collector.check_equal("0", "0", "badge"));

        let summary = collector.failure_summary().unwrap();
        assert!(summary.starts_with("badge cleared"));
        assert_eq!(collector.into_records().len(), 2);
    }
}
