//! Run reports

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::assertions::AssertionRecord;
use crate::error::FlowResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Passed,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", content = "step", rename_all = "snake_case")]
pub enum SkipReason {
    /// The step is switched off in the flow definition
    Disabled,
    /// An earlier fatal failure or a cancellation ended the run
    Aborted,
    /// A required step did not pass
    DependencyNotPassed(String),
}

/// Result of executing (or skipping) a single step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub step_name: String,
    pub priority: i32,
    pub status: StepStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<SkipReason>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub elapsed_ms: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub assertions: Vec<AssertionRecord>,
}

impl StepResult {
    pub fn passed(step_name: &str, priority: i32, elapsed_ms: u64, assertions: Vec<AssertionRecord>) -> Self {
        Self {
            step_name: step_name.to_string(),
            priority,
            status: StepStatus::Passed,
            skip_reason: None,
            message: None,
            elapsed_ms,
            assertions,
        }
    }

    pub fn failed(
        step_name: &str,
        priority: i32,
        message: String,
        elapsed_ms: u64,
        assertions: Vec<AssertionRecord>,
    ) -> Self {
        Self {
            step_name: step_name.to_string(),
            priority,
            status: StepStatus::Failed,
            skip_reason: None,
            message: Some(message),
            elapsed_ms,
            assertions,
        }
    }

    pub fn skipped(step_name: &str, priority: i32, reason: SkipReason) -> Self {
        let message = match &reason {
            SkipReason::Disabled => "step disabled".to_string(),
            SkipReason::Aborted => "run aborted".to_string(),
            SkipReason::DependencyNotPassed(dep) => format!("required step '{}' did not pass", dep),
        };
        Self {
            step_name: step_name.to_string(),
            priority,
            status: StepStatus::Skipped,
            skip_reason: Some(reason),
            message: Some(message),
            elapsed_ms: 0,
            assertions: Vec::new(),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.status == StepStatus::Failed
    }
}

/// How the run ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunOutcome {
    Completed,
    Aborted { reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// Everything one run produced, one entry per step in priority order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub flow: String,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub outcome: RunOutcome,
    pub steps: Vec<StepResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub teardown_error: Option<String>,
}

impl RunReport {
    pub fn summary(&self) -> RunSummary {
        let count = |status: StepStatus| self.steps.iter().filter(|s| s.status == status).count();
        RunSummary {
            total: self.steps.len(),
            passed: count(StepStatus::Passed),
            failed: count(StepStatus::Failed),
            skipped: count(StepStatus::Skipped),
        }
    }

    /// Skipped steps do not count against the run
    pub fn success(&self) -> bool {
        self.outcome == RunOutcome::Completed
            && self.teardown_error.is_none()
            && !self.steps.iter().any(StepResult::is_failed)
    }

    pub fn exit_code(&self) -> i32 {
        if self.success() {
            0
        } else {
            1
        }
    }

    pub fn failures(&self) -> impl Iterator<Item = &StepResult> {
        self.steps.iter().filter(|s| s.is_failed())
    }

    pub fn step(&self, name: &str) -> Option<&StepResult> {
        self.steps.iter().find(|s| s.step_name == name)
    }

    pub fn statuses(&self) -> Vec<StepStatus> {
        self.steps.iter().map(|s| s.status).collect()
    }

    /// Report file name; path separators in the flow name are replaced so
    /// the file always lands directly in the output directory
    pub fn file_name(&self) -> String {
        let stem: String = self
            .flow
            .chars()
            .map(|c| if matches!(c, '/' | '\\') || c.is_control() { '_' } else { c })
            .collect();
        format!("{}-report.json", stem)
    }

    /// Write the report as pretty JSON into `dir`
    pub fn write_json(&self, dir: &Path) -> FlowResult<PathBuf> {
        std::fs::create_dir_all(dir)?;

        let path = dir.join(self.file_name());
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json)?;

        Ok(path)
    }
}
