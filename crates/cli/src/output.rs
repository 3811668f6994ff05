//! Output formatting for CLI

use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Cell, Color, ContentArrangement, Table};

use flowcheck_core::{FlowSpec, RunOutcome, RunReport, StepResult, StepStatus};

/// Per-step result table
pub fn report_table(report: &RunReport) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(vec!["#", "Status", "Step", "Elapsed", "Message"]);
    for result in &report.steps {
        table.add_row(vec![
            Cell::new(result.priority),
            status_cell(result.status),
            Cell::new(&result.step_name),
            Cell::new(format!("{} ms", result.elapsed_ms)),
            Cell::new(detail(result)),
        ]);
    }
    table
}

fn status_cell(status: StepStatus) -> Cell {
    match status {
        StepStatus::Passed => Cell::new("passed").fg(Color::Green),
        StepStatus::Failed => Cell::new("failed").fg(Color::Red),
        StepStatus::Skipped => Cell::new("skipped").fg(Color::Yellow),
    }
}

/// Failure message or skip reason for a row
fn detail(result: &StepResult) -> String {
    result.message.clone().unwrap_or_default()
}

/// One-line run summary
pub fn summary_line(report: &RunReport) -> String {
    let s = report.summary();
    format!(
        "{}: {} passed, {} failed, {} skipped of {} in {:.2}s",
        report.flow,
        s.passed,
        s.failed,
        s.skipped,
        s.total,
        report.duration_ms as f64 / 1000.0
    )
}

/// Print the table, summary and any run-level problems
pub fn print_report(report: &RunReport) {
    println!("{}", report_table(report));

    if let RunOutcome::Aborted { reason } = &report.outcome {
        print_warning(&format!("Run aborted: {}", reason));
    }
    if let Some(err) = &report.teardown_error {
        print_warning(&format!("Teardown failed: {}", err));
    }

    let line = summary_line(report);
    if report.success() {
        print_success(&line);
    } else {
        print_error(&line);
    }
}

/// Table of available flows
pub fn flows_table(builtin: &[(&str, &str)], specs: &[FlowSpec]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(vec!["Flow", "Source", "Steps", "Tags", "Description"]);
    for (name, description) in builtin {
        table.add_row(vec![*name, "built-in", "", "", *description]);
    }
    for spec in specs {
        table.add_row(vec![
            spec.name.clone(),
            "yaml".to_string(),
            spec.steps.len().to_string(),
            spec.tags.join(", "),
            spec.description.clone(),
        ]);
    }
    table
}

/// Print success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

/// Print warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "!".yellow().bold(), message);
}
