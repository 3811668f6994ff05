//! Flow selection and execution for `flowcheck run`

use anyhow::{bail, Result};
use std::path::Path;
use tracing::info;

use flowcheck_core::{Driver, FlowRunner, FlowSpec, RunReport};

use crate::config::HarnessConfig;
use crate::flows::{saucedemo, PlannedFlow};

/// Resolve `--flow` / `--spec` / `--tag` into flows to run.
///
/// Without `--flow` or `--spec` the built-in saucedemo flow is selected.
pub fn select(
    flow: Option<&str>,
    spec: Option<&Path>,
    tag: Option<&str>,
    config: &HarnessConfig,
) -> Result<Vec<PlannedFlow>> {
    let Some(path) = spec else {
        let name = flow.unwrap_or(saucedemo::FLOW_NAME);
        return Ok(vec![PlannedFlow::builtin(name, config)?]);
    };

    let specs = FlowSpec::load_all(path)?;
    let selected: Vec<&FlowSpec> = match tag {
        Some(tag) => FlowSpec::filter_by_tag(&specs, tag),
        None => specs.iter().collect(),
    };
    let selected: Vec<&FlowSpec> = match flow {
        Some(name) => selected.into_iter().filter(|s| s.name == name).collect(),
        None => selected,
    };

    if selected.is_empty() {
        bail!("no flows in {} match the selection", path.display());
    }

    selected
        .into_iter()
        .map(|s| PlannedFlow::from_spec(s, config).map_err(Into::into))
        .collect()
}

/// Runner for `planned`, starting at its own start URL
pub fn runner_for(planned: &PlannedFlow, config: &HarnessConfig) -> FlowRunner {
    let mut runner_config = config.runner_config();
    runner_config.start_url = planned.start_url.clone();
    FlowRunner::new(runner_config)
}

/// Run one flow on `driver` and write its JSON report under `output_dir`
pub async fn run_one<D: Driver>(
    runner: &FlowRunner,
    planned: &PlannedFlow,
    driver: D,
    output_dir: &Path,
) -> Result<RunReport> {
    let report = runner.run(&planned.flow, driver).await;
    let path = report.write_json(output_dir)?;
    info!("Report written to {}", path.display());
    Ok(report)
}
