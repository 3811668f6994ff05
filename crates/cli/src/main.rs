//! flowcheck CLI - Main Entry Point
//!
//! Exit codes: 0 when every executed step passed, 1 on failed steps, an
//! aborted run or a teardown error, 2 when the harness itself could not run.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use flowcheck_cli::config::{HarnessConfig, DEFAULT_CONFIG_FILE};
use flowcheck_cli::flows::{PlannedFlow, BUILTIN_FLOWS};
use flowcheck_cli::{output, run};
use flowcheck_core::FlowSpec;
use flowcheck_webdriver::{Browser, DriverProcess, WebDriverSession};

/// flowcheck - deterministic UI-flow test harness
#[derive(Parser)]
#[command(name = "flowcheck")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Config file
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE, env = "FLOWCHECK_CONFIG", global = true)]
    config: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a built-in flow or flows from YAML specs
    Run(RunArgs),

    /// List built-in flows and flows found in a spec directory
    List(ListArgs),

    /// Check YAML specs without opening a browser
    Validate(ValidateArgs),
}

#[derive(Args)]
struct RunArgs {
    /// Flow to run: a built-in name, or a spec name with --spec
    #[arg(short, long)]
    flow: Option<String>,

    /// YAML spec file or directory
    #[arg(short, long)]
    spec: Option<PathBuf>,

    /// Run only specs with this tag
    #[arg(short, long, requires = "spec")]
    tag: Option<String>,

    /// Override target.base_url
    #[arg(long)]
    base_url: Option<String>,

    /// Override browser.webdriver_url
    #[arg(long)]
    webdriver_url: Option<String>,

    /// Override browser.kind
    #[arg(long)]
    browser: Option<Browser>,

    /// Run the browser headless
    #[arg(long)]
    headless: bool,

    /// Override output.dir
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Args)]
struct ListArgs {
    /// Spec directory to scan
    #[arg(short, long, default_value = "flows")]
    spec: PathBuf,
}

#[derive(Args)]
struct ValidateArgs {
    /// YAML spec file or directory
    #[arg(short, long)]
    spec: PathBuf,
}

fn main() {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    if cli.json_logs {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }

    let code = match tokio::runtime::Runtime::new() {
        Ok(rt) => match rt.block_on(async_main(cli)) {
            Ok(code) => code,
            Err(e) => {
                output::print_error(&format!("{:#}", e));
                2
            }
        },
        Err(e) => {
            output::print_error(&format!("Failed to create tokio runtime: {}", e));
            2
        }
    };

    std::process::exit(code);
}

async fn async_main(cli: Cli) -> Result<i32> {
    let mut config = HarnessConfig::load(&cli.config)?;
    config.apply_env()?;

    match cli.command {
        Commands::Run(args) => run_flows(args, config).await,
        Commands::List(args) => list(args),
        Commands::Validate(args) => validate(args, &config),
    }
}

async fn run_flows(args: RunArgs, mut config: HarnessConfig) -> Result<i32> {
    if let Some(url) = args.base_url {
        config.target.base_url = url;
    }
    if let Some(url) = args.webdriver_url {
        config.browser.webdriver_url = url;
    }
    if let Some(browser) = args.browser {
        config.browser.kind = browser;
    }
    if args.headless {
        config.browser.headless = true;
    }
    if let Some(dir) = args.output {
        config.output.dir = dir;
    }

    let planned = run::select(
        args.flow.as_deref(),
        args.spec.as_deref(),
        args.tag.as_deref(),
        &config,
    )?;

    // Held until every flow finished; dropping it stops the driver
    let driver_process = match config.driver_process() {
        Some(process_config) => Some(DriverProcess::spawn(process_config).await?),
        None => None,
    };
    let server_url = driver_process
        .as_ref()
        .map(|p| p.base_url().to_string())
        .unwrap_or_else(|| config.browser.webdriver_url.clone());

    let mut exit_code = 0;
    for plan in &planned {
        let runner = run::runner_for(plan, &config);
        let cancel = runner.cancellation_token();

        let signal_cancel = cancel.clone();
        let ctrl_c = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted; remaining steps will be skipped");
                signal_cancel.cancel();
            }
        });

        let session = WebDriverSession::connect(&config.session_config(&server_url))
            .await
            .with_context(|| format!("Failed to open a browser session at {}", server_url))?;
        let report = run::run_one(&runner, plan, session, &config.output.dir).await;
        ctrl_c.abort();

        let report = report?;
        output::print_report(&report);
        exit_code = exit_code.max(report.exit_code());

        if cancel.is_cancelled() {
            break;
        }
    }

    Ok(exit_code)
}

fn list(args: ListArgs) -> Result<i32> {
    let specs = if args.spec.exists() {
        FlowSpec::load_all(&args.spec)?
    } else {
        Vec::new()
    };
    println!("{}", output::flows_table(BUILTIN_FLOWS, &specs));
    Ok(0)
}

fn validate(args: ValidateArgs, config: &HarnessConfig) -> Result<i32> {
    let specs = FlowSpec::load_all(&args.spec)?;
    if specs.is_empty() {
        output::print_warning(&format!("No specs found in {}", args.spec.display()));
        return Ok(1);
    }

    let mut invalid = 0;
    for spec in &specs {
        match PlannedFlow::from_spec(spec, config) {
            Ok(plan) => output::print_success(&format!("{}: {} step(s)", spec.name, plan.flow.len())),
            Err(e) => {
                output::print_error(&format!("{}: {}", spec.name, e));
                invalid += 1;
            }
        }
    }

    info!("{} of {} spec(s) valid", specs.len() - invalid, specs.len());
    Ok(if invalid == 0 { 0 } else { 1 })
}
