//! wccc-agent: LLM-driven browser agent binary
//!
//! Usage:
//!   wccc-agent                                  - Run the home workflow once
//!   wccc-agent run --workflow sign-in           - Sign in and report
//!   wccc-agent run -w signup -s "Hill Repeats"  - Register for a ride
//!   wccc-agent schedule --cron "0 0 * * * *"    - Repeat until Ctrl+C
//!   wccc-agent tools                            - List the planner's tools

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use wccc_agent::cli::{self, Cli, Command};
use wccc_agent::{WorkflowRunner, logging};
use wccc_browser::{BrowserDriver, ChromeDriver};
use wccc_core::{Config, LlmClient, Planner};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    let command = args.command();

    let workflow = match &command {
        Command::Tools => {
            cli::print_tools();
            return Ok(());
        }
        Command::Run(w) | Command::Schedule { workflow: w, .. } => w.workflow()?,
    };

    // Load .env file
    dotenvy::dotenv().ok();

    let config = match &args.config {
        Some(path) => Config::from_toml_file(path),
        None => Config::load(),
    }
    .context("Failed to load configuration")?;

    let verbose = args.verbose || config.agent.verbose;
    let log_file = logging::init(Path::new(&config.logging.dir), verbose)?;

    tracing::info!("Starting wccc-agent {}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Provider: {:?}, model: {}", config.llm.provider, config.llm.model);

    let planner = LlmClient::new(&config).context("Failed to create LLM client")?;
    let driver: Arc<dyn BrowserDriver> = Arc::new(ChromeDriver::new());
    let schedule_cron = config.schedule.cron.clone();
    let runner = WorkflowRunner::new(config, driver);

    let outcome = match command {
        Command::Run(_) => cli::run_once(&runner, &planner, &workflow, verbose).await,
        Command::Schedule { cron, .. } => {
            let cron = cron.unwrap_or(schedule_cron);
            let planner: Arc<dyn Planner> = Arc::new(planner);
            cli::run_schedule(Arc::new(runner), planner, workflow, &cron, verbose, log_file.clone()).await
        }
        Command::Tools => Ok(()),
    };

    tracing::info!("Full log: {}", log_file.path().display());
    outcome.map_err(Into::into)
}
