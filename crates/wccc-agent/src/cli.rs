//! Command line interface
//!
//! `run` executes one workflow and exits, `schedule` repeats it on a cron
//! expression until Ctrl+C, and `tools` prints what the planner is offered.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use tracing::{error, info};
use wccc_browser::browser_tool_definitions;
use wccc_core::{LoopState, Planner};

use crate::error::{AgentError, Result};
use crate::logging::RunLog;
use crate::runner::WorkflowRunner;
use crate::scheduler::Scheduler;
use crate::task::Workflow;

#[derive(Parser, Debug)]
#[command(name = "wccc-agent", version, about = "LLM-driven browser agent for the WCCC ride calendar")]
pub struct Cli {
    /// TOML config file (defaults to wccc-agent.toml when present, then the environment)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Print the full transcript and log debug output to the console
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

impl Cli {
    /// The requested command; a bare invocation runs the home workflow
    pub fn command(&self) -> Command {
        self.command
            .clone()
            .unwrap_or_else(|| Command::Run(WorkflowArgs::default()))
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run one workflow and exit
    Run(WorkflowArgs),

    /// Repeat a workflow on a cron schedule until Ctrl+C
    Schedule {
        /// Cron expression (defaults to SCHEDULE_CRON or hourly)
        #[arg(long)]
        cron: Option<String>,

        #[command(flatten)]
        workflow: WorkflowArgs,
    },

    /// List the browser tools offered to the planner
    Tools,
}

#[derive(Args, Debug, Clone)]
pub struct WorkflowArgs {
    /// smoke, home, sign-in or signup
    #[arg(short, long, default_value = "home")]
    pub workflow: String,

    /// Ride to look for (signup only)
    #[arg(short, long)]
    pub search: Option<String>,
}

impl Default for WorkflowArgs {
    fn default() -> Self {
        Self {
            workflow: "home".to_string(),
            search: None,
        }
    }
}

impl WorkflowArgs {
    pub fn workflow(&self) -> Result<Workflow> {
        Workflow::from_name(&self.workflow, self.search.as_deref())
    }
}

pub fn print_tools() {
    for def in browser_tool_definitions() {
        println!("{:<20} {}", def.name, def.description);
    }
}

/// Run once and print the transcript
///
/// # Errors
/// Failed runs, and runs that exhaust their step budget.
pub async fn run_once(
    runner: &WorkflowRunner,
    planner: &dyn Planner,
    workflow: &Workflow,
    verbose: bool,
) -> Result<()> {
    let run = runner.run(planner, workflow).await?;

    println!("{}", runner.render(&run, verbose));

    match run.state {
        LoopState::Completed => Ok(()),
        _ => Err(AgentError::Task(run.report())),
    }
}

/// Repeat `workflow` until Ctrl+C, one log file per run
pub async fn run_schedule(
    runner: Arc<WorkflowRunner>,
    planner: Arc<dyn Planner>,
    workflow: Workflow,
    cron: &str,
    verbose: bool,
    log: RunLog,
) -> Result<()> {
    let scheduler = Scheduler::new(cron)?;
    info!(cron = %scheduler.expr(), workflow = %workflow, "Scheduling workflow, press Ctrl+C to stop");

    let handle = scheduler.start(move |n| {
        let runner = Arc::clone(&runner);
        let planner = Arc::clone(&planner);
        let workflow = workflow.clone();
        let log = log.clone();
        async move {
            start_run_log(&log, n);
            match runner.run(planner.as_ref(), &workflow).await {
                Ok(run) => {
                    info!(run = n, state = ?run.state, "Scheduled run finished");
                    println!("{}", runner.render(&run, verbose));
                }
                Err(e) => error!(run = n, "Scheduled run failed: {}", e),
            }
        }
    });

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl+C: {}", e);
    }
    info!("Shutting down, waiting for the current run to finish");
    let runs = handle.stop().await;
    info!(runs, "Shutdown complete");
    Ok(())
}

/// The first run keeps the startup file; later runs each get a new one
fn start_run_log(log: &RunLog, run: u64) {
    if run > 1 {
        match log.rotate() {
            Ok(path) => info!(run, "Log file: {}", path.display()),
            Err(e) => error!(run, "Keeping previous log file: {}", e),
        }
    }
}
