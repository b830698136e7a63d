mod client;
mod commands;
mod poller;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use devdash_core::status::ServiceAction;

use commands::{Context, LogsArgs};

const LOG_ENV: &str = "DEVDASH_LOG";

#[derive(Parser)]
#[command(name = "devdash")]
#[command(about = "Monitor local devenv projects, their services, and logs", long_about = None)]
struct Cli {
    /// Config file (defaults to $DEVDASH_CONFIG or <config dir>/devdash/config.yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the state of every registered project
    Status,
    /// Clean up a stale project's leftover runtime directory
    Repair { project: String },
    /// Print recent logs of a project's services, interleaved by time
    Logs {
        project: String,
        #[arg(short, long)]
        service: Option<String>,
        #[arg(short, long)]
        grep: Option<String>,
        /// Show only lines matching --grep
        #[arg(short, long, requires = "grep")]
        filter: bool,
        #[arg(short = 'n', long, default_value_t = 50)]
        lines: usize,
    },
    /// Stream health events and logs until Ctrl+C
    Watch { project: String },
    /// Start, stop, or restart one service of a running project
    Service {
        project: String,
        #[arg(value_enum)]
        action: Action,
        service: String,
    },
    /// Shut down every service of a running project
    Stop { project: String },
    /// Look for projects under the configured scan paths
    Scan {
        #[arg(short, long)]
        add: bool,
    },
    /// Register a project directory
    Add { path: PathBuf },
    /// Unregister a project by name or path
    Remove { project: String },
    /// Leave a project out of status and background polling
    Hide { project: String },
    /// Show a hidden project again
    Unhide { project: String },
}

#[derive(Clone, Copy, ValueEnum)]
enum Action {
    Start,
    Stop,
    Restart,
}

impl From<Action> for ServiceAction {
    fn from(action: Action) -> Self {
        match action {
            Action::Start => ServiceAction::Start,
            Action::Stop => ServiceAction::Stop,
            Action::Restart => ServiceAction::Restart,
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let mut ctx = Context::load(cli.config)?;

    match cli.command {
        Commands::Status => commands::run_status(&mut ctx).await,
        Commands::Repair { project } => commands::run_repair(&ctx, &project).await,
        Commands::Logs {
            project,
            service,
            grep,
            filter,
            lines,
        } => {
            let args = LogsArgs {
                project,
                service,
                grep,
                filter,
                lines,
            };
            commands::run_logs(&mut ctx, args).await
        }
        Commands::Watch { project } => commands::run_watch(&mut ctx, &project).await,
        Commands::Service {
            project,
            action,
            service,
        } => commands::run_service(&ctx, &project, action.into(), &service).await,
        Commands::Stop { project } => commands::run_stop(&ctx, &project).await,
        Commands::Scan { add } => commands::run_scan(&mut ctx, add),
        Commands::Add { path } => commands::run_add(&mut ctx, &path),
        Commands::Remove { project } => commands::run_remove(&mut ctx, &project),
        Commands::Hide { project } => commands::run_hide(&mut ctx, &project),
        Commands::Unhide { project } => commands::run_unhide(&mut ctx, &project),
    }
}
