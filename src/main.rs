mod agent;
mod collab;
mod commands;
mod config;
mod deacon;
mod error;
mod state;
mod subprocess;
mod telemetry;

use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::{Parser, Subcommand};

use commands::feed_stranded::FeedStrandedArgs;
use commands::force_kill::ForceKillArgs;
use commands::health_check::HealthCheckArgs;
use commands::health_state::HealthStateArgs;
use commands::heartbeat::HeartbeatArgs;
use commands::pause::{PauseArgs, ResumeArgs, StatusArgs};
use commands::redispatch::RedispatchArgs;
use commands::stale_hooks::StaleHooksArgs;

/// Set by the Ctrl-C handler; long waits poll this.
static CANCEL: AtomicBool = AtomicBool::new(false);

#[derive(Debug, Parser)]
#[command(
    name = "gtd",
    version,
    about = "Gas Town deacon: watchdog and recovery for agent fleets"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Probe an agent and track consecutive failures (exit 2 = force-kill)
    HealthCheck(HealthCheckArgs),
    /// Force-kill an unresponsive agent session and its process tree
    ForceKill(ForceKillArgs),
    /// Show health check state for all monitored agents
    HealthState(HealthStateArgs),
    /// Find hooked beads whose assignee is gone and reclaim them
    StaleHooks(StaleHooksArgs),
    /// Re-route a recovered bead to a fresh worker (exit 2 = cooldown, 3 = skipped)
    Redispatch(RedispatchArgs),
    /// Dispatch workers to stranded convoys, close empty ones
    FeedStranded(FeedStrandedArgs),
    /// Pause all patrol actions
    Pause(PauseArgs),
    /// Allow patrol actions again
    Resume(ResumeArgs),
    /// Show pause state and last heartbeat
    Status(StatusArgs),
    /// Update the deacon heartbeat
    Heartbeat(HeartbeatArgs),
    /// Print the JSON Schema for .gastown.toml
    Schema,
}

impl Commands {
    const fn name(&self) -> &'static str {
        match self {
            Self::HealthCheck(_) => "health-check",
            Self::ForceKill(_) => "force-kill",
            Self::HealthState(_) => "health-state",
            Self::StaleHooks(_) => "stale-hooks",
            Self::Redispatch(_) => "redispatch",
            Self::FeedStranded(_) => "feed-stranded",
            Self::Pause(_) => "pause",
            Self::Resume(_) => "resume",
            Self::Status(_) => "status",
            Self::Heartbeat(_) => "heartbeat",
            Self::Schema => "schema",
        }
    }
}

fn main() -> ExitCode {
    telemetry::init();

    let cli = Cli::parse();

    let _ = ctrlc::set_handler(|| CANCEL.store(true, Ordering::Relaxed));

    let _span = tracing::info_span!("command", name = cli.command.name()).entered();

    let result = match cli.command {
        Commands::HealthCheck(args) => args.execute(&CANCEL),
        Commands::ForceKill(args) => args.execute(),
        Commands::HealthState(args) => args.execute(),
        Commands::StaleHooks(args) => args.execute(),
        Commands::Redispatch(args) => args.execute(),
        Commands::FeedStranded(args) => args.execute(),
        Commands::Pause(args) => args.execute(),
        Commands::Resume(args) => args.execute(),
        Commands::Status(args) => args.execute(),
        Commands::Heartbeat(args) => args.execute(),
        Commands::Schema => commands::schema::run_schema(),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if let Some(exit_err) = e.downcast_ref::<error::ExitError>() {
                // Outcome codes were already reported on stdout
                if !exit_err.is_status() {
                    eprintln!("error: {exit_err}");
                }
                exit_err.exit_code()
            } else {
                eprintln!("error: {e:#}");
                ExitCode::FAILURE
            }
        }
    }
}
