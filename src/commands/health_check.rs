use std::sync::atomic::AtomicBool;
use std::time::Duration;

use clap::Args;
use serde::Serialize;

use crate::agent::AgentAddress;
use crate::collab::{BeadsCli, TmuxSessions};
use crate::deacon::{HealthCheckOutcome, HealthCheckSettings, HealthMonitor, PauseGate};
use crate::error::ExitError;
use crate::state::StateStore;

#[derive(Debug, Args)]
pub struct HealthCheckArgs {
    /// Agent address (e.g. gastown/polecats/max, gastown/witness, deacon)
    pub agent: String,
    /// Seconds to wait for the agent to respond
    #[arg(long)]
    pub timeout: Option<u64>,
    /// Consecutive failures before recommending force-kill
    #[arg(long)]
    pub failures: Option<u32>,
    /// Minimum seconds between force-kills of the same agent
    #[arg(long)]
    pub cooldown: Option<u64>,
    /// Output the result as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct HealthCheckReport<'a> {
    agent: &'a str,
    outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    consecutive_failures: Option<u32>,
    should_force_kill: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    cooldown_remaining_secs: Option<u64>,
}

impl HealthCheckArgs {
    pub fn execute(&self, cancel: &AtomicBool) -> anyhow::Result<()> {
        let (town_root, cfg) = super::town_context()?;
        PauseGate::new(&town_root).ensure_active()?;

        let agent = AgentAddress::parse(&self.agent)?;
        let mut settings = HealthCheckSettings::from(&cfg.deacon);
        if let Some(secs) = self.timeout {
            settings.timeout = Duration::from_secs(secs);
        }
        if let Some(n) = self.failures {
            settings.failure_threshold = n;
        }
        if let Some(secs) = self.cooldown {
            settings.cooldown = Duration::from_secs(secs);
        }

        let sessions = TmuxSessions::new(&cfg.tools.tmux);
        let issues = BeadsCli::new(&cfg.tools.bd, &town_root);
        let store = StateStore::new(&town_root);
        let monitor = HealthMonitor {
            sessions: &sessions,
            issues: &issues,
            store: &store,
            settings,
            cancel: Some(cancel),
        };

        let outcome = monitor.check(&agent)?;

        if self.json {
            let report = match outcome {
                HealthCheckOutcome::Cooldown { remaining } => HealthCheckReport {
                    agent: &self.agent,
                    outcome: "cooldown",
                    consecutive_failures: None,
                    should_force_kill: false,
                    cooldown_remaining_secs: Some(remaining.as_secs()),
                },
                HealthCheckOutcome::SessionNotRunning => HealthCheckReport {
                    agent: &self.agent,
                    outcome: "session-not-running",
                    consecutive_failures: None,
                    should_force_kill: false,
                    cooldown_remaining_secs: None,
                },
                HealthCheckOutcome::Responded => HealthCheckReport {
                    agent: &self.agent,
                    outcome: "responded",
                    consecutive_failures: Some(0),
                    should_force_kill: false,
                    cooldown_remaining_secs: None,
                },
                HealthCheckOutcome::NoResponse {
                    consecutive_failures,
                    should_force_kill,
                } => HealthCheckReport {
                    agent: &self.agent,
                    outcome: "no-response",
                    consecutive_failures: Some(consecutive_failures),
                    should_force_kill,
                    cooldown_remaining_secs: None,
                },
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            match outcome {
                HealthCheckOutcome::Cooldown { remaining } => println!(
                    "agent {agent} is in force-kill cooldown ({}s remaining); skipping check",
                    remaining.as_secs()
                ),
                HealthCheckOutcome::SessionNotRunning => {
                    println!("agent {agent} session not running; nothing to check");
                }
                HealthCheckOutcome::Responded => {
                    println!("agent {agent} responded (failures reset to 0)");
                }
                HealthCheckOutcome::NoResponse {
                    consecutive_failures,
                    should_force_kill,
                } => {
                    println!(
                        "agent {agent} did not respond (consecutive failures: {consecutive_failures}/{})",
                        settings.failure_threshold
                    );
                    if should_force_kill {
                        println!("agent {agent} exceeded the failure threshold; force-kill recommended");
                    }
                }
            }
        }

        if let HealthCheckOutcome::NoResponse {
            should_force_kill: true,
            ..
        } = outcome
        {
            // Exit 2: the driver's signal to run force-kill
            return Err(ExitError::status(2).into());
        }
        Ok(())
    }
}
