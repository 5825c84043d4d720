use std::time::Duration;

use clap::Args;

use crate::agent::AgentAddress;
use crate::collab::{BeadsCli, TmuxSessions, TownMail};
use crate::deacon::{ForceKillExecutor, ForceKillOutcome, ForceKillSettings, PauseGate};
use crate::state::StateStore;

#[derive(Debug, Args)]
pub struct ForceKillArgs {
    /// Agent address to kill
    pub agent: String,
    /// Reason recorded and included in notifications
    #[arg(long)]
    pub reason: Option<String>,
    /// Skip notifying the coordinator
    #[arg(long)]
    pub skip_notify: bool,
    /// Minimum seconds between force-kills of the same agent
    #[arg(long)]
    pub cooldown: Option<u64>,
}

impl ForceKillArgs {
    pub fn execute(&self) -> anyhow::Result<()> {
        let (town_root, cfg) = super::town_context()?;
        PauseGate::new(&town_root).ensure_active()?;

        let agent = AgentAddress::parse(&self.agent)?;
        let mut settings = ForceKillSettings::from(&cfg.deacon);
        if let Some(secs) = self.cooldown {
            settings.cooldown = Duration::from_secs(secs);
        }

        let sessions = TmuxSessions::new(&cfg.tools.tmux);
        let issues = BeadsCli::new(&cfg.tools.bd, &town_root);
        let notifier = TownMail::new(&cfg.tools.gt, &town_root);
        let store = StateStore::new(&town_root);
        let executor = ForceKillExecutor {
            sessions: &sessions,
            issues: &issues,
            notifier: &notifier,
            store: &store,
            settings,
            coordinator: cfg.town.coordinator.clone(),
        };

        match executor.execute(&agent, self.reason.as_deref(), self.skip_notify)? {
            ForceKillOutcome::SessionNotRunning => {
                println!("agent {agent} session not running; nothing to kill");
            }
            ForceKillOutcome::Killed { force_kill_count } => {
                println!("force-killed agent {agent} (total kills: {force_kill_count})");
                println!("agent is now asleep; normal wake mechanisms apply");
            }
        }
        Ok(())
    }
}
