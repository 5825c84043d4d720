//! Force-kill of unresponsive agents.
//!
//! The kill protocol: notify the agent (for its transcript), kill the
//! session and its whole process tree, mark the agent bead killed, tell the
//! coordinator, record the kill. After this the agent is asleep — nothing
//! here restarts it.

use std::time::Duration;

use anyhow::bail;
use tracing::warn;

use crate::agent::AgentAddress;
use crate::collab::{IssueStore, Notifier, SessionManager, UpdateFields};
use crate::config::DeaconConfig;
use crate::state::StateStore;

#[derive(Debug, Clone, Copy)]
pub struct ForceKillSettings {
    /// Minimum time between force-kills of the same agent. Violations are
    /// hard errors, not silent skips.
    pub cooldown: Duration,
}

impl From<&DeaconConfig> for ForceKillSettings {
    fn from(cfg: &DeaconConfig) -> Self {
        Self {
            cooldown: cfg.force_kill_cooldown(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForceKillOutcome {
    /// Nothing to kill.
    SessionNotRunning,
    Killed { force_kill_count: u32 },
}

pub struct ForceKillExecutor<'a> {
    pub sessions: &'a dyn SessionManager,
    pub issues: &'a dyn IssueStore,
    pub notifier: &'a dyn Notifier,
    pub store: &'a StateStore,
    pub settings: ForceKillSettings,
    /// Address notified after a kill (unless skipped).
    pub coordinator: String,
}

impl ForceKillExecutor<'_> {
    pub fn execute(
        &self,
        agent: &AgentAddress,
        reason: Option<&str>,
        skip_notify: bool,
    ) -> anyhow::Result<ForceKillOutcome> {
        let key = agent.to_string();
        let mut doc = self.store.load_health()?;
        let state = doc.agent_mut(&key);

        if state.is_in_cooldown(self.settings.cooldown) {
            let remaining = state.cooldown_remaining(self.settings.cooldown);
            bail!(
                "agent {agent} is in force-kill cooldown ({}s remaining)",
                remaining.as_secs()
            );
        }

        let session = agent.session_name();
        if !self.sessions.exists(&session)? {
            return Ok(ForceKillOutcome::SessionNotRunning);
        }

        let reason = reason.map_or_else(
            || {
                format!(
                    "unresponsive after {} consecutive health check failures",
                    state.consecutive_failures
                )
            },
            ToString::to_string,
        );

        // Last words to the agent's transcript; delivery may fail if the
        // session is truly wedged.
        if let Err(e) = self.notifier.send(
            &key,
            "FORCE_KILL: unresponsive",
            &format!("Deacon detected {agent} as unresponsive.\nReason: {reason}\nAction: force-killing session"),
        ) {
            warn!("force-kill notification to {agent} failed: {e:#}");
        }

        self.sessions.kill_with_processes(&session)?;

        if let Err(e) = self.issues.update(
            &agent.bead_id(),
            &UpdateFields {
                agent_state: Some("killed".into()),
                ..UpdateFields::default()
            },
        ) {
            warn!("marking {agent} bead killed failed: {e:#}");
        }

        if !skip_notify {
            if let Err(e) = self.notifier.send(
                &self.coordinator,
                &format!("Agent killed: {agent}"),
                &format!("Agent {agent} was force-killed by Deacon.\nReason: {reason}"),
            ) {
                warn!("coordinator notification failed: {e:#}");
            }
        }

        let state = doc.agent_mut(&key);
        state.record_force_kill();
        let count = state.force_kill_count;
        if let Err(e) = self.store.save_health(&mut doc) {
            warn!("failed to save health state: {e:#}");
        }

        Ok(ForceKillOutcome::Killed {
            force_kill_count: count,
        })
    }
}
