//! Agent health checks.
//!
//! The detection protocol: nudge the agent, then watch its status bead for
//! an update. Agents touch their bead on every action, so any update that
//! lands after the probe counts as a response. No update within the timeout
//! increments a consecutive-failure counter; at the threshold the caller is
//! told to force-kill.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::agent::AgentAddress;
use crate::collab::{IssueStore, SessionManager};
use crate::config::DeaconConfig;
use crate::state::StateStore;

/// Probe message delivered to the agent's prompt.
pub const HEALTH_PROBE: &str = "HEALTH_CHECK: respond with any action to confirm responsiveness";

/// Granularity of cancellation checks inside a poll tick.
const CANCEL_SLICE: Duration = Duration::from_millis(100);

/// Knobs for one health check.
#[derive(Debug, Clone, Copy)]
pub struct HealthCheckSettings {
    /// How long to wait for a response after the probe.
    pub timeout: Duration,
    /// Delay between issue-store reads while waiting.
    pub poll_interval: Duration,
    /// Consecutive failures before recommending force-kill.
    pub failure_threshold: u32,
    /// Skip checks entirely within this window after a force-kill.
    pub cooldown: Duration,
}

impl From<&DeaconConfig> for HealthCheckSettings {
    fn from(cfg: &DeaconConfig) -> Self {
        Self {
            timeout: cfg.health_timeout(),
            poll_interval: cfg.poll_interval(),
            failure_threshold: cfg.failure_threshold,
            cooldown: cfg.force_kill_cooldown(),
        }
    }
}

/// What a health check concluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthCheckOutcome {
    /// Recently force-killed; checking again now would be noise.
    Cooldown { remaining: Duration },
    /// No session to probe.
    SessionNotRunning,
    /// The agent updated its bead after the probe.
    Responded,
    /// No bead update within the timeout.
    NoResponse {
        consecutive_failures: u32,
        should_force_kill: bool,
    },
}

/// Runs the ping/wait/verify protocol against one agent at a time.
pub struct HealthMonitor<'a> {
    pub sessions: &'a dyn SessionManager,
    pub issues: &'a dyn IssueStore,
    pub store: &'a StateStore,
    pub settings: HealthCheckSettings,
    /// External cancellation (Ctrl-C); observed mid-wait.
    pub cancel: Option<&'a AtomicBool>,
}

impl HealthMonitor<'_> {
    pub fn check(&self, agent: &AgentAddress) -> anyhow::Result<HealthCheckOutcome> {
        let key = agent.to_string();
        let mut doc = self.store.load_health()?;
        let state = doc.agent_mut(&key);

        if state.is_in_cooldown(self.settings.cooldown) {
            return Ok(HealthCheckOutcome::Cooldown {
                remaining: state.cooldown_remaining(self.settings.cooldown),
            });
        }

        if !self.sessions.exists(&agent.session_name())? {
            return Ok(HealthCheckOutcome::SessionNotRunning);
        }

        state.record_ping();
        // Probe delivery is load-bearing: an unsent probe means the timeout
        // would measure nothing.
        self.sessions.nudge(&agent.session_name(), HEALTH_PROBE)?;

        // Baseline after the send: bead activity from before the probe must
        // not count as a response.
        let baseline = Utc::now();
        let responded = self.wait_for_response(&agent.bead_id(), baseline);

        let state = doc.agent_mut(&key);
        let outcome = if responded {
            state.record_response();
            HealthCheckOutcome::Responded
        } else {
            state.record_failure();
            HealthCheckOutcome::NoResponse {
                consecutive_failures: state.consecutive_failures,
                should_force_kill: state.should_force_kill(self.settings.failure_threshold),
            }
        };

        if let Err(e) = self.store.save_health(&mut doc) {
            warn!("failed to save health state: {e:#}");
        }
        Ok(outcome)
    }

    /// Poll the agent's bead until it shows activity after `baseline`, the
    /// timeout elapses, or we're cancelled. Store read failures on a tick are
    /// retried, not fatal — the next tick may succeed.
    fn wait_for_response(&self, bead_id: &str, baseline: DateTime<Utc>) -> bool {
        let deadline = Instant::now() + self.settings.timeout;

        loop {
            if !self.sleep_tick(deadline) {
                return false;
            }

            match self.issues.show(bead_id) {
                Ok(issue) => {
                    if issue.updated_at.is_some_and(|t| t > baseline) {
                        return true;
                    }
                }
                Err(e) => debug!("bead read failed, retrying next tick: {e:#}"),
            }
        }
    }

    /// Sleep one poll tick, bounded by the deadline, in short slices so
    /// cancellation lands promptly. Returns false on deadline or cancel.
    fn sleep_tick(&self, deadline: Instant) -> bool {
        let mut slept = Duration::ZERO;
        while slept < self.settings.poll_interval {
            if self.cancelled() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let slice = CANCEL_SLICE
                .min(self.settings.poll_interval - slept)
                .min(deadline - now);
            std::thread::sleep(slice);
            slept += slice;
        }
        !self.cancelled() && Instant::now() < deadline
    }

    fn cancelled(&self) -> bool {
        self.cancel.is_some_and(|c| c.load(Ordering::Relaxed))
    }
}
