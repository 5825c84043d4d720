//! Work redispatch.
//!
//! A bead recovered from a dead agent gets handed to a fresh worker, a
//! bounded number of times. A bead that keeps coming back is a problem the
//! loop cannot fix, so at the attempt cap it escalates to the coordinator
//! exactly once and the automated loop is done with it.

use std::time::Duration;

use serde::Serialize;
use tracing::warn;

use crate::collab::{IssueStore, Notifier, WorkDispatcher};
use crate::config::{Config, DeaconConfig};
use crate::state::StateStore;

#[derive(Debug, Clone, Copy)]
pub struct RedispatchSettings {
    /// Attempts before escalation.
    pub max_attempts: u32,
    /// Minimum time between attempts for the same bead.
    pub cooldown: Duration,
}

impl From<&DeaconConfig> for RedispatchSettings {
    fn from(cfg: &DeaconConfig) -> Self {
        Self {
            max_attempts: cfg.redispatch_max_attempts,
            cooldown: cfg.redispatch_cooldown(),
        }
    }
}

/// Outcome of one redispatch call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum RedispatchAction {
    Redispatched { rig: String, attempt: u32 },
    /// Attempt cap reached; the coordinator now owns the decision.
    Escalated { attempts: u32 },
    /// Escalated on an earlier call; terminal until an external reset.
    AlreadyEscalated,
    /// Too soon since the last attempt; retry later.
    Cooldown { remaining_secs: u64 },
    /// Bead is not in a redispatchable state.
    Skipped { reason: String },
}

pub struct RedispatchController<'a> {
    pub issues: &'a dyn IssueStore,
    pub dispatcher: &'a dyn WorkDispatcher,
    pub notifier: &'a dyn Notifier,
    pub store: &'a StateStore,
    pub config: &'a Config,
    pub settings: RedispatchSettings,
}

impl RedispatchController<'_> {
    pub fn redispatch(
        &self,
        bead_id: &str,
        rig_override: Option<&str>,
    ) -> anyhow::Result<RedispatchAction> {
        let mut doc = self.store.load_redispatch()?;
        let state = doc.bead_mut(bead_id);

        if state.escalated {
            return Ok(RedispatchAction::AlreadyEscalated);
        }

        if state.is_in_cooldown(self.settings.cooldown) {
            return Ok(RedispatchAction::Cooldown {
                remaining_secs: state.cooldown_remaining(self.settings.cooldown).as_secs(),
            });
        }

        let bead = self.issues.show(bead_id)?;
        if !bead.is_ready() {
            let mut reason = format!("status={}", bead.status);
            if !bead.assignee.is_empty() {
                reason.push_str(&format!(" assignee={}", bead.assignee));
            }
            if bead.blocked {
                reason.push_str(" blocked");
            }
            return Ok(RedispatchAction::Skipped { reason });
        }

        if state.attempt_count >= self.settings.max_attempts {
            state.escalate();
            let attempts = state.attempt_count;
            // The escalation flag is the authoritative one-way latch; losing
            // it would re-arm automatic retries, so a failed save aborts.
            self.store.save_redispatch(&mut doc)?;

            if let Err(e) = self.notifier.send(
                &self.config.town.coordinator,
                &format!("Redispatch escalation: {bead_id}"),
                &format!(
                    "Bead {bead_id} failed {attempts} redispatch attempts.\n\
                     Automated recovery has exhausted its authority; manual attention needed."
                ),
            ) {
                warn!("escalation notification failed: {e:#}");
            }
            return Ok(RedispatchAction::Escalated { attempts });
        }

        let rig = rig_override.map_or_else(|| self.infer_rig(bead_id), ToString::to_string);
        self.dispatcher.dispatch_bead(bead_id, &rig)?;

        let state = doc.bead_mut(bead_id);
        state.record_attempt(&rig);
        state.set_annotation("last-dispatch", &format!("rig {rig}"));
        let attempt = state.attempt_count;
        // The attempt counter is the rate limit; it must not be lost.
        self.store.save_redispatch(&mut doc)?;

        Ok(RedispatchAction::Redispatched { rig, attempt })
    }

    /// Target rig from the bead ID prefix, via the `[rigs]` registry.
    fn infer_rig(&self, bead_id: &str) -> String {
        let prefix = bead_id.split('-').next().unwrap_or(bead_id);
        self.config.rig_for_prefix(prefix)
    }
}
