//! Stale hook reclamation.
//!
//! Beads stay "hooked" to an agent while it works them. When an agent dies
//! or abandons its work, the hook never clears and the bead is invisible to
//! dispatch. The scanner finds hooked beads past an age threshold, verifies
//! the assignee is actually gone, and reclaims the bead. Uncommitted or
//! unpushed work in the agent's tree is flagged first; losing partial work
//! silently is unacceptable.

use std::path::Path;
use std::time::Duration;

use serde::Serialize;
use tracing::warn;

use crate::agent::AgentAddress;
use crate::collab::{IssueStore, ListFilter, SessionManager, UpdateFields, WorktreeInspector};
use crate::config::DeaconConfig;

#[derive(Debug, Clone, Copy)]
pub struct StaleHookSettings {
    /// Age since last update before a hooked bead counts as stale.
    pub max_age: Duration,
    /// Report without reclaiming.
    pub dry_run: bool,
}

impl From<&DeaconConfig> for StaleHookSettings {
    fn from(cfg: &DeaconConfig) -> Self {
        Self {
            max_age: cfg.stale_hook_max_age(),
            dry_run: false,
        }
    }
}

/// What happened to one stale bead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StaleHookAction {
    /// Assignee is still alive; "hooked" alone is not abandonment.
    SkippedAlive,
    /// Dry run: would have been reclaimed.
    WouldUnhook,
    Unhooked,
    /// Reclaim attempted and failed (see `error`).
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct StaleHookRecord {
    pub bead_id: String,
    pub assignee: String,
    pub age_secs: u64,
    pub agent_alive: bool,
    pub action: StaleHookAction,
    /// Uncommitted/unpushed work found in the dead agent's tree.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partial_work: Option<String>,
    /// Non-blocking problems hit along the way (worktree inspection, etc.).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Default, Serialize)]
pub struct HookScanResult {
    pub total_hooked: usize,
    pub stale: usize,
    pub unhooked: usize,
    pub results: Vec<StaleHookRecord>,
}

pub struct StaleHookScanner<'a> {
    pub sessions: &'a dyn SessionManager,
    pub issues: &'a dyn IssueStore,
    pub worktrees: &'a dyn WorktreeInspector,
    pub town_root: &'a Path,
    pub settings: StaleHookSettings,
}

impl StaleHookScanner<'_> {
    pub fn scan(&self) -> anyhow::Result<HookScanResult> {
        let hooked = self.issues.list(&ListFilter {
            status: Some("hooked".into()),
            ..ListFilter::default()
        })?;

        let mut result = HookScanResult {
            total_hooked: hooked.len(),
            ..HookScanResult::default()
        };

        for bead in hooked {
            // Missing update stamp: age unprovable, leave it alone
            let Some(age) = bead.age() else { continue };
            if age <= self.settings.max_age {
                continue;
            }
            result.stale += 1;
            result.results.push(self.handle_stale(&bead.id, &bead.assignee, age));
        }

        result.unhooked = result
            .results
            .iter()
            .filter(|r| r.action == StaleHookAction::Unhooked)
            .count();
        Ok(result)
    }

    fn handle_stale(&self, bead_id: &str, assignee: &str, age: Duration) -> StaleHookRecord {
        let mut record = StaleHookRecord {
            bead_id: bead_id.to_string(),
            assignee: assignee.to_string(),
            age_secs: age.as_secs(),
            agent_alive: false,
            action: StaleHookAction::WouldUnhook,
            partial_work: None,
            warning: None,
            error: None,
        };

        // An unparseable assignee has no session to check; treat as gone but
        // note it so an operator can investigate the bad address.
        let address = match AgentAddress::parse(assignee) {
            Ok(addr) => Some(addr),
            Err(e) => {
                record.warning = Some(format!("unrecognized assignee: {e:#}"));
                None
            }
        };

        if let Some(ref addr) = address {
            match self.sessions.exists(&addr.session_name()) {
                Ok(true) => {
                    record.agent_alive = true;
                    record.action = StaleHookAction::SkippedAlive;
                    return record;
                }
                Ok(false) => {}
                Err(e) => {
                    // Can't prove the agent is gone; reclaiming now could
                    // yank work from under a live session.
                    record.error = Some(format!("liveness check failed: {e:#}"));
                    record.action = StaleHookAction::Failed;
                    return record;
                }
            }

            // Dead agent: look for work that would be lost. Inspection
            // failure is a warning, never a blocker.
            if let Some(worktree) = addr.worktree_path(self.town_root) {
                match self.worktrees.status(&worktree) {
                    Ok(status) if status.has_partial_work() => {
                        let mut parts = Vec::new();
                        if status.dirty {
                            parts.push("uncommitted changes".to_string());
                        }
                        if status.unpushed > 0 {
                            parts.push(format!("{} unpushed commit(s)", status.unpushed));
                        }
                        record.partial_work = Some(parts.join(", "));
                    }
                    Ok(_) => {}
                    Err(e) => {
                        record.warning = Some(format!("worktree inspection failed: {e:#}"));
                    }
                }
            }
        }

        if self.settings.dry_run {
            record.action = StaleHookAction::WouldUnhook;
            return record;
        }

        match self.issues.update(
            bead_id,
            &UpdateFields {
                status: Some("open".into()),
                clear_assignee: true,
                ..UpdateFields::default()
            },
        ) {
            Ok(()) => record.action = StaleHookAction::Unhooked,
            Err(e) => {
                warn!("unhooking {bead_id} failed: {e:#}");
                record.error = Some(format!("{e:#}"));
                record.action = StaleHookAction::Failed;
            }
        }
        record
    }
}
