//! Stranded convoy feeding.
//!
//! A convoy with ready work but no active worker makes no progress until
//! someone notices; after a mass agent failure that can be dozens at once.
//! The feeder dispatches workers to stranded convoys under a per-cycle cap
//! (so one patrol can't spawn unbounded workers) and a per-convoy cooldown
//! (so the same convoy isn't re-fed every cycle), and auto-closes convoys
//! that no longer track any items.

use std::time::Duration;

use serde::Serialize;
use tracing::warn;

use crate::collab::{IssueStore, ListFilter, UpdateFields, WorkDispatcher};
use crate::config::DeaconConfig;
use crate::state::StateStore;

/// Statuses that count as a worker actively on the convoy.
const ACTIVE_STATUSES: [&str; 2] = ["hooked", "in_progress"];

#[derive(Debug, Clone, Copy)]
pub struct ConvoyFeedSettings {
    /// Total actions (feeds + closes) allowed per invocation.
    pub max_feeds_per_cycle: u32,
    /// Minimum time between feeds of the same convoy.
    pub cooldown: Duration,
}

impl From<&DeaconConfig> for ConvoyFeedSettings {
    fn from(cfg: &DeaconConfig) -> Self {
        Self {
            max_feeds_per_cycle: cfg.max_feeds_per_cycle,
            cooldown: cfg.convoy_feed_cooldown(),
        }
    }
}

/// What happened to one stranded convoy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConvoyAction {
    /// Worker dispatched.
    Fed,
    /// Empty convoy closed.
    Closed,
    /// Fed too recently; left for a later cycle.
    Cooldown,
    /// Per-cycle cap reached; deferred, not an error.
    Limit,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConvoyRecord {
    pub convoy_id: String,
    pub action: ConvoyAction,
    pub ready: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Default, Serialize)]
pub struct FeedResult {
    pub fed: u32,
    pub closed: u32,
    pub skipped: u32,
    pub errors: u32,
    pub details: Vec<ConvoyRecord>,
}

pub struct StrandedConvoyFeeder<'a> {
    pub issues: &'a dyn IssueStore,
    pub dispatcher: &'a dyn WorkDispatcher,
    pub store: &'a StateStore,
    pub settings: ConvoyFeedSettings,
}

impl StrandedConvoyFeeder<'_> {
    pub fn feed_stranded(&self) -> anyhow::Result<FeedResult> {
        let convoys = self.issues.list(&ListFilter {
            status: Some("open".into()),
            issue_type: Some("convoy".into()),
            ..ListFilter::default()
        })?;

        let mut doc = self.store.load_convoy()?;
        let mut result = FeedResult::default();
        let mut actions = 0u32;

        for convoy in &convoys {
            let tracked = match self.issues.list(&ListFilter {
                parent: Some(convoy.id.clone()),
                ..ListFilter::default()
            }) {
                Ok(tracked) => tracked,
                Err(e) => {
                    warn!("listing convoy {} items failed: {e:#}", convoy.id);
                    result.errors += 1;
                    result.details.push(ConvoyRecord {
                        convoy_id: convoy.id.clone(),
                        action: ConvoyAction::Error,
                        ready: 0,
                        error: Some(format!("{e:#}")),
                    });
                    continue;
                }
            };

            let ready = tracked.iter().filter(|i| i.is_ready()).count();
            let active = tracked
                .iter()
                .any(|i| ACTIVE_STATUSES.contains(&i.status.as_str()));
            let empty = tracked.is_empty();

            // Stranded: ready work and nobody on it, or nothing tracked at all
            if !(empty || (ready > 0 && !active)) {
                continue;
            }

            if actions >= self.settings.max_feeds_per_cycle {
                result.skipped += 1;
                result.details.push(ConvoyRecord {
                    convoy_id: convoy.id.clone(),
                    action: ConvoyAction::Limit,
                    ready,
                    error: None,
                });
                continue;
            }

            let state = doc.convoy_mut(&convoy.id);
            if state.is_in_cooldown(self.settings.cooldown) {
                result.skipped += 1;
                result.details.push(ConvoyRecord {
                    convoy_id: convoy.id.clone(),
                    action: ConvoyAction::Cooldown,
                    ready,
                    error: None,
                });
                continue;
            }

            if empty {
                match self.issues.update(
                    &convoy.id,
                    &UpdateFields {
                        status: Some("closed".into()),
                        ..UpdateFields::default()
                    },
                ) {
                    Ok(()) => {
                        actions += 1;
                        result.closed += 1;
                        result.details.push(ConvoyRecord {
                            convoy_id: convoy.id.clone(),
                            action: ConvoyAction::Closed,
                            ready,
                            error: None,
                        });
                    }
                    Err(e) => {
                        warn!("closing empty convoy {} failed: {e:#}", convoy.id);
                        result.errors += 1;
                        result.details.push(ConvoyRecord {
                            convoy_id: convoy.id.clone(),
                            action: ConvoyAction::Error,
                            ready,
                            error: Some(format!("{e:#}")),
                        });
                    }
                }
                continue;
            }

            match self.dispatcher.feed_convoy(&convoy.id) {
                Ok(()) => {
                    state.record_feed();
                    actions += 1;
                    result.fed += 1;
                    result.details.push(ConvoyRecord {
                        convoy_id: convoy.id.clone(),
                        action: ConvoyAction::Fed,
                        ready,
                        error: None,
                    });
                }
                Err(e) => {
                    warn!("feeding convoy {} failed: {e:#}", convoy.id);
                    result.errors += 1;
                    result.details.push(ConvoyRecord {
                        convoy_id: convoy.id.clone(),
                        action: ConvoyAction::Error,
                        ready,
                        error: Some(format!("{e:#}")),
                    });
                }
            }
        }

        if let Err(e) = self.store.save_convoy(&mut doc) {
            warn!("failed to save convoy feed state: {e:#}");
        }
        Ok(result)
    }
}
