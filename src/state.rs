//! Persisted deacon state.
//!
//! One JSON document per subsystem (health, redispatch, convoy feed) under
//! `<town>/.gastown/deacon/`, each mapping an ID to its record plus a
//! `last_updated` stamp at the document root. Records are created lazily on
//! first reference and never deleted; the history is the point.
//!
//! Documents are read-modify-written by one short-lived invocation at a
//! time. Saves go through a temp file and rename, so a concurrent reader
//! never sees a torn document; two concurrent writers to the same document
//! can still lose one increment (the driver serializes patrol cycles, and a
//! lost increment only delays remediation, never triggers it).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::DEACON_STATE_DIR;

const HEALTH_FILE: &str = "health-state.json";
const REDISPATCH_FILE: &str = "redispatch-state.json";
const CONVOY_FILE: &str = "convoy-feed-state.json";

/// Loads and saves the per-subsystem state documents.
pub struct StateStore {
    dir: PathBuf,
}

impl StateStore {
    pub fn new(town_root: &Path) -> Self {
        Self {
            dir: town_root.join(DEACON_STATE_DIR),
        }
    }

    /// The directory holding all deacon state files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn load_health(&self) -> anyhow::Result<HealthDoc> {
        self.load(HEALTH_FILE)
    }

    pub fn save_health(&self, doc: &mut HealthDoc) -> anyhow::Result<()> {
        doc.last_updated = Utc::now();
        self.save(HEALTH_FILE, doc)
    }

    pub fn load_redispatch(&self) -> anyhow::Result<RedispatchDoc> {
        self.load(REDISPATCH_FILE)
    }

    pub fn save_redispatch(&self, doc: &mut RedispatchDoc) -> anyhow::Result<()> {
        doc.last_updated = Utc::now();
        self.save(REDISPATCH_FILE, doc)
    }

    pub fn load_convoy(&self) -> anyhow::Result<ConvoyFeedDoc> {
        self.load(CONVOY_FILE)
    }

    pub fn save_convoy(&self, doc: &mut ConvoyFeedDoc) -> anyhow::Result<()> {
        doc.last_updated = Utc::now();
        self.save(CONVOY_FILE, doc)
    }

    fn load<T: Default + serde::de::DeserializeOwned>(&self, name: &str) -> anyhow::Result<T> {
        let path = self.dir.join(name);
        if !path.exists() {
            return Ok(T::default());
        }
        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?;
        serde_json::from_str(&contents).with_context(|| format!("parsing {}", path.display()))
    }

    fn save<T: Serialize>(&self, name: &str, doc: &T) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("creating {}", self.dir.display()))?;
        let path = self.dir.join(name);
        let tmp = self.dir.join(format!("{name}.tmp"));
        let json = serde_json::to_string_pretty(doc).context("serializing state")?;
        std::fs::write(&tmp, json).with_context(|| format!("writing {}", tmp.display()))?;
        std::fs::rename(&tmp, &path)
            .with_context(|| format!("replacing {}", path.display()))?;
        Ok(())
    }
}

fn in_cooldown(last: Option<DateTime<Utc>>, cooldown: Duration) -> bool {
    !remaining_cooldown(last, cooldown).is_zero()
}

fn remaining_cooldown(last: Option<DateTime<Utc>>, cooldown: Duration) -> Duration {
    let Some(last) = last else {
        return Duration::ZERO;
    };
    let elapsed = Utc::now().signed_duration_since(last);
    let Ok(elapsed) = elapsed.to_std() else {
        // Clock went backwards; treat as fully elapsed cooldown remaining
        return cooldown;
    };
    cooldown.saturating_sub(elapsed)
}

// ── Health ──────────────────────────────────────────────────────────────────

/// Health-check state for all monitored agents.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct HealthDoc {
    #[serde(default)]
    pub last_updated: DateTime<Utc>,
    #[serde(default)]
    pub agents: BTreeMap<String, AgentHealthState>,
}

impl HealthDoc {
    /// Record for an agent, created lazily on first reference.
    pub fn agent_mut(&mut self, agent: &str) -> &mut AgentHealthState {
        self.agents.entry(agent.to_string()).or_default()
    }

    pub fn agent(&self, agent: &str) -> Option<&AgentHealthState> {
        self.agents.get(agent)
    }
}

/// Per-agent liveness tracking.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentHealthState {
    #[serde(default)]
    pub consecutive_failures: u32,
    pub last_ping_time: Option<DateTime<Utc>>,
    pub last_response_time: Option<DateTime<Utc>>,
    pub last_force_kill_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub force_kill_count: u32,
}

impl AgentHealthState {
    pub fn record_ping(&mut self) {
        self.last_ping_time = Some(Utc::now());
    }

    /// A confirmed response resets the failure streak.
    pub fn record_response(&mut self) {
        self.last_response_time = Some(Utc::now());
        self.consecutive_failures = 0;
    }

    pub fn record_failure(&mut self) {
        self.consecutive_failures += 1;
    }

    pub fn record_force_kill(&mut self) {
        self.last_force_kill_time = Some(Utc::now());
        self.force_kill_count += 1;
    }

    pub fn is_in_cooldown(&self, cooldown: Duration) -> bool {
        in_cooldown(self.last_force_kill_time, cooldown)
    }

    pub fn cooldown_remaining(&self, cooldown: Duration) -> Duration {
        remaining_cooldown(self.last_force_kill_time, cooldown)
    }

    pub const fn should_force_kill(&self, threshold: u32) -> bool {
        self.consecutive_failures >= threshold
    }
}

// ── Redispatch ──────────────────────────────────────────────────────────────

/// Redispatch state for recovered beads.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct RedispatchDoc {
    #[serde(default)]
    pub last_updated: DateTime<Utc>,
    #[serde(default)]
    pub beads: BTreeMap<String, RedispatchState>,
}

impl RedispatchDoc {
    pub fn bead_mut(&mut self, bead: &str) -> &mut RedispatchState {
        self.beads.entry(bead.to_string()).or_default()
    }
}

/// Per-bead redispatch tracking.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RedispatchState {
    #[serde(default)]
    pub attempt_count: u32,
    pub last_attempt_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_rig: String,
    #[serde(default)]
    pub escalated: bool,
    pub escalated_at: Option<DateTime<Utc>>,
    /// Structured key/value notes (e.g. last failure summary). Replaces the
    /// old scheme of packing `key:value` strings into issue labels.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

impl RedispatchState {
    pub fn record_attempt(&mut self, rig: &str) {
        self.attempt_count += 1;
        self.last_attempt_time = Some(Utc::now());
        self.last_rig = rig.to_string();
    }

    /// One-way transition; never reverts without an external state reset.
    pub fn escalate(&mut self) {
        self.escalated = true;
        self.escalated_at = Some(Utc::now());
    }

    pub fn is_in_cooldown(&self, cooldown: Duration) -> bool {
        in_cooldown(self.last_attempt_time, cooldown)
    }

    pub fn cooldown_remaining(&self, cooldown: Duration) -> Duration {
        remaining_cooldown(self.last_attempt_time, cooldown)
    }

    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.annotations.get(key).map(String::as_str)
    }

    pub fn set_annotation(&mut self, key: &str, value: &str) {
        self.annotations.insert(key.to_string(), value.to_string());
    }

    pub fn clear_annotation(&mut self, key: &str) {
        self.annotations.remove(key);
    }
}

// ── Convoy feed ─────────────────────────────────────────────────────────────

/// Feed history for stranded convoys.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ConvoyFeedDoc {
    #[serde(default)]
    pub last_updated: DateTime<Utc>,
    #[serde(default)]
    pub convoys: BTreeMap<String, ConvoyFeedState>,
}

impl ConvoyFeedDoc {
    pub fn convoy_mut(&mut self, convoy: &str) -> &mut ConvoyFeedState {
        self.convoys.entry(convoy.to_string()).or_default()
    }
}

/// Per-convoy feed tracking.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConvoyFeedState {
    #[serde(default)]
    pub feed_count: u32,
    pub last_feed_time: Option<DateTime<Utc>>,
}

impl ConvoyFeedState {
    pub fn record_feed(&mut self) {
        self.feed_count += 1;
        self.last_feed_time = Some(Utc::now());
    }

    pub fn is_in_cooldown(&self, cooldown: Duration) -> bool {
        in_cooldown(self.last_feed_time, cooldown)
    }

    pub fn cooldown_remaining(&self, cooldown: Duration) -> Duration {
        remaining_cooldown(self.last_feed_time, cooldown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    #[test]
    fn failures_reset_on_response() {
        let mut state = AgentHealthState::default();
        state.record_failure();
        state.record_failure();
        assert_eq!(state.consecutive_failures, 2);
        state.record_response();
        assert_eq!(state.consecutive_failures, 0);
        assert!(state.last_response_time.is_some());
    }

    #[test]
    fn force_kill_threshold() {
        let mut state = AgentHealthState::default();
        state.record_failure();
        state.record_failure();
        assert!(!state.should_force_kill(3));
        state.record_failure();
        assert!(state.should_force_kill(3));
    }

    #[test]
    fn force_kill_cooldown_window() {
        let mut state = AgentHealthState::default();
        assert!(!state.is_in_cooldown(Duration::from_secs(300)));

        state.record_force_kill();
        assert_eq!(state.force_kill_count, 1);
        assert!(state.is_in_cooldown(Duration::from_secs(300)));
        let remaining = state.cooldown_remaining(Duration::from_secs(300));
        assert!(remaining > Duration::from_secs(290));

        // A kill five minutes ago is out of a 5m window
        state.last_force_kill_time = Some(Utc::now() - TimeDelta::seconds(301));
        assert!(!state.is_in_cooldown(Duration::from_secs(300)));
        assert_eq!(
            state.cooldown_remaining(Duration::from_secs(300)),
            Duration::ZERO
        );
    }

    #[test]
    fn escalation_is_one_way() {
        let mut state = RedispatchState::default();
        assert!(!state.escalated);
        state.escalate();
        assert!(state.escalated);
        assert!(state.escalated_at.is_some());
        // Attempts after escalation don't clear the flag
        state.record_attempt("gastown");
        assert!(state.escalated);
    }

    #[test]
    fn redispatch_cooldown_math() {
        let mut state = RedispatchState::default();
        assert_eq!(
            state.cooldown_remaining(Duration::from_secs(600)),
            Duration::ZERO
        );
        state.last_attempt_time = Some(Utc::now() - TimeDelta::seconds(200));
        let remaining = state.cooldown_remaining(Duration::from_secs(600));
        assert!(remaining <= Duration::from_secs(400));
        assert!(remaining > Duration::from_secs(395));
    }

    #[test]
    fn annotations_get_set_clear() {
        let mut state = RedispatchState::default();
        assert_eq!(state.annotation("last-error"), None);
        state.set_annotation("last-error", "worker lost");
        assert_eq!(state.annotation("last-error"), Some("worker lost"));
        state.clear_annotation("last-error");
        assert_eq!(state.annotation("last-error"), None);
    }

    #[test]
    fn lazy_records_persist_round_trip() {
        let town = tempfile::tempdir().unwrap();
        let store = StateStore::new(town.path());

        // Missing files load as empty documents
        let mut doc = store.load_health().unwrap();
        assert!(doc.agents.is_empty());

        doc.agent_mut("gastown/witness").record_failure();
        doc.agent_mut("gastown/witness").record_failure();
        store.save_health(&mut doc).unwrap();

        let reloaded = store.load_health().unwrap();
        assert_eq!(
            reloaded.agent("gastown/witness").unwrap().consecutive_failures,
            2
        );
        // Records for other agents are still created lazily
        assert!(reloaded.agent("gastown/refinery").is_none());
    }

    #[test]
    fn convoy_feed_counts() {
        let mut state = ConvoyFeedState::default();
        assert!(!state.is_in_cooldown(Duration::from_secs(1800)));
        state.record_feed();
        assert_eq!(state.feed_count, 1);
        assert!(state.is_in_cooldown(Duration::from_secs(1800)));
    }
}
