use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::ExitError;

/// Town config file name.
pub const CONFIG_TOML: &str = ".gastown.toml";

/// Subdirectory under the town root where deacon state lives.
pub const DEACON_STATE_DIR: &str = ".gastown/deacon";

/// Find the town root.
///
/// Priority order (highest first):
/// 1. `GASTOWN_ROOT` env var — explicit override (tests, daemons)
/// 2. Nearest ancestor of `start` containing `.gastown.toml`
/// 3. `~/gt` if it contains `.gastown.toml`
pub fn find_town_root(start: &Path) -> anyhow::Result<PathBuf> {
    if let Ok(root) = std::env::var("GASTOWN_ROOT") {
        let root = PathBuf::from(root);
        if root.is_dir() {
            return Ok(root);
        }
        return Err(ExitError::Config(format!(
            "GASTOWN_ROOT is not a directory: {}",
            root.display()
        ))
        .into());
    }

    let mut dir = Some(start);
    while let Some(d) = dir {
        if d.join(CONFIG_TOML).exists() {
            return Ok(d.to_path_buf());
        }
        dir = d.parent();
    }

    if let Some(home) = dirs::home_dir() {
        let fallback = home.join("gt");
        if fallback.join(CONFIG_TOML).exists() {
            return Ok(fallback);
        }
    }

    Err(ExitError::Config(format!(
        "no {CONFIG_TOML} found in {} or any parent (set GASTOWN_ROOT to override)",
        start.display()
    ))
    .into())
}

/// Find the town root starting from the current directory.
pub fn find_town_root_from_cwd() -> anyhow::Result<PathBuf> {
    let cwd = std::env::current_dir().context("determining current directory")?;
    find_town_root(&cwd)
}

/// Top-level `.gastown.toml` config.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct Config {
    #[serde(default)]
    pub town: TownConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub deacon: DeaconConfig,
    /// Rig registry: rig name → settings (bead ID prefix, etc.).
    #[serde(default)]
    pub rigs: std::collections::BTreeMap<String, RigConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TownConfig {
    /// Town display name.
    #[serde(default)]
    pub name: String,
    /// Address notifications for escalations and force-kills go to.
    #[serde(default = "default_coordinator")]
    pub coordinator: String,
}

impl Default for TownConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            coordinator: default_coordinator(),
        }
    }
}

fn default_coordinator() -> String {
    "mayor".to_string()
}

/// Companion tool binaries. Overridable for sandboxed installs.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ToolsConfig {
    /// Issue-tracker (beads) CLI.
    #[serde(default = "default_bd")]
    pub bd: String,
    /// Town CLI (mail, sling).
    #[serde(default = "default_gt")]
    pub gt: String,
    /// Terminal multiplexer.
    #[serde(default = "default_tmux")]
    pub tmux: String,
    /// Git binary for worktree inspection.
    #[serde(default = "default_git")]
    pub git: String,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            bd: default_bd(),
            gt: default_gt(),
            tmux: default_tmux(),
            git: default_git(),
        }
    }
}

fn default_bd() -> String {
    "bd".to_string()
}
fn default_gt() -> String {
    "gt".to_string()
}
fn default_tmux() -> String {
    "tmux".to_string()
}
fn default_git() -> String {
    "git".to_string()
}

/// Per-rig settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct RigConfig {
    /// Bead ID prefix for this rig (e.g. "gt" for bead IDs like gt-a1b2).
    #[serde(default)]
    pub prefix: String,
}

/// Deacon remediation tunables.
///
/// These used to be scattered CLI-flag globals in earlier tooling; they are
/// a single struct here so every mechanism takes its knobs explicitly.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DeaconConfig {
    /// How long a health check waits for an agent response (seconds).
    #[serde(default = "default_health_timeout")]
    pub health_timeout_secs: u64,
    /// Seconds between issue-store reads while waiting for a response.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// Consecutive failures before a force-kill is recommended.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    /// Minimum seconds between force-kills of the same agent.
    #[serde(default = "default_force_kill_cooldown")]
    pub force_kill_cooldown_secs: u64,
    /// Age in seconds before a hooked bead is considered stale.
    #[serde(default = "default_stale_hook_max_age")]
    pub stale_hook_max_age_secs: u64,
    /// Redispatch attempts before escalating to the coordinator.
    #[serde(default = "default_max_attempts")]
    pub redispatch_max_attempts: u32,
    /// Minimum seconds between redispatch attempts for the same bead.
    #[serde(default = "default_redispatch_cooldown")]
    pub redispatch_cooldown_secs: u64,
    /// Maximum convoys acted on (fed or closed) per feed-stranded cycle.
    #[serde(default = "default_max_feeds")]
    pub max_feeds_per_cycle: u32,
    /// Minimum seconds between feeds of the same convoy.
    #[serde(default = "default_convoy_cooldown")]
    pub convoy_feed_cooldown_secs: u64,
}

impl Default for DeaconConfig {
    fn default() -> Self {
        Self {
            health_timeout_secs: default_health_timeout(),
            poll_interval_secs: default_poll_interval(),
            failure_threshold: default_failure_threshold(),
            force_kill_cooldown_secs: default_force_kill_cooldown(),
            stale_hook_max_age_secs: default_stale_hook_max_age(),
            redispatch_max_attempts: default_max_attempts(),
            redispatch_cooldown_secs: default_redispatch_cooldown(),
            max_feeds_per_cycle: default_max_feeds(),
            convoy_feed_cooldown_secs: default_convoy_cooldown(),
        }
    }
}

fn default_health_timeout() -> u64 {
    30
}
fn default_poll_interval() -> u64 {
    2
}
fn default_failure_threshold() -> u32 {
    3
}
fn default_force_kill_cooldown() -> u64 {
    300
}
fn default_stale_hook_max_age() -> u64 {
    3600
}
fn default_max_attempts() -> u32 {
    3
}
fn default_redispatch_cooldown() -> u64 {
    600
}
fn default_max_feeds() -> u32 {
    3
}
fn default_convoy_cooldown() -> u64 {
    1800
}

impl DeaconConfig {
    pub const fn health_timeout(&self) -> Duration {
        Duration::from_secs(self.health_timeout_secs)
    }

    pub const fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub const fn force_kill_cooldown(&self) -> Duration {
        Duration::from_secs(self.force_kill_cooldown_secs)
    }

    pub const fn stale_hook_max_age(&self) -> Duration {
        Duration::from_secs(self.stale_hook_max_age_secs)
    }

    pub const fn redispatch_cooldown(&self) -> Duration {
        Duration::from_secs(self.redispatch_cooldown_secs)
    }

    pub const fn convoy_feed_cooldown(&self) -> Duration {
        Duration::from_secs(self.convoy_feed_cooldown_secs)
    }
}

impl Config {
    /// Load config from the town root. A missing file yields defaults so a
    /// bare town still gets a working deacon.
    pub fn load_from_town(town_root: &Path) -> anyhow::Result<Self> {
        let path = town_root.join(CONFIG_TOML);
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::parse_toml(&contents)
    }

    /// Parse config from a TOML string.
    pub fn parse_toml(toml_str: &str) -> anyhow::Result<Self> {
        toml::from_str(toml_str)
            .map_err(|e| ExitError::Config(format!("invalid {CONFIG_TOML}: {e}")).into())
    }

    /// Resolve a bead ID prefix to a rig name via the `[rigs]` table.
    /// Falls back to the prefix itself when no rig declares it.
    pub fn rig_for_prefix(&self, prefix: &str) -> String {
        for (name, rig) in &self.rigs {
            if rig.prefix == prefix {
                return name.clone();
            }
        }
        prefix.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = DeaconConfig::default();
        assert_eq!(cfg.health_timeout_secs, 30);
        assert_eq!(cfg.failure_threshold, 3);
        assert_eq!(cfg.force_kill_cooldown_secs, 300);
        assert_eq!(cfg.stale_hook_max_age_secs, 3600);
        assert_eq!(cfg.redispatch_max_attempts, 3);
        assert_eq!(cfg.max_feeds_per_cycle, 3);
    }

    #[test]
    fn parse_minimal_toml() {
        let cfg = Config::parse_toml(
            r#"
            [town]
            name = "gastown"

            [deacon]
            failure_threshold = 5
            "#,
        )
        .unwrap();
        assert_eq!(cfg.town.name, "gastown");
        assert_eq!(cfg.deacon.failure_threshold, 5);
        // Unspecified fields keep defaults
        assert_eq!(cfg.deacon.health_timeout_secs, 30);
        assert_eq!(cfg.tools.bd, "bd");
    }

    #[test]
    fn parse_rejects_bad_toml() {
        let err = Config::parse_toml("town = [broken").unwrap_err();
        assert!(err.downcast_ref::<ExitError>().is_some());
    }

    #[test]
    fn rig_for_prefix_consults_registry() {
        let cfg = Config::parse_toml(
            r#"
            [rigs.gastown]
            prefix = "gt"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.rig_for_prefix("gt"), "gastown");
        assert_eq!(cfg.rig_for_prefix("zz"), "zz");
    }

    #[test]
    fn find_town_root_walks_up() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_TOML), "").unwrap();
        let nested = dir.path().join("rig/polecats/max");
        std::fs::create_dir_all(&nested).unwrap();
        let found = find_town_root(&nested).unwrap();
        assert_eq!(found, dir.path());
    }
}
