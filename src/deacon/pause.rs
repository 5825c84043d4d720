//! The pause gate.
//!
//! Presence of the pause record is the paused boolean: a `paused.json` under
//! the deacon state dir means every remediation entry point refuses to act.
//! The state survives session restarts until an explicit resume.

use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::DEACON_STATE_DIR;
use crate::error::ExitError;

const PAUSE_FILE: &str = "paused.json";

/// Pause metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PauseState {
    #[serde(default)]
    pub reason: String,
    pub paused_at: DateTime<Utc>,
    #[serde(default)]
    pub paused_by: String,
}

/// Global gate over all remediation actions.
pub struct PauseGate {
    path: PathBuf,
}

impl PauseGate {
    pub fn new(town_root: &Path) -> Self {
        Self {
            path: town_root.join(DEACON_STATE_DIR).join(PAUSE_FILE),
        }
    }

    /// The pause file location (shown to operators).
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current pause state, or None when running.
    pub fn state(&self) -> anyhow::Result<Option<PauseState>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&self.path)
            .with_context(|| format!("reading {}", self.path.display()))?;
        let state = serde_json::from_str(&contents)
            .with_context(|| format!("parsing {}", self.path.display()))?;
        Ok(Some(state))
    }

    pub fn is_paused(&self) -> anyhow::Result<bool> {
        Ok(self.state()?.is_some())
    }

    /// Errors with a paused signal when the gate is set. Every mechanism
    /// entry point calls this first.
    pub fn ensure_active(&self) -> anyhow::Result<()> {
        if let Some(state) = self.state()? {
            return Err(ExitError::Paused {
                reason: state.reason,
            }
            .into());
        }
        Ok(())
    }

    pub fn pause(&self, reason: &str, actor: &str) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let state = PauseState {
            reason: reason.to_string(),
            paused_at: Utc::now(),
            paused_by: actor.to_string(),
        };
        let json = serde_json::to_string_pretty(&state).context("serializing pause state")?;
        std::fs::write(&self.path, json)
            .with_context(|| format!("writing {}", self.path.display()))?;
        Ok(())
    }

    /// Remove the pause record. Returns false when not paused.
    pub fn resume(&self) -> anyhow::Result<bool> {
        if !self.path.exists() {
            return Ok(false);
        }
        std::fs::remove_file(&self.path)
            .with_context(|| format!("removing {}", self.path.display()))?;
        Ok(true)
    }
}
