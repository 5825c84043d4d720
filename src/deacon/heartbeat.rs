//! Deacon heartbeat.
//!
//! The daemon pokes the deacon when its heartbeat goes quiet; touching it at
//! the start of each wake cycle keeps those pokes away. A paused deacon
//! refuses to beat so the daemon sees it as needing attention.

use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::DEACON_STATE_DIR;

use super::pause::PauseGate;

const HEARTBEAT_FILE: &str = "heartbeat.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatRecord {
    pub last_beat: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
}

pub struct Heartbeat {
    path: PathBuf,
}

impl Heartbeat {
    pub fn new(town_root: &Path) -> Self {
        Self {
            path: town_root.join(DEACON_STATE_DIR).join(HEARTBEAT_FILE),
        }
    }

    /// Touch the heartbeat, optionally recording what the deacon is doing.
    pub fn touch(&self, gate: &PauseGate, action: Option<&str>) -> anyhow::Result<()> {
        gate.ensure_active()?;

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let record = HeartbeatRecord {
            last_beat: Utc::now(),
            action: action.map(ToString::to_string),
        };
        let json = serde_json::to_string_pretty(&record).context("serializing heartbeat")?;
        std::fs::write(&self.path, json)
            .with_context(|| format!("writing {}", self.path.display()))?;
        Ok(())
    }

    pub fn last(&self) -> anyhow::Result<Option<HeartbeatRecord>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&self.path)
            .with_context(|| format!("reading {}", self.path.display()))?;
        let record = serde_json::from_str(&contents)
            .with_context(|| format!("parsing {}", self.path.display()))?;
        Ok(Some(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExitError;

    #[test]
    fn touch_records_action() {
        let town = tempfile::tempdir().unwrap();
        let gate = PauseGate::new(town.path());
        let heartbeat = Heartbeat::new(town.path());

        assert!(heartbeat.last().unwrap().is_none());
        heartbeat.touch(&gate, Some("checking witnesses")).unwrap();
        let record = heartbeat.last().unwrap().unwrap();
        assert_eq!(record.action.as_deref(), Some("checking witnesses"));
    }

    #[test]
    fn paused_deacon_refuses_to_beat() {
        let town = tempfile::tempdir().unwrap();
        let gate = PauseGate::new(town.path());
        let heartbeat = Heartbeat::new(town.path());

        gate.pause("testing", "human").unwrap();
        let err = heartbeat.touch(&gate, None).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ExitError>(),
            Some(ExitError::Paused { .. })
        ));
        assert!(heartbeat.last().unwrap().is_none());
    }
}
