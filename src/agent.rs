//! Agent addresses.
//!
//! Every fleet agent is addressed as `deacon`, `mayor`, `<rig>/witness`,
//! `<rig>/refinery`, `<rig>/polecats/<name>`, or `<rig>/crew/<name>`. The
//! address maps to the agent's status bead in the issue store, its tmux
//! session name, and (for worker roles) its git worktree.

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::bail;

/// A parsed agent address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentAddress {
    Deacon,
    Mayor,
    Witness { rig: String },
    Refinery { rig: String },
    Polecat { rig: String, name: String },
    Crew { rig: String, name: String },
}

impl AgentAddress {
    /// Parse an address string.
    pub fn parse(address: &str) -> anyhow::Result<Self> {
        match address {
            "deacon" => return Ok(Self::Deacon),
            "mayor" => return Ok(Self::Mayor),
            _ => {}
        }

        let parts: Vec<&str> = address.split('/').collect();
        match parts.as_slice() {
            [rig, "witness"] => Ok(Self::Witness {
                rig: (*rig).to_string(),
            }),
            [rig, "refinery"] => Ok(Self::Refinery {
                rig: (*rig).to_string(),
            }),
            [rig, "polecats", name] => Ok(Self::Polecat {
                rig: (*rig).to_string(),
                name: (*name).to_string(),
            }),
            [rig, "crew", name] => Ok(Self::Crew {
                rig: (*rig).to_string(),
                name: (*name).to_string(),
            }),
            [_, role] => bail!("unknown role: {role}"),
            [_, kind, _] => bail!("unknown agent type: {kind}"),
            _ => bail!(
                "invalid agent address: {address} (expected rig/role or rig/type/name)"
            ),
        }
    }

    /// The agent's status bead in the issue store.
    pub fn bead_id(&self) -> String {
        match self {
            Self::Deacon => "hq-deacon".to_string(),
            Self::Mayor => "hq-mayor".to_string(),
            Self::Witness { rig } => format!("gt-{rig}-witness"),
            Self::Refinery { rig } => format!("gt-{rig}-refinery"),
            Self::Polecat { rig, name } => format!("gt-{rig}-polecat-{name}"),
            Self::Crew { rig, name } => format!("gt-{rig}-crew-{name}"),
        }
    }

    /// The tmux session hosting the agent.
    pub fn session_name(&self) -> String {
        match self {
            Self::Deacon => "hq-deacon".to_string(),
            Self::Mayor => "hq-mayor".to_string(),
            Self::Witness { rig } => format!("gt-{rig}-witness"),
            Self::Refinery { rig } => format!("gt-{rig}-refinery"),
            Self::Polecat { rig, name } => format!("gt-{rig}-{name}"),
            Self::Crew { rig, name } => format!("gt-{rig}-crew-{name}"),
        }
    }

    /// The agent's git worktree, if the role has one.
    ///
    /// Polecats and crew get worktrees; town agents and per-rig overseers run
    /// from shared checkouts. Probes the current nested layout
    /// (`<town>/<rig>/polecats/<name>/<rig>`) first, then the legacy flat
    /// layout (`<town>/<rig>/polecats/<name>`). A directory counts as a
    /// worktree when it carries a `.git` entry.
    pub fn worktree_path(&self, town_root: &Path) -> Option<PathBuf> {
        let (rig, kind, name) = match self {
            Self::Polecat { rig, name } => (rig, "polecats", name),
            Self::Crew { rig, name } => (rig, "crew", name),
            _ => return None,
        };

        let base = town_root.join(rig).join(kind).join(name);
        let nested = base.join(rig);
        if nested.join(".git").exists() {
            return Some(nested);
        }
        if base.join(".git").exists() {
            return Some(base);
        }
        None
    }
}

impl fmt::Display for AgentAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Deacon => write!(f, "deacon"),
            Self::Mayor => write!(f, "mayor"),
            Self::Witness { rig } => write!(f, "{rig}/witness"),
            Self::Refinery { rig } => write!(f, "{rig}/refinery"),
            Self::Polecat { rig, name } => write!(f, "{rig}/polecats/{name}"),
            Self::Crew { rig, name } => write!(f, "{rig}/crew/{name}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_map() {
        let cases = [
            ("deacon", "hq-deacon", "hq-deacon"),
            ("mayor", "hq-mayor", "hq-mayor"),
            ("gastown/witness", "gt-gastown-witness", "gt-gastown-witness"),
            (
                "gastown/refinery",
                "gt-gastown-refinery",
                "gt-gastown-refinery",
            ),
            ("gastown/polecats/max", "gt-gastown-polecat-max", "gt-gastown-max"),
            ("gastown/crew/joe", "gt-gastown-crew-joe", "gt-gastown-crew-joe"),
        ];
        for (addr, bead, session) in cases {
            let parsed = AgentAddress::parse(addr).unwrap();
            assert_eq!(parsed.bead_id(), bead, "bead for {addr}");
            assert_eq!(parsed.session_name(), session, "session for {addr}");
            assert_eq!(parsed.to_string(), addr, "display for {addr}");
        }
    }

    #[test]
    fn parse_rejects_malformed() {
        for addr in ["", "unknown", "gastown/unknown/agent", "a/b/c/d", "gastown/dog"] {
            assert!(AgentAddress::parse(addr).is_err(), "accepted {addr:?}");
        }
    }

    #[test]
    fn worktree_nested_layout_preferred() {
        let town = tempfile::tempdir().unwrap();
        let nested = town.path().join("rig/polecats/max/rig");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(nested.join(".git"), "gitdir: /fake").unwrap();

        let addr = AgentAddress::parse("rig/polecats/max").unwrap();
        assert_eq!(addr.worktree_path(town.path()), Some(nested));
    }

    #[test]
    fn worktree_flat_layout_fallback() {
        let town = tempfile::tempdir().unwrap();
        let flat = town.path().join("rig/crew/joe");
        std::fs::create_dir_all(&flat).unwrap();
        std::fs::write(flat.join(".git"), "gitdir: /fake").unwrap();

        let addr = AgentAddress::parse("rig/crew/joe").unwrap();
        assert_eq!(addr.worktree_path(town.path()), Some(flat));
    }

    #[test]
    fn overseers_have_no_worktree() {
        let town = tempfile::tempdir().unwrap();
        let addr = AgentAddress::parse("rig/witness").unwrap();
        assert_eq!(addr.worktree_path(town.path()), None);
        assert_eq!(
            AgentAddress::parse("deacon").unwrap().worktree_path(town.path()),
            None
        );
    }
}
