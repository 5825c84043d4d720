use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::subprocess::Tool;

/// Wrap every issue-CLI call so a wedged daemon can't hang an invocation.
const BD_TIMEOUT: Duration = Duration::from_secs(30);

/// A work item ("bead") as the issue store reports it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Issue {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub assignee: String,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default, rename = "type")]
    pub issue_type: String,
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub blocked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
}

impl Issue {
    /// Time since the record was last touched.
    pub fn age(&self) -> Option<Duration> {
        let updated = self.updated_at?;
        Utc::now().signed_duration_since(updated).to_std().ok()
    }

    /// Open, unassigned, and not blocked on anything.
    pub fn is_ready(&self) -> bool {
        self.status == "open" && self.assignee.is_empty() && !self.blocked
    }
}

/// Query filter for [`IssueStore::list`].
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub status: Option<String>,
    pub assignee: Option<String>,
    pub label: Option<String>,
    pub parent: Option<String>,
    pub issue_type: Option<String>,
    /// Only items whose last update is older than this.
    pub older_than: Option<Duration>,
}

/// Mutation set for [`IssueStore::update`]. Only remediation-signaling
/// fields: status, assignee, labels, and the agent lifecycle state.
#[derive(Debug, Clone, Default)]
pub struct UpdateFields {
    pub status: Option<String>,
    pub assignee: Option<String>,
    pub clear_assignee: bool,
    pub add_labels: Vec<String>,
    pub remove_labels: Vec<String>,
    pub agent_state: Option<String>,
}

/// The external issue store.
pub trait IssueStore {
    fn show(&self, id: &str) -> anyhow::Result<Issue>;
    fn update(&self, id: &str, fields: &UpdateFields) -> anyhow::Result<()>;
    fn list(&self, filter: &ListFilter) -> anyhow::Result<Vec<Issue>>;
}

/// Adapter over the beads CLI (`bd`).
pub struct BeadsCli {
    bd: String,
    dir: PathBuf,
}

impl BeadsCli {
    pub fn new(bd: &str, town_root: &Path) -> Self {
        Self {
            bd: bd.to_string(),
            dir: town_root.to_path_buf(),
        }
    }

    fn tool(&self) -> Tool {
        Tool::new(&self.bd)
            .current_dir(&self.dir)
            .timeout(BD_TIMEOUT)
    }
}

impl IssueStore for BeadsCli {
    fn show(&self, id: &str) -> anyhow::Result<Issue> {
        let output = self.tool().args(&["show", id, "--json"]).run_ok()?;
        // bd show returns a one-element array
        let mut issues: Vec<Issue> = output
            .parse_json()
            .with_context(|| format!("parsing bd show {id}"))?;
        issues
            .pop()
            .with_context(|| format!("bead not found: {id}"))
    }

    fn update(&self, id: &str, fields: &UpdateFields) -> anyhow::Result<()> {
        let mut args: Vec<String> = vec!["update".into(), id.into()];
        if let Some(ref status) = fields.status {
            args.push(format!("--status={status}"));
        }
        if fields.clear_assignee {
            args.push("--assignee=".into());
        } else if let Some(ref assignee) = fields.assignee {
            args.push(format!("--assignee={assignee}"));
        }
        for label in &fields.add_labels {
            args.push(format!("--add-label={label}"));
        }
        for label in &fields.remove_labels {
            args.push(format!("--remove-label={label}"));
        }
        if args.len() > 2 {
            let refs: Vec<&str> = args.iter().map(String::as_str).collect();
            self.tool().args(&refs).run_ok()?;
        }

        // Agent lifecycle state rides a separate subcommand
        if let Some(ref state) = fields.agent_state {
            self.tool().args(&["agent", "state", id, state]).run_ok()?;
        }
        Ok(())
    }

    fn list(&self, filter: &ListFilter) -> anyhow::Result<Vec<Issue>> {
        let mut args: Vec<String> = vec!["list".into(), "--json".into()];
        if let Some(ref status) = filter.status {
            args.push(format!("--status={status}"));
        }
        if let Some(ref assignee) = filter.assignee {
            args.push(format!("--assignee={assignee}"));
        }
        if let Some(ref label) = filter.label {
            args.push(format!("--label={label}"));
        }
        if let Some(ref parent) = filter.parent {
            args.push(format!("--parent={parent}"));
        }
        if let Some(ref issue_type) = filter.issue_type {
            args.push(format!("--type={issue_type}"));
        }
        let refs: Vec<&str> = args.iter().map(String::as_str).collect();
        let output = self.tool().args(&refs).run_ok()?;
        let mut issues: Vec<Issue> = output.parse_json().context("parsing bd list")?;

        // bd has no age predicate; apply it here
        if let Some(older_than) = filter.older_than {
            issues.retain(|i| i.age().is_some_and(|age| age > older_than));
        }
        Ok(issues)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    #[test]
    fn ready_requires_open_unassigned_unblocked() {
        let mut issue = Issue {
            status: "open".into(),
            ..Issue::default()
        };
        assert!(issue.is_ready());

        issue.assignee = "gastown/polecats/max".into();
        assert!(!issue.is_ready());

        issue.assignee.clear();
        issue.blocked = true;
        assert!(!issue.is_ready());

        issue.blocked = false;
        issue.status = "hooked".into();
        assert!(!issue.is_ready());
    }

    #[test]
    fn age_from_updated_at() {
        let issue = Issue {
            updated_at: Some(Utc::now() - TimeDelta::seconds(90)),
            ..Issue::default()
        };
        let age = issue.age().unwrap();
        assert!(age >= Duration::from_secs(89));
        assert!(age < Duration::from_secs(95));

        assert!(Issue::default().age().is_none());
    }

    #[test]
    fn issue_parses_bd_json() {
        let json = r#"{
            "id": "gt-a1b2",
            "title": "fix flaky nudge",
            "status": "hooked",
            "assignee": "gastown/polecats/max",
            "labels": ["bug"],
            "type": "task",
            "updated_at": "2026-01-10T12:00:00Z"
        }"#;
        let issue: Issue = serde_json::from_str(json).unwrap();
        assert_eq!(issue.id, "gt-a1b2");
        assert_eq!(issue.issue_type, "task");
        assert_eq!(issue.status, "hooked");
        assert!(!issue.blocked);
        assert!(issue.updated_at.is_some());
    }
}
