//! In-process collaborator fakes for mechanism tests.

use std::cell::{Cell, RefCell};
use std::collections::BTreeSet;
use std::path::Path;

use anyhow::bail;
use chrono::Utc;

use crate::collab::{
    Issue, IssueStore, ListFilter, Notifier, SessionManager, UpdateFields, WorkDispatcher,
    WorktreeInspector, WorktreeStatus,
};

#[derive(Default)]
pub struct FakeSessions {
    pub alive: RefCell<BTreeSet<String>>,
    pub nudges: RefCell<Vec<(String, String)>>,
    pub kills: RefCell<Vec<String>>,
    pub fail_nudge: Cell<bool>,
}

impl FakeSessions {
    pub fn with_alive(sessions: &[&str]) -> Self {
        let fake = Self::default();
        for s in sessions {
            fake.alive.borrow_mut().insert((*s).to_string());
        }
        fake
    }
}

impl SessionManager for FakeSessions {
    fn exists(&self, session: &str) -> anyhow::Result<bool> {
        Ok(self.alive.borrow().contains(session))
    }

    fn nudge(&self, session: &str, message: &str) -> anyhow::Result<()> {
        if self.fail_nudge.get() {
            bail!("send-keys failed");
        }
        self.nudges
            .borrow_mut()
            .push((session.to_string(), message.to_string()));
        Ok(())
    }

    fn kill_with_processes(&self, session: &str) -> anyhow::Result<()> {
        self.alive.borrow_mut().remove(session);
        self.kills.borrow_mut().push(session.to_string());
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeIssues {
    pub issues: RefCell<Vec<Issue>>,
    pub updates: RefCell<Vec<(String, UpdateFields)>>,
    /// When set, show() stamps updated_at with the current time, modeling an
    /// agent that touches its bead as soon as it's probed.
    pub fresh_updates: Cell<bool>,
    pub fail_show: Cell<bool>,
    pub fail_list: Cell<bool>,
}

impl FakeIssues {
    pub fn with_issues(issues: Vec<Issue>) -> Self {
        let fake = Self::default();
        *fake.issues.borrow_mut() = issues;
        fake
    }
}

impl IssueStore for FakeIssues {
    fn show(&self, id: &str) -> anyhow::Result<Issue> {
        if self.fail_show.get() {
            bail!("bd unavailable");
        }
        let issues = self.issues.borrow();
        let Some(issue) = issues.iter().find(|i| i.id == id) else {
            bail!("bead not found: {id}");
        };
        let mut issue = issue.clone();
        if self.fresh_updates.get() {
            issue.updated_at = Some(Utc::now());
        }
        Ok(issue)
    }

    fn update(&self, id: &str, fields: &UpdateFields) -> anyhow::Result<()> {
        // Apply to the stored issue so callers can assert on visible state
        let mut issues = self.issues.borrow_mut();
        if let Some(issue) = issues.iter_mut().find(|i| i.id == id) {
            if let Some(ref status) = fields.status {
                issue.status = status.clone();
            }
            if fields.clear_assignee {
                issue.assignee.clear();
            } else if let Some(ref assignee) = fields.assignee {
                issue.assignee = assignee.clone();
            }
        }
        self.updates
            .borrow_mut()
            .push((id.to_string(), fields.clone()));
        Ok(())
    }

    fn list(&self, filter: &ListFilter) -> anyhow::Result<Vec<Issue>> {
        if self.fail_list.get() {
            bail!("bd unavailable");
        }
        let issues = self.issues.borrow();
        Ok(issues
            .iter()
            .filter(|i| {
                filter.status.as_ref().is_none_or(|s| &i.status == s)
                    && filter.assignee.as_ref().is_none_or(|a| &i.assignee == a)
                    && filter.label.as_ref().is_none_or(|l| i.labels.contains(l))
                    && filter.parent.as_ref().is_none_or(|p| i.parent.as_ref() == Some(p))
                    && filter
                        .issue_type
                        .as_ref()
                        .is_none_or(|t| &i.issue_type == t)
                    && filter
                        .older_than
                        .is_none_or(|cutoff| i.age().is_some_and(|age| age > cutoff))
            })
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct FakeNotifier {
    pub sent: RefCell<Vec<(String, String, String)>>,
    pub fail: Cell<bool>,
}

impl Notifier for FakeNotifier {
    fn send(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()> {
        if self.fail.get() {
            bail!("mail router down");
        }
        self.sent
            .borrow_mut()
            .push((to.to_string(), subject.to_string(), body.to_string()));
        Ok(())
    }
}

pub struct FakeWorktree {
    pub status: WorktreeStatus,
    pub fail: Cell<bool>,
}

impl Default for FakeWorktree {
    fn default() -> Self {
        Self {
            status: WorktreeStatus::default(),
            fail: Cell::new(false),
        }
    }
}

impl WorktreeInspector for FakeWorktree {
    fn status(&self, _path: &Path) -> anyhow::Result<WorktreeStatus> {
        if self.fail.get() {
            bail!("not a git repository");
        }
        Ok(self.status)
    }
}

#[derive(Default)]
pub struct FakeDispatcher {
    pub dispatched: RefCell<Vec<(String, String)>>,
    pub fed: RefCell<Vec<String>>,
    pub fail: Cell<bool>,
}

impl WorkDispatcher for FakeDispatcher {
    fn dispatch_bead(&self, bead: &str, rig: &str) -> anyhow::Result<()> {
        if self.fail.get() {
            bail!("no workers available");
        }
        self.dispatched
            .borrow_mut()
            .push((bead.to_string(), rig.to_string()));
        Ok(())
    }

    fn feed_convoy(&self, convoy: &str) -> anyhow::Result<()> {
        if self.fail.get() {
            bail!("no workers available");
        }
        self.fed.borrow_mut().push(convoy.to_string());
        Ok(())
    }
}
