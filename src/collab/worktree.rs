use std::path::Path;
use std::time::Duration;

use crate::subprocess::Tool;

/// Result of inspecting an agent's working tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorktreeStatus {
    /// Uncommitted changes present.
    pub dirty: bool,
    /// Commits not pushed to the upstream branch.
    pub unpushed: usize,
}

impl WorktreeStatus {
    /// Any work that would be lost if the tree were discarded.
    pub const fn has_partial_work(&self) -> bool {
        self.dirty || self.unpushed > 0
    }
}

/// Inspects working trees for uncommitted or unpushed work.
pub trait WorktreeInspector {
    fn status(&self, path: &Path) -> anyhow::Result<WorktreeStatus>;
}

/// git-backed inspector.
pub struct GitWorktree {
    git: String,
}

impl GitWorktree {
    pub fn new(git: &str) -> Self {
        Self {
            git: git.to_string(),
        }
    }

    fn tool(&self, path: &Path) -> Tool {
        Tool::new(&self.git)
            .current_dir(path)
            .timeout(Duration::from_secs(30))
    }
}

impl WorktreeInspector for GitWorktree {
    fn status(&self, path: &Path) -> anyhow::Result<WorktreeStatus> {
        let porcelain = self
            .tool(path)
            .args(&["status", "--porcelain"])
            .run_ok()?;
        let dirty = !porcelain.stdout.trim().is_empty();

        // No upstream configured reads as nothing unpushed, not an error
        let unpushed = self
            .tool(path)
            .args(&["rev-list", "--count", "@{upstream}..HEAD"])
            .run_ok()
            .ok()
            .and_then(|out| out.stdout.trim().parse::<usize>().ok())
            .unwrap_or(0);

        Ok(WorktreeStatus { dirty, unpushed })
    }
}
