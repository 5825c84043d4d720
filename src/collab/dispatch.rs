use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::subprocess::Tool;

/// Routes recovered work to workers.
pub trait WorkDispatcher {
    /// Hand a bead to an available worker on the given rig.
    fn dispatch_bead(&self, bead: &str, rig: &str) -> anyhow::Result<()>;

    /// Dispatch a worker to a stranded convoy.
    fn feed_convoy(&self, convoy: &str) -> anyhow::Result<()>;
}

/// Adapter over the town CLI's sling subsystem.
pub struct SlingDispatcher {
    gt: String,
    dir: PathBuf,
}

impl SlingDispatcher {
    pub fn new(gt: &str, town_root: &Path) -> Self {
        Self {
            gt: gt.to_string(),
            dir: town_root.to_path_buf(),
        }
    }

    fn tool(&self) -> Tool {
        Tool::new(&self.gt)
            .current_dir(&self.dir)
            .timeout(Duration::from_secs(60))
    }
}

impl WorkDispatcher for SlingDispatcher {
    fn dispatch_bead(&self, bead: &str, rig: &str) -> anyhow::Result<()> {
        self.tool().args(&["sling", bead, rig]).run_ok()?;
        Ok(())
    }

    fn feed_convoy(&self, convoy: &str) -> anyhow::Result<()> {
        let var = format!("convoy={convoy}");
        self.tool()
            .args(&["sling", "mol-convoy-feed", "deacon/dogs", "--var", &var])
            .run_ok()?;
        Ok(())
    }
}
