use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::subprocess::Tool;

/// Mail to agents and the coordinator. Delivery is best-effort everywhere
/// this core uses it; callers downgrade failures to warnings.
pub trait Notifier {
    fn send(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()>;
}

/// Adapter over the town CLI's mail subsystem.
pub struct TownMail {
    gt: String,
    dir: PathBuf,
}

impl TownMail {
    pub fn new(gt: &str, town_root: &Path) -> Self {
        Self {
            gt: gt.to_string(),
            dir: town_root.to_path_buf(),
        }
    }
}

impl Notifier for TownMail {
    fn send(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()> {
        Tool::new(&self.gt)
            .args(&["mail", "send", to, "-s", subject, "-m", body])
            .current_dir(&self.dir)
            .timeout(Duration::from_secs(30))
            .run_ok()?;
        Ok(())
    }
}
