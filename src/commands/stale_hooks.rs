use std::time::Duration;

use clap::Args;

use crate::collab::{BeadsCli, GitWorktree, TmuxSessions};
use crate::deacon::{PauseGate, StaleHookAction, StaleHookScanner, StaleHookSettings};

#[derive(Debug, Args)]
pub struct StaleHooksArgs {
    /// Seconds since last update before a hooked bead is considered stale
    #[arg(long)]
    pub max_age: Option<u64>,
    /// Preview what would be unhooked without making changes
    #[arg(long)]
    pub dry_run: bool,
    /// Output the result as JSON
    #[arg(long)]
    pub json: bool,
}

impl StaleHooksArgs {
    pub fn execute(&self) -> anyhow::Result<()> {
        let (town_root, cfg) = super::town_context()?;
        PauseGate::new(&town_root).ensure_active()?;

        let mut settings = StaleHookSettings::from(&cfg.deacon);
        if let Some(secs) = self.max_age {
            settings.max_age = Duration::from_secs(secs);
        }
        settings.dry_run = self.dry_run;

        let sessions = TmuxSessions::new(&cfg.tools.tmux);
        let issues = BeadsCli::new(&cfg.tools.bd, &town_root);
        let worktrees = GitWorktree::new(&cfg.tools.git);
        let scanner = StaleHookScanner {
            sessions: &sessions,
            issues: &issues,
            worktrees: &worktrees,
            town_root: &town_root,
            settings,
        };

        let result = scanner.scan()?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&result)?);
            return Ok(());
        }

        if result.total_hooked == 0 {
            println!("no hooked beads found");
            return Ok(());
        }
        println!(
            "found {} hooked bead(s), {} stale (older than {}s)",
            result.total_hooked,
            result.stale,
            settings.max_age.as_secs()
        );

        for record in &result.results {
            let action = match record.action {
                StaleHookAction::SkippedAlive => "skipped (agent alive)".to_string(),
                StaleHookAction::WouldUnhook => "would unhook (agent dead)".to_string(),
                StaleHookAction::Unhooked => "unhooked (agent dead)".to_string(),
                StaleHookAction::Failed => format!(
                    "failed: {}",
                    record.error.as_deref().unwrap_or("unknown error")
                ),
            };
            println!(
                "  {}: {} (age: {}s, assignee: {})",
                record.bead_id, action, record.age_secs, record.assignee
            );
            if let Some(ref partial) = record.partial_work {
                println!("    warning: partial work in tree: {partial}");
            }
            if let Some(ref warning) = record.warning {
                println!("    warning: {warning}");
            }
        }

        if self.dry_run {
            println!("dry run; no changes made (run without --dry-run to unhook)");
        } else if result.unhooked > 0 {
            println!("unhooked {} stale bead(s)", result.unhooked);
        }
        Ok(())
    }
}
