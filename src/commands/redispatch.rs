use std::time::Duration;

use clap::Args;

use crate::collab::{BeadsCli, SlingDispatcher, TownMail};
use crate::deacon::{PauseGate, RedispatchAction, RedispatchController, RedispatchSettings};
use crate::error::ExitError;
use crate::state::StateStore;

#[derive(Debug, Args)]
pub struct RedispatchArgs {
    /// Bead to redispatch
    pub bead: String,
    /// Target rig (default: inferred from the bead ID prefix)
    #[arg(long)]
    pub rig: Option<String>,
    /// Attempts before escalating to the coordinator
    #[arg(long)]
    pub max_attempts: Option<u32>,
    /// Minimum seconds between attempts for the same bead
    #[arg(long)]
    pub cooldown: Option<u64>,
    /// Output the result as JSON
    #[arg(long)]
    pub json: bool,
}

impl RedispatchArgs {
    pub fn execute(&self) -> anyhow::Result<()> {
        let (town_root, cfg) = super::town_context()?;
        PauseGate::new(&town_root).ensure_active()?;

        let mut settings = RedispatchSettings::from(&cfg.deacon);
        if let Some(n) = self.max_attempts {
            settings.max_attempts = n;
        }
        if let Some(secs) = self.cooldown {
            settings.cooldown = Duration::from_secs(secs);
        }

        let issues = BeadsCli::new(&cfg.tools.bd, &town_root);
        let dispatcher = SlingDispatcher::new(&cfg.tools.gt, &town_root);
        let notifier = TownMail::new(&cfg.tools.gt, &town_root);
        let store = StateStore::new(&town_root);
        let controller = RedispatchController {
            issues: &issues,
            dispatcher: &dispatcher,
            notifier: &notifier,
            store: &store,
            config: &cfg,
            settings,
        };

        let action = controller.redispatch(&self.bead, self.rig.as_deref())?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&action)?);
        } else {
            match &action {
                RedispatchAction::Redispatched { rig, attempt } => println!(
                    "redispatched {} to {rig} (attempt {attempt}/{})",
                    self.bead, settings.max_attempts
                ),
                RedispatchAction::Escalated { attempts } => println!(
                    "escalated {} after {attempts} attempts; coordinator notified",
                    self.bead
                ),
                RedispatchAction::AlreadyEscalated => {
                    println!("{} is already escalated; nothing to do", self.bead);
                }
                RedispatchAction::Cooldown { remaining_secs } => println!(
                    "{} is in redispatch cooldown ({remaining_secs}s remaining); retry later",
                    self.bead
                ),
                RedispatchAction::Skipped { reason } => {
                    println!("skipped {}: not redispatchable ({reason})", self.bead);
                }
            }
        }

        match action {
            // Exit 2: retry-later, distinct from failure for the driver
            RedispatchAction::Cooldown { .. } => Err(ExitError::status(2).into()),
            // Exit 3: bead is not in a redispatchable state
            RedispatchAction::Skipped { .. } => Err(ExitError::status(3).into()),
            _ => Ok(()),
        }
    }
}
