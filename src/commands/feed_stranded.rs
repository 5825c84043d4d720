use std::time::Duration;

use clap::Args;

use crate::collab::{BeadsCli, SlingDispatcher};
use crate::deacon::{ConvoyAction, ConvoyFeedSettings, PauseGate, StrandedConvoyFeeder};
use crate::state::StateStore;

#[derive(Debug, Args)]
pub struct FeedStrandedArgs {
    /// Maximum convoys acted on this cycle
    #[arg(long)]
    pub max_feeds: Option<u32>,
    /// Minimum seconds between feeds of the same convoy
    #[arg(long)]
    pub cooldown: Option<u64>,
    /// Output the result as JSON
    #[arg(long)]
    pub json: bool,
}

impl FeedStrandedArgs {
    pub fn execute(&self) -> anyhow::Result<()> {
        let (town_root, cfg) = super::town_context()?;
        PauseGate::new(&town_root).ensure_active()?;

        let mut settings = ConvoyFeedSettings::from(&cfg.deacon);
        if let Some(n) = self.max_feeds {
            settings.max_feeds_per_cycle = n;
        }
        if let Some(secs) = self.cooldown {
            settings.cooldown = Duration::from_secs(secs);
        }

        let issues = BeadsCli::new(&cfg.tools.bd, &town_root);
        let dispatcher = SlingDispatcher::new(&cfg.tools.gt, &town_root);
        let store = StateStore::new(&town_root);
        let feeder = StrandedConvoyFeeder {
            issues: &issues,
            dispatcher: &dispatcher,
            store: &store,
            settings,
        };

        let result = feeder.feed_stranded()?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&result)?);
            return Ok(());
        }

        if result.details.is_empty() {
            println!("no stranded convoys");
            return Ok(());
        }

        for record in &result.details {
            let line = match record.action {
                ConvoyAction::Fed => "fed (worker dispatched)".to_string(),
                ConvoyAction::Closed => "closed (no tracked items)".to_string(),
                ConvoyAction::Cooldown => "skipped (cooldown)".to_string(),
                ConvoyAction::Limit => "deferred (per-cycle limit)".to_string(),
                ConvoyAction::Error => format!(
                    "error: {}",
                    record.error.as_deref().unwrap_or("unknown error")
                ),
            };
            println!("  {}: {line} (ready: {})", record.convoy_id, record.ready);
        }
        println!(
            "fed {} convoy(s), closed {}, skipped {}, errors {}",
            result.fed, result.closed, result.skipped, result.errors
        );
        Ok(())
    }
}
