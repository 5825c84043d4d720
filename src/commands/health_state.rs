use clap::Args;
use chrono::Utc;

use crate::deacon::HealthCheckSettings;
use crate::state::StateStore;

#[derive(Debug, Args)]
pub struct HealthStateArgs {
    /// Output the full state document as JSON
    #[arg(long)]
    pub json: bool,
}

impl HealthStateArgs {
    pub fn execute(&self) -> anyhow::Result<()> {
        let (town_root, cfg) = super::town_context()?;
        let store = StateStore::new(&town_root);
        let doc = store.load_health()?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&doc)?);
            return Ok(());
        }

        if doc.agents.is_empty() {
            println!("no health check state recorded yet");
            return Ok(());
        }

        let settings = HealthCheckSettings::from(&cfg.deacon);
        println!("health check state (updated {})", doc.last_updated.to_rfc3339());
        for (agent, state) in &doc.agents {
            println!();
            println!("agent: {agent}");
            if let Some(ping) = state.last_ping_time {
                println!("  last ping: {}s ago", age_secs(ping));
            }
            if let Some(response) = state.last_response_time {
                println!("  last response: {}s ago", age_secs(response));
            }
            println!("  consecutive failures: {}", state.consecutive_failures);
            println!("  total force-kills: {}", state.force_kill_count);
            if let Some(kill) = state.last_force_kill_time {
                println!("  last force-kill: {}s ago", age_secs(kill));
                if state.is_in_cooldown(settings.cooldown) {
                    println!(
                        "  cooldown: {}s remaining",
                        state.cooldown_remaining(settings.cooldown).as_secs()
                    );
                }
            }
        }
        Ok(())
    }
}

fn age_secs(t: chrono::DateTime<Utc>) -> i64 {
    Utc::now().signed_duration_since(t).num_seconds().max(0)
}
