use clap::Args;

use crate::deacon::{Heartbeat, PauseGate};

#[derive(Debug, Args)]
pub struct PauseArgs {
    /// Reason for pausing (shown in status and refusals)
    #[arg(long)]
    pub reason: Option<String>,
}

impl PauseArgs {
    pub fn execute(&self) -> anyhow::Result<()> {
        let (town_root, _cfg) = super::town_context()?;
        let gate = PauseGate::new(&town_root);

        if let Some(state) = gate.state()? {
            println!("deacon is already paused");
            if !state.reason.is_empty() {
                println!("  reason: {}", state.reason);
            }
            println!("  paused at: {}", state.paused_at.to_rfc3339());
            println!("  paused by: {}", state.paused_by);
            return Ok(());
        }

        gate.pause(self.reason.as_deref().unwrap_or(""), "human")?;
        println!("deacon paused");
        if let Some(ref reason) = self.reason {
            println!("  reason: {reason}");
        }
        println!("  pause file: {}", gate.path().display());
        println!("no patrol actions will run until 'gtd resume'");
        Ok(())
    }
}

#[derive(Debug, Args)]
pub struct ResumeArgs {}

impl ResumeArgs {
    pub fn execute(&self) -> anyhow::Result<()> {
        let (town_root, _cfg) = super::town_context()?;
        let gate = PauseGate::new(&town_root);

        if gate.resume()? {
            println!("deacon resumed; patrol actions allowed again");
        } else {
            println!("deacon is not paused");
        }
        Ok(())
    }
}

#[derive(Debug, Args)]
pub struct StatusArgs {}

impl StatusArgs {
    pub fn execute(&self) -> anyhow::Result<()> {
        let (town_root, _cfg) = super::town_context()?;
        let gate = PauseGate::new(&town_root);

        if let Some(state) = gate.state()? {
            println!("deacon: PAUSED");
            if !state.reason.is_empty() {
                println!("  reason: {}", state.reason);
            }
            println!("  paused at: {}", state.paused_at.to_rfc3339());
            println!("  paused by: {}", state.paused_by);
            println!("resume with: gtd resume");
        } else {
            println!("deacon: running");
        }

        let heartbeat = Heartbeat::new(&town_root);
        match heartbeat.last()? {
            Some(record) => {
                print!("last heartbeat: {}", record.last_beat.to_rfc3339());
                if let Some(action) = record.action {
                    print!(" ({action})");
                }
                println!();
            }
            None => println!("last heartbeat: never"),
        }
        Ok(())
    }
}
