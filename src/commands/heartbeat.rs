use clap::Args;

use crate::deacon::{Heartbeat, PauseGate};

#[derive(Debug, Args)]
pub struct HeartbeatArgs {
    /// What the deacon is currently doing (free text)
    pub action: Vec<String>,
}

impl HeartbeatArgs {
    pub fn execute(&self) -> anyhow::Result<()> {
        let (town_root, _cfg) = super::town_context()?;
        let gate = PauseGate::new(&town_root);
        let heartbeat = Heartbeat::new(&town_root);

        let action = if self.action.is_empty() {
            None
        } else {
            Some(self.action.join(" "))
        };
        heartbeat.touch(&gate, action.as_deref())?;

        match action {
            Some(action) => println!("heartbeat updated: {action}"),
            None => println!("heartbeat updated"),
        }
        Ok(())
    }
}
