//! CLI command wiring. Thin by design: parse flags, check the pause gate,
//! hand off to a mechanism, print one-line statuses, map outcomes to the
//! documented exit codes.

pub mod feed_stranded;
pub mod force_kill;
pub mod health_check;
pub mod health_state;
pub mod heartbeat;
pub mod pause;
pub mod redispatch;
pub mod schema;
pub mod stale_hooks;

use std::path::PathBuf;

use crate::config::{self, Config};

/// Resolve the town root and load its config.
pub(crate) fn town_context() -> anyhow::Result<(PathBuf, Config)> {
    let town_root = config::find_town_root_from_cwd()?;
    let cfg = Config::load_from_town(&town_root)?;
    Ok((town_root, cfg))
}
