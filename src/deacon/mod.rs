//! The deacon recovery control loop.
//!
//! Five remediation mechanisms (health checks, force-kill, stale-hook
//! reclamation, redispatch, stranded-convoy feeding) plus the pause gate and
//! heartbeat that make repeated invocations safe. Each mechanism is a
//! short-lived, stateless-process entry point: load its state slice, decide,
//! act through collaborators, persist.

pub mod convoy;
pub mod force_kill;
pub mod health;
pub mod heartbeat;
pub mod pause;
pub mod redispatch;
pub mod stale_hooks;

#[cfg(test)]
pub(crate) mod testing;

pub use convoy::{ConvoyAction, ConvoyFeedSettings, FeedResult, StrandedConvoyFeeder};
pub use force_kill::{ForceKillExecutor, ForceKillOutcome, ForceKillSettings};
pub use health::{HealthCheckOutcome, HealthCheckSettings, HealthMonitor};
pub use heartbeat::Heartbeat;
pub use pause::{PauseGate, PauseState};
pub use redispatch::{RedispatchAction, RedispatchController, RedispatchSettings};
pub use stale_hooks::{HookScanResult, StaleHookAction, StaleHookScanner, StaleHookSettings};
