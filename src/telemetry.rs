//! Tracing setup for the gtd binary.
//!
//! Log level comes from `GASTOWN_LOG` (EnvFilter syntax, default `warn`).
//! Set `GASTOWN_LOG_FORMAT=json` for line-delimited JSON events.

use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber. Call once from main().
pub fn init() {
    let filter = EnvFilter::try_from_env("GASTOWN_LOG")
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let json = std::env::var("GASTOWN_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    // try_init: tests may initialize more than once
    if json {
        let _ = builder.json().try_init();
    } else {
        let _ = builder.compact().try_init();
    }
}
