//! Tracing setup for the CLI entrypoint (SPEC_FULL.md §3.1). Library code
//! never installs a global subscriber — only `main.rs` calls this, keeping
//! `tracing_subscriber::Registry` construction in exactly one place.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install a `tracing_subscriber` registry with an `EnvFilter` derived from
/// `RUST_LOG` (default `info`), bumped by `-v`/`-vv`/`-vvv` on the CLI.
pub fn init(verbosity: u8) {
    let default_level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
