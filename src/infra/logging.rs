//! Tracing subscriber setup for the CLI

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Level used when `RUST_LOG` is not set
pub fn default_level(verbosity: u8, quiet: bool) -> &'static str {
    if quiet {
        return "error";
    }
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Install a stderr `fmt` subscriber; `RUST_LOG` takes precedence over `-v`
pub fn init(verbosity: u8, quiet: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("diffpack={}", default_level(verbosity, quiet))));

    // A second init (tests) keeps the first subscriber
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(verbosity > 1))
        .try_init()
        .ok();
}
