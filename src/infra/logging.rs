//! Tracing subscriber bootstrap for the binary.
//!
//! Logs go to stderr so stdout stays parseable. `REFMARK_LOG` takes any
//! `EnvFilter` directive and wins over `--verbose`.

use tracing_subscriber::EnvFilter;

/// Env var holding a filter directive
pub const LOG_ENV: &str = "REFMARK_LOG";

/// Filter used when `REFMARK_LOG` is unset
pub fn default_directive(verbose: bool) -> &'static str {
    if verbose { "refmark=debug" } else { "refmark=warn" }
}

/// Install the global fmt subscriber; repeated calls are ignored
pub fn init(verbose: bool, no_color: bool) {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(!no_color)
        .with_target(false)
        .try_init();
}
