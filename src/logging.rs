//! Tracing subscriber setup for the `markdir` binary.

use tracing_subscriber::EnvFilter;

/// Default filter directive for a `-v` count.
pub fn default_directive(verbosity: u8, serving: bool) -> &'static str {
    match (verbosity, serving) {
        (0, false) => "warn",
        (0, true) | (1, _) => "info",
        _ => "debug",
    }
}

/// Install a stderr `fmt` subscriber. `RUST_LOG` takes precedence over
/// the verbosity flags. Calling this twice is harmless.
pub fn init(verbosity: u8, serving: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity, serving)));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
