//! Structured logging setup
//!
//! The subscriber is installed for the lifetime of the returned guard rather
//! than process-wide, so tests and embedders can run their own. It is
//! thread-local, which fits the single-threaded runtime the binary uses.

use tracing::subscriber::DefaultGuard;
use tracing::Subscriber;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

/// Default filter directive for the given verbosity
pub fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "debug"
    } else {
        "info"
    }
}

/// Build the run's subscriber. `RUST_LOG` wins over `verbose` when set.
pub fn subscriber(verbose: bool) -> impl Subscriber + Send + Sync {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish()
}

/// Install the run's subscriber on the current thread until the guard drops
pub fn install(verbose: bool) -> DefaultGuard {
    tracing::subscriber::set_default(subscriber(verbose))
}
