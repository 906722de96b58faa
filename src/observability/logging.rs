//! Developer diagnostics via `tracing`.
//!
//! This is separate from the in-memory [`Tracer`](super::Tracer): the tracer
//! is a product artifact that can be exported, while these logs only go to
//! stderr and are filtered by `RUST_LOG`.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the global subscriber.
///
/// Reads `RUST_LOG`; when unset, defaults to `warn`, or to `revloop=debug`
/// when `verbose` is set.
pub fn init(verbose: bool) {
    let fallback = if verbose { "warn,revloop=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    // A second init (e.g. from tests) keeps the first subscriber.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .try_init();
}
