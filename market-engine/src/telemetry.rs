//! Tracing setup for embedding binaries
//!
//! The library itself only emits `tracing` events; a binary embedding
//! the engine calls [`init`] once at startup to install the global
//! subscriber.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global tracing subscriber
///
/// Respects `RUST_LOG`, defaulting to `info`. With `json` set the
/// output is structured for log shippers. A second call is a no-op, so
/// tests can call this freely.
pub fn init(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if json {
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .try_init();
    } else {
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .try_init();
    }
}
