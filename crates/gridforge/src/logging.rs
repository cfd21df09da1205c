//! Tracing setup for binaries built on Gridforge.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Installs a global `tracing` subscriber that writes to stderr.
///
/// The filter comes from `RUST_LOG` when it is set; otherwise every
/// Gridforge crate logs at `default_level` and the WebSocket library is
/// kept at `warn`. Calling this twice is harmless: the second call
/// leaves the first subscriber in place.
///
/// # Examples
///
/// ```no_run
/// gridforge::logging::init_tracing("info");
/// ```
pub fn init_tracing(default_level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("{default_level},tokio_tungstenite=warn,tungstenite=warn").into()
    });

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}
