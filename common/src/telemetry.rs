use tracing::subscriber::{set_global_default, SetGlobalDefaultError};
use tracing::Subscriber;
use tracing_bunyan_formatter::{BunyanFormattingLayer, JsonStorageLayer};
use tracing_log::{log::SetLoggerError, LogTracer};
use tracing_subscriber::{fmt::MakeWriter, layer::SubscriberExt, EnvFilter, Registry};

use crate::helper::error_chain_fmt;

/// Composes the `tracing` layers used by every service into a single Subscriber.
///
/// Spans and events are filtered with `RUST_LOG` (or `fallback_env_filter` when the variable
/// is not set), then stored as JSON and written in the "bunyan" format to `sink`.
///
/// # Arguments
/// - `name`: name of the app, written in each log record
/// - `fallback_env_filter`: filter directives used if RUST_LOG has not been set (ex: `info`)
/// - `sink`: where the records are written (`std::io::stdout`, `std::io::sink` in tests)
pub fn get_tracing_subscriber<Sink>(
    name: String,
    fallback_env_filter: String,
    sink: Sink,
) -> impl Subscriber + Send + Sync
where
    // The sink implements `MakeWriter` for all choices of the lifetime parameter `'a`
    Sink: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback_env_filter));

    let formatting_layer = BunyanFormattingLayer::new(name, sink);

    Registry::default()
        .with(env_filter)
        // Keeps span fields as JSON and propagates them from parent spans to their children
        .with(JsonStorageLayer)
        .with(formatting_layer)
}

/// Registers a Subscriber as the global default and redirects `log` records to it.
///
/// Must be called only once per process: a second call fails with `TelemetryError`.
pub fn init_tracing_subscriber(
    subscriber: impl Subscriber + Send + Sync,
) -> Result<(), TelemetryError> {
    LogTracer::init()?;
    set_global_default(subscriber)?;

    Ok(())
}

#[derive(thiserror::Error)]
pub enum TelemetryError {
    #[error("Failed to redirect `log` records to tracing: {0}")]
    LoggerError(#[from] SetLoggerError),
    #[error("Failed to set the global tracing subscriber: {0}")]
    SubscriberError(#[from] SetGlobalDefaultError),
}

impl std::fmt::Debug for TelemetryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}
