//! Log output for the host process, optionally bridged into exported traces.

use std::env;

use tracing::Subscriber;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::trace::error::TraceError;

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable with colors
    #[default]
    Pretty,
    /// One JSON object per line
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

impl LogConfig {
    /// Read `RUST_LOG` and `LOG_FORMAT`
    pub fn from_env() -> Self {
        let format = match env::var("LOG_FORMAT").as_deref() {
            Ok(value) if value.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        };

        Self {
            level: env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            format,
        }
    }

    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }
}

/// Bridge `tracing` spans into the installed trace provider.
///
/// `None` unless tracing is enabled. The layer keeps the provider it was built
/// from; after a reconfigure its spans go nowhere.
#[cfg(feature = "otlp")]
pub fn build_otel_layer<S>(
    name: &'static str,
) -> Option<tracing_opentelemetry::OpenTelemetryLayer<S, opentelemetry_sdk::trace::Tracer>>
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    use opentelemetry::trace::TracerProvider as _;

    crate::trace::provider::with_active_provider(|provider| {
        tracing_opentelemetry::layer().with_tracer(provider.tracer(name))
    })
}

/// Build the JSON fmt layer for log shippers
pub fn build_json_layer<S>() -> impl Layer<S>
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    tracing_subscriber::fmt::layer()
        .json()
        .flatten_event(true)
        .with_current_span(true)
        .with_ansi(false)
}

/// Build the pretty fmt layer for terminals
pub fn build_pretty_layer<S>() -> impl Layer<S>
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    tracing_subscriber::fmt::layer()
        .pretty()
        .with_ansi(true)
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(FmtSpan::CLOSE)
}

/// `RUST_LOG` wins over the configured level
pub fn build_filter(config: &LogConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level))
}

/// Install the global subscriber.
///
/// Call after `configure()` so the trace bridge can attach to the provider.
pub fn init_logging(config: &LogConfig) -> Result<(), TraceError> {
    let registry = tracing_subscriber::registry().with(build_filter(config));
    #[cfg(feature = "otlp")]
    let registry = registry.with(build_otel_layer(env!("CARGO_PKG_NAME")));

    let installed = match config.format {
        LogFormat::Pretty => registry.with(build_pretty_layer()).try_init(),
        LogFormat::Json => registry.with(build_json_layer()).try_init(),
    };

    installed.map_err(|e| TraceError::Init(format!("failed to install log subscriber: {e}")))
}
