use std::path::PathBuf;

/// Errors surfaced synchronously by configuration, flush and shutdown.
///
/// Export-time failures never show up here; the batch processor drops or
/// retries those on its own.
#[derive(Debug, thiserror::Error)]
pub enum TraceError {
    /// Invalid or incomplete trace settings (bad protocol, malformed endpoint,
    /// half an mTLS pair, unparseable PEM).
    #[error("Configuration error: {0}")]
    Config(String),

    /// TLS material referenced by path could not be read.
    #[error("Failed to read TLS material from {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Initialization error: {0}")]
    Init(String),

    #[error("Flush error: {0}")]
    Flush(String),
}

impl TraceError {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// True for errors caused by the supplied settings rather than the backend.
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_) | Self::Io { .. })
    }
}

#[cfg(feature = "otlp")]
impl From<opentelemetry_otlp::ExporterBuildError> for TraceError {
    // The exporter only fails to build on settings it cannot use, such as an
    // unparseable endpoint or a certificate tonic rejects.
    fn from(err: opentelemetry_otlp::ExporterBuildError) -> Self {
        Self::Config(format!("exporter rejected settings: {err}"))
    }
}

#[cfg(feature = "otlp")]
impl From<opentelemetry_sdk::error::OTelSdkError> for TraceError {
    fn from(err: opentelemetry_sdk::error::OTelSdkError) -> Self {
        Self::Flush(err.to_string())
    }
}
