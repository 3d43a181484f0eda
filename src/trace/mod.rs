//! Process-wide distributed tracing with a zero-cost off switch.
//!
//! Tracing is configured once per process from the `runtime.trace` section of
//! the host configuration. When it is disabled, or never configured, every
//! tracer is a shared no-op and the OTLP backend is never constructed.
//!
//! # Features
//!
//! - `otlp` (default): OTLP export over gRPC (tonic) or HTTP (reqwest).
//!   Without it, enabling tracing is a configuration error.
//! - `test-internals` (default): exposes [`reset`]. Not for production use.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use otel_runtime::trace;
//!
//! trace::init()?;
//!
//! let tracer = trace::get_tracer("ingest");
//! tracer.in_span("load", |span| {
//!     span.set_attribute(KeyValue::new("rows", 42_i64));
//! });
//! ```
//!
//! # Configuration
//!
//! ```rust,ignore
//! use otel_runtime::trace::{self, Protocol, TlsConfig, TraceConfig};
//!
//! let config = TraceConfig::default()
//!     .with_enabled(true)
//!     .with_protocol(Protocol::Http)
//!     .with_endpoint("https://collector.internal:4318/v1/traces")
//!     .with_tls(TlsConfig::default().with_ca("/etc/tls/ca.pem"));
//!
//! trace::init_with_config(&config)?;
//! ```
//!
//! TLS fields take either inline PEM text or a file path. Files are read on
//! every `configure()` call, so rotated credentials are picked up.
//!
//! # Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `RUNTIME_TRACE_ENABLED` | Turn exporting on | `false` |
//! | `RUNTIME_TRACE_PROTOCOL` | `grpc` or `http` | `grpc` |
//! | `RUNTIME_TRACE_ENDPOINT` | `host:port` (grpc) or URL (http) | per protocol |
//! | `RUNTIME_TRACE_FLUSH_ON_EXIT` | Flush buffered spans at exit | `true` |
//! | `RUNTIME_TRACE_SERVICE_NAME` | `service.name` resource attribute | `CARGO_PKG_NAME` |
//! | `RUNTIME_TRACE_EXPORT_TIMEOUT_SECS` | Per-export timeout | `10` |
//! | `RUNTIME_TRACE_TLS_CA` | CA bundle, PEM or path | - |
//! | `RUNTIME_TRACE_TLS_CLIENT_CERT` | Client certificate, PEM or path | - |
//! | `RUNTIME_TRACE_TLS_CLIENT_KEY` | Client key, PEM or path | - |
//! | `RUST_LOG` | Log level filter | `info` |
//! | `LOG_FORMAT` | `pretty` or `json` | `pretty` |
//!
//! # Module Structure
//!
//! - [`api`]: configure, tracer acquisition, flush and shutdown
//! - [`config`]: raw and validated settings
//! - [`tls`]: credential material
//! - [`logging`]: log subscriber and trace bridge
//! - `export`: OTLP exporter factory (feature `otlp`)

pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod tls;

mod noop;
mod provider;
mod shutdown;
mod span;
mod tracer;

#[cfg(feature = "otlp")]
mod export;
#[cfg(feature = "otlp")]
mod resource;
#[cfg(feature = "otlp")]
mod sdk;

pub use api::{configure, force_flush, get_tracer, init, init_with_config, shutdown, state};
#[cfg(feature = "test-internals")]
pub use api::reset;
pub use config::{Protocol, TraceConfig, TraceSettings};
pub use error::TraceError;
pub use logging::{init_logging, LogConfig, LogFormat};
pub use provider::TraceState;
pub use shutdown::FLUSH_TIMEOUT;
pub use span::{ScopedSpan, Span, SpanBackend};
pub use tls::{PemMaterial, PemSource, ResolvedTls, TlsConfig, TlsSettings};
pub use tracer::{Tracer, TracerBackend};

#[cfg(feature = "otlp")]
pub use export::backend_activated;

/// Without the `otlp` feature no backend can ever be activated.
#[cfg(not(feature = "otlp"))]
pub fn backend_activated() -> bool {
    false
}

pub use opentelemetry::trace::SpanContext;
pub use opentelemetry::{KeyValue, Value};
