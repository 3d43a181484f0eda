//! Exporter factory: turns enabled settings into a running export pipeline.
//!
//! This is the only place the OTLP backend gets constructed. Nothing here
//! runs unless tracing is configured as enabled.

mod grpc;
mod http;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::SpanExporter;
use opentelemetry_sdk::trace::{BatchSpanProcessor, SdkTracerProvider};
use tracing::info;

use crate::trace::config::{Protocol, TraceSettings};
use crate::trace::error::TraceError;
use crate::trace::resource::build_resource;
use crate::trace::sdk::SdkTracerBackend;
use crate::trace::tls::ResolvedTls;
use crate::trace::tracer::Tracer;

pub(crate) use grpc::GrpcExporterFactory;
pub(crate) use http::HttpExporterFactory;

static BACKEND_ACTIVATED: AtomicBool = AtomicBool::new(false);

/// True once an export pipeline has been built in this process.
///
/// Stays false for as long as tracing is unconfigured or disabled.
pub fn backend_activated() -> bool {
    BACKEND_ACTIVATED.load(Ordering::SeqCst)
}

/// Builds the span exporter for one transport
pub(crate) trait ExporterFactory {
    fn build_exporter(
        &self,
        settings: &TraceSettings,
        tls: Option<ResolvedTls>,
    ) -> Result<SpanExporter, TraceError>;
}

/// Exporter, batch processor and provider for one enabled configuration.
pub(crate) struct ExportPipeline {
    provider: SdkTracerProvider,
    protocol: Protocol,
    // Dropped after the provider so a final export can still use it.
    _runtime: Option<ExportRuntime>,
}

impl ExportPipeline {
    pub(crate) fn protocol(&self) -> Protocol {
        self.protocol
    }

    pub(crate) fn provider(&self) -> &SdkTracerProvider {
        &self.provider
    }

    pub(crate) fn tracer(&self, name: impl Into<std::borrow::Cow<'static, str>>) -> Tracer {
        Tracer::from_backend(Arc::new(SdkTracerBackend::new(self.provider.tracer(name))))
    }
}

/// Build the pipeline for enabled `settings`, consuming the resolved TLS
/// material.
pub(crate) fn build(
    settings: &TraceSettings,
    tls: Option<ResolvedTls>,
) -> Result<ExportPipeline, TraceError> {
    BACKEND_ACTIVATED.store(true, Ordering::SeqCst);

    let secure = tls.is_some();
    let (exporter, runtime) = match settings.protocol {
        Protocol::Grpc => {
            // tonic needs a reactor while the channel is built and for every
            // export afterwards; the pipeline owns one so callers need none.
            let runtime = ExportRuntime::new()?;
            let exporter = runtime.enter(|| GrpcExporterFactory.build_exporter(settings, tls))?;
            (exporter, Some(runtime))
        }
        Protocol::Http => (HttpExporterFactory.build_exporter(settings, tls)?, None),
    };

    let processor = BatchSpanProcessor::builder(exporter).build();
    let provider = SdkTracerProvider::builder()
        .with_span_processor(processor)
        .with_resource(build_resource(settings))
        .build();

    info!(
        protocol = %settings.protocol,
        endpoint = %settings.endpoint,
        secure,
        service_name = %settings.service_name,
        "Trace export pipeline started"
    );

    Ok(ExportPipeline {
        provider,
        protocol: settings.protocol,
        _runtime: runtime,
    })
}

struct ExportRuntime(Option<tokio::runtime::Runtime>);

impl ExportRuntime {
    fn new() -> Result<Self, TraceError> {
        tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("trace-export")
            .enable_all()
            .build()
            .map(|rt| Self(Some(rt)))
            .map_err(|e| TraceError::Init(format!("failed to start export runtime: {e}")))
    }

    fn enter<T>(&self, f: impl FnOnce() -> T) -> T {
        match &self.0 {
            Some(rt) => {
                let _guard = rt.enter();
                f()
            }
            None => f(),
        }
    }
}

impl Drop for ExportRuntime {
    fn drop(&mut self) {
        // Dropping a runtime blocks, which panics inside another runtime.
        if let Some(rt) = self.0.take() {
            rt.shutdown_background();
        }
    }
}
