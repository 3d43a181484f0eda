use std::borrow::Cow;

use crate::trace::config::{TraceConfig, TraceSettings};
use crate::trace::error::TraceError;
use crate::trace::provider::{self, TraceState};
use crate::trace::tracer::Tracer;

/// Install the process-wide provider for `settings`.
///
/// Disabled settings install the no-op provider without touching the export
/// backend. Enabled settings read TLS material, build the exporter and swap
/// the new provider in; a provider installed by an earlier call is shut down
/// afterwards (last call wins).
///
/// On error the previous state is kept. If this was the first call, tracing
/// is left disabled. An unreachable collector is not an error here: exports
/// fail later, inside the batch processor.
pub fn configure(settings: &TraceSettings) -> Result<(), TraceError> {
    provider::install(settings)
}

/// Resolve `config` and configure with the result
pub fn init_with_config(config: &TraceConfig) -> Result<(), TraceError> {
    let settings = config
        .clone()
        .resolve()
        .inspect_err(|_| provider::settle_after_failure())?;
    configure(&settings)
}

/// Initialize tracing from `RUNTIME_TRACE_*` environment variables
pub fn init() -> Result<(), TraceError> {
    let config = TraceConfig::from_env().inspect_err(|_| provider::settle_after_failure())?;
    init_with_config(&config)
}

/// A tracer from the installed provider; the no-op tracer when unconfigured
/// or disabled. Never fails.
pub fn get_tracer(name: impl Into<Cow<'static, str>>) -> Tracer {
    provider::tracer(name)
}

pub fn state() -> TraceState {
    provider::state()
}

/// Export every buffered span now, waiting at most
/// [`FLUSH_TIMEOUT`](crate::trace::FLUSH_TIMEOUT). No-op unless enabled.
pub fn force_flush() -> Result<(), TraceError> {
    provider::force_flush()
}

/// Flush and shut down the installed provider, then install the no-op one.
///
/// Disarms the exit flush.
pub fn shutdown() -> Result<(), TraceError> {
    provider::shutdown()
}

/// Return the provider to the unconfigured state.
///
/// Test support only. NOT for production use: tracers handed out before the
/// reset stop exporting.
#[cfg(feature = "test-internals")]
pub fn reset() {
    provider::reset()
}
