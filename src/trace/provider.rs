//! The process-wide tracer provider.
//!
//! Readers take a lock-free snapshot of the installed state; transitions are
//! serialized by a mutex so a half-built provider is never observable.

use std::borrow::Cow;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use arc_swap::ArcSwap;
use once_cell::sync::Lazy;
use tracing::{debug, info};
#[cfg(feature = "otlp")]
use tracing::warn;

use crate::trace::config::{Protocol, TraceSettings};
use crate::trace::error::TraceError;
#[cfg(feature = "otlp")]
use crate::trace::export::{self, ExportPipeline};
use crate::trace::shutdown::arm_exit_flush;
#[cfg(feature = "otlp")]
use crate::trace::shutdown::bounded;
#[cfg(feature = "otlp")]
use crate::trace::tls::TlsSettings;
use crate::trace::tracer::Tracer;

static STATE: Lazy<ArcSwap<ProviderState>> =
    Lazy::new(|| ArcSwap::from_pointee(ProviderState::Uninitialized));

static TRANSITION: Mutex<()> = Mutex::new(());

enum ProviderState {
    Uninitialized,
    NoOp,
    #[cfg(feature = "otlp")]
    Active(ExportPipeline),
}

impl ProviderState {
    fn describe(&self) -> TraceState {
        match self {
            Self::Uninitialized => TraceState::Uninitialized,
            Self::NoOp => TraceState::Disabled,
            #[cfg(feature = "otlp")]
            Self::Active(pipeline) => TraceState::Enabled(pipeline.protocol()),
        }
    }
}

/// What the process-wide provider currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceState {
    /// `configure()` has not run yet
    Uninitialized,
    /// Tracing is off; every tracer is the no-op tracer
    Disabled,
    /// Spans are exported over this transport
    Enabled(Protocol),
}

fn transition() -> MutexGuard<'static, ()> {
    // The guarded data is `()`, so a poisoned lock carries no broken state.
    TRANSITION.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn install(settings: &TraceSettings) -> Result<(), TraceError> {
    let _transition = transition();

    let next = match build_state(settings) {
        Ok(next) => next,
        Err(err) => {
            settle_if_uninitialized();
            return Err(err);
        }
    };

    let next = Arc::new(next);
    info!(state = ?next.describe(), "Trace provider installed");
    arm_exit_flush(settings.enabled && settings.flush_on_exit);
    let previous = STATE.swap(next);
    retire(&previous);
    Ok(())
}

/// After a failed first configuration, tracing counts as disabled.
pub(crate) fn settle_after_failure() {
    let _transition = transition();
    settle_if_uninitialized();
}

fn settle_if_uninitialized() {
    if matches!(**STATE.load(), ProviderState::Uninitialized) {
        STATE.store(Arc::new(ProviderState::NoOp));
    }
}

fn build_state(settings: &TraceSettings) -> Result<ProviderState, TraceError> {
    if !settings.enabled {
        return Ok(ProviderState::NoOp);
    }
    settings.validate()?;
    activate(settings)
}

#[cfg(feature = "otlp")]
fn activate(settings: &TraceSettings) -> Result<ProviderState, TraceError> {
    // Credentials are read fresh on every call and dropped once the
    // transport holds them.
    let tls = settings.tls.as_ref().map(TlsSettings::resolve).transpose()?;
    Ok(ProviderState::Active(export::build(settings, tls)?))
}

#[cfg(not(feature = "otlp"))]
fn activate(_settings: &TraceSettings) -> Result<ProviderState, TraceError> {
    Err(TraceError::config(
        "tracing is enabled but this build does not include the `otlp` feature",
    ))
}

/// Shut down a provider that has just been replaced. Its tracers go inert.
fn retire(previous: &ProviderState) {
    #[cfg(feature = "otlp")]
    if let ProviderState::Active(pipeline) = previous {
        if let Err(err) = shutdown_pipeline(pipeline) {
            warn!(error = %err, "Replaced trace provider did not shut down cleanly");
        }
    }
    #[cfg(not(feature = "otlp"))]
    let _ = previous;
}

#[cfg(feature = "otlp")]
fn shutdown_pipeline(pipeline: &ExportPipeline) -> Result<(), TraceError> {
    let provider = pipeline.provider().clone();
    bounded("shutdown", move || provider.shutdown())
}

#[cfg_attr(not(feature = "otlp"), allow(unused_variables))]
pub(crate) fn tracer(name: impl Into<Cow<'static, str>>) -> Tracer {
    #[cfg(feature = "otlp")]
    if let ProviderState::Active(pipeline) = &**STATE.load() {
        return pipeline.tracer(name);
    }
    Tracer::noop()
}

pub(crate) fn state() -> TraceState {
    STATE.load().describe()
}

pub(crate) fn force_flush() -> Result<(), TraceError> {
    #[cfg(feature = "otlp")]
    if let ProviderState::Active(pipeline) = &**STATE.load() {
        let provider = pipeline.provider().clone();
        return bounded("flush", move || provider.force_flush());
    }
    Ok(())
}

#[cfg_attr(not(feature = "otlp"), allow(unused_variables))]
pub(crate) fn shutdown() -> Result<(), TraceError> {
    let _transition = transition();
    arm_exit_flush(false);
    let previous = STATE.swap(Arc::new(ProviderState::NoOp));
    debug!("Trace provider shut down");

    #[cfg(feature = "otlp")]
    if let ProviderState::Active(pipeline) = &*previous {
        return shutdown_pipeline(pipeline);
    }
    Ok(())
}

#[cfg(feature = "test-internals")]
pub(crate) fn reset() {
    let _transition = transition();
    arm_exit_flush(false);
    let previous = STATE.swap(Arc::new(ProviderState::Uninitialized));
    retire(&previous);
}

#[cfg(feature = "otlp")]
pub(crate) fn with_active_provider<T>(
    f: impl FnOnce(&opentelemetry_sdk::trace::SdkTracerProvider) -> T,
) -> Option<T> {
    match &**STATE.load() {
        ProviderState::Active(pipeline) => Some(f(pipeline.provider())),
        _ => None,
    }
}
