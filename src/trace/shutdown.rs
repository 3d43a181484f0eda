//! Process-exit flush and the bounded wait shared by every flush path.

use std::sync::atomic::{AtomicBool, Ordering};
#[cfg(feature = "otlp")]
use std::sync::mpsc::{self, RecvTimeoutError};
#[cfg(feature = "otlp")]
use std::thread;
use std::time::Duration;

use ctor::dtor;

#[cfg(feature = "otlp")]
use crate::trace::error::TraceError;
use crate::trace::provider;

/// Upper bound on how long a flush or shutdown may block the caller.
pub const FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

static FLUSH_ON_EXIT: AtomicBool = AtomicBool::new(false);

/// Arm or disarm the exit flush. Set by every successful `configure()`.
pub(crate) fn arm_exit_flush(armed: bool) {
    FLUSH_ON_EXIT.store(armed, Ordering::SeqCst);
}

pub(crate) fn exit_flush_armed() -> bool {
    FLUSH_ON_EXIT.load(Ordering::SeqCst)
}

/// Run `op` on a helper thread and wait at most [`FLUSH_TIMEOUT`] for it.
///
/// On timeout the helper is abandoned; it finishes or dies with the process.
#[cfg(feature = "otlp")]
pub(crate) fn bounded<F>(what: &'static str, op: F) -> Result<(), TraceError>
where
    F: FnOnce() -> opentelemetry_sdk::error::OTelSdkResult + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    thread::Builder::new()
        .name(format!("trace-{what}"))
        .spawn(move || {
            let _ = tx.send(op());
        })
        .map_err(|e| TraceError::Flush(format!("failed to spawn {what} thread: {e}")))?;

    match rx.recv_timeout(FLUSH_TIMEOUT) {
        Ok(result) => result.map_err(TraceError::from),
        Err(RecvTimeoutError::Timeout) => Err(TraceError::Flush(format!(
            "{what} did not complete within {}s",
            FLUSH_TIMEOUT.as_secs()
        ))),
        Err(RecvTimeoutError::Disconnected) => {
            Err(TraceError::Flush(format!("{what} thread panicked")))
        }
    }
}

#[dtor]
fn flush_at_exit() {
    if !exit_flush_armed() {
        return;
    }
    // Best effort: the outcome cannot be reported once the process is exiting.
    let _ = provider::force_flush();
}

#[cfg(all(test, feature = "otlp"))]
mod tests {
    use super::*;
    use opentelemetry_sdk::error::OTelSdkError;

    #[test]
    fn bounded_passes_result_through() {
        assert!(bounded("flush", || Ok(())).is_ok());

        let err = bounded("flush", || Err(OTelSdkError::AlreadyShutdown)).unwrap_err();
        assert!(matches!(err, TraceError::Flush(_)));
    }

    #[test]
    fn bounded_reports_panics() {
        let err = bounded("flush", || panic!("exporter blew up")).unwrap_err();
        assert!(err.to_string().contains("panicked"));
    }
}
