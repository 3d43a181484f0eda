//! The tracer handed out while tracing is unconfigured or disabled.
//!
//! Every operation is accepted and discarded. Spans are zero-sized, so
//! starting one does not allocate.

use std::borrow::Cow;
use std::sync::Arc;

use once_cell::sync::Lazy;
use opentelemetry::context::ContextGuard;
use opentelemetry::trace::SpanContext;
use opentelemetry::KeyValue;

use crate::trace::span::SpanBackend;
use crate::trace::tracer::{Tracer, TracerBackend};

static NOOP_TRACER: Lazy<Tracer> = Lazy::new(|| Tracer::from_backend(Arc::new(NoOpTracer)));

pub(crate) fn tracer() -> Tracer {
    NOOP_TRACER.clone()
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpTracer;

#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpSpan;

impl TracerBackend for NoOpTracer {
    fn start_span(
        &self,
        _name: Cow<'static, str>,
        _parent: Option<&SpanContext>,
        _links: &[SpanContext],
    ) -> Box<dyn SpanBackend> {
        Box::new(NoOpSpan)
    }

    fn attach(&self, _span: &dyn SpanBackend) -> Option<ContextGuard> {
        None
    }

    fn is_enabled(&self) -> bool {
        false
    }
}

impl SpanBackend for NoOpSpan {
    fn set_attribute(&mut self, _attribute: KeyValue) {}

    fn add_event(&mut self, _name: Cow<'static, str>, _attributes: Vec<KeyValue>) {}

    fn add_link(&mut self, _context: SpanContext, _attributes: Vec<KeyValue>) {}

    fn span_context(&self) -> SpanContext {
        SpanContext::empty_context()
    }

    fn is_recording(&self) -> bool {
        false
    }

    fn end(&mut self) {}
}
