use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use opentelemetry::context::ContextGuard;
use opentelemetry::trace::SpanContext;

use crate::trace::noop;
use crate::trace::span::{ScopedSpan, Span, SpanBackend};

/// Span factory operations.
///
/// Implemented by the no-op tracer and the SDK tracer. The choice between the
/// two is made once, when the tracer is handed out.
pub trait TracerBackend: Send + Sync {
    /// Start a span. With no `parent` the span is a child of the current
    /// context, if any. `links` may contain invalid contexts, which the
    /// implementation must skip.
    fn start_span(
        &self,
        name: Cow<'static, str>,
        parent: Option<&SpanContext>,
        links: &[SpanContext],
    ) -> Box<dyn SpanBackend>;

    /// Make `span` the current span of this thread until the guard drops.
    fn attach(&self, span: &dyn SpanBackend) -> Option<ContextGuard>;

    fn is_enabled(&self) -> bool;
}

/// A named source of spans. Cheap to clone.
#[derive(Clone)]
pub struct Tracer {
    inner: Arc<dyn TracerBackend>,
}

impl Tracer {
    pub(crate) fn from_backend(inner: Arc<dyn TracerBackend>) -> Self {
        Self { inner }
    }

    /// The shared tracer that discards everything
    pub fn noop() -> Self {
        noop::tracer()
    }

    /// False for the no-op tracer
    pub fn is_enabled(&self) -> bool {
        self.inner.is_enabled()
    }

    pub fn start_span(&self, name: impl Into<Cow<'static, str>>) -> Span {
        Span::new(self.inner.start_span(name.into(), None, &[]))
    }

    pub fn start_span_with_links(
        &self,
        name: impl Into<Cow<'static, str>>,
        links: &[SpanContext],
    ) -> Span {
        Span::new(self.inner.start_span(name.into(), None, links))
    }

    /// Start a span whose parent is `parent` regardless of the current context
    pub fn start_child_span(&self, name: impl Into<Cow<'static, str>>, parent: &Span) -> Span {
        let parent = parent.span_context();
        let parent = parent.is_valid().then_some(&parent);
        Span::new(self.inner.start_span(name.into(), parent, &[]))
    }

    /// Start a span and make it current until the returned guard drops
    pub fn start_as_current_span(&self, name: impl Into<Cow<'static, str>>) -> ScopedSpan {
        let span = self.start_span(name);
        let attached = self.inner.attach(span.backend());
        ScopedSpan::new(span, attached)
    }

    /// Run `f` inside a current span that ends when `f` returns or unwinds
    pub fn in_span<T, F>(&self, name: impl Into<Cow<'static, str>>, f: F) -> T
    where
        F: FnOnce(&mut Span) -> T,
    {
        let mut scoped = self.start_as_current_span(name);
        f(&mut scoped)
    }
}

impl fmt::Debug for Tracer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tracer")
            .field("enabled", &self.inner.is_enabled())
            .finish()
    }
}
