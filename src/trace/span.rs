use std::borrow::Cow;
use std::fmt;
use std::ops::{Deref, DerefMut};

use opentelemetry::context::ContextGuard;
use opentelemetry::trace::SpanContext;
use opentelemetry::KeyValue;

/// Operations every span implementation provides.
///
/// There are exactly two implementations: the no-op span handed out while
/// tracing is off, and the SDK span of the active provider.
pub trait SpanBackend: Send + Sync {
    fn set_attribute(&mut self, attribute: KeyValue);

    fn add_event(&mut self, name: Cow<'static, str>, attributes: Vec<KeyValue>);

    fn add_link(&mut self, context: SpanContext, attributes: Vec<KeyValue>);

    fn span_context(&self) -> SpanContext;

    fn is_recording(&self) -> bool;

    /// Mark the span finished. Calling it more than once is harmless.
    fn end(&mut self);
}

/// A unit of work. Ends when dropped.
pub struct Span {
    inner: Box<dyn SpanBackend>,
}

impl Span {
    pub(crate) fn new(inner: Box<dyn SpanBackend>) -> Self {
        Self { inner }
    }

    pub(crate) fn backend(&self) -> &dyn SpanBackend {
        self.inner.as_ref()
    }

    pub fn set_attribute(&mut self, attribute: KeyValue) -> &mut Self {
        self.inner.set_attribute(attribute);
        self
    }

    pub fn set_attributes<I>(&mut self, attributes: I) -> &mut Self
    where
        I: IntoIterator<Item = KeyValue>,
    {
        for attribute in attributes {
            self.inner.set_attribute(attribute);
        }
        self
    }

    pub fn add_event<N>(&mut self, name: N, attributes: Vec<KeyValue>) -> &mut Self
    where
        N: Into<Cow<'static, str>>,
    {
        self.inner.add_event(name.into(), attributes);
        self
    }

    /// Link this span to another one. Invalid contexts are discarded.
    pub fn add_link(&mut self, context: &SpanContext) -> &mut Self {
        self.add_link_with_attributes(context, Vec::new())
    }

    pub fn add_link_with_attributes(
        &mut self,
        context: &SpanContext,
        attributes: Vec<KeyValue>,
    ) -> &mut Self {
        if context.is_valid() {
            self.inner.add_link(context.clone(), attributes);
        }
        self
    }

    pub fn span_context(&self) -> SpanContext {
        self.inner.span_context()
    }

    pub fn is_recording(&self) -> bool {
        self.inner.is_recording()
    }

    /// End the span now instead of at drop.
    pub fn end(self) {}
}

impl Drop for Span {
    fn drop(&mut self) {
        self.inner.end();
    }
}

impl fmt::Debug for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Span")
            .field("span_context", &self.inner.span_context())
            .field("recording", &self.inner.is_recording())
            .finish()
    }
}

/// A span that is the current span of this thread until dropped.
///
/// Spans started through the same tracer while it is alive become its
/// children. Dropping it ends the span and restores the previous context,
/// whether the scope exits normally, early or by unwinding.
pub struct ScopedSpan {
    // Field order matters: the span ends before the context is restored.
    span: Span,
    _attached: Option<ContextGuard>,
}

impl ScopedSpan {
    pub(crate) fn new(span: Span, attached: Option<ContextGuard>) -> Self {
        Self {
            span,
            _attached: attached,
        }
    }

    pub fn end(self) {}
}

impl Deref for ScopedSpan {
    type Target = Span;

    fn deref(&self) -> &Span {
        &self.span
    }
}

impl DerefMut for ScopedSpan {
    fn deref_mut(&mut self) -> &mut Span {
        &mut self.span
    }
}

impl fmt::Debug for ScopedSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ScopedSpan").field(&self.span).finish()
    }
}
