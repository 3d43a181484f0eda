//! Tracer and span backed by the OpenTelemetry SDK provider.

use std::borrow::Cow;

use opentelemetry::context::{Context, ContextGuard};
use opentelemetry::trace::{
    Link, Span as _, SpanBuilder, SpanContext, TraceContextExt, Tracer as _,
};
use opentelemetry::KeyValue;
use opentelemetry_sdk::trace::{Span as SdkSpan, Tracer as SdkTracer};

use crate::trace::span::SpanBackend;
use crate::trace::tracer::TracerBackend;

pub(crate) struct SdkTracerBackend {
    tracer: SdkTracer,
}

impl SdkTracerBackend {
    pub(crate) fn new(tracer: SdkTracer) -> Self {
        Self { tracer }
    }
}

impl TracerBackend for SdkTracerBackend {
    fn start_span(
        &self,
        name: Cow<'static, str>,
        parent: Option<&SpanContext>,
        links: &[SpanContext],
    ) -> Box<dyn SpanBackend> {
        let links: Vec<Link> = links
            .iter()
            .filter(|cx| cx.is_valid())
            .map(|cx| Link::with_context(cx.clone()))
            .collect();

        let mut builder = SpanBuilder::from_name(name);
        if !links.is_empty() {
            builder = builder.with_links(links);
        }

        let parent_cx = match parent {
            Some(parent) => Context::current().with_remote_span_context(parent.clone()),
            None => Context::current(),
        };

        Box::new(SdkSpanBackend(self.tracer.build_with_context(builder, &parent_cx)))
    }

    fn attach(&self, span: &dyn SpanBackend) -> Option<ContextGuard> {
        let span_cx = span.span_context();
        if !span_cx.is_valid() {
            return None;
        }
        // The SDK span stays owned by the caller's `Span`; only its context
        // becomes current so new spans pick it up as their parent.
        Some(Context::current().with_remote_span_context(span_cx).attach())
    }

    fn is_enabled(&self) -> bool {
        true
    }
}

pub(crate) struct SdkSpanBackend(SdkSpan);

impl SpanBackend for SdkSpanBackend {
    fn set_attribute(&mut self, attribute: KeyValue) {
        self.0.set_attribute(attribute);
    }

    fn add_event(&mut self, name: Cow<'static, str>, attributes: Vec<KeyValue>) {
        self.0.add_event(name, attributes);
    }

    fn add_link(&mut self, context: SpanContext, attributes: Vec<KeyValue>) {
        self.0.add_link(context, attributes);
    }

    fn span_context(&self) -> SpanContext {
        self.0.span_context().clone()
    }

    fn is_recording(&self) -> bool {
        self.0.is_recording()
    }

    fn end(&mut self) {
        self.0.end();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::tracer::Tracer;
    use opentelemetry::trace::TracerProvider as _;
    use opentelemetry_sdk::trace::{InMemorySpanExporter, SdkTracerProvider};
    use std::sync::Arc;

    fn in_memory() -> (Tracer, SdkTracerProvider, InMemorySpanExporter) {
        let exporter = InMemorySpanExporter::default();
        let provider = SdkTracerProvider::builder()
            .with_simple_exporter(exporter.clone())
            .build();
        let tracer = Tracer::from_backend(Arc::new(SdkTracerBackend::new(
            provider.tracer("sdk-test"),
        )));
        (tracer, provider, exporter)
    }

    #[test]
    fn scoped_span_parents_nested_spans() {
        let (tracer, _provider, exporter) = in_memory();

        {
            let outer = tracer.start_as_current_span("outer");
            assert!(outer.is_recording());
            let _inner = tracer.start_span("inner");
        }

        let spans = exporter.get_finished_spans().unwrap();
        let outer = spans.iter().find(|s| s.name == "outer").unwrap();
        let inner = spans.iter().find(|s| s.name == "inner").unwrap();
        assert_eq!(inner.parent_span_id, outer.span_context.span_id());
        assert_eq!(
            inner.span_context.trace_id(),
            outer.span_context.trace_id()
        );
    }

    #[test]
    fn context_is_restored_after_scope() {
        let (tracer, _provider, exporter) = in_memory();

        drop(tracer.start_as_current_span("first"));
        drop(tracer.start_span("second"));

        let spans = exporter.get_finished_spans().unwrap();
        let second = spans.iter().find(|s| s.name == "second").unwrap();
        assert_eq!(second.parent_span_id, opentelemetry::trace::SpanId::INVALID);
    }

    #[test]
    fn explicit_parent_and_links() {
        let (tracer, _provider, exporter) = in_memory();

        let parent = tracer.start_span("parent");
        let sibling = tracer.start_span("sibling");
        {
            let mut child = tracer.start_child_span("child", &parent);
            child
                .add_link(&sibling.span_context())
                .add_link(&SpanContext::empty_context());
        }
        let linked = tracer.start_span_with_links(
            "linked",
            &[parent.span_context(), SpanContext::empty_context()],
        );
        drop(linked);

        let parent_id = parent.span_context().span_id();
        drop(parent);
        drop(sibling);

        let spans = exporter.get_finished_spans().unwrap();
        let child = spans.iter().find(|s| s.name == "child").unwrap();
        assert_eq!(child.parent_span_id, parent_id);
        assert_eq!(child.links.links.len(), 1);

        let linked = spans.iter().find(|s| s.name == "linked").unwrap();
        assert_eq!(linked.links.links.len(), 1);
    }

    #[test]
    fn attributes_and_events_are_recorded() {
        let (tracer, _provider, exporter) = in_memory();

        tracer.in_span("work", |span| {
            span.set_attribute(KeyValue::new("foo", "bar"))
                .set_attribute(KeyValue::new("count", 3_i64))
                .add_event("checkpoint", vec![KeyValue::new("ok", true)]);
        });

        let spans = exporter.get_finished_spans().unwrap();
        let work = &spans[0];
        assert_eq!(work.name, "work");
        assert!(work
            .attributes
            .iter()
            .any(|kv| kv.key.as_str() == "foo" && kv.value.as_str() == "bar"));
        assert_eq!(work.events.events.len(), 1);
    }
}
