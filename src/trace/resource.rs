use opentelemetry::KeyValue;
use opentelemetry_sdk::Resource;
use opentelemetry_semantic_conventions::resource::{SERVICE_NAME, SERVICE_VERSION};

use crate::trace::config::TraceSettings;

/// Attributes every exported span carries
pub fn base_attributes(settings: &TraceSettings) -> Vec<KeyValue> {
    vec![
        KeyValue::new(SERVICE_NAME, settings.service_name.clone()),
        KeyValue::new(SERVICE_VERSION, env!("CARGO_PKG_VERSION")),
    ]
}

/// Build the provider resource. Attributes from `OTEL_RESOURCE_ATTRIBUTES`
/// are merged in by the SDK detectors; ours take precedence.
pub fn build_resource(settings: &TraceSettings) -> Resource {
    Resource::builder()
        .with_attributes(base_attributes(settings))
        .build()
}
