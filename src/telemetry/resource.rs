//! Service resource shared by every signal.

use opentelemetry::KeyValue;
use opentelemetry_sdk::Resource;

use crate::config::ServiceInfo;

/// Resource describing the service: name, version and whatever the
/// `OTEL_RESOURCE_ATTRIBUTES` environment detectors add.
pub fn service_resource(service: &ServiceInfo) -> Resource {
    Resource::builder()
        .with_service_name(service.name.clone())
        .with_attribute(KeyValue::new("service.version", service.version.clone()))
        .build()
}
