//! Text-map context propagation.
//!
//! The composite propagator is handed to callers through
//! [`TelemetryProviders`](crate::telemetry::TelemetryProviders) and used to
//! inject or extract context on outgoing and incoming requests.

use opentelemetry::propagation::{TextMapCompositePropagator, TextMapPropagator};
use opentelemetry_sdk::propagation::{BaggagePropagator, TraceContextPropagator};

use crate::config::PropagatorKind;

/// Composite propagator for `kinds`, applied in the given order.
pub fn build_propagator(kinds: &[PropagatorKind]) -> TextMapCompositePropagator {
    let propagators = kinds
        .iter()
        .map(|kind| -> Box<dyn TextMapPropagator + Send + Sync> {
            match kind {
                PropagatorKind::TraceContext => Box::new(TraceContextPropagator::new()),
                PropagatorKind::Baggage => Box::new(BaggagePropagator::new()),
            }
        })
        .collect();
    TextMapCompositePropagator::new(propagators)
}

#[cfg(test)]
mod tests {
    use super::*;
    use opentelemetry::baggage::BaggageExt;
    use opentelemetry::trace::{
        SpanContext, SpanId, TraceContextExt, TraceFlags, TraceId, TraceState,
    };
    use opentelemetry::{Context, KeyValue};
    use std::collections::HashMap;

    fn remote_context() -> Context {
        let span_context = SpanContext::new(
            TraceId::from_bytes([0x4b; 16]),
            SpanId::from_bytes([0x1a; 8]),
            TraceFlags::SAMPLED,
            true,
            TraceState::default(),
        );
        Context::new()
            .with_remote_span_context(span_context)
            .with_baggage([KeyValue::new("tenant", "acme")])
    }

    #[test]
    fn test_default_injects_traceparent_and_baggage() {
        let propagator = build_propagator(&[PropagatorKind::TraceContext, PropagatorKind::Baggage]);
        let mut headers = HashMap::new();
        propagator.inject_context(&remote_context(), &mut headers);

        assert_eq!(
            headers.get("traceparent").map(String::as_str),
            Some("00-4b4b4b4b4b4b4b4b4b4b4b4b4b4b4b4b-1a1a1a1a1a1a1a1a-01")
        );
        assert_eq!(headers.get("baggage").map(String::as_str), Some("tenant=acme"));
    }

    #[test]
    fn test_extract_restores_remote_parent() {
        let propagator = build_propagator(&[PropagatorKind::TraceContext, PropagatorKind::Baggage]);
        let mut headers = HashMap::new();
        propagator.inject_context(&remote_context(), &mut headers);

        let extracted = propagator.extract(&headers);
        let span = extracted.span();
        let span_context = span.span_context();
        assert!(span_context.is_remote());
        assert_eq!(span_context.trace_id(), TraceId::from_bytes([0x4b; 16]));
        assert_eq!(
            extracted.baggage().get("tenant").map(|v| v.as_str().to_string()),
            Some("acme".to_string())
        );
    }

    #[test]
    fn test_only_configured_formats_are_used() {
        let propagator = build_propagator(&[PropagatorKind::Baggage]);
        let mut headers = HashMap::new();
        propagator.inject_context(&remote_context(), &mut headers);
        assert!(!headers.contains_key("traceparent"));
        assert!(headers.contains_key("baggage"));

        let mut headers = HashMap::new();
        build_propagator(&[]).inject_context(&remote_context(), &mut headers);
        assert!(headers.is_empty());
    }
}
