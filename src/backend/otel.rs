//! OTLP span pipeline backend.
//!
//! Builds an OTLP/HTTP exporter and a batching tracer provider, registers
//! them process-wide, and instruments the dispatch surface with client spans
//! whose context travels in the W3C `traceparent` header.
//!
//! While this backend is active its span-backed traceparent is
//! authoritative: configure interception with `inject_traceparent = false`
//! so the built-in codec does not compete with it.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use http::header::{HeaderMap, HeaderName, HeaderValue};
use opentelemetry::trace::{SpanKind, Status, TraceContextExt, Tracer as _, TracerProvider as _};
use opentelemetry::{global, Context, KeyValue};
use opentelemetry_otlp::{WithExportConfig, WithHttpConfig};
use opentelemetry_sdk::propagation::TraceContextPropagator;
use opentelemetry_sdk::trace::{SdkTracerProvider, Tracer as SdkTracer};
use opentelemetry_sdk::Resource;
use serde::Deserialize;
use url::Url;

use super::BackendError;
use crate::context::origin::HostPattern;
use crate::interceptor::dispatch::{Dispatcher, Transport};

/// Default OTLP/HTTP trace endpoint of a local collector.
pub const DEFAULT_OTLP_ENDPOINT: &str = "http://localhost:4318/v1/traces";

/// Configuration for the OTLP span pipeline.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OtelConfig {
    /// OTLP/HTTP endpoint spans are exported to.
    pub otlp_endpoint: String,

    /// Headers added to every export request (e.g. an API token).
    pub export_headers: HashMap<String, String>,

    /// Hostnames eligible for cross-origin traceparent propagation.
    pub cors_propagation_patterns: Vec<String>,
}

impl Default for OtelConfig {
    fn default() -> Self {
        Self {
            otlp_endpoint: DEFAULT_OTLP_ENDPOINT.to_string(),
            export_headers: HashMap::new(),
            cors_propagation_patterns: vec!["localhost".to_string(), "127.0.0.1".to_string()],
        }
    }
}

/// Handle to the active OTLP pipeline.
#[derive(Debug)]
pub struct OtelBackend {
    provider: SdkTracerProvider,
}

impl OtelBackend {
    /// Flush pending spans and shut the pipeline down.
    pub fn shutdown(&self) {
        if let Err(error) = self.provider.shutdown() {
            tracing::warn!(%error, "failed to shut down tracer provider");
        }
    }
}

pub(crate) fn activate(
    config: OtelConfig,
    dispatcher: &Dispatcher,
) -> Result<OtelBackend, BackendError> {
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_http()
        .with_endpoint(&config.otlp_endpoint)
        .with_headers(config.export_headers.clone())
        .build()
        .map_err(|error| BackendError::Exporter(error.to_string()))?;

    let resource = Resource::builder_empty()
        .with_attributes(vec![KeyValue::new("service.name", env!("CARGO_PKG_NAME"))])
        .build();
    let provider = SdkTracerProvider::builder()
        .with_resource(resource)
        .with_batch_exporter(exporter)
        .build();

    global::set_tracer_provider(provider.clone());
    global::set_text_map_propagator(TraceContextPropagator::new());

    let patterns: Vec<HostPattern> = config
        .cors_propagation_patterns
        .iter()
        .map(HostPattern::new)
        .collect();
    dispatcher.wrap(|inner| {
        Arc::new(SpanTransport {
            tracer: provider.tracer(env!("CARGO_PKG_NAME")),
            patterns,
            inner,
        })
    });

    tracing::info!(endpoint = %config.otlp_endpoint, "OTLP trace pipeline active");
    Ok(OtelBackend { provider })
}

/// Transport wrapper creating a client span per eligible request and
/// injecting its context via the registered propagator.
struct SpanTransport {
    tracer: SdkTracer,
    patterns: Vec<HostPattern>,
    inner: Arc<dyn Transport>,
}

#[async_trait]
impl Transport for SpanTransport {
    async fn send(&self, mut request: reqwest::Request) -> reqwest::Result<reqwest::Response> {
        if !cors_eligible(&self.patterns, request.url()) {
            return self.inner.send(request).await;
        }

        let span = self
            .tracer
            .span_builder(format!("HTTP {}", request.method()))
            .with_kind(SpanKind::Client)
            .with_attributes([
                KeyValue::new("http.request.method", request.method().to_string()),
                KeyValue::new("url.full", request.url().to_string()),
            ])
            .start(&self.tracer);
        let cx = Context::current_with_span(span);

        global::get_text_map_propagator(|propagator| {
            propagator.inject_context(&cx, &mut HeaderCarrier(request.headers_mut()));
        });

        let result = self.inner.send(request).await;
        match &result {
            Ok(response) => {
                cx.span().set_attribute(KeyValue::new(
                    "http.response.status_code",
                    i64::from(response.status().as_u16()),
                ));
            }
            Err(error) => cx.span().set_status(Status::error(error.to_string())),
        }
        cx.span().end();
        result
    }
}

/// An empty pattern list places no restriction on propagation.
fn cors_eligible(patterns: &[HostPattern], url: &Url) -> bool {
    if patterns.is_empty() {
        return true;
    }
    url.host_str()
        .map(|host| patterns.iter().any(|pattern| pattern.matches(host)))
        .unwrap_or(false)
}

/// Carrier injecting propagator output into request headers.
struct HeaderCarrier<'a>(&'a mut HeaderMap);

impl opentelemetry::propagation::Injector for HeaderCarrier<'_> {
    fn set(&mut self, key: &str, value: String) {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(key.as_bytes()),
            HeaderValue::from_str(&value),
        ) {
            self.0.insert(name, value);
        }
    }
}
