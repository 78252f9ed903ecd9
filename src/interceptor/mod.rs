//! Request interception.
//!
//! # Data Flow
//! ```text
//! outbound request
//!     → origin policy (disallowed targets proceed unmodified)
//!     → traceparent codec (fresh value, unless the caller set one)
//!     → correlation store (current session identifier)
//!     → underlying transport
//! inbound response
//!     → x-correlation-id header (case-insensitive)
//!     → correlation store update
//! ```
//!
//! Two adapters drive the same protocol: [`dispatch::Dispatcher`] owns a
//! process-wide transport slot, [`layer::TraceContextLayer`] plugs into a
//! caller-owned `tower` service stack.

pub mod dispatch;
pub mod layer;

use std::sync::Arc;

use http::header::{HeaderMap, HeaderName, HeaderValue};

use crate::context::correlation::CorrelationStore;
use crate::context::origin::OriginPolicy;
use crate::context::traceparent;

/// W3C trace-context header.
pub const TRACEPARENT: HeaderName = HeaderName::from_static("traceparent");

/// Correlation identifier header linking client telemetry to server logs.
pub const X_CORRELATION_ID: HeaderName = HeaderName::from_static("x-correlation-id");

/// Protocol-agnostic injection/extraction logic shared by every adapter.
#[derive(Clone)]
pub struct Interceptor {
    store: Arc<CorrelationStore>,
    policy: OriginPolicy,
    inject_traceparent: bool,
}

impl Interceptor {
    /// Build the interception protocol over a correlation store and policy.
    ///
    /// `inject_traceparent` should be disabled when an active telemetry
    /// backend owns the traceparent: its span-backed value resolves in the
    /// backend, a codec-generated one would not.
    pub fn new(store: Arc<CorrelationStore>, policy: OriginPolicy, inject_traceparent: bool) -> Self {
        Self {
            store,
            policy,
            inject_traceparent,
        }
    }

    /// Outbound phase. Runs synchronously before the transport is invoked.
    ///
    /// Headers already present are never overwritten, so a more
    /// authoritative source (the caller, or a backend's own instrumentation)
    /// always wins.
    pub fn outbound(&self, target: &str, headers: &mut HeaderMap) {
        // 1. Origin gate: disallowed targets proceed unmodified.
        if !self.policy.is_allowed(target) {
            return;
        }

        // 2. Traceparent, unless disabled or already owned by the caller.
        if self.inject_traceparent && !headers.contains_key(&TRACEPARENT) {
            match traceparent::generate_traceparent(true) {
                Ok(value) => {
                    if let Ok(value) = HeaderValue::from_str(&value) {
                        headers.insert(TRACEPARENT, value);
                    }
                }
                Err(error) => {
                    // A missing traceparent is recoverable downstream; a
                    // malformed one is not. The request itself goes out.
                    tracing::error!(%error, "traceparent generation failed; header omitted");
                }
            }
        }

        // 3. Correlation identifier, created on first use.
        if !headers.contains_key(&X_CORRELATION_ID) {
            let id = self.store.get_or_create();
            match HeaderValue::from_str(&id) {
                Ok(value) => {
                    headers.insert(X_CORRELATION_ID, value);
                }
                Err(_) => {
                    tracing::warn!("correlation identifier is not a valid header value; header omitted");
                }
            }
        }
    }

    /// Inbound phase: adopt a server-supplied correlation identifier.
    ///
    /// Header lookup is case-insensitive by construction of [`HeaderMap`].
    pub fn inbound(&self, headers: &HeaderMap) {
        if let Some(id) = headers.get(&X_CORRELATION_ID).and_then(|value| value.to_str().ok()) {
            self.store.update(id);
        }
    }
}
