//! Client-side trace-context propagation.
//!
//! Propagates a session-scoped correlation identity across every outbound
//! HTTP call an application makes, and links that identity to exactly one
//! pluggable telemetry backend.
//!
//! # Architecture Overview
//!
//! ```text
//!   application startup
//!       → ObservabilityClient  (correlation id ensured, dispatch instrumented)
//!       → BackendActivator     (OTLP pipeline XOR vendor agent, one-time)
//!
//!   outbound request
//!       → origin policy ── disallowed? → transport, unmodified
//!       → traceparent codec    (unless a backend owns the header)
//!       → correlation store    (x-correlation-id)
//!       → transport
//!   inbound response
//!       → x-correlation-id → correlation store update
//! ```

// Core propagation state
pub mod context;

// Interception surfaces
pub mod interceptor;

// Telemetry backends
pub mod backend;

mod client;

pub use backend::{ActiveBackend, BackendActivator, BackendError, BackendSelection};
pub use client::{ClientError, ObservabilityClient, ObservabilityClientBuilder, ObservabilityOptions};
pub use context::correlation::{
    CorrelationStore, FileSessionStore, MemorySessionStore, SessionStore, SessionStoreError,
};
pub use context::origin::{HostPattern, OriginPolicy};
pub use context::traceparent::{generate_traceparent, Traceparent, TraceparentError};
pub use interceptor::dispatch::{DispatchError, Dispatcher, Transport};
pub use interceptor::layer::{TraceContextLayer, TraceContextService};
pub use interceptor::{Interceptor, TRACEPARENT, X_CORRELATION_ID};
