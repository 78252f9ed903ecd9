//! Process-wide dispatch surface.
//!
//! # Responsibilities
//! - Own the shared HTTP transport behind a lock-free slot
//! - Wrap-and-replace the transport with interception, exactly once
//! - Let a telemetry backend stack its own instrumentation on the same slot
//!
//! # Design Decisions
//! - `arc-swap` slot: dispatching never takes a lock
//! - A second `instrument` call is an error, not an overwrite; silent
//!   re-wrapping would double-inject every request
//! - Wrappers stack, newest outermost, so the most recently attached
//!   instrumentation sees the request first and owns contested headers

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use async_trait::async_trait;
use thiserror::Error;

use super::Interceptor;

/// Error type for dispatch instrumentation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("dispatch surface is already instrumented")]
    AlreadyInstrumented,
}

/// Underlying HTTP transport invoked for every dispatched request.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn send(&self, request: reqwest::Request) -> reqwest::Result<reqwest::Response>;
}

#[async_trait]
impl Transport for reqwest::Client {
    async fn send(&self, request: reqwest::Request) -> reqwest::Result<reqwest::Response> {
        self.execute(request).await
    }
}

struct Slot {
    transport: Arc<dyn Transport>,
}

/// Process-wide request dispatch function.
///
/// Modeled as an explicit object rather than a mutable global so tests
/// construct one per run; the host application keeps a single instance for
/// its lifetime. The calling application owns the underlying transport;
/// detaching instrumentation is not supported.
pub struct Dispatcher {
    slot: ArcSwap<Slot>,
    instrumented: AtomicBool,
}

impl Dispatcher {
    /// Create a dispatcher over the given transport.
    pub fn new(transport: impl Transport) -> Self {
        Self::from_shared(Arc::new(transport))
    }

    pub fn from_shared(transport: Arc<dyn Transport>) -> Self {
        Self {
            slot: ArcSwap::from_pointee(Slot { transport }),
            instrumented: AtomicBool::new(false),
        }
    }

    /// Wrap the transport with the interception protocol.
    ///
    /// Applied exactly once for the dispatcher's lifetime; a second call
    /// returns [`DispatchError::AlreadyInstrumented`].
    pub fn instrument(&self, interceptor: Arc<Interceptor>) -> Result<(), DispatchError> {
        if self.instrumented.swap(true, Ordering::SeqCst) {
            return Err(DispatchError::AlreadyInstrumented);
        }
        self.wrap(|inner| Arc::new(InstrumentedTransport { interceptor, inner }));
        Ok(())
    }

    /// Stack an additional transport wrapper onto the slot.
    ///
    /// Used by telemetry backends to wire their own instrumentation into the
    /// same surface.
    pub(crate) fn wrap(&self, wrap: impl FnOnce(Arc<dyn Transport>) -> Arc<dyn Transport>) {
        let current = self.slot.load_full();
        let transport = wrap(current.transport.clone());
        self.slot.store(Arc::new(Slot { transport }));
    }

    /// Dispatch a request through the current transport chain.
    ///
    /// Transport errors propagate unchanged; this layer never masks or
    /// retries a failed request.
    pub async fn dispatch(&self, request: reqwest::Request) -> reqwest::Result<reqwest::Response> {
        let slot = self.slot.load_full();
        slot.transport.send(request).await
    }
}

struct InstrumentedTransport {
    interceptor: Arc<Interceptor>,
    inner: Arc<dyn Transport>,
}

#[async_trait]
impl Transport for InstrumentedTransport {
    async fn send(&self, mut request: reqwest::Request) -> reqwest::Result<reqwest::Response> {
        let target = request.url().as_str().to_owned();
        // Injection completes before the transport suspends.
        self.interceptor.outbound(&target, request.headers_mut());
        let response = self.inner.send(request).await?;
        self.interceptor.inbound(response.headers());
        Ok(response)
    }
}
