//! Client façade wiring the propagation layer together.
//!
//! # Responsibilities
//! - Build the correlation store and warm the identifier at startup
//! - Instrument the dispatch surface (on by default)
//! - Hand out the tower layer for caller-owned client stacks
//! - Own backend activation and shutdown

use std::sync::{Arc, Mutex};

use serde::Deserialize;
use thiserror::Error;
use url::Url;

use crate::backend::{ActiveBackend, BackendActivator, BackendError, BackendSelection};
use crate::context::correlation::{CorrelationStore, SessionStore};
use crate::context::origin::{HostPattern, OriginPolicy};
use crate::interceptor::dispatch::{Dispatcher, Transport};
use crate::interceptor::layer::TraceContextLayer;
use crate::interceptor::Interceptor;

/// Error type for client construction.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("own origin is not a valid URL: {0}")]
    InvalidOrigin(#[from] url::ParseError),
}

/// Interception configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ObservabilityOptions {
    /// The application's own origin; same-origin targets always receive
    /// trace headers.
    pub origin: String,

    /// Hostnames allowed to receive trace headers cross-origin. Empty means
    /// every target is allowed.
    #[serde(default)]
    pub allow_list: Vec<String>,

    /// Whether to instrument the shared dispatch surface.
    #[serde(default = "default_true")]
    pub instrument_dispatch: bool,

    /// Whether interception injects a `traceparent` itself.
    ///
    /// Disable when an active backend owns the traceparent: its span-backed
    /// value resolves in the telemetry backend, while a codec-generated one
    /// on top of it would produce an orphaned trace identifier.
    #[serde(default = "default_true")]
    pub inject_traceparent: bool,
}

fn default_true() -> bool {
    true
}

impl ObservabilityOptions {
    /// Options with defaults for the given own origin.
    pub fn new(origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            allow_list: Vec::new(),
            instrument_dispatch: true,
            inject_traceparent: true,
        }
    }
}

/// Process-wide observability context.
///
/// Construct one per application, or one per test run; all state lives in
/// the instance, so dropping it tears the propagation layer down with it.
pub struct ObservabilityClient {
    store: Arc<CorrelationStore>,
    interceptor: Arc<Interceptor>,
    dispatcher: Dispatcher,
    activator: BackendActivator,
    backend: Mutex<Option<ActiveBackend>>,
}

impl ObservabilityClient {
    /// Build with defaults: in-memory session store, `reqwest` transport.
    pub fn new(options: ObservabilityOptions) -> Result<Self, ClientError> {
        Self::builder(options).build()
    }

    pub fn builder(options: ObservabilityOptions) -> ObservabilityClientBuilder {
        ObservabilityClientBuilder {
            options,
            session: None,
            transport: None,
        }
    }

    /// Current correlation identifier, created on first use.
    pub fn correlation_id(&self) -> String {
        self.store.get_or_create()
    }

    /// The interception protocol shared by all adapters.
    pub fn interceptor(&self) -> Arc<Interceptor> {
        self.interceptor.clone()
    }

    /// Tower layer attaching interception to a caller-owned client stack.
    pub fn layer(&self) -> TraceContextLayer {
        TraceContextLayer::new(self.interceptor.clone())
    }

    /// Dispatch a request through the instrumented surface.
    pub async fn dispatch(&self, request: reqwest::Request) -> reqwest::Result<reqwest::Response> {
        self.dispatcher.dispatch(request).await
    }

    /// Activate a telemetry backend. At most one per client lifetime.
    pub async fn activate_backend(&self, selection: BackendSelection) -> Result<(), BackendError> {
        let backend = self.activator.activate(selection, &self.dispatcher).await?;
        let mut slot = self.backend.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *slot = Some(backend);
        Ok(())
    }

    /// Flush and release backend resources.
    pub fn shutdown(&self) {
        let backend = self
            .backend
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(ActiveBackend::Otel(otel)) = backend {
            otel.shutdown();
        }
    }
}

/// Builder for [`ObservabilityClient`].
pub struct ObservabilityClientBuilder {
    options: ObservabilityOptions,
    session: Option<Box<dyn SessionStore>>,
    transport: Option<Arc<dyn Transport>>,
}

impl ObservabilityClientBuilder {
    /// Replace the in-memory session store.
    pub fn session_store(mut self, store: impl SessionStore + 'static) -> Self {
        self.session = Some(Box::new(store));
        self
    }

    /// Replace the default `reqwest` transport.
    pub fn transport(mut self, transport: impl Transport) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    pub fn build(self) -> Result<ObservabilityClient, ClientError> {
        let origin = Url::parse(&self.options.origin)?;

        let store = Arc::new(match self.session {
            Some(session) => CorrelationStore::new(session),
            None => CorrelationStore::in_memory(),
        });
        // Ensure an identifier exists before the first request goes out.
        store.get_or_create();

        let patterns = self.options.allow_list.iter().map(HostPattern::new).collect();
        let policy = OriginPolicy::new(origin, patterns);
        let interceptor = Arc::new(Interceptor::new(
            store.clone(),
            policy,
            self.options.inject_traceparent,
        ));

        let dispatcher = match self.transport {
            Some(transport) => Dispatcher::from_shared(transport),
            None => Dispatcher::new(reqwest::Client::new()),
        };
        if self.options.instrument_dispatch {
            // The dispatcher is freshly built, so the once-guard cannot trip.
            let _ = dispatcher.instrument(interceptor.clone());
        }

        Ok(ObservabilityClient {
            store,
            interceptor,
            dispatcher,
            activator: BackendActivator::new(),
            backend: Mutex::new(None),
        })
    }
}
