//! Telemetry backend activation.
//!
//! # Responsibilities
//! - Select and initialize exactly one telemetry backend
//! - Defer backend-specific resource construction until the branch is chosen
//! - Keep activation mutually exclusive for the activator's lifetime
//!
//! # Design Decisions
//! - Tagged configuration enum with exhaustive matching, no shape sniffing
//! - Atomic state machine; a second activation is an error
//! - A failed activation resets the state so a corrected configuration can
//!   retry

pub mod otel;
pub mod vendor;

use std::sync::atomic::{AtomicU8, Ordering};

use serde::Deserialize;
use thiserror::Error;

pub use otel::{OtelBackend, OtelConfig};
pub use vendor::{VendorBackend, VendorConfig};

use crate::interceptor::dispatch::Dispatcher;

/// Discriminated backend configuration. Exactly one variant ever activates.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum BackendSelection {
    Otel(OtelConfig),
    Vendor(VendorConfig),
}

/// Error type for backend activation.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("a telemetry backend is already active")]
    AlreadyActive,
    #[error("vendor backend requires an agent script URL")]
    MissingScriptUrl,
    #[error("vendor agent script URL is invalid: {0}")]
    InvalidScriptUrl(#[from] url::ParseError),
    #[error("failed to build OTLP span exporter: {0}")]
    Exporter(String),
}

/// Handle to whichever backend was activated.
#[derive(Debug)]
pub enum ActiveBackend {
    Otel(OtelBackend),
    Vendor(VendorBackend),
}

const UNINITIALIZED: u8 = 0;
const ACTIVATING: u8 = 1;
const OTEL_ACTIVE: u8 = 2;
const VENDOR_ACTIVE: u8 = 3;

/// One-shot, mutually exclusive backend activation.
#[derive(Debug, Default)]
pub struct BackendActivator {
    state: AtomicU8,
}

impl BackendActivator {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(UNINITIALIZED),
        }
    }

    /// Activate the selected backend, wiring its instrumentation into the
    /// dispatch surface.
    ///
    /// At most one backend ever activates per activator; a second call
    /// returns [`BackendError::AlreadyActive`]. A failed activation resets
    /// the activator so a corrected configuration may retry. Configuration
    /// errors are reported through the returned `Result` and an error-level
    /// diagnostic; they never panic the host application.
    pub async fn activate(
        &self,
        selection: BackendSelection,
        dispatcher: &Dispatcher,
    ) -> Result<ActiveBackend, BackendError> {
        if self
            .state
            .compare_exchange(UNINITIALIZED, ACTIVATING, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(BackendError::AlreadyActive);
        }

        // Resource construction lives inside the chosen arm; the
        // non-selected backend is never loaded.
        let result = match selection {
            BackendSelection::Otel(config) => {
                otel::activate(config, dispatcher).map(ActiveBackend::Otel)
            }
            BackendSelection::Vendor(config) => {
                vendor::activate(config).await.map(ActiveBackend::Vendor)
            }
        };

        match &result {
            Ok(ActiveBackend::Otel(_)) => self.state.store(OTEL_ACTIVE, Ordering::SeqCst),
            Ok(ActiveBackend::Vendor(_)) => self.state.store(VENDOR_ACTIVE, Ordering::SeqCst),
            Err(error) => {
                tracing::error!(%error, "telemetry backend activation failed; continuing without one");
                self.state.store(UNINITIALIZED, Ordering::SeqCst);
            }
        }
        result
    }

    /// Returns true once a backend reached a terminal active state.
    pub fn is_active(&self) -> bool {
        matches!(
            self.state.load(Ordering::SeqCst),
            OTEL_ACTIVE | VENDOR_ACTIVE
        )
    }
}
