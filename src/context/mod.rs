//! Trace-context state.
//!
//! # Data Flow
//! ```text
//! correlation.rs  → session-scoped identifier (created lazily, persisted,
//!                   overwritten by server-supplied values)
//! traceparent.rs  → fresh W3C trace-context value per outbound request
//! origin.rs       → decides whether a target may receive either header
//! ```

pub mod correlation;
pub mod origin;
pub mod traceparent;
