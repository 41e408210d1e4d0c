//! Cycle telemetry.
//!
//! # INVARIANT
//! Telemetry is a read-only side-effect layer. It is never read inside
//! decision logic; it exists for observability and tests.
//!
//! Events carry counts and labels only, never image bytes or model text.

pub mod event;
pub mod metrics;
pub mod recorder;
