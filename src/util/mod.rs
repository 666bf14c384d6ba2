//! Process plumbing for the `x402-paywall` binary.
//!
//! - [`sig_down`] - Ctrl-C / SIGTERM handling
//! - [`telemetry`] - Log output and optional OpenTelemetry export

pub mod sig_down;
pub mod telemetry;

pub use sig_down::*;
pub use telemetry::*;
