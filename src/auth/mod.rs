//! Shared-secret authentication
//!
//! Handles:
//! - Secret validation with per-IP lockout
//! - Client IP and secret extraction

mod gate;
mod middleware;

pub use gate::{AuthDecision, AuthGate, AuthGateStats, AuthPolicy, AuthRecord, INVALID_KEY};
pub use middleware::{ClientIp, SharedSecret, UNKNOWN_IP};
