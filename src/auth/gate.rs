//! Shared-secret gate with per-IP lockout
//!
//! Every check for an IP is a read-modify-write on that IP's record. The whole
//! table sits behind one async mutex, so concurrent failures for the same IP
//! are serialized and a ban is imposed exactly once.

use std::collections::HashMap;
use std::sync::Arc;

use rand::Rng;
use subtle::ConstantTimeEq;
use tokio::sync::Mutex;

use crate::clock::Clock;
use crate::config::AuthConfig;
use crate::error::AppError;
use crate::metrics::{AUTH_BANS_TOTAL, AUTH_FAILURES_TOTAL, AUTH_TRACKED_IPS};

/// Reason returned with [`AuthDecision::Denied`]
pub const INVALID_KEY: &str = "invalid key";

/// Lockout policy
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AuthPolicy {
    /// Failed attempts that trigger a ban
    pub max_attempts: u32,
    /// Ban length in seconds
    pub ban_duration_secs: i64,
    /// Chance that a check also sweeps the table
    pub sweep_probability: f64,
}

impl Default for AuthPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            ban_duration_secs: 3600,
            sweep_probability: 0.01,
        }
    }
}

impl From<&AuthConfig> for AuthPolicy {
    fn from(config: &AuthConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            ban_duration_secs: i64::try_from(config.ban_duration_seconds).unwrap_or(i64::MAX),
            sweep_probability: config.sweep_probability.clamp(0.0, 1.0),
        }
    }
}

/// Failure bookkeeping for one client IP
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AuthRecord {
    /// Consecutive failures since the last success or ban
    pub attempts: u32,
    /// Unix seconds; 0 or in the past means not banned
    pub ban_until: i64,
}

impl AuthRecord {
    fn is_banned(&self, now: i64) -> bool {
        now < self.ban_until
    }

    /// Nothing left worth remembering
    fn is_stale(&self, now: i64) -> bool {
        self.attempts == 0 && self.ban_until <= now
    }

    fn remaining_minutes(&self, now: i64) -> u64 {
        let remaining = (self.ban_until - now).max(0) as u64;
        remaining.div_ceil(60)
    }
}

/// Outcome of [`AuthGate::check`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthDecision {
    Allowed,
    Denied { reason: &'static str },
    Banned { remaining_minutes: u64 },
}

/// Gate statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthGateStats {
    /// IPs with a record in the table
    pub tracked_ips: usize,
    /// IPs currently banned
    pub banned_ips: usize,
}

/// Validates the shared secret and enforces the lockout policy
pub struct AuthGate {
    secret: Option<String>,
    records: Mutex<HashMap<String, AuthRecord>>,
    policy: AuthPolicy,
    clock: Arc<dyn Clock>,
}

impl AuthGate {
    /// Create a gate
    ///
    /// `secret` of `None` (or empty) makes every check fail with
    /// [`AppError::SecretNotConfigured`].
    pub fn new(secret: Option<String>, policy: AuthPolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            secret: secret.filter(|s| !s.is_empty()),
            records: Mutex::new(HashMap::new()),
            policy,
            clock,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.secret.is_some()
    }

    pub fn policy(&self) -> AuthPolicy {
        self.policy
    }

    fn should_sweep(&self) -> bool {
        self.policy.sweep_probability > 0.0
            && rand::thread_rng().gen_bool(self.policy.sweep_probability)
    }

    fn sweep_locked(records: &mut HashMap<String, AuthRecord>, now: i64) -> usize {
        let before = records.len();
        records.retain(|_, record| !record.is_stale(now));
        before - records.len()
    }

    fn secret_matches(&self, provided: Option<&str>) -> bool {
        match (provided, self.secret.as_deref()) {
            (Some(provided), Some(secret)) => provided.as_bytes().ct_eq(secret.as_bytes()).into(),
            _ => false,
        }
    }

    /// Check a presented secret for `ip`
    ///
    /// # Errors
    /// [`AppError::SecretNotConfigured`] when the gate has no secret.
    pub async fn check(&self, ip: &str, provided: Option<&str>) -> Result<AuthDecision, AppError> {
        if !self.is_configured() {
            return Err(AppError::SecretNotConfigured);
        }

        let sweep = self.should_sweep();
        let mut records = self.records.lock().await;
        let now = self.clock.now().timestamp();

        if sweep {
            let removed = Self::sweep_locked(&mut records, now);
            if removed > 0 {
                tracing::debug!(removed, "Swept expired auth records");
            }
        }

        let record = records.entry(ip.to_string()).or_default();

        let decision = if record.is_banned(now) {
            AuthDecision::Banned {
                remaining_minutes: record.remaining_minutes(now),
            }
        } else if self.secret_matches(provided) {
            records.remove(ip);
            AuthDecision::Allowed
        } else {
            AUTH_FAILURES_TOTAL.inc();
            record.attempts += 1;
            if record.attempts >= self.policy.max_attempts {
                record.ban_until = now.saturating_add(self.policy.ban_duration_secs);
                record.attempts = 0;
                AUTH_BANS_TOTAL.inc();
                tracing::warn!(ip = %ip, "IP banned due to invalid key attempts");
                AuthDecision::Banned {
                    remaining_minutes: record.remaining_minutes(now),
                }
            } else {
                AuthDecision::Denied {
                    reason: INVALID_KEY,
                }
            }
        };

        AUTH_TRACKED_IPS.set(records.len() as i64);
        Ok(decision)
    }

    /// Drop records whose ban has expired and that have no pending failures
    ///
    /// Returns the number of records removed.
    pub async fn sweep(&self) -> usize {
        let mut records = self.records.lock().await;
        let removed = Self::sweep_locked(&mut records, self.clock.now().timestamp());
        AUTH_TRACKED_IPS.set(records.len() as i64);
        removed
    }

    /// Current record for `ip`, if any
    pub async fn record(&self, ip: &str) -> Option<AuthRecord> {
        self.records.lock().await.get(ip).copied()
    }

    pub async fn stats(&self) -> AuthGateStats {
        let records = self.records.lock().await;
        let now = self.clock.now().timestamp();
        AuthGateStats {
            tracked_ips: records.len(),
            banned_ips: records.values().filter(|r| r.is_banned(now)).count(),
        }
    }
}
