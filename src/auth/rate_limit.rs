//! Fixed-window request limiting for the sensitive auth endpoints.
//!
//! Each client fingerprint gets a window that starts on its first request
//! and resets wholesale once it elapses. State is per process; a
//! multi-instance deployment needs a shared backend instead.
//!
//! # Tracing Events
//!
//! - `auth.rate_limited` - Request blocked by a gate
//! - `auth.rate_limit.sweep` - Expired windows removed

use crate::auth::clock::{SharedClock, SystemClock};
use crate::error::{AuthError, Result};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Characters of the user agent kept in a fingerprint.
pub const USER_AGENT_PREFIX_LEN: usize = 50;

/// A named request budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitRule {
    /// Namespaces the counters so gates don't share budgets.
    pub name: &'static str,
    pub max_requests: u32,
    pub window_secs: i64,
}

impl RateLimitRule {
    pub const fn new(name: &'static str, max_requests: u32, window_secs: i64) -> Self {
        Self {
            name,
            max_requests,
            window_secs,
        }
    }

    pub fn window(&self) -> Duration {
        Duration::seconds(self.window_secs)
    }
}

/// 5 registrations per 15 minutes.
pub const REGISTER: RateLimitRule = RateLimitRule::new("register", 5, 15 * 60);

/// 10 logins per 15 minutes.
pub const LOGIN: RateLimitRule = RateLimitRule::new("login", 10, 15 * 60);

/// 3 reset requests per 10 minutes.
pub const PASSWORD_RESET_REQUEST: RateLimitRule =
    RateLimitRule::new("password_reset_request", 3, 10 * 60);

/// 5 reset completions per 15 minutes.
pub const PASSWORD_RESET: RateLimitRule = RateLimitRule::new("password_reset", 5, 15 * 60);

#[derive(Debug, Clone)]
struct RateLimitEntry {
    requests: u32,
    reset_at: DateTime<Utc>,
}

/// Process-wide window map shared by every gate.
#[derive(Clone)]
pub struct RateLimiter {
    entries: Arc<DashMap<String, RateLimitEntry>>,
    clock: SharedClock,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("tracked_keys", &self.entries.len())
            .finish()
    }
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: SharedClock) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            clock,
        }
    }

    /// A gate enforcing `rule`.
    pub fn limit(&self, rule: RateLimitRule) -> RateLimitGate {
        RateLimitGate {
            limiter: self.clone(),
            rule,
        }
    }

    /// Count one request for `fingerprint` against `rule`.
    ///
    /// Fails with [`AuthError::TooManyRequests`] carrying the seconds until
    /// the window resets.
    pub fn check(&self, rule: &RateLimitRule, fingerprint: &str) -> Result<()> {
        let now = self.clock.now();
        let key = format!("{}:{}", rule.name, fingerprint);

        let mut entry = self.entries.entry(key).or_insert_with(|| RateLimitEntry {
            requests: 0,
            reset_at: now + rule.window(),
        });

        if now >= entry.reset_at {
            entry.requests = 0;
            entry.reset_at = now + rule.window();
        }

        if entry.requests >= rule.max_requests {
            let retry_after = seconds_until(now, entry.reset_at);
            drop(entry);

            tracing::warn!(
                target: "auth.rate_limited",
                rule = rule.name,
                fingerprint = %fingerprint,
                retry_after_secs = retry_after,
                max_requests = rule.max_requests,
                window_secs = rule.window_secs,
                "Request rate limited"
            );
            return Err(AuthError::too_many_requests(retry_after));
        }

        entry.requests += 1;
        Ok(())
    }

    /// Drop every window that has elapsed. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.reset_at > now);
        let removed = before.saturating_sub(self.entries.len());

        tracing::debug!(
            target: "auth.rate_limit.sweep",
            removed,
            remaining = self.entries.len(),
            "Rate limit windows swept"
        );
        removed
    }

    /// Run [`sweep`](Self::sweep) every `interval` on the tokio runtime.
    pub fn spawn_sweeper(&self, interval: std::time::Duration) -> JoinHandle<()> {
        let limiter = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                limiter.sweep();
            }
        })
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A [`RateLimiter`] bound to one rule.
#[derive(Clone, Debug)]
pub struct RateLimitGate {
    limiter: RateLimiter,
    rule: RateLimitRule,
}

impl RateLimitGate {
    pub fn check(&self, fingerprint: &str) -> Result<()> {
        self.limiter.check(&self.rule, fingerprint)
    }

    pub fn rule(&self) -> &RateLimitRule {
        &self.rule
    }
}

/// Fingerprint a client as `"{ip}:{user agent prefix}"`.
pub fn fingerprint(ip: &str, user_agent: &str) -> String {
    let agent: String = user_agent.chars().take(USER_AGENT_PREFIX_LEN).collect();
    format!("{}:{}", ip, agent)
}

fn seconds_until(now: DateTime<Utc>, then: DateTime<Utc>) -> u64 {
    let millis = (then - now).num_milliseconds().max(0) as u64;
    millis.div_ceil(1000).max(1)
}
