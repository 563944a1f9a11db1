//! Upstream API rate-limit tracking.
//!
//! Reads `X-RateLimit-Remaining` / `X-RateLimit-Reset` (or the IETF
//! `RateLimit-*` names) from every GitHub response.  When the budget is spent
//! the source refuses further requests until the reset time, so a poll fails
//! fast instead of collecting a string of 403s.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::debug;

#[derive(Debug, Clone)]
pub struct RateLimitState {
    remaining: Arc<AtomicU64>,
    /// Unix timestamp at which the window resets.
    reset_at: Arc<AtomicU64>,
}

impl Default for RateLimitState {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimitState {
    pub fn new() -> Self {
        Self {
            remaining: Arc::new(AtomicU64::new(u64::MAX)),
            reset_at: Arc::new(AtomicU64::new(0)),
        }
    }

    /// `None` until the first response carried a rate-limit header.
    pub fn remaining(&self) -> Option<u64> {
        match self.remaining.load(Ordering::Relaxed) {
            u64::MAX => None,
            n => Some(n),
        }
    }

    pub fn reset_at(&self) -> u64 {
        self.reset_at.load(Ordering::Relaxed)
    }

    pub fn update_from_headers(&self, headers: &reqwest::header::HeaderMap) {
        let read = |primary: &str, fallback: &str| {
            headers
                .get(primary)
                .or_else(|| headers.get(fallback))
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
        };

        if let Some(r) = read("X-RateLimit-Remaining", "RateLimit-Remaining") {
            self.remaining.store(r, Ordering::Relaxed);
        }
        if let Some(r) = read("X-RateLimit-Reset", "RateLimit-Reset") {
            self.reset_at.store(r, Ordering::Relaxed);
        }
    }

    /// Seconds until the window resets when the budget is spent, else `None`.
    pub fn exhausted_for(&self, now_unix: u64) -> Option<u64> {
        let remaining = self.remaining()?;
        let reset = self.reset_at();
        if remaining == 0 && reset > now_unix {
            debug!(reset_in_secs = reset - now_unix, "rate limit exhausted");
            Some(reset - now_unix)
        } else {
            None
        }
    }
}
