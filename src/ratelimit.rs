//! In-process request rate limiting.
//!
//! A sliding-window limiter shared by all endpoints. Each endpoint checks its
//! own [`Scope`], so quotas are tracked per (scope, identifier) pair where the
//! identifier is a lowercased wallet address or a client IP string.
//!
//! Memory is bounded two ways: a probabilistic cleanup pass every
//! `cleanup_interval` requests drops identifiers with no recent activity, and
//! a hard cap on tracked identifiers rejects brand-new identifiers once the
//! map is full and cleanup cannot reclaim space.
//!
//! The limiter is deliberately process-local and fails open: a poisoned lock
//! is recovered and the request proceeds rather than turning a limiter fault
//! into an outage.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::{Duration, Instant};

/// Endpoint classes with independent quotas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Burner creation / registration, keyed by wallet.
    Init,
    /// Tap relay, keyed by wallet.
    Tap,
    /// Ledger sync by transaction hash, keyed by wallet.
    SyncUser,
    /// Commission credit, keyed by wallet.
    Commission,
    /// Burner lookup, keyed by IP.
    GetBurner,
    /// Leaderboard reads, keyed by IP.
    Leaderboard,
    /// Boost percent reads, keyed by IP.
    BoostQuery,
    /// Boost code redemption, keyed by wallet.
    BoostRedeem,
    /// Referral registration, keyed by wallet.
    ReferralRegister,
    /// Referral bonus claim, keyed by wallet.
    ReferralClaim,
    /// User snapshot reads, keyed by IP.
    UserLookup,
    /// On-chain boost reconciliation, keyed by wallet.
    SyncBoost,
    /// Tiny window for exercising expiry in tests.
    #[cfg(test)]
    ShortWindow,
}

impl Scope {
    /// (max requests, window) for this scope.
    fn quota(self) -> (u32, Duration) {
        match self {
            Scope::Init => (2, Duration::from_secs(30)),
            Scope::Tap => (60, Duration::from_secs(60)),
            Scope::SyncUser => (30, Duration::from_secs(60)),
            Scope::Commission => (60, Duration::from_secs(60)),
            Scope::GetBurner => (10, Duration::from_secs(60)),
            Scope::Leaderboard => (60, Duration::from_secs(60)),
            Scope::BoostQuery => (60, Duration::from_secs(60)),
            Scope::BoostRedeem => (10, Duration::from_secs(60)),
            Scope::ReferralRegister => (3, Duration::from_secs(10)),
            Scope::ReferralClaim => (3, Duration::from_secs(30)),
            Scope::UserLookup => (30, Duration::from_secs(60)),
            Scope::SyncBoost => (10, Duration::from_secs(60)),
            #[cfg(test)]
            Scope::ShortWindow => (2, Duration::from_millis(40)),
        }
    }
}

/// Sliding-window rate limiter over (scope, identifier) pairs.
pub struct RateLimiter {
    state: RwLock<HashMap<(Scope, String), Vec<Instant>>>,
    request_count: AtomicU64,
    cleanup_interval: u64,
    max_tracked: usize,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(100, 10_000)
    }
}

impl RateLimiter {
    pub fn new(cleanup_interval: u64, max_tracked: usize) -> Self {
        Self {
            state: RwLock::new(HashMap::new()),
            request_count: AtomicU64::new(0),
            cleanup_interval,
            max_tracked,
        }
    }

    /// Record a request for `identifier` under `scope`. Returns `false` when
    /// the quota for the current window is exhausted.
    pub fn allow(&self, scope: Scope, identifier: &str) -> bool {
        let (max_requests, window) = scope.quota();
        let now = Instant::now();
        let cutoff = now.checked_sub(window).unwrap_or(now);

        let count = self.request_count.fetch_add(1, Ordering::Relaxed);
        if count > 0 && count % self.cleanup_interval == 0 {
            self.cleanup();
        }

        let key = (scope, identifier.to_string());

        let mut state = self
            .state
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        // Hard cap on tracked identifiers. Try reclaiming expired entries
        // before rejecting a brand-new identifier.
        if !state.contains_key(&key) && state.len() >= self.max_tracked {
            state.retain(|(s, _), timestamps| {
                let (_, w) = s.quota();
                let c = now.checked_sub(w).unwrap_or(now);
                timestamps.retain(|&t| t > c);
                !timestamps.is_empty()
            });
            if state.len() >= self.max_tracked {
                tracing::warn!(
                    tracked = state.len(),
                    max_tracked = self.max_tracked,
                    "rate limiter identifier cap reached, rejecting new identifier"
                );
                return false;
            }
        }

        let timestamps = state.entry(key).or_default();
        timestamps.retain(|&t| t > cutoff);

        if timestamps.len() >= max_requests as usize {
            tracing::warn!(
                ?scope,
                identifier,
                requests = timestamps.len(),
                max = max_requests,
                "rate limit exceeded"
            );
            return false;
        }

        timestamps.push(now);
        true
    }

    /// Drop identifiers whose every timestamp has aged out of its window.
    pub fn cleanup(&self) {
        let now = Instant::now();
        let mut state = self
            .state
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        state.retain(|(scope, _), timestamps| {
            let (_, window) = scope.quota();
            let cutoff = now.checked_sub(window).unwrap_or(now);
            timestamps.retain(|&t| t > cutoff);
            !timestamps.is_empty()
        });
    }

    /// Number of tracked (scope, identifier) pairs, for monitoring.
    pub fn tracked(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }
}
