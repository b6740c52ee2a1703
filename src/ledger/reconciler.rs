//! Ledger reconciliation.
//!
//! Every credit to the points ledger is keyed by the transaction hash that
//! earned it. A hash is applied at most once per process; replays return
//! `None` and the caller serves the current ledger row unchanged.
//!
//! Points per credit: `tap_count * (1 + boost_percent / 100)`. Single taps
//! land in premium points, batches in standard points; both add to the total.

use std::sync::Arc;

use alloy::primitives::B256;
use chrono::Utc;

use crate::storage::{Database, DbResult, UserRecord};

use super::processed::ProcessedSet;

/// Points earned by `tap_count` taps at the given boost.
pub fn points_for(tap_count: u32, boost_percent: u32) -> f64 {
    f64::from(tap_count) * (1.0 + f64::from(boost_percent) / 100.0)
}

pub struct Reconciler {
    db: Arc<Database>,
    processed: ProcessedSet,
}

impl Reconciler {
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            db,
            processed: ProcessedSet::default(),
        }
    }

    /// Credit taps for a wallet, at most once per transaction hash.
    ///
    /// Returns `Some((row, points_earned))` on first application and `None`
    /// when the hash was already credited.
    pub fn apply_taps(
        &self,
        main_wallet: &str,
        tx_hash: B256,
        tap_count: u32,
    ) -> DbResult<Option<(UserRecord, f64)>> {
        if !self.processed.mark(tx_hash) {
            tracing::debug!(%tx_hash, "tap credit replay ignored");
            return Ok(None);
        }

        let mut earned = 0.0;
        let user = self.db.update_user(main_wallet, |u| {
            earned = points_for(tap_count, u.boost_percent);
            if tap_count == 1 {
                u.premium_points += earned;
            } else {
                u.standard_points += earned;
            }
            u.total_points += earned;
            u.taps_remaining = u.taps_remaining.saturating_sub(u64::from(tap_count));
            u.last_tap_at = Some(Utc::now());
        })?;

        Ok(Some((user, earned)))
    }

    /// Record a confirmed deposit, at most once per transaction hash.
    pub fn apply_deposit(
        &self,
        main_wallet: &str,
        usd_amount: f64,
        taps_purchased: u64,
        tx_hash: B256,
    ) -> DbResult<Option<UserRecord>> {
        if !self.processed.mark(tx_hash) {
            tracing::debug!(%tx_hash, "deposit replay ignored");
            return Ok(None);
        }

        let user = self.db.update_user(main_wallet, |u| {
            u.total_deposit_usd += usd_amount;
            u.deposit_count += 1;
            u.taps_remaining += taps_purchased;
        })?;
        Ok(Some(user))
    }

    /// Whether a hash was already credited.
    pub fn is_processed(&self, tx_hash: B256) -> bool {
        self.processed.contains(tx_hash)
    }
}
