//! Commission credit for the partner wallet pool.
//!
//! Every tap by a regular wallet earns one uniformly random pool member
//! `0.1 * tap_count` commission points. Pool members themselves earn no
//! commission on their own taps. Credits are deduplicated by the tap's
//! transaction hash with the same bounded-set semantics as the reconciler.

use std::sync::Arc;

use alloy::primitives::B256;
use rand::Rng;

use crate::config::COMMISSION_PER_TAP;
use crate::storage::{Database, DbResult};

use super::processed::ProcessedSet;

pub struct CommissionDistributor {
    db: Arc<Database>,
    /// Lowercased pool wallets.
    pool: Vec<String>,
    processed: ProcessedSet,
}

impl CommissionDistributor {
    pub fn new(db: Arc<Database>, pool: impl IntoIterator<Item = String>) -> Self {
        Self {
            db,
            pool: pool.into_iter().map(|w| w.to_lowercase()).collect(),
            processed: ProcessedSet::default(),
        }
    }

    pub fn is_pool_wallet(&self, wallet: &str) -> bool {
        let wallet = wallet.to_lowercase();
        self.pool.iter().any(|w| *w == wallet)
    }

    /// Credit commission for a tap transaction. Returns the credited wallet
    /// and amount, or `None` when the sender is a pool member, the hash was
    /// already credited, or the pool is empty.
    pub fn credit(
        &self,
        from_wallet: &str,
        tx_hash: B256,
        tap_count: u32,
    ) -> DbResult<Option<(String, f64)>> {
        if self.pool.is_empty() || self.is_pool_wallet(from_wallet) {
            return Ok(None);
        }
        if !self.processed.mark(tx_hash) {
            tracing::debug!(%tx_hash, "commission replay ignored");
            return Ok(None);
        }

        let index = rand::thread_rng().gen_range(0..self.pool.len());
        let recipient = self.pool[index].clone();
        let amount = COMMISSION_PER_TAP * f64::from(tap_count);

        self.db
            .update_user(&recipient, |u| u.commission_points += amount)?;

        tracing::info!(from = from_wallet, to = %recipient, amount, "commission credited");
        Ok(Some((recipient, amount)))
    }
}
