//! On-chain boost reconciliation.
//!
//! The contract multiplies tap rewards by a per-user `pointsMultiplier`,
//! while the ledger tracks boost percent off-chain. The syncer pushes the
//! ledger value on-chain with an owner-signed `setBoost` whenever the two
//! drift apart. A contract that has never seen the user reports zero, which
//! means the base multiplier of 100.

use std::sync::Arc;

use alloy::primitives::{Address, B256};
use alloy::signers::local::PrivateKeySigner;

use crate::chain::{burner_signer, ChainRpc, TxRelay};
use crate::error::ApiError;
use crate::storage::Database;

/// The contract treats a zero multiplier as this base value.
const BASE_MULTIPLIER: u64 = 100;

/// Result of one reconciliation pass for a wallet.
#[derive(Debug, Clone)]
pub enum BoostSyncOutcome {
    /// No owner key configured; the expected multiplier is reported so the
    /// caller can still surface it.
    NotConfigured { multiplier: u64 },
    /// Contract already holds the expected multiplier.
    AlreadyInSync { multiplier: u64 },
    /// A `setBoost` transaction was broadcast.
    Synced { multiplier: u64, tx_hash: B256 },
}

/// Reconciles ledger boost percent with the contract's points multiplier.
pub struct BoostSyncer {
    db: Arc<Database>,
    chain: Arc<dyn ChainRpc>,
    relay: Arc<TxRelay>,
    owner: Option<PrivateKeySigner>,
}

impl BoostSyncer {
    pub fn new(
        db: Arc<Database>,
        chain: Arc<dyn ChainRpc>,
        relay: Arc<TxRelay>,
        owner_key: Option<[u8; 32]>,
    ) -> Self {
        let owner = owner_key.and_then(|key| match burner_signer(&key) {
            Ok(signer) => Some(signer),
            Err(err) => {
                tracing::warn!(error = %err, "owner key is unusable, boost sync disabled");
                None
            }
        });
        Self {
            db,
            chain,
            relay,
            owner,
        }
    }

    /// Bring the contract's multiplier for `wallet` in line with the ledger.
    pub async fn sync(&self, wallet: &str) -> Result<BoostSyncOutcome, ApiError> {
        let main = wallet.to_lowercase();
        let address: Address = main
            .parse()
            .map_err(|_| ApiError::validation("Invalid wallet address"))?;

        let boost = self
            .db
            .get_user(&main)?
            .map(|u| u.boost_percent)
            .unwrap_or(0);
        let expected = BASE_MULTIPLIER + u64::from(boost);

        let Some(owner) = self.owner.clone() else {
            return Ok(BoostSyncOutcome::NotConfigured {
                multiplier: expected,
            });
        };

        let on_chain = self.chain.points_multiplier(address).await?;
        let on_chain = if on_chain.is_zero() {
            BASE_MULTIPLIER
        } else {
            u64::try_from(on_chain).unwrap_or(u64::MAX)
        };
        if on_chain == expected {
            return Ok(BoostSyncOutcome::AlreadyInSync {
                multiplier: expected,
            });
        }

        let tx_hash = self.relay.set_boost(owner, address, expected).await?;
        tracing::info!(
            wallet = %main,
            multiplier = expected,
            on_chain,
            %tx_hash,
            "boost multiplier pushed on-chain"
        );
        Ok(BoostSyncOutcome::Synced {
            multiplier: expected,
            tx_hash,
        })
    }
}
