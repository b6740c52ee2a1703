//! Transaction relay with locally sequenced nonces.
//!
//! Burner wallets fire taps far faster than the chain confirms them, so the
//! relay keeps its own nonce cursor per burner instead of asking the node
//! before every send. Cursors live behind a per-burner async lock; taps for
//! different burners never serialize against each other.
//!
//! Nonce rules:
//! - first use of a burner fetches the *pending* transaction count
//! - a nonce conflict reported at submission time (before broadcast) triggers
//!   exactly one refetch-and-retry
//! - a transaction that has been broadcast is never retried
//! - any other submission failure invalidates the cursor so the next send
//!   resyncs with the node

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use alloy::{
    eips::eip2718::Encodable2718,
    network::{EthereumWallet, TransactionBuilder},
    primitives::{Address, Bytes, B256, U256},
    rpc::types::TransactionRequest,
    signers::local::PrivateKeySigner,
};
use tokio::sync::OnceCell;

use crate::config::{BOOST_SYNC_GAS, TAP_BASE_GAS, TAP_PER_TAP_GAS, TRANSFER_GAS};
use crate::error::ApiError;

use super::client::ChainRpc;
use super::contract::{batch_tap_calldata, set_boost_calldata, tap_calldata};

type NonceCursor = Arc<tokio::sync::Mutex<Option<u64>>>;

/// Relays burner-signed transactions to the game chain.
pub struct TxRelay {
    chain: Arc<dyn ChainRpc>,
    contract_address: Address,
    /// Gas-price ceiling in wei for tap relaying.
    max_gas_wei: u128,
    chain_id: OnceCell<u64>,
    cursors: Mutex<HashMap<Address, NonceCursor>>,
}

impl TxRelay {
    pub fn new(chain: Arc<dyn ChainRpc>, contract_address: Address, max_gas_wei: u128) -> Self {
        Self {
            chain,
            contract_address,
            max_gas_wei,
            chain_id: OnceCell::new(),
            cursors: Mutex::new(HashMap::new()),
        }
    }

    /// Relay `count` taps from a burner. Single taps call `tap()`, batches
    /// call `batchTap(count)`. Returns the broadcast transaction hash.
    pub async fn relay_taps(
        &self,
        signer: PrivateKeySigner,
        count: u32,
    ) -> Result<B256, ApiError> {
        let burner = signer.address();
        let gas_price = self.tap_gas_price().await?;
        let gas_limit = TAP_BASE_GAS + TAP_PER_TAP_GAS * u64::from(count);

        let balance = self.chain.balance(burner).await?;
        let required = U256::from(gas_limit) * U256::from(gas_price);
        if balance < required {
            return Err(ApiError::InsufficientGas {
                balance_wei: balance.to_string(),
                required_wei: required.to_string(),
            });
        }

        let input = if count == 1 {
            tap_calldata()
        } else {
            batch_tap_calldata(count)
        };

        self.submit(
            signer,
            self.contract_address,
            U256::ZERO,
            Some(input),
            gas_limit,
            gas_price,
        )
        .await
    }

    /// Drain a burner into `to`, leaving exactly the transfer fee behind.
    /// Returns `None` when the balance does not cover the fee.
    pub async fn sweep(
        &self,
        signer: PrivateKeySigner,
        to: Address,
    ) -> Result<Option<B256>, ApiError> {
        let burner = signer.address();
        let balance = self.chain.balance(burner).await?;
        let gas_price = self.chain.gas_price().await?;

        let fee = U256::from(TRANSFER_GAS) * U256::from(gas_price);
        if balance <= fee {
            return Ok(None);
        }

        let hash = self
            .submit(signer, to, balance - fee, None, TRANSFER_GAS, gas_price)
            .await?;
        Ok(Some(hash))
    }

    /// Push a user's points multiplier to the contract via `setBoost`, signed
    /// by the contract owner. Returns the broadcast transaction hash.
    pub async fn set_boost(
        &self,
        signer: PrivateKeySigner,
        user: Address,
        multiplier: u64,
    ) -> Result<B256, ApiError> {
        let gas_price = self.chain.gas_price().await?;
        self.submit(
            signer,
            self.contract_address,
            U256::ZERO,
            Some(set_boost_calldata(user, multiplier)),
            BOOST_SYNC_GAS,
            gas_price,
        )
        .await
    }

    /// Gas price for tap relaying, enforcing the ceiling. An RPC failure
    /// here fails open: the tap proceeds priced at the ceiling rather than
    /// turning a price-feed hiccup into an outage.
    async fn tap_gas_price(&self) -> Result<u128, ApiError> {
        match self.chain.gas_price().await {
            Ok(price) if price > self.max_gas_wei => Err(ApiError::validation(
                "Network gas price is too high right now. Please try again shortly.",
            )),
            Ok(price) => Ok(price),
            Err(err) => {
                tracing::warn!(error = %err, "gas price fetch failed, relaying at the ceiling");
                Ok(self.max_gas_wei)
            }
        }
    }

    fn cursor(&self, burner: Address) -> NonceCursor {
        let mut cursors = self
            .cursors
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        Arc::clone(cursors.entry(burner).or_default())
    }

    async fn chain_id(&self) -> Result<u64, ApiError> {
        self.chain_id
            .get_or_try_init(|| async { self.chain.chain_id().await })
            .await
            .copied()
            .map_err(Into::into)
    }

    async fn submit(
        &self,
        signer: PrivateKeySigner,
        to: Address,
        value: U256,
        input: Option<Bytes>,
        gas_limit: u64,
        gas_price: u128,
    ) -> Result<B256, ApiError> {
        let burner = signer.address();
        let chain_id = self.chain_id().await?;
        let wallet = EthereumWallet::from(signer);

        let cursor = self.cursor(burner);
        let mut next = cursor.lock().await;
        let mut nonce = match *next {
            Some(n) => n,
            None => self.chain.pending_nonce(burner).await?,
        };

        let mut retried = false;
        loop {
            let mut tx = TransactionRequest::default()
                .with_from(burner)
                .with_to(to)
                .with_value(value)
                .with_nonce(nonce)
                .with_chain_id(chain_id)
                .with_gas_limit(gas_limit)
                .with_max_fee_per_gas(gas_price.saturating_mul(2))
                .with_max_priority_fee_per_gas(gas_price);
            if let Some(data) = input.clone() {
                tx = tx.with_input(data);
            }

            let envelope = tx
                .build(&wallet)
                .await
                .map_err(|e| ApiError::chain(format!("failed to sign transaction: {e}")))?;

            match self.chain.send_raw_transaction(envelope.encoded_2718()).await {
                Ok(hash) => {
                    *next = Some(nonce + 1);
                    return Ok(hash);
                }
                Err(err) => {
                    let message = err.to_string();
                    // A conflict reported here means the node rejected the
                    // transaction before broadcast, so one resync is safe.
                    if !retried && is_nonce_conflict(&message) {
                        tracing::warn!(%burner, nonce, "nonce conflict, refetching pending nonce");
                        retried = true;
                        nonce = self.chain.pending_nonce(burner).await?;
                        continue;
                    }
                    *next = None;
                    return Err(err.into());
                }
            }
        }
    }
}

fn is_nonce_conflict(message: &str) -> bool {
    let m = message.to_lowercase();
    m.contains("nonce too low")
        || m.contains("invalid nonce")
        || m.contains("already known")
        || m.contains("replacement transaction")
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU64, Ordering};

    use alloy::consensus::{Transaction, TxEnvelope};
    use alloy::eips::eip2718::Decodable2718;
    use alloy::primitives::keccak256;
    use async_trait::async_trait;

    use super::super::client::{ChainError, ReceiptInfo};
    use super::*;

    struct MockChain {
        balance: U256,
        gas_price: Result<u128, ()>,
        start_nonce: u64,
        sent: Mutex<Vec<Vec<u8>>>,
        fail_next_send: Mutex<Option<String>>,
        nonce_fetches: AtomicU64,
    }

    impl MockChain {
        fn new(balance: U256, gas_price: u128, start_nonce: u64) -> Self {
            Self {
                balance,
                gas_price: Ok(gas_price),
                start_nonce,
                sent: Mutex::new(Vec::new()),
                fail_next_send: Mutex::new(None),
                nonce_fetches: AtomicU64::new(0),
            }
        }

        fn sent_nonces(&self) -> Vec<u64> {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .map(|raw| {
                    TxEnvelope::decode_2718(&mut raw.as_slice())
                        .unwrap()
                        .nonce()
                })
                .collect()
        }
    }

    #[async_trait]
    impl ChainRpc for MockChain {
        async fn balance(&self, _address: Address) -> Result<U256, ChainError> {
            Ok(self.balance)
        }

        async fn gas_price(&self) -> Result<u128, ChainError> {
            self.gas_price
                .map_err(|()| ChainError::Rpc("gas price unavailable".into()))
        }

        async fn pending_nonce(&self, _address: Address) -> Result<u64, ChainError> {
            self.nonce_fetches.fetch_add(1, Ordering::Relaxed);
            Ok(self.start_nonce)
        }

        async fn chain_id(&self) -> Result<u64, ChainError> {
            Ok(84532)
        }

        async fn receipt(&self, _tx_hash: B256) -> Result<Option<ReceiptInfo>, ChainError> {
            Ok(None)
        }

        async fn send_raw_transaction(&self, raw: Vec<u8>) -> Result<B256, ChainError> {
            if let Some(message) = self.fail_next_send.lock().unwrap().take() {
                return Err(ChainError::Rpc(message));
            }
            let hash = keccak256(&raw);
            self.sent.lock().unwrap().push(raw);
            Ok(hash)
        }

        async fn registered_burner(&self, _user: Address) -> Result<Address, ChainError> {
            Ok(Address::ZERO)
        }

        async fn tap_balance(&self, _user: Address) -> Result<U256, ChainError> {
            Ok(U256::ZERO)
        }

        async fn points_multiplier(&self, _user: Address) -> Result<U256, ChainError> {
            Ok(U256::from(100))
        }
    }

    fn relay_over(chain: Arc<MockChain>) -> TxRelay {
        TxRelay::new(chain, Address::repeat_byte(0xC0), 5_000_000)
    }

    fn burner() -> PrivateKeySigner {
        PrivateKeySigner::from_slice(&[0x42; 32]).unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn concurrent_taps_get_unique_increasing_nonces() {
        let chain = Arc::new(MockChain::new(
            U256::from(10u128).pow(U256::from(18)),
            100,
            7,
        ));
        let relay = Arc::new(relay_over(Arc::clone(&chain)));
        let signer = burner();

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let relay = Arc::clone(&relay);
                let signer = signer.clone();
                tokio::spawn(async move { relay.relay_taps(signer, 1).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let mut nonces = chain.sent_nonces();
        nonces.sort_unstable();
        assert_eq!(nonces, (7..17).collect::<Vec<_>>());
        // Only the first tap hit the node for a nonce.
        assert_eq!(chain.nonce_fetches.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn insufficient_burner_balance_is_rejected_before_send() {
        let chain = Arc::new(MockChain::new(U256::from(1_000u64), 100, 0));
        let relay = relay_over(Arc::clone(&chain));

        let err = relay.relay_taps(burner(), 10).await.unwrap_err();
        assert!(matches!(err, ApiError::InsufficientGas { .. }));
        assert!(chain.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn gas_ceiling_refuses_taps() {
        let mut chain = MockChain::new(U256::from(10u128).pow(U256::from(18)), 100, 0);
        chain.gas_price = Ok(6_000_000);
        let relay = relay_over(Arc::new(chain));

        let err = relay.relay_taps(burner(), 1).await.unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[tokio::test]
    async fn gas_price_failure_fails_open() {
        let mut chain = MockChain::new(U256::from(10u128).pow(U256::from(18)), 0, 0);
        chain.gas_price = Err(());
        let chain = Arc::new(chain);
        let relay = relay_over(Arc::clone(&chain));

        relay.relay_taps(burner(), 1).await.unwrap();
        assert_eq!(chain.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn nonce_conflict_retries_once_with_refetched_nonce() {
        let chain = Arc::new(MockChain::new(
            U256::from(10u128).pow(U256::from(18)),
            100,
            42,
        ));
        *chain.fail_next_send.lock().unwrap() = Some("nonce too low".into());
        let relay = relay_over(Arc::clone(&chain));

        relay.relay_taps(burner(), 1).await.unwrap();

        let nonces = chain.sent_nonces();
        assert_eq!(nonces, vec![42]);
        // One fetch for first use, one for the conflict resync.
        assert_eq!(chain.nonce_fetches.load(Ordering::Relaxed), 2);
    }

    #[tokio::test]
    async fn revert_is_not_retried_and_invalidates_cursor() {
        let chain = Arc::new(MockChain::new(
            U256::from(10u128).pow(U256::from(18)),
            100,
            5,
        ));
        *chain.fail_next_send.lock().unwrap() = Some("execution reverted: Blacklisted".into());
        let relay = relay_over(Arc::clone(&chain));
        let signer = burner();

        let err = relay.relay_taps(signer.clone(), 1).await.unwrap_err();
        assert!(matches!(err, ApiError::Chain { .. }));
        assert!(chain.sent.lock().unwrap().is_empty());

        // Next send resyncs with the node instead of trusting the cursor.
        relay.relay_taps(signer, 1).await.unwrap();
        assert_eq!(chain.sent_nonces(), vec![5]);
        assert_eq!(chain.nonce_fetches.load(Ordering::Relaxed), 2);
    }

    #[tokio::test]
    async fn set_boost_targets_the_contract_with_owner_calldata() {
        let chain = Arc::new(MockChain::new(
            U256::from(10u128).pow(U256::from(18)),
            100,
            0,
        ));
        let relay = relay_over(Arc::clone(&chain));
        let user = Address::repeat_byte(0xAB);

        relay.set_boost(burner(), user, 120).await.unwrap();

        let sent = chain.sent.lock().unwrap();
        let envelope = TxEnvelope::decode_2718(&mut sent[0].as_slice()).unwrap();
        assert_eq!(envelope.to(), Some(Address::repeat_byte(0xC0)));
        assert_eq!(envelope.input(), &set_boost_calldata(user, 120));
    }

    #[tokio::test]
    async fn sweep_skips_dust_balances() {
        // Balance exactly equal to the fee must be skipped.
        let chain = Arc::new(MockChain::new(U256::from(21_000u64 * 100), 100, 0));
        let relay = relay_over(Arc::clone(&chain));

        let result = relay.sweep(burner(), Address::repeat_byte(0x77)).await.unwrap();
        assert!(result.is_none());
        assert!(chain.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn sweep_transfers_balance_minus_fee() {
        let chain = Arc::new(MockChain::new(U256::from(10_000_000u64), 100, 0));
        let relay = relay_over(Arc::clone(&chain));

        let hash = relay
            .sweep(burner(), Address::repeat_byte(0x77))
            .await
            .unwrap();
        assert!(hash.is_some());

        let sent = chain.sent.lock().unwrap();
        let envelope = TxEnvelope::decode_2718(&mut sent[0].as_slice()).unwrap();
        let expected = U256::from(10_000_000u64 - 21_000 * 100);
        assert_eq!(envelope.value(), expected);
    }
}
