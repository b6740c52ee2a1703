//! JSON-RPC access to the game chain.
//!
//! [`ChainRpc`] is the seam between the service and the network: the relay,
//! registry, and admin sweep all talk to the chain through it, so tests can
//! substitute a mock without touching a node. [`HttpChainClient`] is the
//! production implementation over an alloy HTTP provider.
//!
//! Every RPC call carries an explicit 15 second timeout. A slow node fails
//! the request with [`ChainError::Timeout`] instead of hanging the handler.

use std::future::Future;
use std::time::Duration;

use alloy::{
    network::Ethereum,
    primitives::{Address, B256, U256},
    providers::{
        fillers::{BlobGasFiller, ChainIdFiller, FillProvider, GasFiller, JoinFill, NonceFiller},
        Identity, Provider, ProviderBuilder, RootProvider,
    },
    signers::local::PrivateKeySigner,
};
use async_trait::async_trait;

use super::contract::IBasion;

const RPC_TIMEOUT: Duration = Duration::from_secs(15);

/// HTTP provider type (with all fillers).
type HttpProvider = FillProvider<
    JoinFill<
        Identity,
        JoinFill<GasFiller, JoinFill<BlobGasFiller, JoinFill<NonceFiller, ChainIdFiller>>>,
    >,
    RootProvider<Ethereum>,
>;

/// Errors from chain access.
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("RPC call timed out")]
    Timeout,

    #[error("invalid private key: {0}")]
    InvalidKey(String),
}

/// The slice of a transaction receipt the service cares about.
#[derive(Debug, Clone)]
pub struct ReceiptInfo {
    pub status: bool,
    pub to: Option<Address>,
    pub block_number: Option<u64>,
    pub gas_used: u64,
}

/// Chain operations used by the relay, registry, and admin sweep.
#[async_trait]
pub trait ChainRpc: Send + Sync {
    /// Native balance of an address in wei.
    async fn balance(&self, address: Address) -> Result<U256, ChainError>;

    /// Current gas price in wei.
    async fn gas_price(&self) -> Result<u128, ChainError>;

    /// Transaction count including pending transactions.
    async fn pending_nonce(&self, address: Address) -> Result<u64, ChainError>;

    async fn chain_id(&self) -> Result<u64, ChainError>;

    /// Receipt for a transaction hash, `None` while unmined.
    async fn receipt(&self, tx_hash: B256) -> Result<Option<ReceiptInfo>, ChainError>;

    /// Broadcast a signed EIP-2718 envelope, returning its hash.
    async fn send_raw_transaction(&self, raw: Vec<u8>) -> Result<B256, ChainError>;

    /// `userToBurner(user)` on the game contract. Zero when unregistered.
    async fn registered_burner(&self, user: Address) -> Result<Address, ChainError>;

    /// `tapBalance(user)` on the game contract.
    async fn tap_balance(&self, user: Address) -> Result<U256, ChainError>;

    /// `pointsMultiplier(user)` on the game contract. Zero means the contract
    /// has never been told a multiplier and treats the user as 100.
    async fn points_multiplier(&self, user: Address) -> Result<U256, ChainError>;
}

/// Production chain client over HTTP.
pub struct HttpChainClient {
    provider: HttpProvider,
    contract_address: Address,
}

impl HttpChainClient {
    pub fn new(rpc_url: url::Url, contract_address: Address) -> Self {
        let provider = ProviderBuilder::new().connect_http(rpc_url);
        Self {
            provider,
            contract_address,
        }
    }

    async fn timed<T, F>(fut: F) -> Result<T, ChainError>
    where
        F: Future<Output = Result<T, ChainError>>,
    {
        tokio::time::timeout(RPC_TIMEOUT, fut)
            .await
            .map_err(|_| ChainError::Timeout)?
    }
}

#[async_trait]
impl ChainRpc for HttpChainClient {
    async fn balance(&self, address: Address) -> Result<U256, ChainError> {
        Self::timed(async {
            self.provider
                .get_balance(address)
                .await
                .map_err(|e| ChainError::Rpc(e.to_string()))
        })
        .await
    }

    async fn gas_price(&self) -> Result<u128, ChainError> {
        Self::timed(async {
            self.provider
                .get_gas_price()
                .await
                .map_err(|e| ChainError::Rpc(e.to_string()))
        })
        .await
    }

    async fn pending_nonce(&self, address: Address) -> Result<u64, ChainError> {
        Self::timed(async {
            self.provider
                .get_transaction_count(address)
                .pending()
                .await
                .map_err(|e| ChainError::Rpc(e.to_string()))
        })
        .await
    }

    async fn chain_id(&self) -> Result<u64, ChainError> {
        Self::timed(async {
            self.provider
                .get_chain_id()
                .await
                .map_err(|e| ChainError::Rpc(e.to_string()))
        })
        .await
    }

    async fn receipt(&self, tx_hash: B256) -> Result<Option<ReceiptInfo>, ChainError> {
        Self::timed(async {
            let receipt = self
                .provider
                .get_transaction_receipt(tx_hash)
                .await
                .map_err(|e| ChainError::Rpc(e.to_string()))?;

            Ok(receipt.map(|r| ReceiptInfo {
                status: r.status(),
                to: r.to,
                block_number: r.block_number,
                gas_used: r.gas_used,
            }))
        })
        .await
    }

    async fn send_raw_transaction(&self, raw: Vec<u8>) -> Result<B256, ChainError> {
        Self::timed(async {
            let pending = self
                .provider
                .send_raw_transaction(&raw)
                .await
                .map_err(|e| ChainError::Rpc(e.to_string()))?;
            Ok(*pending.tx_hash())
        })
        .await
    }

    async fn registered_burner(&self, user: Address) -> Result<Address, ChainError> {
        Self::timed(async {
            IBasion::new(self.contract_address, &self.provider)
                .userToBurner(user)
                .call()
                .await
                .map_err(|e| ChainError::Rpc(e.to_string()))
        })
        .await
    }

    async fn tap_balance(&self, user: Address) -> Result<U256, ChainError> {
        Self::timed(async {
            IBasion::new(self.contract_address, &self.provider)
                .tapBalance(user)
                .call()
                .await
                .map_err(|e| ChainError::Rpc(e.to_string()))
        })
        .await
    }

    async fn points_multiplier(&self, user: Address) -> Result<U256, ChainError> {
        Self::timed(async {
            IBasion::new(self.contract_address, &self.provider)
                .pointsMultiplier(user)
                .call()
                .await
                .map_err(|e| ChainError::Rpc(e.to_string()))
        })
        .await
    }
}

/// Build a signer from a raw 32-byte burner private key.
pub fn burner_signer(key_bytes: &[u8; 32]) -> Result<PrivateKeySigner, ChainError> {
    PrivateKeySigner::from_slice(key_bytes).map_err(|e| ChainError::InvalidKey(e.to_string()))
}
