//! Chain access: RPC client, game contract surface, and the transaction relay.

pub mod client;
pub mod contract;
pub mod relay;

pub use client::{burner_signer, ChainError, ChainRpc, HttpChainClient, ReceiptInfo};
pub use relay::TxRelay;
