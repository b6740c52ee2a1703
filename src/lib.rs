//! Basion Relay - Custodial Burner-Wallet Relay Service
//!
//! Server side of the Basion tap-to-earn game. Each player's main wallet gets
//! a server-held burner wallet whose key is stored encrypted; taps are signed
//! by the burner and relayed to the game contract, while the points ledger is
//! reconciled against confirmed on-chain transactions.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - Signature and receipt verification
//! - `chain` - EVM client, contract bindings, and the nonce-sequenced relay
//! - `ledger` - Points reconciliation and commission distribution
//! - `registry` - Burner creation and key custody
//! - `storage` - Embedded database (redb)
//! - `vault` - Key-at-rest encryption

pub mod api;
pub mod auth;
pub mod chain;
pub mod config;
pub mod error;
pub mod ledger;
pub mod models;
pub mod ratelimit;
pub mod registry;
pub mod state;
pub mod storage;
pub mod vault;
