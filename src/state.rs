//! Shared application state.

use std::sync::Arc;

use crate::chain::{ChainRpc, HttpChainClient, TxRelay};
use crate::config::Config;
use crate::ledger::{BoostSyncer, CommissionDistributor, Reconciler};
use crate::ratelimit::RateLimiter;
use crate::registry::BurnerRegistry;
use crate::storage::{Database, DbError};
use crate::vault::KeyVault;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub db: Arc<Database>,
    pub chain: Arc<dyn ChainRpc>,
    pub relay: Arc<TxRelay>,
    pub registry: Arc<BurnerRegistry>,
    pub reconciler: Arc<Reconciler>,
    pub commission: Arc<CommissionDistributor>,
    pub boost_sync: Arc<BoostSyncer>,
    pub limiter: Arc<RateLimiter>,
}

impl AppState {
    /// Build production state: opens the database and connects the HTTP
    /// chain client from config.
    pub fn new(config: Config) -> Result<Self, DbError> {
        let db = Arc::new(Database::open(&config.data_dir.join("basion.redb"))?);
        let chain: Arc<dyn ChainRpc> = Arc::new(HttpChainClient::new(
            config.rpc_url.clone(),
            config.contract_address,
        ));
        Ok(Self::with_parts(config, db, chain))
    }

    /// Wire services over the given database and chain client.
    pub fn with_parts(config: Config, db: Arc<Database>, chain: Arc<dyn ChainRpc>) -> Self {
        let vault = KeyVault::new(config.vault_secret);
        let relay = Arc::new(TxRelay::new(
            Arc::clone(&chain),
            config.contract_address,
            config.max_gas_wei,
        ));
        let registry = Arc::new(BurnerRegistry::new(Arc::clone(&db), vault));
        let reconciler = Arc::new(Reconciler::new(Arc::clone(&db)));
        let commission = Arc::new(CommissionDistributor::new(
            Arc::clone(&db),
            config.commission_wallets.iter().map(|a| a.to_string()),
        ));
        let boost_sync = Arc::new(BoostSyncer::new(
            Arc::clone(&db),
            Arc::clone(&chain),
            Arc::clone(&relay),
            config.owner_key,
        ));

        Self {
            config: Arc::new(config),
            db,
            chain,
            relay,
            registry,
            reconciler,
            commission,
            boost_sync,
            limiter: Arc::new(RateLimiter::default()),
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::sync::Mutex;

    use alloy::primitives::{keccak256, Address, B256, U256};
    use async_trait::async_trait;

    use crate::chain::{ChainError, ChainRpc, ReceiptInfo};

    use super::*;

    /// Configurable in-memory chain for handler tests.
    pub struct StubChain {
        /// Default balance, overridable per address via `balances`.
        pub balance: Mutex<U256>,
        pub balances: Mutex<HashMap<Address, U256>>,
        pub gas_price: Mutex<u128>,
        pub receipt: Mutex<Option<ReceiptInfo>>,
        pub registered: Mutex<Address>,
        pub tap_balance: Mutex<U256>,
        pub multiplier: Mutex<U256>,
        pub sent: Mutex<Vec<Vec<u8>>>,
    }

    impl Default for StubChain {
        fn default() -> Self {
            Self {
                balance: Mutex::new(U256::from(10u128).pow(U256::from(18))),
                balances: Mutex::new(HashMap::new()),
                gas_price: Mutex::new(100),
                receipt: Mutex::new(None),
                registered: Mutex::new(Address::ZERO),
                tap_balance: Mutex::new(U256::ZERO),
                multiplier: Mutex::new(U256::from(100)),
                sent: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ChainRpc for StubChain {
        async fn balance(&self, address: Address) -> Result<U256, ChainError> {
            if let Some(balance) = self.balances.lock().unwrap().get(&address) {
                return Ok(*balance);
            }
            Ok(*self.balance.lock().unwrap())
        }

        async fn gas_price(&self) -> Result<u128, ChainError> {
            Ok(*self.gas_price.lock().unwrap())
        }

        async fn pending_nonce(&self, _address: Address) -> Result<u64, ChainError> {
            Ok(0)
        }

        async fn chain_id(&self) -> Result<u64, ChainError> {
            Ok(84532)
        }

        async fn receipt(&self, _tx_hash: B256) -> Result<Option<ReceiptInfo>, ChainError> {
            Ok(self.receipt.lock().unwrap().clone())
        }

        async fn send_raw_transaction(&self, raw: Vec<u8>) -> Result<B256, ChainError> {
            let hash = keccak256(&raw);
            self.sent.lock().unwrap().push(raw);
            Ok(hash)
        }

        async fn registered_burner(&self, _user: Address) -> Result<Address, ChainError> {
            Ok(*self.registered.lock().unwrap())
        }

        async fn tap_balance(&self, _user: Address) -> Result<U256, ChainError> {
            Ok(*self.tap_balance.lock().unwrap())
        }

        async fn points_multiplier(&self, _user: Address) -> Result<U256, ChainError> {
            Ok(*self.multiplier.lock().unwrap())
        }
    }

    /// State over a temp database and the given stub chain.
    pub fn test_state(chain: Arc<dyn ChainRpc>, admin: Address) -> (AppState, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = Arc::new(Database::open(&dir.path().join("test.redb")).unwrap());

        let config = Config {
            host: "127.0.0.1".to_string(),
            port: 0,
            rpc_url: "http://localhost:8545".parse().unwrap(),
            contract_address: Address::repeat_byte(0xC0),
            treasury_address: Address::repeat_byte(0x77),
            admin_wallet: admin,
            vault_secret: [9u8; 32],
            owner_key: Some([0x42u8; 32]),
            data_dir: PathBuf::from("."),
            max_gas_wei: 5_000_000,
            commission_wallets: vec![Address::repeat_byte(0x11)],
            boost_codes: HashMap::from([("MAVRINO40413".to_string(), 20u32)]),
            maintenance_mode: false,
            maintenance_message: "maintenance".to_string(),
        };

        (AppState::with_parts(config, db, chain), dir)
    }
}
