//! # Runtime Configuration
//!
//! Configuration is loaded from the environment once at startup into a
//! [`Config`] value shared through application state.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `RPC_URL` | EVM JSON-RPC endpoint | `https://sepolia.base.org` |
//! | `CONTRACT_ADDRESS` | Basion game contract (proxy) | Base Sepolia deployment |
//! | `TREASURY_ADDRESS` | Sweep destination for burner funds | — |
//! | `ADMIN_WALLET` | Admin identity for privileged endpoints | — |
//! | `ENCRYPTION_KEY` | 32-byte hex secret for the key vault | Required |
//! | `OWNER_PRIVATE_KEY` | Contract owner key for on-chain boost sync | Unset (sync disabled) |
//! | `DATA_DIR` | Directory for the embedded database | `./data` |
//! | `MAX_GAS_WEI` | Gas-price ceiling; taps are refused above it | `5000000` (0.005 gwei) |
//! | `COMMISSION_WALLETS` | Comma-separated commission pool override | Built-in pool |
//! | `BOOST_CODES` | `CODE:PERCENT` pairs, comma-separated | `MAVRINO40413:20` |
//! | `MAINTENANCE_MODE` | `true` blocks init with 503 | `false` |
//! | `LOG_FORMAT` | `json` or `pretty` | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use alloy::primitives::{Address, U256};

/// Fixed gas budget for a tap submission: `base + per_tap * count`.
pub const TAP_BASE_GAS: u64 = 50_000;
/// Incremental gas per tap in a batch.
pub const TAP_PER_TAP_GAS: u64 = 5_000;
/// Gas reserved for a plain value transfer during fund sweeps.
pub const TRANSFER_GAS: u64 = 21_000;
/// Gas budget for an owner-signed `setBoost` call.
pub const BOOST_SYNC_GAS: u64 = 150_000;

/// Commission credited to a pool wallet per tap (10% of one base tap).
pub const COMMISSION_PER_TAP: f64 = 0.1;

/// Referral bonus in boost percent, applied once per side.
pub const REFERRAL_BONUS_PERCENT: u32 = 10;
/// A referrer stops earning boost after this many referrals.
pub const MAX_REWARDED_REFERRALS: u32 = 5;

/// Boost percent is capped here regardless of redeemed codes.
pub const MAX_BOOST_PERCENT: u32 = 100;

/// Default commission pool (overridable via `COMMISSION_WALLETS`).
const DEFAULT_COMMISSION_WALLETS: &[&str] = &[
    "0x7cf0E9B33800E21fD69Aa3Fe693B735A121AA950",
    "0x338388413cb284B31122B84da5E330017A8692C0",
    "0x5f878c7D5F4B25F5730A703a65d1492bc2b16cfB",
    "0x953e94EEf0740b77E230EEd5849432E2C9e4b2B2",
    "0x174f44A473Bb7aDfe005157abc8EAc27Bf3575f3",
    "0x8dD04af9be247A87438da2812C555C3c0F4df8d7",
    "0x882ABb7ab668188De2F80A02c958C3f88f5B0db4",
    "0xceF725dB47160438787b6ED362162DafCA6677cd",
    "0x8d1eE41E1AC330C96E36f272Cc1bE3572fB30c97",
    "0xbc189B1BC53adC93c6019DD03feccf4311D0175a",
];

/// A purchasable tap package. Package IDs match the contract's array indices.
#[derive(Debug, Clone, Copy)]
pub struct TapPackage {
    pub id: u8,
    pub usd: u32,
    pub taps: u32,
    /// Deposit price in wei.
    pub price_wei: U256,
}

/// The two packages offered by the contract (0 and 1).
pub fn packages() -> [TapPackage; 2] {
    [
        TapPackage {
            id: 0,
            usd: 3,
            taps: 5_000,
            price_wei: U256::from(1_000_000_000_000_000u64), // 0.001 ETH
        },
        TapPackage {
            id: 1,
            usd: 10,
            taps: 20_000,
            price_wei: U256::from(3_000_000_000_000_000u64), // 0.003 ETH
        },
    ]
}

/// Errors raised while loading configuration from the environment.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

/// Immutable runtime configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub rpc_url: url::Url,
    pub contract_address: Address,
    pub treasury_address: Address,
    pub admin_wallet: Address,
    /// 32-byte vault secret for burner-key encryption at rest.
    pub vault_secret: [u8; 32],
    /// Contract owner key for `setBoost`; boost sync is disabled when unset.
    pub owner_key: Option<[u8; 32]>,
    pub data_dir: PathBuf,
    /// Gas-price ceiling in wei; taps are refused while the network is above it.
    pub max_gas_wei: u128,
    pub commission_wallets: Vec<Address>,
    /// Boost redemption codes, normalized to uppercase.
    pub boost_codes: HashMap<String, u32>,
    pub maintenance_mode: bool,
    pub maintenance_message: String,
}

impl Config {
    /// Load configuration from the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let rpc_url = env::var("RPC_URL")
            .unwrap_or_else(|_| "https://sepolia.base.org".to_string())
            .parse()
            .map_err(|e: url::ParseError| ConfigError::Invalid {
                var: "RPC_URL",
                reason: e.to_string(),
            })?;

        let contract_address = parse_address(
            "CONTRACT_ADDRESS",
            &env::var("CONTRACT_ADDRESS")
                .unwrap_or_else(|_| "0x6bdd40883a4828DfFcE33C3A2222a0eFd31DFe1A".to_string()),
        )?;
        let treasury_address = parse_address(
            "TREASURY_ADDRESS",
            &env::var("TREASURY_ADDRESS")
                .unwrap_or_else(|_| "0x52a3435A247a42B37B7f35756fBB972455f0C645".to_string()),
        )?;
        let admin_wallet = parse_address(
            "ADMIN_WALLET",
            &env::var("ADMIN_WALLET")
                .unwrap_or_else(|_| "0x52a3435A247a42B37B7f35756fBB972455f0C645".to_string()),
        )?;

        let secret_hex =
            env::var("ENCRYPTION_KEY").map_err(|_| ConfigError::Missing("ENCRYPTION_KEY"))?;
        let vault_secret = parse_hex_key("ENCRYPTION_KEY", &secret_hex)?;

        let owner_key = match env::var("OWNER_PRIVATE_KEY") {
            Ok(hex) => Some(parse_hex_key("OWNER_PRIVATE_KEY", &hex)?),
            Err(_) => None,
        };

        let commission_wallets = match env::var("COMMISSION_WALLETS") {
            Ok(raw) => raw
                .split(',')
                .map(|w| parse_address("COMMISSION_WALLETS", w.trim()))
                .collect::<Result<Vec<_>, _>>()?,
            Err(_) => DEFAULT_COMMISSION_WALLETS
                .iter()
                .map(|w| parse_address("COMMISSION_WALLETS", w))
                .collect::<Result<Vec<_>, _>>()?,
        };

        let boost_codes = parse_boost_codes(
            &env::var("BOOST_CODES").unwrap_or_else(|_| "MAVRINO40413:20".to_string()),
        );

        Ok(Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            rpc_url,
            contract_address,
            treasury_address,
            admin_wallet,
            vault_secret,
            owner_key,
            data_dir: env::var("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./data")),
            max_gas_wei: env::var("MAX_GAS_WEI")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5_000_000),
            commission_wallets,
            boost_codes,
            maintenance_mode: env::var("MAINTENANCE_MODE").as_deref() == Ok("true"),
            maintenance_message: env::var("MAINTENANCE_MESSAGE").unwrap_or_else(|_| {
                "Service is under maintenance. Please try again later.".to_string()
            }),
        })
    }

    /// Whether a wallet belongs to the commission pool.
    pub fn is_commission_wallet(&self, wallet: Address) -> bool {
        self.commission_wallets.contains(&wallet)
    }
}

fn parse_address(var: &'static str, value: &str) -> Result<Address, ConfigError> {
    Address::from_str(value).map_err(|e| ConfigError::Invalid {
        var,
        reason: e.to_string(),
    })
}

fn parse_hex_key(var: &'static str, hex: &str) -> Result<[u8; 32], ConfigError> {
    let bytes =
        alloy::hex::decode(hex.trim_start_matches("0x")).map_err(|e| ConfigError::Invalid {
            var,
            reason: e.to_string(),
        })?;
    bytes.try_into().map_err(|_| ConfigError::Invalid {
        var,
        reason: "expected 32 bytes of hex".to_string(),
    })
}

/// Parse `CODE1:AMOUNT,CODE2:AMOUNT` into a code → boost-percent map.
fn parse_boost_codes(raw: &str) -> HashMap<String, u32> {
    raw.split(',')
        .filter_map(|entry| {
            let (code, amount) = entry.split_once(':')?;
            let code = code.trim().to_uppercase();
            if code.is_empty() {
                return None;
            }
            Some((code, amount.trim().parse().unwrap_or(20)))
        })
        .collect()
}
