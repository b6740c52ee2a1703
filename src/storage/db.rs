//! Embedded database backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `burner_keys`: main_wallet → serialized BurnerRecord
//! - `burner_index`: burner_wallet → main_wallet (reverse lookup)
//! - `users`: main_wallet → serialized UserRecord
//!
//! All addresses are lowercased before they are used as keys, so lookups are
//! case-insensitive regardless of how the client checksums them.
//!
//! redb serializes write transactions, which is what makes
//! [`Database::get_or_create_burner`] safe under concurrent first-time
//! requests: the second writer re-reads the table inside its own transaction
//! and sees the first writer's row.

use std::path::Path;

use chrono::{DateTime, Utc};
use redb::{Database as RedbDatabase, ReadableDatabase, ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};

// =============================================================================
// Table Definitions
// =============================================================================

/// Primary custody table: lowercase main wallet → BurnerRecord (JSON bytes).
const BURNER_KEYS: TableDefinition<&str, &[u8]> = TableDefinition::new("burner_keys");

/// Reverse index: lowercase burner wallet → lowercase main wallet.
const BURNER_INDEX: TableDefinition<&str, &str> = TableDefinition::new("burner_index");

/// Ledger table: lowercase main wallet → UserRecord (JSON bytes).
const USERS: TableDefinition<&str, &[u8]> = TableDefinition::new("users");

// =============================================================================
// Error Type
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type DbResult<T> = Result<T, DbError>;

// =============================================================================
// Records
// =============================================================================

/// A custodial burner wallet bound to one main wallet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BurnerRecord {
    /// Owning main wallet, lowercase.
    pub main_wallet: String,
    /// Burner address, lowercase.
    pub burner_wallet: String,
    /// Vault-encrypted private key, hex(nonce || ciphertext).
    pub encrypted_key: String,
    /// Set once an admin sweep has drained this burner.
    pub withdrawn: bool,
    pub created_at: DateTime<Utc>,
}

/// Off-chain points ledger row for one main wallet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub main_wallet: String,
    #[serde(default)]
    pub burner_wallet: Option<String>,
    pub total_points: f64,
    /// Points from single taps.
    pub premium_points: f64,
    /// Points from batch taps.
    pub standard_points: f64,
    pub taps_remaining: u64,
    pub boost_percent: u32,
    #[serde(default)]
    pub used_codes: Vec<String>,
    #[serde(default)]
    pub referred_by: Option<String>,
    #[serde(default)]
    pub referral_count: u32,
    #[serde(default)]
    pub referral_bonus_claimed: bool,
    #[serde(default)]
    pub is_banned: bool,
    #[serde(default)]
    pub banned_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub total_deposit_usd: f64,
    #[serde(default)]
    pub deposit_count: u32,
    #[serde(default)]
    pub commission_points: f64,
    #[serde(default)]
    pub last_tap_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl UserRecord {
    /// Fresh ledger row with everything zeroed.
    pub fn new(main_wallet: &str) -> Self {
        Self {
            main_wallet: main_wallet.to_lowercase(),
            burner_wallet: None,
            total_points: 0.0,
            premium_points: 0.0,
            standard_points: 0.0,
            taps_remaining: 0,
            boost_percent: 0,
            used_codes: Vec::new(),
            referred_by: None,
            referral_count: 0,
            referral_bonus_claimed: false,
            is_banned: false,
            banned_at: None,
            total_deposit_usd: 0.0,
            deposit_count: 0,
            commission_points: 0.0,
            last_tap_at: None,
            created_at: Utc::now(),
        }
    }
}

// =============================================================================
// Database
// =============================================================================

/// Embedded ACID database for custody and ledger state.
pub struct Database {
    db: RedbDatabase,
}

impl Database {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> DbResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let db = RedbDatabase::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(BURNER_KEYS)?;
            let _ = write_txn.open_table(BURNER_INDEX)?;
            let _ = write_txn.open_table(USERS)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    // =========================================================================
    // Burner custody
    // =========================================================================

    /// Look up the burner record for a main wallet.
    pub fn get_burner(&self, main_wallet: &str) -> DbResult<Option<BurnerRecord>> {
        let key = main_wallet.to_lowercase();
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(BURNER_KEYS)?;
        match table.get(key.as_str())? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Reverse lookup: burner address → record.
    pub fn get_burner_by_address(&self, burner_wallet: &str) -> DbResult<Option<BurnerRecord>> {
        let key = burner_wallet.to_lowercase();
        let read_txn = self.db.begin_read()?;
        let index = read_txn.open_table(BURNER_INDEX)?;
        let main_wallet = match index.get(key.as_str())? {
            Some(v) => v.value().to_string(),
            None => return Ok(None),
        };
        let table = read_txn.open_table(BURNER_KEYS)?;
        match table.get(main_wallet.as_str())? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Atomically fetch the burner for a main wallet, creating it with `make`
    /// when absent. Returns `(record, created)`.
    ///
    /// The existence check and the insert run inside one write transaction,
    /// so two concurrent first-time callers converge on a single persisted
    /// burner; `make` runs at most once per missing row.
    pub fn get_or_create_burner<F>(&self, main_wallet: &str, make: F) -> DbResult<(BurnerRecord, bool)>
    where
        F: FnOnce() -> BurnerRecord,
    {
        let key = main_wallet.to_lowercase();
        let write_txn = self.db.begin_write()?;
        let (record, created) = {
            let mut table = write_txn.open_table(BURNER_KEYS)?;

            let existing = match table.get(key.as_str())? {
                Some(value) => Some(serde_json::from_slice::<BurnerRecord>(value.value())?),
                None => None,
            };

            match existing {
                Some(record) => (record, false),
                None => {
                    let record = make();
                    let json = serde_json::to_vec(&record)?;
                    table.insert(key.as_str(), json.as_slice())?;

                    let mut index = write_txn.open_table(BURNER_INDEX)?;
                    index.insert(record.burner_wallet.as_str(), key.as_str())?;
                    (record, true)
                }
            }
        };
        write_txn.commit()?;
        Ok((record, created))
    }

    /// Flag a burner as drained by an admin sweep.
    ///
    /// Unknown burners are a no-op. Lookups are scoped so their table guards
    /// drop before the transaction is aborted or committed.
    pub fn mark_burner_withdrawn(&self, burner_wallet: &str) -> DbResult<()> {
        let burner = burner_wallet.to_lowercase();
        let write_txn = self.db.begin_write()?;

        let main_wallet = {
            let index = write_txn.open_table(BURNER_INDEX)?;
            let main_wallet = index.get(burner.as_str())?.map(|v| v.value().to_string());
            main_wallet
        };
        let Some(main_wallet) = main_wallet else {
            write_txn.abort()?;
            return Ok(());
        };

        let existing_bytes = {
            let table = write_txn.open_table(BURNER_KEYS)?;
            let existing_bytes = table.get(main_wallet.as_str())?.map(|v| v.value().to_vec());
            existing_bytes
        };
        let Some(existing_bytes) = existing_bytes else {
            write_txn.abort()?;
            return Ok(());
        };

        let mut record: BurnerRecord = serde_json::from_slice(&existing_bytes)?;
        record.withdrawn = true;
        let json = serde_json::to_vec(&record)?;
        {
            let mut table = write_txn.open_table(BURNER_KEYS)?;
            table.insert(main_wallet.as_str(), json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// All burner records, for the admin data dump.
    pub fn all_burners(&self) -> DbResult<Vec<BurnerRecord>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(BURNER_KEYS)?;
        let mut records = Vec::new();
        for entry in table.iter()? {
            let (_, value) = entry?;
            records.push(serde_json::from_slice(value.value())?);
        }
        Ok(records)
    }

    // =========================================================================
    // Users / ledger
    // =========================================================================

    /// Look up a ledger row.
    pub fn get_user(&self, main_wallet: &str) -> DbResult<Option<UserRecord>> {
        let key = main_wallet.to_lowercase();
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(USERS)?;
        match table.get(key.as_str())? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Read-modify-write a ledger row inside a single write transaction.
    ///
    /// A missing row is created first, so mutations never fail on absent
    /// users. Returns the row as persisted.
    pub fn update_user<F>(&self, main_wallet: &str, mutate: F) -> DbResult<UserRecord>
    where
        F: FnOnce(&mut UserRecord),
    {
        let key = main_wallet.to_lowercase();
        let write_txn = self.db.begin_write()?;
        let record = {
            let mut table = write_txn.open_table(USERS)?;

            let mut record = match table.get(key.as_str())? {
                Some(value) => serde_json::from_slice(value.value())?,
                None => UserRecord::new(&key),
            };
            mutate(&mut record);

            let json = serde_json::to_vec(&record)?;
            table.insert(key.as_str(), json.as_slice())?;
            record
        };
        write_txn.commit()?;
        Ok(record)
    }

    /// Ledger row for a wallet, created when absent.
    pub fn get_or_create_user(&self, main_wallet: &str) -> DbResult<UserRecord> {
        if let Some(user) = self.get_user(main_wallet)? {
            return Ok(user);
        }
        self.update_user(main_wallet, |_| {})
    }

    /// All ledger rows, for the admin data dump.
    pub fn all_users(&self) -> DbResult<Vec<UserRecord>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(USERS)?;
        let mut records = Vec::new();
        for entry in table.iter()? {
            let (_, value) = entry?;
            records.push(serde_json::from_slice(value.value())?);
        }
        Ok(records)
    }

    /// Top `limit` wallets by total points, descending.
    pub fn leaderboard(&self, limit: usize) -> DbResult<Vec<UserRecord>> {
        let mut users = self.all_users()?;
        users.sort_by(|a, b| {
            b.total_points
                .partial_cmp(&a.total_points)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        users.truncate(limit);
        Ok(users)
    }
}

// =============================================================================
// Tests
// =============================================================================
