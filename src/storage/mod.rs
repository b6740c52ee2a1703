//! Persistent storage for burner custody and the points ledger.

mod db;

pub use db::{BurnerRecord, Database, DbError, DbResult, UserRecord};
