//! Off-chain points ledger: dedup, reconciliation, and commission credit.

mod boost_sync;
mod commission;
mod processed;
mod reconciler;

pub use boost_sync::{BoostSyncOutcome, BoostSyncer};
pub use commission::CommissionDistributor;
pub use processed::ProcessedSet;
pub use reconciler::{points_for, Reconciler};
