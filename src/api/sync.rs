//! Reconciliation endpoints.
//!
//! Clients that broadcast their own transactions (deposits, or taps sent
//! outside the relay) report the hash here. The receipt is re-read from the
//! chain before any ledger credit, so a fabricated or failed hash earns
//! nothing.

use alloy::primitives::B256;
use axum::{extract::State, Json};

use crate::auth::verify_execution;
use crate::config::packages;
use crate::error::ApiError;
use crate::ledger::BoostSyncOutcome;
use crate::models::{
    CommissionRequest, CommissionResponse, SyncBoostRequest, SyncBoostResponse,
    SyncDepositRequest, SyncResponse, SyncUserRequest,
};
use crate::ratelimit::Scope;
use crate::state::AppState;

use super::check_limit;

fn parse_hash(raw: &str) -> Result<B256, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::validation("Invalid transaction hash"))
}

/// Credit taps confirmed by a client-reported transaction.
#[utoipa::path(
    post,
    path = "/api/sync-user",
    tag = "Game",
    request_body = SyncUserRequest,
    responses(
        (status = 200, description = "Ledger state after the sync", body = SyncResponse),
        (status = 400, description = "Unknown or unconfirmed transaction"),
        (status = 401, description = "Transaction failed or targeted another contract")
    )
)]
pub async fn sync_user(
    State(state): State<AppState>,
    Json(req): Json<SyncUserRequest>,
) -> Result<Json<SyncResponse>, ApiError> {
    check_limit(&state, Scope::SyncUser, &req.main_wallet)?;

    let tx_hash = parse_hash(&req.tx_hash)?;
    verify_execution(
        state.chain.as_ref(),
        state.config.contract_address,
        tx_hash,
    )
    .await?;

    let tap_count = req.tap_count.unwrap_or(1);
    if tap_count == 0 || tap_count > 100 {
        return Err(ApiError::validation("Tap count must be between 1 and 100"));
    }

    let main = req.main_wallet.to_lowercase();
    let (applied, user) = match state.reconciler.apply_taps(&main, tx_hash, tap_count)? {
        Some((user, _)) => (true, user),
        None => (false, state.db.get_or_create_user(&main)?),
    };

    Ok(Json(SyncResponse {
        applied,
        user: user.into(),
    }))
}

/// Record a confirmed deposit and grant the purchased taps.
#[utoipa::path(
    post,
    path = "/api/sync-deposit",
    tag = "Game",
    request_body = SyncDepositRequest,
    responses(
        (status = 200, description = "Ledger state after the deposit", body = SyncResponse),
        (status = 400, description = "Unknown or unconfirmed transaction"),
        (status = 401, description = "Transaction failed or targeted another contract")
    )
)]
pub async fn sync_deposit(
    State(state): State<AppState>,
    Json(req): Json<SyncDepositRequest>,
) -> Result<Json<SyncResponse>, ApiError> {
    check_limit(&state, Scope::SyncUser, &req.wallet)?;

    let tx_hash = parse_hash(&req.tx_hash)?;
    verify_execution(
        state.chain.as_ref(),
        state.config.contract_address,
        tx_hash,
    )
    .await?;

    // Tap grants come from the package table, never from the client's number.
    let taps_purchased = packages()
        .into_iter()
        .find(|p| f64::from(p.usd) == req.usd_amount)
        .map(|p| u64::from(p.taps))
        .unwrap_or(0);
    if taps_purchased == 0 {
        tracing::warn!(
            wallet = %req.wallet,
            usd = req.usd_amount,
            "deposit does not match any package, no taps granted"
        );
    }

    let main = req.wallet.to_lowercase();
    let (applied, user) = match state
        .reconciler
        .apply_deposit(&main, req.usd_amount, taps_purchased, tx_hash)?
    {
        Some(user) => (true, user),
        None => (false, state.db.get_or_create_user(&main)?),
    };

    Ok(Json(SyncResponse {
        applied,
        user: user.into(),
    }))
}

/// Reconcile a wallet's on-chain points multiplier with the ledger.
#[utoipa::path(
    post,
    path = "/api/sync-boost",
    tag = "Game",
    request_body = SyncBoostRequest,
    responses(
        (status = 200, description = "Multiplier state after the sync", body = SyncBoostResponse),
        (status = 400, description = "Invalid wallet address")
    )
)]
pub async fn sync_boost(
    State(state): State<AppState>,
    Json(req): Json<SyncBoostRequest>,
) -> Result<Json<SyncBoostResponse>, ApiError> {
    check_limit(&state, Scope::SyncBoost, &req.wallet)?;

    Ok(Json(match state.boost_sync.sync(&req.wallet).await? {
        BoostSyncOutcome::NotConfigured { multiplier } => SyncBoostResponse {
            synced: false,
            multiplier,
            message: Some("Server not configured for contract sync".to_string()),
            tx_hash: None,
        },
        BoostSyncOutcome::AlreadyInSync { multiplier } => SyncBoostResponse {
            synced: true,
            multiplier,
            message: Some("Already in sync".to_string()),
            tx_hash: None,
        },
        BoostSyncOutcome::Synced {
            multiplier,
            tx_hash,
        } => SyncBoostResponse {
            synced: true,
            multiplier,
            message: None,
            tx_hash: Some(tx_hash.to_string()),
        },
    }))
}

/// Credit partner-pool commission for a confirmed tap transaction.
#[utoipa::path(
    post,
    path = "/api/commission",
    tag = "Game",
    request_body = CommissionRequest,
    responses(
        (status = 200, description = "Commission outcome", body = CommissionResponse),
        (status = 400, description = "Unknown or unconfirmed transaction")
    )
)]
pub async fn commission(
    State(state): State<AppState>,
    Json(req): Json<CommissionRequest>,
) -> Result<Json<CommissionResponse>, ApiError> {
    check_limit(&state, Scope::Commission, &req.from_wallet)?;

    let tx_hash = parse_hash(&req.tx_hash)?;
    verify_execution(
        state.chain.as_ref(),
        state.config.contract_address,
        tx_hash,
    )
    .await?;

    let tap_count = req.tap_count.unwrap_or(1).min(100);
    let credited = state
        .commission
        .credit(&req.from_wallet, tx_hash, tap_count)?;

    Ok(Json(match credited {
        Some((recipient, amount)) => CommissionResponse {
            credited: true,
            recipient: Some(recipient),
            amount: Some(amount),
        },
        None => CommissionResponse {
            credited: false,
            recipient: None,
            amount: None,
        },
    }))
}
