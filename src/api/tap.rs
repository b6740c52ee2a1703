//! Tap relay endpoint.
//!
//! A signed intent from the main wallet is exchanged for a burner-signed
//! transaction on the game contract, then the ledger is credited against the
//! broadcast hash. Commission for the partner pool is credited off the
//! request path.

use axum::{extract::State, Json};

use crate::auth::{verify_intent, IntentAction};
use crate::error::ApiError;
use crate::models::{TapRequest, TapResponse};
use crate::ratelimit::Scope;
use crate::state::AppState;

use super::check_limit;

const MAX_TAPS_PER_REQUEST: u32 = 100;

/// Relay one tap (`tap()`) or a batch (`batchTap(count)`) from the caller's
/// burner wallet.
#[utoipa::path(
    post,
    path = "/api/tap",
    tag = "Game",
    request_body = TapRequest,
    responses(
        (status = 200, description = "Tap relayed and credited", body = TapResponse),
        (status = 400, description = "Invalid count or insufficient burner gas"),
        (status = 401, description = "Invalid or expired signature"),
        (status = 403, description = "Wallet is banned"),
        (status = 404, description = "No burner on file")
    )
)]
pub async fn tap(
    State(state): State<AppState>,
    Json(req): Json<TapRequest>,
) -> Result<Json<TapResponse>, ApiError> {
    check_limit(&state, Scope::Tap, &req.wallet)?;
    verify_intent(IntentAction::Tap, &req.wallet, req.timestamp, &req.signature)?;

    if req.count == 0 || req.count > MAX_TAPS_PER_REQUEST {
        return Err(ApiError::validation(format!(
            "Tap count must be between 1 and {MAX_TAPS_PER_REQUEST}"
        )));
    }

    let main = req.wallet.to_lowercase();
    if let Some(user) = state.db.get_user(&main)? {
        if user.is_banned {
            return Err(ApiError::Forbidden("Wallet is banned".to_string()));
        }
    }

    let record = state
        .db
        .get_burner(&main)?
        .ok_or_else(|| ApiError::not_found("No burner wallet for this address"))?;
    let signer = state.registry.signer_for(&record)?;

    // Best-effort multiplier reconciliation so the contract prices this tap
    // with the current boost. Never blocks or fails the relay.
    let boost_sync = state.boost_sync.clone();
    let sync_wallet = main.clone();
    tokio::spawn(async move {
        if let Err(err) = boost_sync.sync(&sync_wallet).await {
            tracing::debug!(wallet = %sync_wallet, error = %err, "pre-tap boost sync failed");
        }
    });

    let tx_hash = state.relay.relay_taps(signer, req.count).await?;

    let (user, earned) = match state.reconciler.apply_taps(&main, tx_hash, req.count)? {
        Some(applied) => applied,
        // The hash is fresh, so this only happens on a hash collision replay.
        None => (state.db.get_or_create_user(&main)?, 0.0),
    };

    let commission = state.commission.clone();
    let from = main.clone();
    let count = req.count;
    tokio::spawn(async move {
        match commission.credit(&from, tx_hash, count) {
            Ok(Some((recipient, amount))) => {
                tracing::debug!(%recipient, amount, "tap commission settled");
            }
            Ok(None) => {}
            Err(err) => {
                tracing::warn!(error = %err, %tx_hash, "commission credit failed");
            }
        }
    });

    tracing::info!(
        wallet = %main,
        burner = %record.burner_wallet,
        count = req.count,
        %tx_hash,
        earned,
        "taps relayed"
    );

    Ok(Json(TapResponse {
        tx_hash: tx_hash.to_string(),
        points_earned: earned,
        points: user.total_points,
        boost_percent: user.boost_percent,
    }))
}
