//! Admin endpoints.
//!
//! Every admin call carries a fresh signature from the configured admin
//! wallet in `x-admin-*` headers. Withdrawals require the dedicated withdraw
//! message so an access signature cannot be replayed to move funds.

use std::time::Duration;

use alloy::primitives::B256;
use axum::{extract::State, http::HeaderMap, Json};

use crate::auth::{verify_intent, IntentAction};
use crate::chain::{ChainRpc, ReceiptInfo};
use crate::error::ApiError;
use crate::models::{
    AdminBanRequest, AdminBanResponse, AdminDataResponse, AdminDecryptRequest,
    AdminDecryptResponse, AdminWithdrawRequest, AdminWithdrawResponse, BanAction, WithdrawOutcome,
};
use crate::state::AppState;

const MAX_BATCH: usize = 100;

const SWEEP_CONFIRM_ATTEMPTS: u32 = 10;
const SWEEP_CONFIRM_INTERVAL: Duration = Duration::from_secs(2);

/// Verify the `x-admin-*` headers against the configured admin wallet.
fn authorize(
    state: &AppState,
    headers: &HeaderMap,
    action: IntentAction,
) -> Result<(), ApiError> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::auth("Missing admin credentials"))
    };

    let address = header("x-admin-address")?;
    let signature = header("x-admin-signature")?;
    let timestamp: i64 = header("x-admin-timestamp")?
        .parse()
        .map_err(|_| ApiError::auth("Malformed admin timestamp"))?;

    let signer = verify_intent(action, address, timestamp, signature)?;
    if signer != state.config.admin_wallet {
        return Err(ApiError::Forbidden(
            "Signer is not the admin wallet".to_string(),
        ));
    }
    Ok(())
}

/// Full dump of the ledger and burner registry.
#[utoipa::path(
    get,
    path = "/api/admin/data",
    tag = "Admin",
    responses(
        (status = 200, description = "All users and burners", body = AdminDataResponse),
        (status = 401, description = "Missing or invalid admin signature"),
        (status = 403, description = "Signer is not the admin wallet")
    )
)]
pub async fn data(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<AdminDataResponse>, ApiError> {
    authorize(&state, &headers, IntentAction::AdminAccess)?;

    let users = state.db.all_users()?.into_iter().map(Into::into).collect();
    let burners = state
        .db
        .all_burners()?
        .into_iter()
        .map(Into::into)
        .collect();
    Ok(Json(AdminDataResponse { users, burners }))
}

/// Ban or unban a batch of wallets.
#[utoipa::path(
    post,
    path = "/api/admin/ban",
    tag = "Admin",
    request_body = AdminBanRequest,
    responses(
        (status = 200, description = "Number of wallets updated", body = AdminBanResponse),
        (status = 401, description = "Missing or invalid admin signature"),
        (status = 403, description = "Signer is not the admin wallet")
    )
)]
pub async fn ban(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<AdminBanRequest>,
) -> Result<Json<AdminBanResponse>, ApiError> {
    authorize(&state, &headers, IntentAction::AdminAccess)?;

    if req.wallets.is_empty() || req.wallets.len() > MAX_BATCH {
        return Err(ApiError::validation(format!(
            "Expected between 1 and {MAX_BATCH} wallets"
        )));
    }

    let banned = req.action == BanAction::Ban;
    for wallet in &req.wallets {
        state.db.update_user(wallet, |u| {
            u.is_banned = banned;
            u.banned_at = banned.then(chrono::Utc::now);
        })?;
    }

    tracing::info!(count = req.wallets.len(), banned, "ban state updated");
    Ok(Json(AdminBanResponse {
        updated: req.wallets.len(),
    }))
}

/// Sweep burner balances to the treasury. Each burner is handled
/// independently so one failure never aborts the batch.
#[utoipa::path(
    post,
    path = "/api/admin/withdraw",
    tag = "Admin",
    request_body = AdminWithdrawRequest,
    responses(
        (status = 200, description = "Per-burner sweep outcomes", body = AdminWithdrawResponse),
        (status = 401, description = "Missing or invalid admin signature"),
        (status = 403, description = "Signer is not the admin wallet")
    )
)]
pub async fn withdraw(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<AdminWithdrawRequest>,
) -> Result<Json<AdminWithdrawResponse>, ApiError> {
    authorize(&state, &headers, IntentAction::AdminWithdraw)?;

    if req.burner_addresses.is_empty() || req.burner_addresses.len() > MAX_BATCH {
        return Err(ApiError::validation(format!(
            "Expected between 1 and {MAX_BATCH} burner addresses"
        )));
    }

    let mut results = Vec::with_capacity(req.burner_addresses.len());
    for address in &req.burner_addresses {
        results.push(sweep_one(&state, address).await);
    }
    Ok(Json(AdminWithdrawResponse { results }))
}

async fn sweep_one(state: &AppState, burner_address: &str) -> WithdrawOutcome {
    let burner = burner_address.to_lowercase();
    let outcome = |status: &str, tx_hash, error| WithdrawOutcome {
        burner_wallet: burner.clone(),
        status: status.to_string(),
        tx_hash,
        error,
    };

    let record = match state.db.get_burner_by_address(&burner) {
        Ok(Some(record)) => record,
        Ok(None) => return outcome("failed", None, Some("unknown burner".to_string())),
        Err(err) => return outcome("failed", None, Some(err.to_string())),
    };

    let signer = match state.registry.signer_for(&record) {
        Ok(signer) => signer,
        Err(err) => return outcome("failed", None, Some(err.to_string())),
    };

    match state
        .relay
        .sweep(signer, state.config.treasury_address)
        .await
    {
        // The burner is only marked withdrawn once the sweep has a successful
        // receipt; a broadcast that reverts or stalls leaves the record live.
        Ok(Some(tx_hash)) => {
            let receipt = await_confirmation(
                state.chain.as_ref(),
                tx_hash,
                SWEEP_CONFIRM_ATTEMPTS,
                SWEEP_CONFIRM_INTERVAL,
            )
            .await;
            match receipt {
                Some(receipt) if receipt.status => {
                    if let Err(err) = state.db.mark_burner_withdrawn(&burner) {
                        tracing::error!(%burner, error = %err, "swept but failed to mark withdrawn");
                    }
                    tracing::info!(%burner, %tx_hash, "burner swept to treasury");
                    outcome("swept", Some(tx_hash.to_string()), None)
                }
                Some(_) => {
                    tracing::warn!(%burner, %tx_hash, "sweep transaction reverted");
                    outcome(
                        "failed",
                        Some(tx_hash.to_string()),
                        Some("sweep transaction reverted".to_string()),
                    )
                }
                None => {
                    tracing::warn!(%burner, %tx_hash, "sweep confirmation timed out");
                    outcome(
                        "unconfirmed",
                        Some(tx_hash.to_string()),
                        Some("confirmation timed out".to_string()),
                    )
                }
            }
        }
        Ok(None) => outcome("skipped", None, Some("balance below sweep fee".to_string())),
        Err(err) => {
            tracing::warn!(%burner, error = %err, "sweep failed");
            outcome("failed", None, Some(err.to_string()))
        }
    }
}

/// Poll for a receipt until one appears or the attempt budget runs out.
async fn await_confirmation(
    chain: &dyn ChainRpc,
    tx_hash: B256,
    attempts: u32,
    interval: Duration,
) -> Option<ReceiptInfo> {
    for attempt in 0..attempts {
        match chain.receipt(tx_hash).await {
            Ok(Some(receipt)) => return Some(receipt),
            Ok(None) => {}
            Err(err) => {
                tracing::warn!(%tx_hash, attempt, error = %err, "receipt poll failed");
            }
        }
        tokio::time::sleep(interval).await;
    }
    None
}

/// Decrypt a vault-encrypted burner key. Audit-logged; this is the only
/// endpoint that returns key material.
#[utoipa::path(
    post,
    path = "/api/admin/decrypt-key",
    tag = "Admin",
    request_body = AdminDecryptRequest,
    responses(
        (status = 200, description = "Decrypted private key", body = AdminDecryptResponse),
        (status = 401, description = "Missing or invalid admin signature"),
        (status = 403, description = "Signer is not the admin wallet"),
        (status = 500, description = "Ciphertext could not be decrypted")
    )
)]
pub async fn decrypt_key(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<AdminDecryptRequest>,
) -> Result<Json<AdminDecryptResponse>, ApiError> {
    authorize(&state, &headers, IntentAction::AdminAccess)?;

    let private_key = state.registry.decrypt_key(&req.encrypted_key)?;
    tracing::warn!(admin = %state.config.admin_wallet, "burner key decrypted via admin recovery");
    Ok(Json(AdminDecryptResponse { private_key }))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use alloy::primitives::{Address, U256};
    use alloy::signers::{local::PrivateKeySigner, SignerSync};

    use crate::config::TRANSFER_GAS;
    use crate::state::testing::{test_state, StubChain};

    use super::*;

    fn admin_headers(signer: &PrivateKeySigner, action: IntentAction) -> HeaderMap {
        let timestamp = chrono::Utc::now().timestamp_millis();
        let message = action.message("", timestamp);
        let signature = signer.sign_message_sync(message.as_bytes()).unwrap();

        let mut headers = HeaderMap::new();
        headers.insert(
            "x-admin-address",
            signer.address().to_string().parse().unwrap(),
        );
        headers.insert(
            "x-admin-signature",
            alloy::hex::encode(signature.as_bytes()).parse().unwrap(),
        );
        headers.insert("x-admin-timestamp", timestamp.to_string().parse().unwrap());
        headers
    }

    fn admin_fixture() -> (crate::state::AppState, Arc<StubChain>, PrivateKeySigner, tempfile::TempDir)
    {
        let admin = PrivateKeySigner::random();
        let chain = Arc::new(StubChain::default());
        let (state, dir) = test_state(chain.clone(), admin.address());
        (state, chain, admin, dir)
    }

    #[tokio::test]
    async fn missing_credentials_are_unauthorized() {
        let (state, _chain, _admin, _dir) = admin_fixture();

        let err = data(State(state), HeaderMap::new()).await.unwrap_err();
        assert!(matches!(err, ApiError::Auth(_)));
    }

    #[tokio::test]
    async fn non_admin_signer_is_forbidden() {
        let (state, _chain, _admin, _dir) = admin_fixture();
        let intruder = PrivateKeySigner::random();

        let err = data(
            State(state),
            admin_headers(&intruder, IntentAction::AdminAccess),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));
    }

    #[tokio::test]
    async fn access_signature_cannot_authorize_a_withdrawal() {
        let (state, _chain, admin, _dir) = admin_fixture();

        let err = withdraw(
            State(state),
            admin_headers(&admin, IntentAction::AdminAccess),
            Json(AdminWithdrawRequest {
                burner_addresses: vec!["0xAAAA".to_string()],
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::Auth(_)));
    }

    #[tokio::test]
    async fn data_dump_includes_users_and_burners() {
        let (state, _chain, admin, _dir) = admin_fixture();
        state.db.update_user("0xaaa", |u| u.total_points = 5.0).unwrap();
        state.registry.get_or_create("0xaaa").unwrap();

        let response = data(State(state), admin_headers(&admin, IntentAction::AdminAccess))
            .await
            .unwrap();
        assert_eq!(response.users.len(), 1);
        assert_eq!(response.burners.len(), 1);
    }

    #[tokio::test]
    async fn ban_and_unban_update_the_ledger() {
        let (state, _chain, admin, _dir) = admin_fixture();

        ban(
            State(state.clone()),
            admin_headers(&admin, IntentAction::AdminAccess),
            Json(AdminBanRequest {
                wallets: vec!["0xaaa".to_string(), "0xbbb".to_string()],
                action: BanAction::Ban,
            }),
        )
        .await
        .unwrap();

        let user = state.db.get_user("0xaaa").unwrap().unwrap();
        assert!(user.is_banned);
        assert!(user.banned_at.is_some());

        ban(
            State(state.clone()),
            admin_headers(&admin, IntentAction::AdminAccess),
            Json(AdminBanRequest {
                wallets: vec!["0xaaa".to_string()],
                action: BanAction::Unban,
            }),
        )
        .await
        .unwrap();

        let user = state.db.get_user("0xaaa").unwrap().unwrap();
        assert!(!user.is_banned);
        assert!(user.banned_at.is_none());
        assert!(state.db.get_user("0xbbb").unwrap().unwrap().is_banned);
    }

    fn confirm_receipt(chain: &StubChain, status: bool) {
        *chain.receipt.lock().unwrap() = Some(crate::chain::ReceiptInfo {
            status,
            to: Some(Address::repeat_byte(0x77)),
            block_number: Some(1),
            gas_used: TRANSFER_GAS,
        });
    }

    #[tokio::test]
    async fn withdraw_sweeps_funded_burners_and_isolates_failures() {
        let (state, chain, admin, _dir) = admin_fixture();
        confirm_receipt(&chain, true);

        let (funded, _) = state.registry.get_or_create("0xaaa").unwrap();
        let (dust, _) = state.registry.get_or_create("0xbbb").unwrap();

        // The dust burner holds exactly the sweep fee, so nothing is left to move.
        let fee = U256::from(TRANSFER_GAS) * U256::from(100u64);
        chain
            .balances
            .lock()
            .unwrap()
            .insert(dust.burner_wallet.parse().unwrap(), fee);

        let response = withdraw(
            State(state.clone()),
            admin_headers(&admin, IntentAction::AdminWithdraw),
            Json(AdminWithdrawRequest {
                burner_addresses: vec![
                    funded.burner_wallet.clone(),
                    dust.burner_wallet.clone(),
                    "0x00000000000000000000000000000000000000ff".to_string(),
                ],
            }),
        )
        .await
        .unwrap();

        let statuses: Vec<_> = response.results.iter().map(|r| r.status.as_str()).collect();
        assert_eq!(statuses, vec!["swept", "skipped", "failed"]);
        assert_eq!(chain.sent.lock().unwrap().len(), 1);

        let record = state
            .db
            .get_burner_by_address(&funded.burner_wallet)
            .unwrap()
            .unwrap();
        assert!(record.withdrawn);
        let record = state
            .db
            .get_burner_by_address(&dust.burner_wallet)
            .unwrap()
            .unwrap();
        assert!(!record.withdrawn);
    }

    #[tokio::test]
    async fn reverted_sweep_is_not_marked_withdrawn() {
        let (state, chain, admin, _dir) = admin_fixture();
        confirm_receipt(&chain, false);

        let (record, _) = state.registry.get_or_create("0xaaa").unwrap();

        let response = withdraw(
            State(state.clone()),
            admin_headers(&admin, IntentAction::AdminWithdraw),
            Json(AdminWithdrawRequest {
                burner_addresses: vec![record.burner_wallet.clone()],
            }),
        )
        .await
        .unwrap();

        assert_eq!(response.results[0].status, "failed");
        assert!(response.results[0].tx_hash.is_some());

        let record = state
            .db
            .get_burner_by_address(&record.burner_wallet)
            .unwrap()
            .unwrap();
        assert!(!record.withdrawn);
    }

    #[tokio::test]
    async fn confirmation_polling_gives_up_after_the_attempt_budget() {
        let chain = StubChain::default();
        let receipt =
            await_confirmation(&chain, B256::ZERO, 3, Duration::from_millis(1)).await;
        assert!(receipt.is_none());
    }

    #[tokio::test]
    async fn decrypt_key_recovers_the_burner_signer() {
        let (state, _chain, admin, _dir) = admin_fixture();
        let (record, _) = state.registry.get_or_create("0xaaa").unwrap();

        let response = decrypt_key(
            State(state),
            admin_headers(&admin, IntentAction::AdminAccess),
            Json(AdminDecryptRequest {
                encrypted_key: record.encrypted_key,
            }),
        )
        .await
        .unwrap();

        let bytes = alloy::hex::decode(&response.private_key).unwrap();
        let signer = PrivateKeySigner::from_slice(&bytes).unwrap();
        assert_eq!(
            signer.address().to_string().to_lowercase(),
            record.burner_wallet
        );
    }
}
