//! Onboarding endpoint: burner creation plus client transaction payloads.

use axum::{extract::State, Json};

use crate::auth::{verify_intent, IntentAction};
use crate::chain::contract::{deposit_calldata, register_burner_calldata};
use crate::config::packages;
use crate::error::ApiError;
use crate::models::{InitRequest, InitResponse, TxPayload};
use crate::ratelimit::Scope;
use crate::state::AppState;

use super::{check_limit, referral};

/// Create (or fetch) the caller's burner and return the transactions the main
/// wallet still has to send. The registration payload is omitted once the
/// contract already maps the wallet to a burner.
#[utoipa::path(
    post,
    path = "/api/init",
    tag = "Onboarding",
    request_body = InitRequest,
    responses(
        (status = 200, description = "Onboarding state and client transactions", body = InitResponse),
        (status = 401, description = "Invalid or expired signature"),
        (status = 503, description = "Maintenance mode")
    )
)]
pub async fn init(
    State(state): State<AppState>,
    Json(req): Json<InitRequest>,
) -> Result<Json<InitResponse>, ApiError> {
    if state.config.maintenance_mode {
        return Err(ApiError::Maintenance(
            state.config.maintenance_message.clone(),
        ));
    }
    check_limit(&state, Scope::Init, &req.wallet)?;

    let signer = verify_intent(IntentAction::Init, &req.wallet, req.timestamp, &req.signature)?;

    let package = packages()
        .into_iter()
        .find(|p| p.id == req.package_id)
        .ok_or_else(|| ApiError::validation("Unknown package id"))?;

    // Referral registration piggybacks on init; a rejected referral must not
    // block onboarding.
    if let Some(referrer) = &req.referrer {
        let (registered, message) =
            referral::apply_registration(&state.db, &req.wallet, referrer)?;
        if !registered {
            tracing::debug!(wallet = %req.wallet, message, "referral not registered at init");
        }
    }

    // The deposit forwards the referrer on-chain; self-referrals and anything
    // that does not parse collapse to the zero address.
    let deposit_referrer = req
        .referrer
        .as_deref()
        .and_then(|r| r.parse::<alloy::primitives::Address>().ok())
        .filter(|r| r.to_string().to_lowercase() != req.wallet.to_lowercase())
        .unwrap_or(alloy::primitives::Address::ZERO);

    let (record, _created) = state.registry.get_or_create(&req.wallet)?;
    let status = state.registry.onboarding(state.chain.as_ref(), signer).await?;

    let register_burner_tx = if status.registered {
        None
    } else {
        let burner: alloy::primitives::Address = record
            .burner_wallet
            .parse()
            .map_err(|_| ApiError::Decryption)?;
        Some(TxPayload {
            to: state.config.contract_address.to_string(),
            data: register_burner_calldata(burner).to_string(),
            value: None,
        })
    };

    let deposit_tx = TxPayload {
        to: state.config.contract_address.to_string(),
        data: deposit_calldata(package.id, deposit_referrer).to_string(),
        value: Some(package.price_wei.to_string()),
    };

    Ok(Json(InitResponse {
        burner_wallet: record.burner_wallet,
        register_burner_tx,
        deposit_tx,
        tap_balance: status.tap_balance.to_string(),
        stage: status.stage,
    }))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use alloy::primitives::{Address, U256};
    use alloy::signers::{local::PrivateKeySigner, SignerSync};

    use crate::registry::OnboardingStage;
    use crate::state::testing::{test_state, StubChain};

    use super::*;

    fn signed_request(signer: &PrivateKeySigner, package_id: u8) -> InitRequest {
        let wallet = signer.address().to_string();
        let timestamp = chrono::Utc::now().timestamp_millis();
        let message = IntentAction::Init.message(&wallet, timestamp);
        let signature = signer.sign_message_sync(message.as_bytes()).unwrap();
        InitRequest {
            wallet,
            signature: alloy::hex::encode(signature.as_bytes()),
            timestamp,
            package_id,
            referrer: None,
        }
    }

    #[tokio::test]
    async fn first_init_creates_burner_and_requests_registration() {
        let (state, _dir) = test_state(Arc::new(StubChain::default()), Address::ZERO);
        let signer = PrivateKeySigner::random();

        let response = init(
            State(state.clone()),
            Json(signed_request(&signer, 0)),
        )
        .await
        .unwrap();

        assert!(response.register_burner_tx.is_some());
        assert_eq!(response.stage, OnboardingStage::BurnerCreated);
        assert_eq!(
            response.deposit_tx.value.as_deref(),
            Some("1000000000000000")
        );
        assert!(state
            .db
            .get_burner(&signer.address().to_string())
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn registered_and_funded_wallet_skips_registration() {
        let signer = PrivateKeySigner::random();
        let chain = Arc::new(StubChain::default());

        let (state, _dir) = test_state(chain.clone(), Address::ZERO);
        let (record, _) = state
            .registry
            .get_or_create(&signer.address().to_string())
            .unwrap();
        *chain.registered.lock().unwrap() = record.burner_wallet.parse().unwrap();
        *chain.tap_balance.lock().unwrap() = U256::from(4_000);

        let response = init(
            State(state),
            Json(signed_request(&signer, 1)),
        )
        .await
        .unwrap();

        assert!(response.register_burner_tx.is_none());
        assert_eq!(response.stage, OnboardingStage::Confirmed);
        assert_eq!(response.tap_balance, "4000");
    }

    #[tokio::test]
    async fn unknown_package_is_rejected() {
        let (state, _dir) = test_state(Arc::new(StubChain::default()), Address::ZERO);
        let signer = PrivateKeySigner::random();

        let err = init(
            State(state),
            Json(signed_request(&signer, 7)),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[tokio::test]
    async fn tampered_signature_is_rejected() {
        let (state, _dir) = test_state(Arc::new(StubChain::default()), Address::ZERO);
        let signer = PrivateKeySigner::random();

        let mut req = signed_request(&signer, 0);
        req.wallet = PrivateKeySigner::random().address().to_string();

        let err = init(State(state), Json(req))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Auth(_)));
    }

    #[tokio::test]
    async fn maintenance_mode_blocks_init() {
        let chain: Arc<StubChain> = Arc::new(StubChain::default());
        let (state, _dir) = test_state(chain.clone(), Address::ZERO);

        let mut config = (*state.config).clone();
        config.maintenance_mode = true;
        let state = crate::state::AppState::with_parts(config, Arc::clone(&state.db), chain);

        let signer = PrivateKeySigner::random();
        let err = init(
            State(state),
            Json(signed_request(&signer, 0)),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::Maintenance(_)));
    }

    #[tokio::test]
    async fn init_quota_is_two_per_window() {
        let (state, _dir) = test_state(Arc::new(StubChain::default()), Address::ZERO);
        let signer = PrivateKeySigner::random();

        for _ in 0..2 {
            init(State(state.clone()), Json(signed_request(&signer, 0)))
                .await
                .unwrap();
        }

        let err = init(
            State(state),
            Json(signed_request(&signer, 0)),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::RateLimited));
    }

    #[tokio::test]
    async fn referrer_is_recorded_at_init() {
        let (state, _dir) = test_state(Arc::new(StubChain::default()), Address::ZERO);
        let signer = PrivateKeySigner::random();
        let referrer = PrivateKeySigner::random().address().to_string();

        let mut req = signed_request(&signer, 0);
        req.referrer = Some(referrer.clone());

        init(State(state.clone()), Json(req))
            .await
            .unwrap();

        let user = state
            .db
            .get_user(&signer.address().to_string())
            .unwrap()
            .unwrap();
        assert_eq!(user.referred_by, Some(referrer.to_lowercase()));
    }

    #[tokio::test]
    async fn deposit_payload_carries_the_referrer() {
        let (state, _dir) = test_state(Arc::new(StubChain::default()), Address::ZERO);
        let signer = PrivateKeySigner::random();
        let referrer: Address = PrivateKeySigner::random().address();

        let mut req = signed_request(&signer, 0);
        req.referrer = Some(referrer.to_string());

        let response = init(State(state), Json(req)).await.unwrap();

        let expected = deposit_calldata(0, referrer).to_string();
        assert_eq!(response.deposit_tx.data, expected);
        let selector = &alloy::primitives::keccak256(b"deposit(uint256,address)")[..4];
        assert!(response.deposit_tx.data[2..].starts_with(&alloy::hex::encode(selector)));
    }

    #[tokio::test]
    async fn deposit_payload_defaults_to_the_zero_referrer() {
        let (state, _dir) = test_state(Arc::new(StubChain::default()), Address::ZERO);
        let signer = PrivateKeySigner::random();

        let response = init(State(state), Json(signed_request(&signer, 0)))
            .await
            .unwrap();
        assert_eq!(
            response.deposit_tx.data,
            deposit_calldata(0, Address::ZERO).to_string()
        );
    }
}
