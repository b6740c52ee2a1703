//! Referral endpoints.
//!
//! Registration binds a wallet to its referrer once, first writer wins. The
//! referrer's counter always moves, but their boost only grows for the first
//! few referrals. The referred side claims its own one-shot bonus separately.

use axum::{extract::State, Json};

use crate::config::{MAX_BOOST_PERCENT, MAX_REWARDED_REFERRALS, REFERRAL_BONUS_PERCENT};
use crate::error::ApiError;
use crate::models::{ReferralClaimRequest, ReferralRegisterRequest, ReferralResponse};
use crate::ratelimit::Scope;
use crate::state::AppState;
use crate::storage::Database;

use super::check_limit;

/// Record a referral relationship, rewarding the referrer. Returns
/// `(registered, message)` so callers embedding this in onboarding can treat
/// rejection as advisory.
pub(crate) fn apply_registration(
    db: &Database,
    user_wallet: &str,
    referrer_wallet: &str,
) -> Result<(bool, String), ApiError> {
    let user = user_wallet.to_lowercase();
    let referrer = referrer_wallet.to_lowercase();

    if user == referrer {
        return Ok((false, "Cannot refer yourself".to_string()));
    }
    let parsed: Result<alloy::primitives::Address, _> = referrer.parse();
    match parsed {
        Ok(addr) if addr != alloy::primitives::Address::ZERO => {}
        _ => return Ok((false, "Invalid referrer address".to_string())),
    }

    let mut taken = false;
    db.update_user(&user, |u| {
        if u.referred_by.is_some() {
            taken = true;
        } else {
            u.referred_by = Some(referrer.clone());
        }
    })?;
    if taken {
        return Ok((false, "Referral already registered".to_string()));
    }

    // The counter tracks every referral; the boost reward stops once the cap
    // of rewarded referrals is reached.
    db.update_user(&referrer, |u| {
        if u.referral_count < MAX_REWARDED_REFERRALS {
            u.boost_percent = (u.boost_percent + REFERRAL_BONUS_PERCENT).min(MAX_BOOST_PERCENT);
        }
        u.referral_count += 1;
    })?;

    tracing::info!(%user, %referrer, "referral registered");
    Ok((true, "Referral registered".to_string()))
}

#[utoipa::path(
    post,
    path = "/api/referral/register",
    tag = "Social",
    request_body = ReferralRegisterRequest,
    responses(
        (status = 200, description = "Registration outcome", body = ReferralResponse)
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<ReferralRegisterRequest>,
) -> Result<Json<ReferralResponse>, ApiError> {
    check_limit(&state, Scope::ReferralRegister, &req.user_wallet)?;

    let (success, message) =
        apply_registration(&state.db, &req.user_wallet, &req.referrer_wallet)?;
    Ok(Json(ReferralResponse { success, message }))
}

/// Claim the referred side's one-time boost bonus.
#[utoipa::path(
    post,
    path = "/api/referral/claim-bonus",
    tag = "Social",
    request_body = ReferralClaimRequest,
    responses(
        (status = 200, description = "Claim outcome", body = ReferralResponse)
    )
)]
pub async fn claim_bonus(
    State(state): State<AppState>,
    Json(req): Json<ReferralClaimRequest>,
) -> Result<Json<ReferralResponse>, ApiError> {
    check_limit(&state, Scope::ReferralClaim, &req.user_wallet)?;

    let user = req.user_wallet.to_lowercase();
    let mut outcome = Ok(());
    state.db.update_user(&user, |u| {
        if u.referred_by.is_none() {
            outcome = Err("No referral registered for this wallet");
        } else if u.referral_bonus_claimed {
            outcome = Err("Referral bonus already claimed");
        } else {
            u.boost_percent = (u.boost_percent + REFERRAL_BONUS_PERCENT).min(MAX_BOOST_PERCENT);
            u.referral_bonus_claimed = true;
        }
    })?;

    match outcome {
        Ok(()) => Ok(Json(ReferralResponse {
            success: true,
            message: "Referral bonus claimed".to_string(),
        })),
        Err(message) => Ok(Json(ReferralResponse {
            success: false,
            message: message.to_string(),
        })),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use alloy::primitives::Address;

    use crate::state::testing::{test_state, StubChain};

    use super::*;

    const USER: &str = "0x00000000000000000000000000000000000000AA";
    const REFERRER: &str = "0x00000000000000000000000000000000000000BB";

    fn fixture() -> (crate::state::AppState, tempfile::TempDir) {
        test_state(Arc::new(StubChain::default()), Address::ZERO)
    }

    fn register_req(user: &str, referrer: &str) -> ReferralRegisterRequest {
        ReferralRegisterRequest {
            user_wallet: user.to_string(),
            referrer_wallet: referrer.to_string(),
        }
    }

    #[tokio::test]
    async fn registration_binds_once_first_writer_wins() {
        let (state, _dir) = fixture();

        let first = register(State(state.clone()), Json(register_req(USER, REFERRER)))
            .await
            .unwrap();
        assert!(first.success);

        let other = "0x00000000000000000000000000000000000000CC";
        let second = register(State(state.clone()), Json(register_req(USER, other)))
            .await
            .unwrap();
        assert!(!second.success);

        let user = state.db.get_user(USER).unwrap().unwrap();
        assert_eq!(user.referred_by, Some(REFERRER.to_lowercase()));
    }

    #[tokio::test]
    async fn self_and_zero_referrers_are_rejected() {
        let (state, _dir) = fixture();

        let own = register(State(state.clone()), Json(register_req(USER, USER)))
            .await
            .unwrap();
        assert!(!own.success);

        let zero = register(
            State(state.clone()),
            Json(register_req(USER, &Address::ZERO.to_string())),
        )
        .await
        .unwrap();
        assert!(!zero.success);

        assert!(state
            .db
            .get_user(USER)
            .unwrap()
            .map(|u| u.referred_by.is_none())
            .unwrap_or(true));
    }

    #[tokio::test]
    async fn referrer_boost_stops_at_the_reward_cap() {
        let (state, _dir) = fixture();

        for n in 0..7u8 {
            let user = format!("0x000000000000000000000000000000000000{n:02x}99");
            let (success, _) = apply_registration(&state.db, &user, REFERRER).unwrap();
            assert!(success);
        }

        let referrer = state.db.get_user(REFERRER).unwrap().unwrap();
        assert_eq!(referrer.referral_count, 7);
        assert_eq!(referrer.boost_percent, 5 * REFERRAL_BONUS_PERCENT);
    }

    #[tokio::test]
    async fn bonus_claim_is_one_shot() {
        let (state, _dir) = fixture();
        apply_registration(&state.db, USER, REFERRER).unwrap();

        let claim = ReferralClaimRequest {
            user_wallet: USER.to_string(),
        };

        let first = claim_bonus(State(state.clone()), Json(claim.clone()))
            .await
            .unwrap();
        assert!(first.success);

        let second = claim_bonus(State(state.clone()), Json(claim))
            .await
            .unwrap();
        assert!(!second.success);

        let user = state.db.get_user(USER).unwrap().unwrap();
        assert_eq!(user.boost_percent, REFERRAL_BONUS_PERCENT);
        assert!(user.referral_bonus_claimed);
    }

    #[tokio::test]
    async fn claim_without_registration_fails() {
        let (state, _dir) = fixture();

        let response = claim_bonus(
            State(state),
            Json(ReferralClaimRequest {
                user_wallet: USER.to_string(),
            }),
        )
        .await
        .unwrap();
        assert!(!response.success);
    }
}
