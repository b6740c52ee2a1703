use axum::{
    http::HeaderMap,
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    error::ApiError,
    models::{
        AdminBanRequest, AdminBanResponse, AdminDataResponse, AdminDecryptRequest,
        AdminDecryptResponse, AdminWithdrawRequest, AdminWithdrawResponse, BanAction,
        BoostRedeemRequest,
        BoostRedeemResponse, BoostResponse, BurnerResponse, BurnerSummary, CommissionRequest,
        CommissionResponse, InitRequest, InitResponse, LeaderboardEntry, LeaderboardResponse,
        ReferralClaimRequest, ReferralRegisterRequest, ReferralResponse, StatusResponse,
        SyncBoostRequest, SyncBoostResponse, SyncDepositRequest, SyncResponse, SyncUserRequest,
        TapRequest, TapResponse, TxPayload, UserResponse, WithdrawOutcome,
    },
    ratelimit::Scope,
    registry::OnboardingStage,
    state::AppState,
};

pub mod admin;
pub mod boost;
pub mod init;
pub mod referral;
pub mod sync;
pub mod tap;
pub mod user;

pub fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/init", post(init::init))
        .route("/tap", post(tap::tap))
        .route("/sync-user", post(sync::sync_user))
        .route("/sync-deposit", post(sync::sync_deposit))
        .route("/sync-boost", post(sync::sync_boost))
        .route("/commission", post(sync::commission))
        .route("/user/{address}", get(user::get_user))
        .route("/leaderboard", get(user::leaderboard))
        .route("/get-burner", get(user::get_burner))
        .route("/status", get(user::status))
        .route("/boost", get(boost::get_boost))
        .route("/boost/redeem", post(boost::redeem))
        .route("/referral/register", post(referral::register))
        .route("/referral/claim-bonus", post(referral::claim_bonus))
        .route("/admin/data", get(admin::data))
        .route("/admin/ban", post(admin::ban))
        .route("/admin/withdraw", post(admin::withdraw))
        .route("/admin/decrypt-key", post(admin::decrypt_key))
        .with_state(state);

    Router::new()
        .nest("/api", api_routes)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Best-effort client IP for IP-keyed rate limits. The service sits behind a
/// proxy, so the forwarded headers are the only source available.
pub(crate) fn client_ip(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .map(|v| v.to_string())
        })
        .unwrap_or_else(|| "unknown".to_string())
}

pub(crate) fn check_limit(
    state: &AppState,
    scope: Scope,
    identifier: &str,
) -> Result<(), ApiError> {
    if state.limiter.allow(scope, &identifier.to_lowercase()) {
        Ok(())
    } else {
        Err(ApiError::RateLimited)
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        init::init,
        tap::tap,
        sync::sync_user,
        sync::sync_deposit,
        sync::sync_boost,
        sync::commission,
        user::get_user,
        user::leaderboard,
        user::get_burner,
        user::status,
        boost::get_boost,
        boost::redeem,
        referral::register,
        referral::claim_bonus,
        admin::data,
        admin::ban,
        admin::withdraw,
        admin::decrypt_key
    ),
    components(
        schemas(
            InitRequest,
            InitResponse,
            OnboardingStage,
            TxPayload,
            BanAction,
            TapRequest,
            TapResponse,
            SyncUserRequest,
            SyncDepositRequest,
            SyncBoostRequest,
            SyncBoostResponse,
            SyncResponse,
            CommissionRequest,
            CommissionResponse,
            UserResponse,
            LeaderboardEntry,
            LeaderboardResponse,
            BoostResponse,
            BoostRedeemRequest,
            BoostRedeemResponse,
            ReferralRegisterRequest,
            ReferralClaimRequest,
            ReferralResponse,
            BurnerResponse,
            StatusResponse,
            AdminBanRequest,
            AdminBanResponse,
            AdminDataResponse,
            AdminWithdrawRequest,
            AdminWithdrawResponse,
            AdminDecryptRequest,
            AdminDecryptResponse,
            BurnerSummary,
            WithdrawOutcome
        )
    ),
    tags(
        (name = "Onboarding", description = "Burner creation and funding"),
        (name = "Game", description = "Tap relay and ledger sync"),
        (name = "Social", description = "Referrals and boost codes"),
        (name = "Admin", description = "Operator tooling")
    )
)]
struct ApiDoc;
