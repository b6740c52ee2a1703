//! Boost code endpoints.
//!
//! Codes come from configuration and are one-shot per wallet. Redeeming never
//! pushes the boost past the global cap.

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    Json,
};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::config::MAX_BOOST_PERCENT;
use crate::error::ApiError;
use crate::models::{BoostRedeemRequest, BoostRedeemResponse, BoostResponse};
use crate::ratelimit::Scope;
use crate::state::AppState;

use super::{check_limit, client_ip};

#[derive(Debug, Deserialize, IntoParams)]
pub struct BoostQuery {
    pub address: String,
}

#[utoipa::path(
    get,
    path = "/api/boost",
    tag = "Social",
    params(BoostQuery),
    responses(
        (status = 200, description = "Current boost for the wallet", body = BoostResponse)
    )
)]
pub async fn get_boost(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<BoostQuery>,
) -> Result<Json<BoostResponse>, ApiError> {
    check_limit(&state, Scope::BoostQuery, &client_ip(&headers))?;

    let boost_percent = state
        .db
        .get_user(&query.address)?
        .map(|u| u.boost_percent)
        .unwrap_or(0);
    Ok(Json(BoostResponse {
        address: query.address.to_lowercase(),
        boost_percent,
    }))
}

#[utoipa::path(
    post,
    path = "/api/boost/redeem",
    tag = "Social",
    request_body = BoostRedeemRequest,
    responses(
        (status = 200, description = "Boost after redemption", body = BoostRedeemResponse),
        (status = 400, description = "Unknown or already redeemed code")
    )
)]
pub async fn redeem(
    State(state): State<AppState>,
    Json(req): Json<BoostRedeemRequest>,
) -> Result<Json<BoostRedeemResponse>, ApiError> {
    check_limit(&state, Scope::BoostRedeem, &req.address)?;

    let code = req.code.trim().to_uppercase();
    let amount = *state
        .config
        .boost_codes
        .get(&code)
        .ok_or_else(|| ApiError::validation("Unknown boost code"))?;

    let mut already_used = false;
    let user = state.db.update_user(&req.address, |u| {
        if u.used_codes.contains(&code) {
            already_used = true;
            return;
        }
        u.used_codes.push(code.clone());
        u.boost_percent = (u.boost_percent + amount).min(MAX_BOOST_PERCENT);
    })?;

    if already_used {
        return Err(ApiError::validation("Code already redeemed"));
    }

    tracing::info!(wallet = %user.main_wallet, code, boost = user.boost_percent, "boost code redeemed");
    Ok(Json(BoostRedeemResponse {
        boost_percent: user.boost_percent,
    }))
}
