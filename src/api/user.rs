//! Read-side endpoints: ledger lookups, leaderboard, burner lookup, status.

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::error::ApiError;
use crate::models::{
    BurnerResponse, LeaderboardEntry, LeaderboardResponse, StatusResponse, UserResponse,
};
use crate::ratelimit::Scope;
use crate::state::AppState;
use crate::storage::UserRecord;

use super::{check_limit, client_ip};

const LEADERBOARD_DEFAULT: usize = 100;
const LEADERBOARD_MAX: usize = 500;

/// Ledger snapshot for a wallet. Unknown wallets get a zeroed snapshot
/// without creating a row.
#[utoipa::path(
    get,
    path = "/api/user/{address}",
    tag = "Game",
    params(("address" = String, Path, description = "Main wallet address")),
    responses(
        (status = 200, description = "Ledger snapshot", body = UserResponse)
    )
)]
pub async fn get_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(address): Path<String>,
) -> Result<Json<UserResponse>, ApiError> {
    check_limit(&state, Scope::UserLookup, &client_ip(&headers))?;

    let user = state
        .db
        .get_user(&address)?
        .unwrap_or_else(|| UserRecord::new(&address));
    Ok(Json(user.into()))
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct LeaderboardQuery {
    /// Number of entries to return, capped server-side.
    pub limit: Option<usize>,
}

#[utoipa::path(
    get,
    path = "/api/leaderboard",
    tag = "Game",
    params(LeaderboardQuery),
    responses(
        (status = 200, description = "Top wallets by total points", body = LeaderboardResponse)
    )
)]
pub async fn leaderboard(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<LeaderboardQuery>,
) -> Result<Json<LeaderboardResponse>, ApiError> {
    check_limit(&state, Scope::Leaderboard, &client_ip(&headers))?;

    let limit = query
        .limit
        .unwrap_or(LEADERBOARD_DEFAULT)
        .min(LEADERBOARD_MAX);
    let entries = state
        .db
        .leaderboard(limit)?
        .into_iter()
        .enumerate()
        .map(|(i, u)| LeaderboardEntry {
            rank: i + 1,
            wallet: u.main_wallet,
            total_points: u.total_points,
        })
        .collect();

    Ok(Json(LeaderboardResponse { entries }))
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct BurnerQuery {
    /// Main wallet to look up.
    pub wallet: String,
}

/// Burner lookup for a main wallet. The key stays encrypted; recovery goes
/// through the admin decrypt endpoint.
#[utoipa::path(
    get,
    path = "/api/get-burner",
    tag = "Onboarding",
    params(BurnerQuery),
    responses(
        (status = 200, description = "Burner record, if any", body = BurnerResponse)
    )
)]
pub async fn get_burner(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<BurnerQuery>,
) -> Result<Json<BurnerResponse>, ApiError> {
    check_limit(&state, Scope::GetBurner, &client_ip(&headers))?;

    Ok(Json(match state.db.get_burner(&query.wallet)? {
        Some(record) => BurnerResponse {
            exists: true,
            burner_wallet: Some(record.burner_wallet),
            encrypted_key: Some(record.encrypted_key),
            withdrawn: Some(record.withdrawn),
        },
        None => BurnerResponse {
            exists: false,
            burner_wallet: None,
            encrypted_key: None,
            withdrawn: None,
        },
    }))
}

/// Service health. Maintenance mode answers 503 so clients back off.
#[utoipa::path(
    get,
    path = "/api/status",
    tag = "Onboarding",
    responses(
        (status = 200, description = "Service is up", body = StatusResponse),
        (status = 503, description = "Maintenance mode")
    )
)]
pub async fn status(State(state): State<AppState>) -> Result<Json<StatusResponse>, ApiError> {
    if state.config.maintenance_mode {
        return Err(ApiError::Maintenance(
            state.config.maintenance_message.clone(),
        ));
    }
    Ok(Json(StatusResponse {
        status: "ok".to_string(),
        message: None,
    }))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use alloy::primitives::Address;

    use crate::state::testing::{test_state, StubChain};

    use super::*;

    fn fixture() -> (AppState, tempfile::TempDir) {
        test_state(Arc::new(StubChain::default()), Address::ZERO)
    }

    #[tokio::test]
    async fn unknown_wallet_gets_a_zeroed_snapshot() {
        let (state, _dir) = fixture();

        let response = get_user(
            State(state.clone()),
            HeaderMap::new(),
            Path("0xABC".to_string()),
        )
            .await
            .unwrap();
        assert_eq!(response.total_points, 0.0);
        assert_eq!(response.taps_remaining, 0);

        // The lookup does not persist anything.
        assert!(state.db.get_user("0xabc").unwrap().is_none());
    }

    #[tokio::test]
    async fn leaderboard_orders_by_total_points() {
        let (state, _dir) = fixture();
        state
            .db
            .update_user("0xaaa", |u| u.total_points = 10.0)
            .unwrap();
        state
            .db
            .update_user("0xbbb", |u| u.total_points = 30.0)
            .unwrap();
        state
            .db
            .update_user("0xccc", |u| u.total_points = 20.0)
            .unwrap();

        let response = leaderboard(
            State(state),
            HeaderMap::new(),
            Query(LeaderboardQuery { limit: Some(2) }),
        )
        .await
        .unwrap();

        let wallets: Vec<_> = response
            .entries
            .iter()
            .map(|e| e.wallet.as_str())
            .collect();
        assert_eq!(wallets, vec!["0xbbb", "0xccc"]);
        assert_eq!(response.entries[0].rank, 1);
    }

    #[tokio::test]
    async fn burner_lookup_reports_existence() {
        let (state, _dir) = fixture();

        let missing = get_burner(
            State(state.clone()),
            HeaderMap::new(),
            Query(BurnerQuery {
                wallet: "0xAAAA".to_string(),
            }),
        )
        .await
        .unwrap();
        assert!(!missing.exists);

        let (record, _) = state.registry.get_or_create("0xAAAA").unwrap();
        let found = get_burner(
            State(state),
            HeaderMap::new(),
            Query(BurnerQuery {
                wallet: "0xaaaa".to_string(),
            }),
        )
        .await
        .unwrap();
        assert!(found.exists);
        assert_eq!(found.burner_wallet, Some(record.burner_wallet));
        assert_eq!(found.encrypted_key, Some(record.encrypted_key));
    }

    #[tokio::test]
    async fn status_reflects_maintenance_mode() {
        let (state, _dir) = fixture();
        let ok = status(State(state.clone())).await.unwrap();
        assert_eq!(ok.status, "ok");

        let chain: Arc<StubChain> = Arc::new(StubChain::default());
        let mut config = (*state.config).clone();
        config.maintenance_mode = true;
        let down = AppState::with_parts(config, Arc::clone(&state.db), chain);

        let err = status(State(down)).await.unwrap_err();
        assert!(matches!(err, ApiError::Maintenance(_)));
    }
}
