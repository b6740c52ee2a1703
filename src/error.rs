//! API error taxonomy.
//!
//! Every handler returns `Result<_, ApiError>`. The variants map one-to-one
//! onto the failure classes of the relay: authentication, validation, rate
//! limiting, chain RPC failures, storage, and key decryption. Auth, validation
//! and rate-limit errors are terminal and produce no side effects.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::storage::DbError;

/// Revert reasons the game contract is known to produce.
///
/// Recognized reasons are surfaced to clients with actionable messages;
/// anything else is reported as a generic transaction failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevertReason {
    NoTapsRemaining,
    NotRegistered,
    Blacklisted,
    Unrecognized,
}

impl RevertReason {
    /// Classify an RPC error string returned by the node.
    pub fn classify(message: &str) -> Self {
        if message.contains("No taps remaining") {
            Self::NoTapsRemaining
        } else if message.contains("Not registered") {
            Self::NotRegistered
        } else if message.contains("Blacklisted") {
            Self::Blacklisted
        } else {
            Self::Unrecognized
        }
    }
}

/// Application error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Bad, expired, or missing signature / proof.
    #[error("{0}")]
    Auth(String),

    /// Malformed address, count, package id, or other input.
    #[error("{0}")]
    Validation(String),

    /// Caller is not allowed to perform this operation.
    #[error("{0}")]
    Forbidden(String),

    /// No burner (or other resource) on file.
    #[error("{0}")]
    NotFound(String),

    /// Burner balance does not cover the gas for the requested action.
    #[error("insufficient gas on burner: balance {balance_wei} wei, required {required_wei} wei")]
    InsufficientGas {
        balance_wei: String,
        required_wei: String,
    },

    /// Request quota exhausted for this identifier.
    #[error("rate limit exceeded")]
    RateLimited,

    /// RPC failure or transaction revert.
    #[error("chain error: {message}")]
    Chain {
        message: String,
        reason: RevertReason,
    },

    /// Persistent storage failure.
    #[error("database error: {0}")]
    Database(#[from] DbError),

    /// Burner key could not be decrypted (corruption or secret mismatch).
    #[error("failed to decrypt burner key")]
    Decryption,

    /// Service is in maintenance mode.
    #[error("{0}")]
    Maintenance(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    error_code: String,
}

impl ApiError {
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn chain(message: impl Into<String>) -> Self {
        let message = message.into();
        let reason = RevertReason::classify(&message);
        Self::Chain { message, reason }
    }

    /// Stable machine-readable code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::Auth(_) => "auth_error",
            ApiError::Validation(_) => "validation_error",
            ApiError::Forbidden(_) => "forbidden",
            ApiError::NotFound(_) => "not_found",
            ApiError::InsufficientGas { .. } => "insufficient_gas",
            ApiError::RateLimited => "rate_limited",
            ApiError::Chain { reason, .. } => match reason {
                RevertReason::NoTapsRemaining => "no_taps_remaining",
                RevertReason::NotRegistered => "not_registered",
                RevertReason::Blacklisted => "blacklisted",
                RevertReason::Unrecognized => "chain_error",
            },
            ApiError::Database(_) => "database_error",
            ApiError::Decryption => "decryption_error",
            ApiError::Maintenance(_) => "maintenance",
        }
    }

    /// HTTP status for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Auth(_) => StatusCode::UNAUTHORIZED,
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::InsufficientGas { .. } => StatusCode::BAD_REQUEST,
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            // Recognized reverts are caller-fixable; unrecognized ones are upstream failures.
            ApiError::Chain { reason, .. } => match reason {
                RevertReason::Unrecognized => StatusCode::BAD_GATEWAY,
                _ => StatusCode::BAD_REQUEST,
            },
            ApiError::Database(_) | ApiError::Decryption => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Maintenance(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl From<crate::chain::ChainError> for ApiError {
    fn from(err: crate::chain::ChainError) -> Self {
        match err {
            crate::chain::ChainError::Timeout => ApiError::Chain {
                message: "chain RPC timed out".to_string(),
                reason: RevertReason::Unrecognized,
            },
            other => ApiError::chain(other.to_string()),
        }
    }
}

impl From<crate::vault::VaultError> for ApiError {
    fn from(_: crate::vault::VaultError) -> Self {
        ApiError::Decryption
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(ErrorBody {
            error: self.to_string(),
            error_code: self.error_code().to_string(),
        });
        (status, body).into_response()
    }
}
