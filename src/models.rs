//! API request and response models.
//!
//! Field names are camelCase on the wire to match the game client.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::registry::OnboardingStage;
use crate::storage::{BurnerRecord, UserRecord};

// =============================================================================
// Requests
// =============================================================================

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InitRequest {
    pub wallet: String,
    pub signature: String,
    /// Unix milliseconds, signed into the message.
    pub timestamp: i64,
    pub package_id: u8,
    pub referrer: Option<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TapRequest {
    pub wallet: String,
    pub signature: String,
    pub timestamp: i64,
    pub count: u32,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SyncUserRequest {
    pub main_wallet: String,
    pub tx_hash: String,
    pub tap_count: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SyncDepositRequest {
    pub wallet: String,
    pub usd_amount: f64,
    pub tx_hash: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CommissionRequest {
    pub from_wallet: String,
    pub tx_hash: String,
    pub tap_count: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SyncBoostRequest {
    pub wallet: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BoostRedeemRequest {
    pub address: String,
    pub code: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReferralRegisterRequest {
    pub user_wallet: String,
    pub referrer_wallet: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReferralClaimRequest {
    pub user_wallet: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum BanAction {
    Ban,
    Unban,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdminBanRequest {
    pub wallets: Vec<String>,
    pub action: BanAction,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdminWithdrawRequest {
    pub burner_addresses: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdminDecryptRequest {
    pub encrypted_key: String,
}

// =============================================================================
// Responses
// =============================================================================

/// An unsigned transaction for the client's main wallet to send.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TxPayload {
    pub to: String,
    pub data: String,
    /// Attached value in wei, when the call is payable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InitResponse {
    pub burner_wallet: String,
    /// Absent when the burner is already registered on-chain.
    pub register_burner_tx: Option<TxPayload>,
    pub deposit_tx: TxPayload,
    /// Remaining taps according to the contract.
    pub tap_balance: String,
    pub stage: OnboardingStage,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TapResponse {
    pub tx_hash: String,
    pub points_earned: f64,
    pub points: f64,
    pub boost_percent: u32,
}

/// Ledger snapshot for one wallet.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub wallet: String,
    pub burner_wallet: Option<String>,
    pub total_points: f64,
    pub premium_points: f64,
    pub standard_points: f64,
    pub taps_remaining: u64,
    pub boost_percent: u32,
    pub referral_count: u32,
    pub referral_bonus_claimed: bool,
    pub is_banned: bool,
    pub total_deposit_usd: f64,
    pub deposit_count: u32,
    pub commission_points: f64,
    pub last_tap_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<UserRecord> for UserResponse {
    fn from(u: UserRecord) -> Self {
        Self {
            wallet: u.main_wallet,
            burner_wallet: u.burner_wallet,
            total_points: u.total_points,
            premium_points: u.premium_points,
            standard_points: u.standard_points,
            taps_remaining: u.taps_remaining,
            boost_percent: u.boost_percent,
            referral_count: u.referral_count,
            referral_bonus_claimed: u.referral_bonus_claimed,
            is_banned: u.is_banned,
            total_deposit_usd: u.total_deposit_usd,
            deposit_count: u.deposit_count,
            commission_points: u.commission_points,
            last_tap_at: u.last_tap_at,
            created_at: u.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SyncResponse {
    /// False when the hash had already been credited.
    pub applied: bool,
    pub user: UserResponse,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub wallet: String,
    pub total_points: f64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardResponse {
    pub entries: Vec<LeaderboardEntry>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SyncBoostResponse {
    /// True when the contract multiplier matches the ledger (or now does).
    pub synced: bool,
    pub multiplier: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BoostResponse {
    pub address: String,
    pub boost_percent: u32,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BoostRedeemResponse {
    pub boost_percent: u32,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReferralResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BurnerResponse {
    pub exists: bool,
    pub burner_wallet: Option<String>,
    pub encrypted_key: Option<String>,
    pub withdrawn: Option<bool>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CommissionResponse {
    pub credited: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
}

// Admin

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BurnerSummary {
    pub main_wallet: String,
    pub burner_wallet: String,
    pub encrypted_key: String,
    pub withdrawn: bool,
    pub created_at: DateTime<Utc>,
}

impl From<BurnerRecord> for BurnerSummary {
    fn from(b: BurnerRecord) -> Self {
        Self {
            main_wallet: b.main_wallet,
            burner_wallet: b.burner_wallet,
            encrypted_key: b.encrypted_key,
            withdrawn: b.withdrawn,
            created_at: b.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdminDataResponse {
    pub users: Vec<UserResponse>,
    pub burners: Vec<BurnerSummary>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdminBanResponse {
    pub updated: usize,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawOutcome {
    pub burner_wallet: String,
    /// `swept`, `skipped`, `unconfirmed`, or `failed`.
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdminWithdrawResponse {
    pub results: Vec<WithdrawOutcome>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdminDecryptResponse {
    pub private_key: String,
}
