//! Request authentication.
//!
//! Two proof kinds exist and are never conflated:
//!
//! - **Proof of intent**: an EIP-191 personal-sign signature from the main
//!   wallet over a fixed per-action message. Valid only within a timestamp
//!   window of 5 minutes back and 60 seconds forward, so a captured
//!   signature goes stale quickly.
//! - **Proof of execution**: a confirmed on-chain transaction. The receipt
//!   must show success and must target the game contract.
//!
//! Timestamps are unix milliseconds, matching what wallet clients sign.

use alloy::primitives::{Address, Signature, B256};

use crate::chain::{ChainRpc, ReceiptInfo};
use crate::error::ApiError;

/// Backward tolerance for intent timestamps.
const MAX_AGE_MS: i64 = 5 * 60 * 1000;
/// Forward tolerance for client clock skew.
const MAX_SKEW_MS: i64 = 60 * 1000;

/// Actions a main wallet can sign for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentAction {
    Init,
    Tap,
    AdminAccess,
    AdminWithdraw,
}

impl IntentAction {
    /// The exact message the wallet signs. `wallet` is interpolated as the
    /// client sent it, since the signature covers the literal string.
    pub fn message(self, wallet: &str, timestamp: i64) -> String {
        match self {
            IntentAction::Init => format!("Basion init for {wallet} at {timestamp}"),
            IntentAction::Tap => format!("Basion tap for {wallet} at {timestamp}"),
            IntentAction::AdminAccess => format!("Basion Admin Access {timestamp}"),
            IntentAction::AdminWithdraw => format!("Basion Admin Withdraw {timestamp}"),
        }
    }
}

/// A request's claim to authenticity.
#[derive(Debug, Clone)]
pub enum AuthProof {
    /// Signature from the main wallet over an action message.
    Intent {
        action: IntentAction,
        wallet: String,
        timestamp: i64,
        signature: String,
    },
    /// A transaction hash whose receipt proves the action happened on-chain.
    Execution { tx_hash: B256 },
}

/// Outcome of verifying an [`AuthProof`].
#[derive(Debug, Clone)]
pub enum Verified {
    Signer(Address),
    Receipt(ReceiptInfo),
}

impl AuthProof {
    pub async fn verify(
        &self,
        chain: &dyn ChainRpc,
        contract_address: Address,
    ) -> Result<Verified, ApiError> {
        match self {
            AuthProof::Intent {
                action,
                wallet,
                timestamp,
                signature,
            } => verify_intent(*action, wallet, *timestamp, signature).map(Verified::Signer),
            AuthProof::Execution { tx_hash } => {
                verify_execution(chain, contract_address, *tx_hash)
                    .await
                    .map(Verified::Receipt)
            }
        }
    }
}

/// Verify a signed intent. Returns the wallet address iff the signature
/// recovers to `wallet` and the timestamp is inside the window.
pub fn verify_intent(
    action: IntentAction,
    wallet: &str,
    timestamp: i64,
    signature: &str,
) -> Result<Address, ApiError> {
    let expected: Address = wallet
        .parse()
        .map_err(|_| ApiError::validation("Invalid wallet address"))?;

    let now = chrono::Utc::now().timestamp_millis();
    if timestamp < now - MAX_AGE_MS {
        return Err(ApiError::auth("Signature timestamp expired"));
    }
    if timestamp > now + MAX_SKEW_MS {
        return Err(ApiError::auth("Signature timestamp is in the future"));
    }

    let signature: Signature = signature
        .parse()
        .map_err(|_| ApiError::auth("Malformed signature"))?;

    let message = action.message(wallet, timestamp);
    let recovered = signature
        .recover_address_from_msg(message.as_bytes())
        .map_err(|_| ApiError::auth("Signature recovery failed"))?;

    if recovered != expected {
        return Err(ApiError::auth("Signature does not match wallet"));
    }
    Ok(recovered)
}

/// Verify an execution proof: the transaction must be mined, successful, and
/// addressed to the game contract.
pub async fn verify_execution(
    chain: &dyn ChainRpc,
    contract_address: Address,
    tx_hash: B256,
) -> Result<ReceiptInfo, ApiError> {
    let receipt = chain.receipt(tx_hash).await?;
    check_receipt(receipt, contract_address)
}

fn check_receipt(
    receipt: Option<ReceiptInfo>,
    contract_address: Address,
) -> Result<ReceiptInfo, ApiError> {
    let receipt =
        receipt.ok_or_else(|| ApiError::validation("Transaction not found or not yet confirmed"))?;
    if !receipt.status {
        return Err(ApiError::auth("Transaction did not succeed on-chain"));
    }
    if receipt.to != Some(contract_address) {
        return Err(ApiError::auth(
            "Transaction did not target the game contract",
        ));
    }
    Ok(receipt)
}

#[cfg(test)]
mod tests {
    use alloy::signers::{local::PrivateKeySigner, SignerSync};

    use super::*;

    fn signed(action: IntentAction, signer: &PrivateKeySigner, timestamp: i64) -> (String, String) {
        let wallet = signer.address().to_string();
        let message = action.message(&wallet, timestamp);
        let signature = signer.sign_message_sync(message.as_bytes()).unwrap();
        (wallet, alloy::hex::encode(signature.as_bytes()))
    }

    #[test]
    fn valid_signature_recovers_wallet() {
        let signer = PrivateKeySigner::random();
        let now = chrono::Utc::now().timestamp_millis();
        let (wallet, signature) = signed(IntentAction::Tap, &signer, now);

        let recovered = verify_intent(IntentAction::Tap, &wallet, now, &signature).unwrap();
        assert_eq!(recovered, signer.address());
    }

    #[test]
    fn flipped_signature_bit_fails() {
        let signer = PrivateKeySigner::random();
        let now = chrono::Utc::now().timestamp_millis();
        let (wallet, signature) = signed(IntentAction::Tap, &signer, now);

        let mut bytes = alloy::hex::decode(&signature).unwrap();
        bytes[10] ^= 0x01;
        let tampered = alloy::hex::encode(bytes);

        assert!(verify_intent(IntentAction::Tap, &wallet, now, &tampered).is_err());
    }

    #[test]
    fn signature_for_other_action_fails() {
        let signer = PrivateKeySigner::random();
        let now = chrono::Utc::now().timestamp_millis();
        let (wallet, signature) = signed(IntentAction::Init, &signer, now);

        assert!(verify_intent(IntentAction::Tap, &wallet, now, &signature).is_err());
    }

    #[test]
    fn signature_from_other_wallet_fails() {
        let signer = PrivateKeySigner::random();
        let other = PrivateKeySigner::random();
        let now = chrono::Utc::now().timestamp_millis();
        let (_, signature) = signed(IntentAction::Tap, &signer, now);

        let err =
            verify_intent(IntentAction::Tap, &other.address().to_string(), now, &signature)
                .unwrap_err();
        assert!(matches!(err, ApiError::Auth(_)));
    }

    #[test]
    fn expired_timestamp_is_rejected() {
        let signer = PrivateKeySigner::random();
        let stale = chrono::Utc::now().timestamp_millis() - 6 * 60 * 1000;
        let (wallet, signature) = signed(IntentAction::Tap, &signer, stale);

        let err = verify_intent(IntentAction::Tap, &wallet, stale, &signature).unwrap_err();
        assert!(matches!(err, ApiError::Auth(_)));
    }

    #[test]
    fn future_timestamp_is_rejected() {
        let signer = PrivateKeySigner::random();
        let future = chrono::Utc::now().timestamp_millis() + 2 * 60 * 1000;
        let (wallet, signature) = signed(IntentAction::Tap, &signer, future);

        let err = verify_intent(IntentAction::Tap, &wallet, future, &signature).unwrap_err();
        assert!(matches!(err, ApiError::Auth(_)));
    }

    #[test]
    fn receipt_checks() {
        let contract = Address::repeat_byte(0xC0);
        let good = ReceiptInfo {
            status: true,
            to: Some(contract),
            block_number: Some(1),
            gas_used: 60_000,
        };

        assert!(check_receipt(Some(good.clone()), contract).is_ok());
        assert!(check_receipt(None, contract).is_err());

        let failed = ReceiptInfo {
            status: false,
            ..good.clone()
        };
        assert!(check_receipt(Some(failed), contract).is_err());

        let wrong_target = ReceiptInfo {
            to: Some(Address::repeat_byte(0x01)),
            ..good
        };
        assert!(check_receipt(Some(wrong_target), contract).is_err());
    }
}
