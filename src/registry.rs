//! Custodial burner registry.
//!
//! One burner per main wallet, created server-side and stored encrypted. The
//! existence check and insert run in a single database write transaction, so
//! concurrent first-time requests converge on one burner (see
//! [`Database::get_or_create_burner`]).
//!
//! The onboarding stage is always derived by re-reading chain state, never
//! from client-reported progress.

use std::sync::Arc;

use alloy::primitives::{Address, U256};
use alloy::signers::local::PrivateKeySigner;
use serde::Serialize;
use utoipa::ToSchema;

use crate::chain::{burner_signer, ChainRpc};
use crate::error::ApiError;
use crate::storage::{BurnerRecord, Database};
use crate::vault::KeyVault;

/// Where a wallet stands in onboarding, derived from storage plus chain state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum OnboardingStage {
    /// No burner on file.
    NoBurner,
    /// Burner persisted but not yet registered on the contract.
    BurnerCreated,
    /// Registered on-chain, waiting for the first deposit.
    Depositing,
    /// Registered and funded with taps.
    Confirmed,
    /// Chain state could not be read.
    Error,
}

pub struct BurnerRegistry {
    db: Arc<Database>,
    vault: KeyVault,
}

impl BurnerRegistry {
    pub fn new(db: Arc<Database>, vault: KeyVault) -> Self {
        Self { db, vault }
    }

    /// Fetch the burner for a main wallet, generating and persisting one when
    /// absent. Returns `(record, created)`.
    pub fn get_or_create(&self, main_wallet: &str) -> Result<(BurnerRecord, bool), ApiError> {
        let main = main_wallet.to_lowercase();
        // Encrypt up front so a vault failure surfaces before any row exists.
        let signer = PrivateKeySigner::random();
        let encrypted_key = self.vault.encrypt(&signer.to_bytes().0)?;
        let candidate = BurnerRecord {
            main_wallet: main.clone(),
            burner_wallet: signer.address().to_string().to_lowercase(),
            encrypted_key,
            withdrawn: false,
            created_at: chrono::Utc::now(),
        };
        let (record, created) = self.db.get_or_create_burner(&main, move || candidate)?;

        if created {
            tracing::info!(main_wallet = %record.main_wallet, burner = %record.burner_wallet, "burner created");
        }
        Ok((record, created))
    }

    /// Decrypt a burner record into a usable signer.
    pub fn signer_for(&self, record: &BurnerRecord) -> Result<PrivateKeySigner, ApiError> {
        let key = self.vault.decrypt(&record.encrypted_key)?;
        burner_signer(&key).map_err(|_| ApiError::Decryption)
    }

    /// Decrypt a vault-encrypted burner key back into its hex form. Used by
    /// the audit-logged admin recovery path only.
    pub fn decrypt_key(&self, encrypted_hex: &str) -> Result<String, ApiError> {
        let key = self.vault.decrypt(encrypted_hex)?;
        Ok(alloy::hex::encode(key))
    }

    /// Derive the onboarding status for a wallet from storage and chain
    /// state. Client-reported progress is never consulted.
    pub async fn onboarding(
        &self,
        chain: &dyn ChainRpc,
        main_wallet: Address,
    ) -> Result<OnboardingStatus, ApiError> {
        let record = self.db.get_burner(&main_wallet.to_string())?;
        let Some(record) = record else {
            return Ok(OnboardingStatus {
                record: None,
                stage: OnboardingStage::NoBurner,
                registered: false,
                tap_balance: U256::ZERO,
            });
        };

        let on_chain = match chain.registered_burner(main_wallet).await {
            Ok(addr) => addr,
            Err(err) => {
                tracing::warn!(error = %err, "failed to read registration state");
                return Ok(OnboardingStatus {
                    record: Some(record),
                    stage: OnboardingStage::Error,
                    registered: false,
                    tap_balance: U256::ZERO,
                });
            }
        };

        let registered = on_chain != Address::ZERO;
        if registered && on_chain.to_string().to_lowercase() != record.burner_wallet {
            tracing::warn!(
                %main_wallet,
                on_chain = %on_chain,
                stored = %record.burner_wallet,
                "on-chain burner differs from stored burner"
            );
        }

        let tap_balance = if !registered {
            None
        } else {
            match chain.tap_balance(main_wallet).await {
                Ok(balance) => Some(balance),
                Err(err) => {
                    tracing::warn!(error = %err, "failed to read tap balance");
                    return Ok(OnboardingStatus {
                        record: Some(record),
                        stage: OnboardingStage::Error,
                        registered,
                        tap_balance: U256::ZERO,
                    });
                }
            }
        };

        let stage = stage_from(registered, tap_balance);
        Ok(OnboardingStatus {
            record: Some(record),
            stage,
            registered,
            tap_balance: tap_balance.unwrap_or(U256::ZERO),
        })
    }
}

/// Snapshot of a wallet's onboarding progress.
#[derive(Debug, Clone)]
pub struct OnboardingStatus {
    pub record: Option<BurnerRecord>,
    pub stage: OnboardingStage,
    /// Whether `userToBurner` already points at a burner, meaning the client
    /// must not send another `registerBurner`.
    pub registered: bool,
    pub tap_balance: U256,
}

fn stage_from(registered: bool, tap_balance: Option<U256>) -> OnboardingStage {
    if !registered {
        return OnboardingStage::BurnerCreated;
    }
    match tap_balance {
        Some(balance) if balance > U256::ZERO => OnboardingStage::Confirmed,
        _ => OnboardingStage::Depositing,
    }
}
