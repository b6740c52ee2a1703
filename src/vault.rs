//! Key vault for custodial burner keys.
//!
//! Burner private keys are encrypted with ChaCha20-Poly1305 under a single
//! server-held 32-byte secret before they touch the database. Each ciphertext
//! gets a fresh random 12-byte nonce, which is prepended to the ciphertext so
//! the stored blob is self-contained. The hex form of that blob is what lands
//! in `burner_keys` and what the `get-burner` endpoint returns.
//!
//! Plaintext key material must never be logged. The only place a decrypted key
//! leaves this process is the audit-logged admin decrypt endpoint.

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce,
};

const NONCE_LEN: usize = 12;

/// Errors from vault operations.
#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    #[error("ciphertext is malformed")]
    Malformed,

    #[error("decryption failed: wrong secret or corrupted data")]
    DecryptionFailed,

    #[error("encryption failed")]
    EncryptionFailed,
}

/// Encrypts and decrypts 32-byte burner private keys.
#[derive(Clone)]
pub struct KeyVault {
    secret: [u8; 32],
}

impl KeyVault {
    pub fn new(secret: [u8; 32]) -> Self {
        Self { secret }
    }

    /// Encrypt a burner private key. Returns `hex(nonce || ciphertext)`.
    pub fn encrypt(&self, key_bytes: &[u8; 32]) -> Result<String, VaultError> {
        let cipher = ChaCha20Poly1305::new(&self.secret.into());
        let nonce_bytes: [u8; NONCE_LEN] = rand::random();
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, key_bytes.as_slice())
            .map_err(|_| VaultError::EncryptionFailed)?;

        let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        blob.extend_from_slice(&nonce_bytes);
        blob.extend_from_slice(&ciphertext);
        Ok(alloy::hex::encode(blob))
    }

    /// Decrypt a blob produced by [`encrypt`](Self::encrypt) back into the raw
    /// 32-byte private key.
    pub fn decrypt(&self, encrypted_hex: &str) -> Result<[u8; 32], VaultError> {
        let blob = alloy::hex::decode(encrypted_hex.trim_start_matches("0x"))
            .map_err(|_| VaultError::Malformed)?;
        if blob.len() <= NONCE_LEN {
            return Err(VaultError::Malformed);
        }

        let (nonce_bytes, ciphertext) = blob.split_at(NONCE_LEN);
        let cipher = ChaCha20Poly1305::new(&self.secret.into());
        let plaintext = cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| VaultError::DecryptionFailed)?;

        plaintext
            .try_into()
            .map_err(|_| VaultError::DecryptionFailed)
    }
}
