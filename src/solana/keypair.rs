//! Signing identities and key loading.
//!
//! # Security
//! - Secret keys are loaded ONLY from environment variables
//! - Keys are never logged or serialized except by explicit export
//! - Intermediate key buffers are zeroized

use ed25519_dalek::{Signer, SigningKey};
use rand::rngs::OsRng;
use zeroize::Zeroizing;

use crate::solana::types::{LedgerError, LedgerResult, Pubkey, Signature};

/// An Ed25519 key pair able to sign transaction messages.
#[derive(Clone)]
pub struct SigningIdentity {
    signing_key: SigningKey,
}

impl SigningIdentity {
    /// Parse a key pair from a JSON array of byte values.
    ///
    /// Accepts the 64-byte keypair layout (secret seed followed by the
    /// public key) written by `solana-keygen`, or a bare 32-byte seed. For
    /// the 64-byte form the public half must match the seed.
    pub fn from_json_bytes(json: &str) -> LedgerResult<Self> {
        let bytes: Zeroizing<Vec<u8>> = Zeroizing::new(
            serde_json::from_str(json.trim())
                .map_err(|e| LedgerError::Key(format!("expected a JSON array of bytes: {}", e)))?,
        );
        Self::from_bytes(&bytes)
    }

    /// Build a key pair from raw keypair or seed bytes.
    pub fn from_bytes(bytes: &[u8]) -> LedgerResult<Self> {
        let signing_key = match bytes.len() {
            64 => {
                let mut keypair = Zeroizing::new([0u8; 64]);
                keypair.copy_from_slice(bytes);
                SigningKey::from_keypair_bytes(&keypair).map_err(|_| {
                    LedgerError::Key("public key does not match secret key".to_string())
                })?
            }
            32 => {
                let mut seed = Zeroizing::new([0u8; 32]);
                seed.copy_from_slice(bytes);
                SigningKey::from_bytes(&seed)
            }
            n => {
                return Err(LedgerError::Key(format!(
                    "expected 64 or 32 key bytes, got {}",
                    n
                )))
            }
        };
        Ok(Self { signing_key })
    }

    /// Load a key pair from the named environment variable.
    pub fn from_env(var: &str) -> LedgerResult<Self> {
        let value = Zeroizing::new(
            std::env::var(var)
                .map_err(|_| LedgerError::Key(format!("Environment variable {} not set", var)))?,
        );
        Self::from_json_bytes(&value)
    }

    /// Generate a fresh random key pair.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Public identifier of this key pair.
    pub fn pubkey(&self) -> Pubkey {
        Pubkey(self.signing_key.verifying_key().to_bytes())
    }

    /// Sign arbitrary message bytes.
    pub fn sign_message(&self, message: &[u8]) -> Signature {
        Signature(self.signing_key.sign(message).to_bytes())
    }

    /// Export in the 64-byte JSON array layout accepted by [`Self::from_json_bytes`].
    pub fn to_json_bytes(&self) -> Zeroizing<String> {
        let bytes = Zeroizing::new(self.signing_key.to_keypair_bytes());
        let rendered: Vec<String> = bytes.iter().map(|b| b.to_string()).collect();
        Zeroizing::new(format!("[{}]", rendered.join(",")))
    }
}

impl std::fmt::Debug for SigningIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningIdentity")
            .field("pubkey", &self.pubkey())
            .finish_non_exhaustive()
    }
}

/// Verify an Ed25519 signature over `message` by `pubkey`.
pub fn verify_signature(pubkey: &Pubkey, message: &[u8], signature: &Signature) -> bool {
    use ed25519_dalek::{Verifier, VerifyingKey};

    let Ok(key) = VerifyingKey::from_bytes(&pubkey.0) else {
        return false;
    };
    let signature = ed25519_dalek::Signature::from_bytes(&signature.0);
    key.verify(message, &signature).is_ok()
}
