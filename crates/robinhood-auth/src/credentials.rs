//! API credentials for the Robinhood Crypto API
//!
//! A credential is an API key plus an Ed25519 keypair, transported as the
//! base64 encoding of the 64-byte `seed || public_key` form.
//!
//! # Security
//!
//! The private seed is stored using the `secrecy` crate which:
//! - Zeroizes memory on drop (prevents memory scanning)
//! - Prevents accidental logging via Debug impl
//! - Provides explicit access via `expose_secret()`

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use ed25519_dalek::{
    Signature, Signer, SigningKey, VerifyingKey, KEYPAIR_LENGTH, SECRET_KEY_LENGTH,
};
use rand::rngs::OsRng;
use secrecy::zeroize::Zeroizing;
use secrecy::{ExposeSecret, SecretBox};
use tracing::debug;

use crate::error::{AuthError, AuthResult};

/// Size of a decoded private key: 32-byte seed followed by 32-byte public key
pub const PRIVATE_KEY_LENGTH: usize = KEYPAIR_LENGTH;

/// API credentials for authenticated requests
///
/// Immutable once constructed. The seed is zeroized when the Credentials
/// are dropped.
pub struct Credentials {
    /// API key (public, may be empty)
    api_key: String,
    /// Ed25519 seed (zeroized on drop)
    seed: SecretBox<[u8; SECRET_KEY_LENGTH]>,
    /// Public half, kept for verification
    verifying_key: VerifyingKey,
}

impl Credentials {
    /// Create new credentials from an API key and a base64 private key
    ///
    /// # Arguments
    /// * `api_key` - Your Robinhood API key
    /// * `private_key` - base64 of the 64-byte Ed25519 keypair (seed || public key)
    ///
    /// # Errors
    /// Fails if the key is not base64, is not 64 bytes long, or its public
    /// half does not correspond to its seed.
    pub fn new(api_key: impl Into<String>, private_key: impl AsRef<str>) -> AuthResult<Self> {
        let decoded = Zeroizing::new(BASE64.decode(private_key.as_ref().trim())?);

        let keypair: &[u8; PRIVATE_KEY_LENGTH] =
            decoded
                .as_slice()
                .try_into()
                .map_err(|_| AuthError::InvalidKeyLength {
                    expected: PRIVATE_KEY_LENGTH,
                    actual: decoded.len(),
                })?;

        let signing_key =
            SigningKey::from_keypair_bytes(keypair).map_err(|_| AuthError::KeyMismatch)?;

        let credentials = Self::from_signing_key(api_key, &signing_key);
        debug!(api_key = %credentials.api_key_prefix(), "Loaded Ed25519 credentials");
        Ok(credentials)
    }

    /// Create credentials from an already-decoded signing key
    pub fn from_signing_key(api_key: impl Into<String>, signing_key: &SigningKey) -> Self {
        Self {
            api_key: api_key.into(),
            seed: SecretBox::new(Box::new(signing_key.to_bytes())),
            verifying_key: signing_key.verifying_key(),
        }
    }

    /// Get the API key
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Get the public key matching the private seed
    pub fn verifying_key(&self) -> VerifyingKey {
        self.verifying_key
    }

    /// Sign raw message bytes with the private key
    pub fn sign(&self, message: &[u8]) -> Signature {
        // expose_secret() provides controlled access to the seed
        SigningKey::from_bytes(self.seed.expose_secret()).sign(message)
    }

    fn api_key_prefix(&self) -> &str {
        let end = self
            .api_key
            .char_indices()
            .nth(8)
            .map_or(self.api_key.len(), |(i, _)| i);
        &self.api_key[..end]
    }
}

impl Clone for Credentials {
    /// Clone credentials (creates new SecretBox with same content)
    fn clone(&self) -> Self {
        Self {
            api_key: self.api_key.clone(),
            seed: SecretBox::new(Box::new(*self.seed.expose_secret())),
            verifying_key: self.verifying_key,
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &format!("{}...", self.api_key_prefix()))
            .field("private_key", &"[REDACTED]")
            .finish()
    }
}

/// A freshly generated keypair, base64 encoded
///
/// Register `public_key` with Robinhood; keep `private_key` secret and pass
/// it to [`Credentials::new`].
pub struct GeneratedKeyPair {
    /// base64 of the 64-byte keypair (seed || public key)
    pub private_key: Zeroizing<String>,
    /// base64 of the 32-byte public key
    pub public_key: String,
}

/// Generate a new Ed25519 keypair for API authentication
pub fn generate_keypair() -> GeneratedKeyPair {
    let signing_key = SigningKey::generate(&mut OsRng);
    let keypair = Zeroizing::new(signing_key.to_keypair_bytes());

    GeneratedKeyPair {
        private_key: Zeroizing::new(BASE64.encode(keypair.as_slice())),
        public_key: BASE64.encode(signing_key.verifying_key().as_bytes()),
    }
}
