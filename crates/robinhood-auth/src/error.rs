//! Error types for authentication operations

/// Errors that can occur while loading signing credentials
///
/// All of these are permanent: retrying with the same key material cannot
/// succeed.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Private key is not valid base64
    #[error("failed to decode private key: {0}")]
    InvalidBase64(#[from] base64::DecodeError),

    /// Decoded private key has the wrong size
    #[error("invalid private key size: expected {expected}, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    /// Public half of the key does not belong to the seed
    #[error("private key seed and public key do not match")]
    KeyMismatch,
}

/// Result type for authentication operations
pub type AuthResult<T> = Result<T, AuthError>;
