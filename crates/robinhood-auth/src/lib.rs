//! Ed25519 request signing for the Robinhood Crypto API
//!
//! Every trading API request is authenticated by three headers derived from
//! an API key and an Ed25519 keypair. This crate loads the keypair, signs
//! the canonical request message and can generate new keypairs for
//! registration.
//!
//! # Example
//!
//! ```no_run
//! use robinhood_auth::{Credentials, RequestSigner};
//!
//! # fn main() -> Result<(), robinhood_auth::AuthError> {
//! let creds = Credentials::new("rh-api-...", "base64-private-key")?;
//! let signer = RequestSigner::new(creds);
//!
//! let headers = signer.sign("GET", "/api/v1/crypto/trading/accounts/", "");
//! for (name, value) in headers.pairs() {
//!     println!("{name}: {value}");
//! }
//! # Ok(())
//! # }
//! ```

mod credentials;
mod error;
mod signer;

pub use credentials::{generate_keypair, Credentials, GeneratedKeyPair, PRIVATE_KEY_LENGTH};
pub use error::{AuthError, AuthResult};
pub use signer::{
    unix_timestamp, RequestSigner, SignedHeaders, SigningInput, API_KEY_HEADER,
    SIGNATURE_HEADER, TIMESTAMP_HEADER,
};
