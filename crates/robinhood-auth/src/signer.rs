//! Per-request signing
//!
//! Every request carries three headers: the API key, a base64 Ed25519
//! signature and the unix timestamp that was signed. The signed message is
//! the plain concatenation `api_key || timestamp || path || method || body`.

use std::time::{SystemTime, UNIX_EPOCH};

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use tracing::trace;

use crate::credentials::Credentials;

/// Header carrying the API key
pub const API_KEY_HEADER: &str = "x-api-key";
/// Header carrying the base64 signature
pub const SIGNATURE_HEADER: &str = "x-signature";
/// Header carrying the signed unix timestamp (decimal seconds)
pub const TIMESTAMP_HEADER: &str = "x-timestamp";

/// Everything that goes into one signature
///
/// Built fresh for every attempt; never reused across retries since the
/// server rejects stale timestamps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningInput<'a> {
    pub api_key: &'a str,
    pub timestamp: u64,
    /// Request path, including `?query` when present
    pub path: &'a str,
    /// HTTP method in its original case
    pub method: &'a str,
    /// Exact body bytes sent, empty when there is no body
    pub body: &'a str,
}

impl SigningInput<'_> {
    /// Canonical message bytes
    pub fn message(&self) -> String {
        let timestamp = self.timestamp.to_string();
        let mut message = String::with_capacity(
            self.api_key.len() + timestamp.len() + self.path.len() + self.method.len() + self.body.len(),
        );
        message.push_str(self.api_key);
        message.push_str(&timestamp);
        message.push_str(self.path);
        message.push_str(self.method);
        message.push_str(self.body);
        message
    }
}

/// Authentication headers for a single request attempt
#[derive(Clone, PartialEq, Eq)]
pub struct SignedHeaders {
    pub api_key: String,
    /// base64 signature
    pub signature: String,
    /// Decimal unix seconds
    pub timestamp: String,
}

impl SignedHeaders {
    /// Header name/value pairs in a fixed order
    pub fn pairs(&self) -> [(&'static str, &str); 3] {
        [
            (API_KEY_HEADER, self.api_key.as_str()),
            (SIGNATURE_HEADER, self.signature.as_str()),
            (TIMESTAMP_HEADER, self.timestamp.as_str()),
        ]
    }
}

impl std::fmt::Debug for SignedHeaders {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignedHeaders")
            .field("signature", &"[REDACTED]")
            .field("timestamp", &self.timestamp)
            .finish_non_exhaustive()
    }
}

/// Signs requests with a long-lived credential
///
/// Holds no mutable state, so one signer can be shared by any number of
/// concurrent requests.
#[derive(Debug, Clone)]
pub struct RequestSigner {
    credentials: Credentials,
}

impl RequestSigner {
    /// Create a signer owning the given credentials
    pub fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }

    /// Get the credentials in use
    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Sign a request using the current wall-clock time
    pub fn sign(&self, method: &str, path: &str, body: &str) -> SignedHeaders {
        let input = self.signing_input(unix_timestamp(), method, path, body);
        self.sign_input(&input)
    }

    /// Build the signing input for an explicit timestamp
    pub fn signing_input<'a>(
        &'a self,
        timestamp: u64,
        method: &'a str,
        path: &'a str,
        body: &'a str,
    ) -> SigningInput<'a> {
        SigningInput {
            api_key: self.credentials.api_key(),
            timestamp,
            path,
            method,
            body,
        }
    }

    /// Sign a prepared input
    pub fn sign_input(&self, input: &SigningInput<'_>) -> SignedHeaders {
        let signature = self.credentials.sign(input.message().as_bytes());
        trace!(method = input.method, path = input.path, timestamp = input.timestamp, "Signed request");

        SignedHeaders {
            api_key: input.api_key.to_string(),
            signature: BASE64.encode(signature.to_bytes()),
            timestamp: input.timestamp.to_string(),
        }
    }
}

/// Seconds since the unix epoch
pub fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::tests::{doc_private_key, DOC_API_KEY, DOC_PUBLIC_KEY};
    use ed25519_dalek::{Signature, Verifier, VerifyingKey};

    const DOC_TIMESTAMP: u64 = 1698708981;
    const DOC_PATH: &str = "/api/v1/crypto/trading/orders/";
    const DOC_BODY: &str = r#"{"client_order_id":"131de903-5a9c-4260-abc1-28d562a5dcf0","side":"buy","symbol":"BTC-USD","type":"market","market_order_config":{"asset_quantity":"0.1"}}"#;

    fn signer() -> RequestSigner {
        RequestSigner::new(Credentials::new(DOC_API_KEY, doc_private_key()).unwrap())
    }

    fn verify(public_key_b64: &str, message: &str, signature_b64: &str) -> bool {
        let public: [u8; 32] = BASE64.decode(public_key_b64).unwrap().try_into().unwrap();
        let signature: [u8; 64] = BASE64.decode(signature_b64).unwrap().try_into().unwrap();
        VerifyingKey::from_bytes(&public)
            .unwrap()
            .verify(message.as_bytes(), &Signature::from_bytes(&signature))
            .is_ok()
    }

    #[test]
    fn test_message_is_plain_concatenation() {
        let signer = signer();
        let input = signer.signing_input(DOC_TIMESTAMP, "POST", DOC_PATH, DOC_BODY);
        assert_eq!(
            input.message(),
            format!("{DOC_API_KEY}1698708981{DOC_PATH}POST{DOC_BODY}")
        );

        let input = signer.signing_input(1, "get", "/x/?a=1", "");
        assert_eq!(input.message(), format!("{DOC_API_KEY}1/x/?a=1get"));
    }

    #[test]
    fn test_documented_vector() {
        let signer = signer();
        let input = signer.signing_input(DOC_TIMESTAMP, "POST", DOC_PATH, DOC_BODY);
        let headers = signer.sign_input(&input);

        assert_eq!(headers.api_key, DOC_API_KEY);
        assert_eq!(headers.timestamp, "1698708981");
        assert_eq!(
            headers.signature,
            "UCrqnNobORgfcMA0VirVLvNW/N1BqJ3xx8M0M1dS7jpuoYIF+ZKynseqtqQ19r2ESnsg9Ze8hRn0/pQsg02VCA=="
        );
        assert!(verify(DOC_PUBLIC_KEY, &input.message(), &headers.signature));
    }

    #[test]
    fn test_get_without_body() {
        let signer = signer();
        let input = signer.signing_input(
            DOC_TIMESTAMP,
            "GET",
            "/api/v1/crypto/trading/accounts/",
            "",
        );
        let headers = signer.sign_input(&input);
        assert_eq!(
            headers.signature,
            "08PdjWE9n95K4rcXLZS0z47SdFJ0k/hod/1WRNd2JugZemESR65/J8UJi6yGjd8KRPizSW9goFFqffDOgqGBDQ=="
        );
    }

    #[test]
    fn test_signature_binds_every_field() {
        let signer = signer();
        let input = signer.signing_input(DOC_TIMESTAMP, "POST", DOC_PATH, DOC_BODY);
        let headers = signer.sign_input(&input);

        let mut tampered = input.clone();
        tampered.timestamp += 1;
        assert!(!verify(DOC_PUBLIC_KEY, &tampered.message(), &headers.signature));

        let tampered = SigningInput { method: "post", ..input.clone() };
        assert!(!verify(DOC_PUBLIC_KEY, &tampered.message(), &headers.signature));

        let tampered = SigningInput { body: "", ..input };
        assert!(!verify(DOC_PUBLIC_KEY, &tampered.message(), &headers.signature));
    }

    #[test]
    fn test_sign_uses_current_time() {
        let before = unix_timestamp();
        let headers = signer().sign("GET", "/api/v1/crypto/trading/accounts/", "");
        let after = unix_timestamp();

        let ts: u64 = headers.timestamp.parse().unwrap();
        assert!(ts >= before && ts <= after);

        let message = format!("{DOC_API_KEY}{ts}/api/v1/crypto/trading/accounts/GET");
        assert!(verify(DOC_PUBLIC_KEY, &message, &headers.signature));
    }

    #[test]
    fn test_header_pairs() {
        let headers = signer().sign("GET", "/", "");
        let pairs = headers.pairs();
        assert_eq!(pairs[0], ("x-api-key", DOC_API_KEY));
        assert_eq!(pairs[1].0, "x-signature");
        assert_eq!(pairs[2], ("x-timestamp", headers.timestamp.as_str()));
        assert!(!format!("{:?}", headers).contains(&headers.signature));
    }
}
