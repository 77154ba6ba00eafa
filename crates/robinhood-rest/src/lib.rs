//! REST client pipeline for the Robinhood Crypto trading API
//!
//! This crate turns logical API calls into signed, rate-limited, retried
//! HTTP exchanges, and walks cursor-paginated list endpoints. Endpoint
//! models are left to the caller; responses decode into any serde type.
//!
//! # Features
//!
//! - **Signing**: Ed25519 headers regenerated for every attempt
//! - **Rate Limiting**: One shared token bucket per client (300 burst, 100/min)
//! - **Retries**: Transport errors, 429 and 5xx retried with linear backoff
//! - **Pagination**: Resumable cursor paginator for any list endpoint
//! - **Cancellation**: Every call takes a [`CancellationToken`]
//!
//! # Example
//!
//! ```no_run
//! use robinhood_rest::{CancellationToken, ClientConfig, ListRequest, RobinhoodClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = RobinhoodClient::from_keys("rh-api-...", "base64-private-key", ClientConfig::new())?;
//!     let cancel = CancellationToken::new();
//!
//!     let mut orders = client.paginate::<serde_json::Value>(
//!         ListRequest::new("/api/v1/crypto/trading/orders/").with_query("symbol", "BTC-USD"),
//!     );
//!     for order in orders.get_all_pages(&cancel).await? {
//!         println!("{order}");
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! # Testing
//!
//! Enable the `test-utils` feature for [`transport::MockTransport`], a
//! scripted transport that records the requests it receives.

pub mod client;
pub mod error;
pub mod executor;
pub mod paginator;
pub mod rate_limiter;
pub mod retry;
pub mod transport;

// Re-export main types
pub use client::{ClientConfig, ListRequest, RobinhoodClient, DEFAULT_BASE_URL};
pub use error::{RestError, RestResult};
pub use executor::{ApiRequest, RequestExecutor};
pub use paginator::{PageFuture, Paginator};
pub use rate_limiter::{RateLimiter, Reservation};
pub use retry::RetryPolicy;
pub use transport::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport, TransportError};

pub use robinhood_auth::{Credentials, RequestSigner};
pub use robinhood_types::{ApiError, ErrorDetail, PageResponse, TokenBucketConfig};
pub use tokio_util::sync::CancellationToken;
