//! Main REST client implementation

use std::sync::Arc;
use std::time::Duration;

use robinhood_auth::{Credentials, RequestSigner};
use robinhood_types::{PageResponse, TokenBucketConfig, CURSOR_PARAM};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::{RestError, RestResult};
use crate::executor::{parse_base_url, ApiRequest, RequestExecutor};
use crate::paginator::Paginator;
use crate::rate_limiter::RateLimiter;
use crate::transport::{HttpTransport, ReqwestTransport};

/// Production API origin
pub const DEFAULT_BASE_URL: &str = "https://trading.robinhood.com";

/// Default request timeout
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Robinhood Crypto REST API client
///
/// Every call is signed, admitted by the client's rate limiter and retried
/// on transient failures. Clones share the limiter and the connection pool.
///
/// # Example
///
/// ```no_run
/// use robinhood_rest::{CancellationToken, ClientConfig, RobinhoodClient};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let client = RobinhoodClient::from_keys("rh-api-...", "base64-private-key", ClientConfig::new())?;
///     let cancel = CancellationToken::new();
///
///     let account: serde_json::Value = client
///         .get_json("/api/v1/crypto/trading/accounts/", &[], &cancel)
///         .await?;
///     println!("{account}");
///
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct RobinhoodClient {
    executor: Arc<RequestExecutor>,
}

impl RobinhoodClient {
    /// Create a client from credentials and configuration
    ///
    /// # Errors
    /// Fails with [`RestError::InvalidUrl`] or [`RestError::InvalidConfig`]
    /// when the configuration is rejected.
    pub fn new(credentials: Credentials, config: ClientConfig) -> RestResult<Self> {
        config.validate()?;

        let transport: Arc<dyn HttpTransport> = match config.transport {
            Some(transport) => transport,
            None => Arc::new(
                ReqwestTransport::new(config.timeout, &config.user_agent)
                    .map_err(|e| RestError::InvalidConfig(e.to_string()))?,
            ),
        };
        let limiter = config
            .rate_limiter
            .unwrap_or_else(|| RateLimiter::new(config.rate_limit));

        let executor = RequestExecutor::new(
            transport,
            RequestSigner::new(credentials),
            limiter,
            &config.base_url,
        )?;

        info!(base_url = %executor.base_url(), "Created Robinhood REST client");

        Ok(Self {
            executor: Arc::new(executor),
        })
    }

    /// Create a client from an API key and a base64 private key
    pub fn from_keys(
        api_key: impl Into<String>,
        private_key: impl AsRef<str>,
        config: ClientConfig,
    ) -> RestResult<Self> {
        let credentials = Credentials::new(api_key, private_key)?;
        Self::new(credentials, config)
    }

    /// Get the request executor
    pub fn executor(&self) -> &RequestExecutor {
        &self.executor
    }

    /// Get the shared rate limiter
    pub fn rate_limiter(&self) -> &RateLimiter {
        self.executor.limiter()
    }

    // ========================================================================
    // Raw Requests
    // ========================================================================

    /// Perform a call and return the raw 2xx body
    pub async fn execute(
        &self,
        request: &ApiRequest,
        cancel: &CancellationToken,
    ) -> RestResult<String> {
        self.executor.execute(request, cancel).await
    }

    /// Perform a call and decode the 2xx body as JSON
    ///
    /// An empty body decodes as `null`, so `()` and `Option<_>` targets
    /// accept it.
    pub async fn request_json<T: DeserializeOwned>(
        &self,
        request: &ApiRequest,
        cancel: &CancellationToken,
    ) -> RestResult<T> {
        let body = self.executor.execute(request, cancel).await?;
        decode_json(&body)
    }

    // ========================================================================
    // Conveniences
    // ========================================================================

    /// GET a path with query parameters
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
        cancel: &CancellationToken,
    ) -> RestResult<T> {
        let request = ApiRequest::get(path).with_query_pairs(query.iter().copied());
        self.request_json(&request, cancel).await
    }

    /// POST a JSON body
    pub async fn post_json<B, T>(
        &self,
        path: &str,
        body: &B,
        cancel: &CancellationToken,
    ) -> RestResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = ApiRequest::post(path).json(body)?;
        self.request_json(&request, cancel).await
    }

    /// DELETE a path, returning the raw body
    pub async fn delete(&self, path: &str, cancel: &CancellationToken) -> RestResult<String> {
        self.execute(&ApiRequest::delete(path), cancel).await
    }

    // ========================================================================
    // Pagination
    // ========================================================================

    /// Page through a list endpoint
    ///
    /// Each page is a signed GET of `list.path` with the list's filters plus
    /// `cursor` once a cursor is known.
    pub fn paginate<T>(&self, list: ListRequest) -> Paginator<T>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let executor = Arc::clone(&self.executor);
        let list = Arc::new(list);

        Paginator::new(move |cursor: Option<String>, cancel: CancellationToken| {
            let executor = Arc::clone(&executor);
            let request = list.to_request(cursor.as_deref());
            async move {
                let body = executor.execute(&request, &cancel).await?;
                decode_json::<PageResponse<T>>(&body)
            }
        })
    }
}

impl std::fmt::Debug for RobinhoodClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RobinhoodClient")
            .field("base_url", &self.executor.base_url().as_str())
            .field("credentials", self.executor.signer().credentials())
            .finish()
    }
}

fn decode_json<T: DeserializeOwned>(body: &str) -> RestResult<T> {
    let body = if body.trim().is_empty() { "null" } else { body };
    serde_json::from_str(body).map_err(RestError::Decode)
}

/// A list endpoint and its filters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListRequest {
    pub path: String,
    pub query: Vec<(String, String)>,
}

impl ListRequest {
    /// List everything under `path`
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            query: Vec::new(),
        }
    }

    /// Add a filter parameter
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Request for one page; `cursor` is added when present
    pub fn to_request(&self, cursor: Option<&str>) -> ApiRequest {
        let request = ApiRequest::get(self.path.clone()).with_query_pairs(self.query.iter().cloned());
        match cursor {
            Some(cursor) => request.with_query(CURSOR_PARAM, cursor),
            None => request,
        }
    }
}

/// Client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API origin
    pub base_url: String,
    /// Per-request HTTP timeout
    pub timeout: Duration,
    /// User agent sent by the default transport
    pub user_agent: String,
    /// Bucket settings used when no `rate_limiter` is given
    pub rate_limit: TokenBucketConfig,
    /// Existing limiter to share with other clients
    pub rate_limiter: Option<RateLimiter>,
    /// Custom transport (replaces the reqwest transport)
    pub transport: Option<Arc<dyn HttpTransport>>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: concat!("robinhood-rest/", env!("CARGO_PKG_VERSION")).to_string(),
            rate_limit: TokenBucketConfig::robinhood_defaults(),
            rate_limiter: None,
            transport: None,
        }
    }
}

impl ClientConfig {
    /// Create a new configuration builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the API origin
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set user agent
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Set rate limit bucket settings
    pub fn with_rate_limit(mut self, rate_limit: TokenBucketConfig) -> Self {
        self.rate_limit = rate_limit;
        self
    }

    /// Share an existing rate limiter
    pub fn with_rate_limiter(mut self, limiter: RateLimiter) -> Self {
        self.rate_limiter = Some(limiter);
        self
    }

    /// Use a custom transport
    pub fn with_transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Check the configuration without building a client
    pub fn validate(&self) -> RestResult<()> {
        parse_base_url(&self.base_url)?;

        if self.timeout.is_zero() {
            return Err(RestError::InvalidConfig("timeout must be non-zero".into()));
        }

        if self.rate_limiter.is_none() {
            let TokenBucketConfig {
                capacity,
                refill_rate,
            } = self.rate_limit;
            if capacity == 0 {
                return Err(RestError::InvalidConfig(
                    "rate limit capacity must be at least 1".into(),
                ));
            }
            if !(refill_rate.is_finite() && refill_rate > 0.0) {
                return Err(RestError::InvalidConfig(format!(
                    "rate limit refill rate must be positive, got {refill_rate}"
                )));
            }
        }

        Ok(())
    }
}
