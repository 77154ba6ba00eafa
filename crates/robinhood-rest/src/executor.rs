//! Signed, rate-limited, retrying request execution
//!
//! [`RequestExecutor::execute`] turns one logical call into up to four HTTP
//! attempts. Each attempt backs off linearly, waits for a rate-limit
//! token, signs with a fresh timestamp, dispatches, and classifies the
//! response.

use std::sync::Arc;

use reqwest::Method;
use robinhood_auth::RequestSigner;
use robinhood_types::ApiError;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};
use url::Url;

use crate::error::{RestError, RestResult};
use crate::rate_limiter::RateLimiter;
use crate::retry::RetryPolicy;
use crate::transport::{HttpRequest, HttpResponse, HttpTransport};

/// Content type sent with every request
pub const CONTENT_TYPE_JSON: &str = "application/json";

/// One logical API call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiRequest {
    pub method: Method,
    /// Path relative to the base URL
    ///
    /// A query string embedded here is merged with `query`.
    pub path: String,
    /// Query parameters, encoded sorted by key
    pub query: Vec<(String, String)>,
    /// Serialized JSON body
    pub body: Option<String>,
}

impl ApiRequest {
    /// Create a request without query or body
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    /// Create a GET request
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    /// Create a POST request
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    /// Create a DELETE request
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Add a query parameter
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Add several query parameters
    pub fn with_query_pairs<K, V>(mut self, pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.query
            .extend(pairs.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Serialize `body` as the JSON request body
    ///
    /// The bytes are fixed here and reused unchanged by every attempt.
    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> RestResult<Self> {
        self.body = Some(serde_json::to_string(body).map_err(RestError::Serialization)?);
        Ok(self)
    }

    /// Use an already-serialized body
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Encoded query string, keys sorted (stable for repeated keys)
    pub fn encoded_query(&self) -> RestResult<String> {
        encode_sorted(self.query.iter())
    }
}

fn encode_sorted<'a>(pairs: impl Iterator<Item = &'a (String, String)>) -> RestResult<String> {
    let mut pairs: Vec<(&str, &str)> = pairs.map(|(k, v)| (k.as_str(), v.as_str())).collect();
    pairs.sort_by(|a, b| a.0.cmp(b.0));

    serde_urlencoded::to_string(pairs).map_err(|e| RestError::InvalidUrl(e.to_string()))
}

/// Runs logical calls against the API
///
/// Shares one signer and one rate limiter across every call; safe to use
/// from many tasks at once.
#[derive(Debug)]
pub struct RequestExecutor {
    transport: Arc<dyn HttpTransport>,
    signer: RequestSigner,
    limiter: RateLimiter,
    base_url: Url,
    retry: RetryPolicy,
}

impl RequestExecutor {
    /// Create an executor
    ///
    /// # Errors
    /// Fails if `base_url` is not an absolute http(s) URL.
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        signer: RequestSigner,
        limiter: RateLimiter,
        base_url: &str,
    ) -> RestResult<Self> {
        Ok(Self {
            transport,
            signer,
            limiter,
            base_url: parse_base_url(base_url)?,
            retry: RetryPolicy::default(),
        })
    }

    /// Get the signer
    pub fn signer(&self) -> &RequestSigner {
        &self.signer
    }

    /// Get the shared rate limiter
    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Get the base URL
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Get the retry schedule
    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Full URL and signed path (`/path?query`) for a request
    ///
    /// Query parameters written into `request.path` are kept and sorted
    /// together with `request.query`.
    pub fn resolve(&self, request: &ApiRequest) -> RestResult<(Url, String)> {
        let joined = format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            request.path.trim_start_matches('/')
        );
        let mut url = Url::parse(&joined).map_err(|e| RestError::InvalidUrl(format!("{joined}: {e}")))?;

        url.set_fragment(None);

        let inline: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        let query = encode_sorted(inline.iter().chain(request.query.iter()))?;
        url.set_query((!query.is_empty()).then_some(query.as_str()));

        let signed_path = match url.query() {
            Some(query) => format!("{}?{}", url.path(), query),
            None => url.path().to_string(),
        };

        Ok((url, signed_path))
    }

    /// Perform one logical call, returning the 2xx response body
    ///
    /// Transport failures, 429 and 5xx are retried with linear backoff; after
    /// the last attempt they surface as [`RestError::RetriesExhausted`]. Any
    /// other status is returned at once as [`RestError::Api`] or
    /// [`RestError::Unstructured`]. Cancellation aborts the wait, backoff or
    /// in-flight request and is never retried.
    #[instrument(skip_all, fields(method = %request.method, path = %request.path))]
    pub async fn execute(
        &self,
        request: &ApiRequest,
        cancel: &CancellationToken,
    ) -> RestResult<String> {
        let (url, signed_path) = self.resolve(request)?;
        let body = request.body.as_deref().unwrap_or("");

        let mut attempt = 0;
        loop {
            if attempt > 0 {
                let delay = self.retry.delay_for_attempt(attempt);
                debug!(attempt, ?delay, "Backing off before retry");
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(RestError::Cancelled),
                    _ = tokio::time::sleep(delay) => {}
                }
            }

            self.limiter.wait(cancel).await?;

            let headers = self
                .signer
                .sign(request.method.as_str(), &signed_path, body);
            let mut http_request = HttpRequest::new(request.method.clone(), url.as_str())
                .with_header("Content-Type", CONTENT_TYPE_JSON);
            for (name, value) in headers.pairs() {
                http_request = http_request.with_header(name, value);
            }
            if let Some(body) = &request.body {
                http_request = http_request.with_body(body.as_str());
            }

            debug!(attempt, "Dispatching request");
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(RestError::Cancelled),
                outcome = self.transport.send(http_request) => outcome,
            };

            let error = match outcome.map_err(RestError::from).and_then(classify) {
                Ok(body) => return Ok(body),
                Err(err) if err.is_retryable() => err,
                Err(err) => return Err(err),
            };

            if !self.retry.should_retry(attempt) {
                debug!(attempt, error = %error, "Giving up after final attempt");
                return Err(RestError::RetriesExhausted {
                    attempts: attempt + 1,
                    source: Box::new(error),
                });
            }

            debug!(attempt, error = %error, "Transient failure, will retry");
            attempt += 1;
        }
    }
}

/// Validate and normalize a base URL
pub(crate) fn parse_base_url(base_url: &str) -> RestResult<Url> {
    let url = Url::parse(base_url).map_err(|e| RestError::InvalidUrl(format!("{base_url}: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") || url.cannot_be_a_base() {
        return Err(RestError::InvalidUrl(format!(
            "{base_url}: expected an absolute http(s) URL"
        )));
    }
    Ok(url)
}

/// Map a fully-read response to its body or a classified error
fn classify(response: HttpResponse) -> RestResult<String> {
    let HttpResponse { status, body } = response;
    match status {
        200..=299 => Ok(body),
        429 => Err(RestError::RateLimited { body }),
        500..=u16::MAX => Err(RestError::Server { status, body }),
        _ => Err(match ApiError::parse(status, &body) {
            Some(err) => RestError::Api(err),
            None => RestError::Unstructured { status, body },
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{MockTransport, TransportError};
    use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
    use ed25519_dalek::{Signature, Verifier};
    use robinhood_auth::{generate_keypair, Credentials};
    use std::time::Duration;

    const VALIDATION_BODY: &str = r#"{"type":"validation_error","errors":[{"detail":"Must be a valid UUID.","attr":"client_order_id"}]}"#;

    fn executor(mock: &Arc<MockTransport>) -> RequestExecutor {
        let pair = generate_keypair();
        let creds = Credentials::new("rh-api-test", pair.private_key.as_str()).unwrap();
        RequestExecutor::new(
            mock.clone(),
            RequestSigner::new(creds),
            RateLimiter::permissive(),
            "https://trading.robinhood.com",
        )
        .unwrap()
    }

    #[test]
    fn test_resolve_sorts_and_encodes_query() {
        let mock = Arc::new(MockTransport::new());
        let executor = executor(&mock);

        let request = ApiRequest::get("/api/v1/crypto/trading/orders/")
            .with_query("symbol", "BTC-USD")
            .with_query("created_at_start", "2024-01-01T00:00:00Z")
            .with_query("symbol", "ETH USD");
        let (url, signed) = executor.resolve(&request).unwrap();

        assert_eq!(
            signed,
            "/api/v1/crypto/trading/orders/?created_at_start=2024-01-01T00%3A00%3A00Z&symbol=BTC-USD&symbol=ETH+USD"
        );
        assert_eq!(
            url.as_str(),
            format!("https://trading.robinhood.com{signed}")
        );

        let (_, signed) = executor
            .resolve(&ApiRequest::get("/api/v1/crypto/trading/accounts/"))
            .unwrap();
        assert_eq!(signed, "/api/v1/crypto/trading/accounts/");
    }

    #[test]
    fn test_resolve_keeps_query_written_in_path() {
        let mock = Arc::new(MockTransport::new());
        let executor = executor(&mock);

        let (url, signed) = executor
            .resolve(&ApiRequest::get("/api/v1/crypto/trading/orders/?symbol=BTC-USD"))
            .unwrap();
        assert_eq!(signed, "/api/v1/crypto/trading/orders/?symbol=BTC-USD");
        assert_eq!(
            url.as_str(),
            "https://trading.robinhood.com/api/v1/crypto/trading/orders/?symbol=BTC-USD"
        );

        let (url, signed) = executor
            .resolve(
                &ApiRequest::get("/api/v1/crypto/trading/orders/?symbol=BTC-USD")
                    .with_query("cursor", "abc"),
            )
            .unwrap();
        assert_eq!(
            signed,
            "/api/v1/crypto/trading/orders/?cursor=abc&symbol=BTC-USD"
        );
        assert_eq!(url.query(), Some("cursor=abc&symbol=BTC-USD"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_path_query_is_sent_and_signed() {
        let mock = Arc::new(MockTransport::new());
        mock.push_response(200, "[]");
        let executor = executor(&mock);

        executor
            .execute(
                &ApiRequest::get("/api/v1/crypto/trading/holdings/?asset_code=BTC"),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        let sent = &mock.requests()[0];
        assert_eq!(
            sent.url,
            "https://trading.robinhood.com/api/v1/crypto/trading/holdings/?asset_code=BTC"
        );

        let timestamp = sent.header("x-timestamp").unwrap();
        let message =
            format!("rh-api-test{timestamp}/api/v1/crypto/trading/holdings/?asset_code=BTCGET");
        let signature: [u8; 64] = BASE64
            .decode(sent.header("x-signature").unwrap())
            .unwrap()
            .try_into()
            .unwrap();
        assert!(executor
            .signer()
            .credentials()
            .verifying_key()
            .verify(message.as_bytes(), &Signature::from_bytes(&signature))
            .is_ok());
    }

    #[test]
    fn test_base_url_validation() {
        assert!(parse_base_url("https://trading.robinhood.com").is_ok());
        assert!(parse_base_url("http://127.0.0.1:8080/prefix").is_ok());
        assert!(matches!(
            parse_base_url("not a url"),
            Err(RestError::InvalidUrl(_))
        ));
        assert!(matches!(
            parse_base_url("ftp://example.com"),
            Err(RestError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_json_body_serialized_once() {
        let request = ApiRequest::post("/orders/")
            .json(&serde_json::json!({"symbol": "BTC-USD"}))
            .unwrap();
        assert_eq!(request.body.as_deref(), Some(r#"{"symbol":"BTC-USD"}"#));
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_is_single_dispatch() {
        let mock = Arc::new(MockTransport::new());
        mock.push_response(200, r#"{"ok":true}"#);
        let executor = executor(&mock);

        let body = executor
            .execute(&ApiRequest::get("/x/"), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(body, r#"{"ok":true}"#);
        assert_eq!(mock.request_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_404_is_not_retried() {
        let mock = Arc::new(MockTransport::new());
        mock.push_response(404, r#"{"type":"client_error","errors":[{"detail":"Not found.","attr":null}]}"#)
            .push_response(200, "{}");
        let executor = executor(&mock);

        let err = executor
            .execute(&ApiRequest::get("/x/"), &CancellationToken::new())
            .await
            .unwrap_err();

        let api = err.api_error().unwrap();
        assert_eq!(api.status, 404);
        assert_eq!(api.error_type, "client_error");
        assert_eq!(mock.request_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_validation_error_is_structured() {
        let mock = Arc::new(MockTransport::new());
        mock.push_response(400, VALIDATION_BODY);
        let executor = executor(&mock);

        let err = executor
            .execute(&ApiRequest::post("/orders/").with_body("{}"), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "API error (status 400): validation_error - client_order_id: Must be a valid UUID."
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_unstructured_error_keeps_raw_body() {
        let mock = Arc::new(MockTransport::new());
        mock.push_response(403, "<html>Forbidden</html>");
        let executor = executor(&mock);

        let err = executor
            .execute(&ApiRequest::get("/x/"), &CancellationToken::new())
            .await
            .unwrap_err();
        match err {
            RestError::Unstructured { status, body } => {
                assert_eq!(status, 403);
                assert_eq!(body, "<html>Forbidden</html>");
            }
            other => panic!("expected unstructured error, got {other:?}"),
        }
        assert_eq!(mock.request_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_three_500s_then_success() {
        let mock = Arc::new(MockTransport::new());
        mock.push_responses(3, 500, "boom").push_response(200, "[]");
        let executor = executor(&mock);

        let start = tokio::time::Instant::now();
        let body = executor
            .execute(&ApiRequest::get("/x/"), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(body, "[]");
        assert_eq!(mock.request_count(), 4);
        // 1s + 2s + 3s of backoff
        assert!(start.elapsed() >= Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn test_four_500s_exhaust_retries() {
        let mock = Arc::new(MockTransport::new());
        mock.push_responses(5, 500, "boom");
        let executor = executor(&mock);

        let err = executor
            .execute(&ApiRequest::get("/x/"), &CancellationToken::new())
            .await
            .unwrap_err();

        match &err {
            RestError::RetriesExhausted { attempts, source } => {
                assert_eq!(*attempts, 4);
                assert!(matches!(**source, RestError::Server { status: 500, .. }));
            }
            other => panic!("expected retries exhausted, got {other:?}"),
        }
        assert_eq!(mock.request_count(), 4);
        assert_eq!(mock.remaining(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_429_and_transport_errors_are_retried() {
        let mock = Arc::new(MockTransport::new());
        mock.push_response(429, "slow down")
            .push_error(TransportError::Timeout)
            .push_error(TransportError::Connect("refused".into()))
            .push_response(201, r#"{"id":"1"}"#);
        let executor = executor(&mock);

        let body = executor
            .execute(&ApiRequest::post("/orders/").with_body("{}"), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(body, r#"{"id":"1"}"#);
        assert_eq!(mock.request_count(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_every_attempt_is_signed_and_verifiable() {
        let mock = Arc::new(MockTransport::new());
        mock.push_response(503, "").push_response(200, "{}");
        let executor = executor(&mock);

        let request = ApiRequest::post("/api/v1/crypto/trading/orders/")
            .with_query("b", "2")
            .with_query("a", "1")
            .with_body(r#"{"side":"buy"}"#);
        executor
            .execute(&request, &CancellationToken::new())
            .await
            .unwrap();

        let verifying_key = executor.signer().credentials().verifying_key();
        let requests = mock.requests();
        assert_eq!(requests.len(), 2);

        for sent in &requests {
            assert_eq!(sent.header("content-type"), Some("application/json"));
            assert_eq!(sent.header("x-api-key"), Some("rh-api-test"));
            assert_eq!(sent.body.as_deref(), Some(r#"{"side":"buy"}"#));

            let timestamp = sent.header("x-timestamp").unwrap();
            let message = format!(
                "rh-api-test{timestamp}/api/v1/crypto/trading/orders/?a=1&b=2POST{{\"side\":\"buy\"}}"
            );
            let signature: [u8; 64] = BASE64
                .decode(sent.header("x-signature").unwrap())
                .unwrap()
                .try_into()
                .unwrap();
            assert!(verifying_key
                .verify(message.as_bytes(), &Signature::from_bytes(&signature))
                .is_ok());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_before_start() {
        let mock = Arc::new(MockTransport::new());
        mock.push_response(200, "{}");
        let executor = executor(&mock);

        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = executor
            .execute(&ApiRequest::get("/x/"), &cancel)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(mock.request_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_aborts_in_flight_request() {
        let mock = Arc::new(MockTransport::new());
        mock.push_stall().push_response(200, "{}");
        let executor = Arc::new(executor(&mock));

        let cancel = CancellationToken::new();
        let task = {
            let executor = Arc::clone(&executor);
            let cancel = cancel.clone();
            tokio::spawn(async move { executor.execute(&ApiRequest::get("/x/"), &cancel).await })
        };

        tokio::time::sleep(Duration::from_millis(100)).await;
        cancel.cancel();

        assert!(task.await.unwrap().unwrap_err().is_cancelled());
        assert_eq!(mock.request_count(), 1);
        assert_eq!(mock.remaining(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_backoff_stops_retries() {
        let mock = Arc::new(MockTransport::new());
        mock.push_response(500, "boom").push_response(200, "{}");
        let executor = Arc::new(executor(&mock));

        let cancel = CancellationToken::new();
        let task = {
            let executor = Arc::clone(&executor);
            let cancel = cancel.clone();
            tokio::spawn(async move { executor.execute(&ApiRequest::get("/x/"), &cancel).await })
        };

        // First backoff is 1s
        tokio::time::sleep(Duration::from_millis(500)).await;
        cancel.cancel();

        assert!(task.await.unwrap().unwrap_err().is_cancelled());
        assert_eq!(mock.request_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limiter_gates_dispatch() {
        let mock = Arc::new(MockTransport::new());
        mock.push_responses(2, 200, "{}");
        let pair = generate_keypair();
        let executor = RequestExecutor::new(
            mock.clone(),
            RequestSigner::new(Credentials::new("k", pair.private_key.as_str()).unwrap()),
            RateLimiter::per_interval(1, 1, Duration::from_secs(5)),
            "https://trading.robinhood.com",
        )
        .unwrap();

        let cancel = CancellationToken::new();
        let start = tokio::time::Instant::now();
        executor.execute(&ApiRequest::get("/x/"), &cancel).await.unwrap();
        executor.execute(&ApiRequest::get("/x/"), &cancel).await.unwrap();

        assert!(start.elapsed() >= Duration::from_millis(4990));
        assert_eq!(mock.request_count(), 2);
    }

    #[tokio::test]
    async fn test_exhausted_limiter_fails_without_dispatch() {
        let mock = Arc::new(MockTransport::new());
        mock.push_response(200, "{}");
        let executor = executor(&mock);
        executor.limiter().set_burst(0);

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            executor.execute(&ApiRequest::get("/x/"), &CancellationToken::new()),
        )
        .await
        .expect("execute returned");

        assert!(matches!(result, Err(RestError::RateLimitUnavailable)));
        assert_eq!(mock.request_count(), 0);
    }
}
