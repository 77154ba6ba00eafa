//! HTTP transport abstraction
//!
//! This module provides a trait-based abstraction over HTTP dispatch,
//! enabling unit testing of the request pipeline without real network calls.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use robinhood_rest::transport::{HttpRequest, HttpTransport, ReqwestTransport, TransportError};
//!
//! async fn example() -> Result<(), TransportError> {
//!     let transport = ReqwestTransport::new(Duration::from_secs(30), "example/0.1")?;
//!     let response = transport
//!         .send(HttpRequest::new(reqwest::Method::GET, "https://trading.robinhood.com/"))
//!         .await?;
//!     println!("{} {}", response.status, response.body);
//!     Ok(())
//! }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method};
use thiserror::Error;
use tracing::{instrument, trace};

/// Transport layer errors
///
/// Any of these means no HTTP status was received.
#[derive(Error, Debug)]
pub enum TransportError {
    /// Could not connect to the server
    #[error("connection failed: {0}")]
    Connect(String),

    /// Request did not complete within the configured timeout
    #[error("request timed out")]
    Timeout,

    /// Request failed before a response arrived
    #[error("request failed: {0}")]
    Request(String),

    /// Response body could not be read
    #[error("failed to read response body: {0}")]
    Body(String),

    /// Client could not be built
    #[error("failed to build HTTP client: {0}")]
    Build(String),
}

impl TransportError {
    fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_connect() {
            Self::Connect(err.to_string())
        } else {
            Self::Request(err.to_string())
        }
    }
}

/// A fully prepared HTTP request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl HttpRequest {
    /// Create a request without headers or body
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// Add a header
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Set the body
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Look up a header value (case-insensitive)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// A response whose body has been read in full
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    /// Create a response
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Check for a 2xx status
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Trait for HTTP transport abstraction
///
/// Implementations must read the whole body before returning so the
/// connection is released on every path.
#[async_trait]
pub trait HttpTransport: Send + Sync + std::fmt::Debug {
    /// Dispatch one request
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// Real HTTP transport using reqwest
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Create a transport with a per-request timeout and user agent
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| TransportError::Build(e.to_string()))?;

        Ok(Self { client })
    }

    /// Wrap an existing reqwest client
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    #[instrument(skip(self, request), fields(method = %request.method, url = %request.url))]
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut builder = self.client.request(request.method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(TransportError::from_reqwest)?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| TransportError::Body(e.to_string()))?;

        trace!(status, len = body.len(), "Response received");
        Ok(HttpResponse { status, body })
    }
}

/// Scripted outcome for [`MockTransport`]
#[cfg(any(test, feature = "test-utils"))]
#[derive(Debug)]
pub enum MockReply {
    /// Return this response
    Respond(HttpResponse),
    /// Fail with this error
    Fail(TransportError),
    /// Never complete (for cancellation tests)
    Stall,
}

/// Mock transport for testing
///
/// Replays scripted replies in order and records every request it sees.
/// Once the script is exhausted, requests fail with a transport error.
#[cfg(any(test, feature = "test-utils"))]
#[derive(Debug, Default)]
pub struct MockTransport {
    replies: parking_lot::Mutex<std::collections::VecDeque<MockReply>>,
    requests: parking_lot::Mutex<Vec<HttpRequest>>,
}

#[cfg(any(test, feature = "test-utils"))]
impl MockTransport {
    /// Create a mock with an empty script
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response
    pub fn push_response(&self, status: u16, body: impl Into<String>) -> &Self {
        self.replies
            .lock()
            .push_back(MockReply::Respond(HttpResponse::new(status, body)));
        self
    }

    /// Queue the same response `count` times
    pub fn push_responses(&self, count: usize, status: u16, body: &str) -> &Self {
        for _ in 0..count {
            self.push_response(status, body);
        }
        self
    }

    /// Queue a transport failure
    pub fn push_error(&self, error: TransportError) -> &Self {
        self.replies.lock().push_back(MockReply::Fail(error));
        self
    }

    /// Queue a request that never completes
    pub fn push_stall(&self) -> &Self {
        self.replies.lock().push_back(MockReply::Stall);
        self
    }

    /// Requests dispatched so far
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().clone()
    }

    /// Number of requests dispatched so far
    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// Number of scripted replies not yet consumed
    pub fn remaining(&self) -> usize {
        self.replies.lock().len()
    }
}

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.requests.lock().push(request);
        let reply = self.replies.lock().pop_front();

        match reply {
            Some(MockReply::Respond(response)) => Ok(response),
            Some(MockReply::Fail(error)) => Err(error),
            Some(MockReply::Stall) => std::future::pending().await,
            None => Err(TransportError::Request("mock script exhausted".into())),
        }
    }
}
