//! Request execution against the FAC API
//!
//! The network boundary is the [`Transport`] trait: one GET, raw status,
//! headers of interest and body text. [`fac_http::FacHttpClient`] builds on it
//! to validate endpoints, classify failures and cooperate with rate limiting.

use async_trait::async_trait;

pub mod fac_config;
pub mod fac_http;
pub mod query;
pub mod retry_formatter;

/// Failures raised at the transport layer, before any HTTP status exists
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum TransportError {
    /// Connection refused, DNS resolution failure, TLS handshake failure
    #[error("connection failed: {0}")]
    Connect(String),

    /// Request did not complete within the configured timeout
    #[error("timed out: {0}")]
    Timeout(String),

    /// Any other failure while sending or reading the request
    #[error("request failed: {0}")]
    Other(String),
}

/// Fetcher errors
///
/// One variant per failure class of the remote service. Callers match on the
/// variant; the message is for humans.
#[derive(Debug, thiserror::Error)]
pub enum FetcherError {
    /// Required configuration (e.g. the API key) is missing or invalid
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Endpoint name is not in the endpoint descriptor
    #[error("unknown endpoint '{name}'. Available: {available}")]
    InvalidEndpoint {
        /// Name as supplied by the caller
        name: String,
        /// Comma-separated list of valid names
        available: String,
    },

    /// Caller supplied an argument the query builders cannot express
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// HTTP 401
    #[error("authentication failed for {endpoint}; check the API key")]
    AuthenticationFailure {
        /// Endpoint name
        endpoint: String,
    },

    /// HTTP 429 that was not (or could not be) waited out
    #[error("rate limit exceeded for {endpoint}")]
    RateLimited {
        /// Endpoint name
        endpoint: String,
        /// Raw `Retry-After` value, if the server sent one
        retry_after: Option<String>,
    },

    /// HTTP 404
    #[error("endpoint not found: {endpoint}")]
    NotFound {
        /// Endpoint name
        endpoint: String,
    },

    /// Any other 4xx/5xx status
    #[error("HTTP {status} error for {endpoint}: {message}")]
    Http {
        /// Endpoint name
        endpoint: String,
        /// HTTP status code
        status: u16,
        /// Response body excerpt
        message: String,
    },

    /// Could not reach the service
    #[error("failed to connect to FAC API ({endpoint}): {source}")]
    ConnectionFailure {
        /// Endpoint name
        endpoint: String,
        /// Transport-level cause
        #[source]
        source: TransportError,
    },

    /// Request timed out
    #[error("request timeout for {endpoint}: {source}")]
    Timeout {
        /// Endpoint name
        endpoint: String,
        /// Transport-level cause
        #[source]
        source: TransportError,
    },

    /// Successful status but the body is not a JSON array
    #[error("malformed response from {endpoint}: {message}")]
    MalformedResponse {
        /// Endpoint name
        endpoint: String,
        /// What was wrong with the body
        message: String,
    },

    /// Generic request failure not covered above
    #[error("request failed for {endpoint}: {source}")]
    Request {
        /// Endpoint name
        endpoint: String,
        /// Transport-level cause
        #[source]
        source: TransportError,
    },

    /// Cancellation was requested while waiting
    #[error("cancelled while waiting on {endpoint}")]
    Cancelled {
        /// Endpoint name
        endpoint: String,
    },
}

impl FetcherError {
    /// Map a transport failure onto the taxonomy
    pub fn from_transport(endpoint: &str, source: TransportError) -> Self {
        let endpoint = endpoint.to_string();
        match source {
            TransportError::Connect(_) => FetcherError::ConnectionFailure { endpoint, source },
            TransportError::Timeout(_) => FetcherError::Timeout { endpoint, source },
            TransportError::Other(_) => FetcherError::Request { endpoint, source },
        }
    }

    /// True for connection and timeout failures
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            FetcherError::ConnectionFailure { .. } | FetcherError::Timeout { .. }
        )
    }
}

/// Result type for fetcher operations
pub type FetcherResult<T> = Result<T, FetcherError>;

/// Raw HTTP response as seen by the request executor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    /// HTTP status code
    pub status: u16,
    /// `Retry-After` header value, if present
    pub retry_after: Option<String>,
    /// Body text
    pub body: String,
}

impl RawResponse {
    /// Successful response carrying `body`
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            retry_after: None,
            body: body.into(),
        }
    }

    /// Response with an arbitrary status and empty body
    pub fn status(status: u16) -> Self {
        Self {
            status,
            retry_after: None,
            body: String::new(),
        }
    }

    /// HTTP 429 with an optional `Retry-After` value
    pub fn too_many_requests(retry_after: Option<&str>) -> Self {
        Self {
            status: 429,
            retry_after: retry_after.map(str::to_string),
            body: String::new(),
        }
    }
}

/// Network boundary for a single GET request
///
/// The production implementation is [`fac_http::ReqwestTransport`]; tests
/// substitute scripted fakes.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Issue one GET against `url` with the given query parameters
    async fn get(&self, url: &str, params: &[(String, String)])
        -> Result<RawResponse, TransportError>;
}
