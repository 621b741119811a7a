//! Failure classification and retry log messages for batch collection.
//!
//! The batch collector retries only network-class failures. This module
//! decides which failures those are and renders the retry/failure lines
//! operators read when a long run degrades.

use std::time::Duration;

use crate::fetcher::FetcherError;

/// Classification of a failed request for retry decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryErrorType {
    /// Request timed out
    NetworkTimeout,
    /// Connection refused, DNS failure, or other offline scenarios
    NetworkOffline,
    /// HTTP 429 that could not be waited out
    RateLimit,
    /// HTTP 5xx
    ServerError(u16),
    /// HTTP 401
    AuthFailed,
    /// HTTP 404
    NotFound,
    /// Other HTTP 4xx
    ClientError(u16),
    /// Caller error: bad endpoint, bad arguments, bad configuration
    InvalidRequest,
    /// Body was not a JSON array
    MalformedBody,
    /// Shutdown requested mid-request
    Cancelled,
    /// Anything else at the transport layer
    RequestFailed,
}

impl RetryErrorType {
    /// Classify a fetcher error.
    pub fn from_error(err: &FetcherError) -> Self {
        match err {
            FetcherError::Timeout { .. } => Self::NetworkTimeout,
            FetcherError::ConnectionFailure { .. } => Self::NetworkOffline,
            FetcherError::RateLimited { .. } => Self::RateLimit,
            FetcherError::AuthenticationFailure { .. } => Self::AuthFailed,
            FetcherError::NotFound { .. } => Self::NotFound,
            FetcherError::Http { status, .. } if *status >= 500 => Self::ServerError(*status),
            FetcherError::Http { status, .. } => Self::ClientError(*status),
            FetcherError::Configuration(_)
            | FetcherError::InvalidEndpoint { .. }
            | FetcherError::InvalidArgument(_) => Self::InvalidRequest,
            FetcherError::MalformedResponse { .. } => Self::MalformedBody,
            FetcherError::Cancelled { .. } => Self::Cancelled,
            FetcherError::Request { .. } => Self::RequestFailed,
        }
    }

    /// Short description used inside log lines.
    pub fn description(&self) -> &'static str {
        match self {
            Self::NetworkTimeout => "network timeout",
            Self::NetworkOffline => "connection failed",
            Self::RateLimit => "rate limit exceeded",
            Self::ServerError(code) => match code {
                500 => "internal server error",
                502 => "bad gateway",
                503 => "service unavailable",
                504 => "gateway timeout",
                _ => "server error",
            },
            Self::AuthFailed => "authentication failed",
            Self::NotFound => "resource not found",
            Self::ClientError(_) => "client error",
            Self::InvalidRequest => "invalid request",
            Self::MalformedBody => "malformed response",
            Self::Cancelled => "cancelled",
            Self::RequestFailed => "request failed",
        }
    }

    /// Suggested remediation shown after a batch is given up on.
    pub fn suggestion(&self) -> &'static str {
        match self {
            Self::NetworkTimeout => "Raise --timeout-secs or check network latency to api.fac.gov",
            Self::NetworkOffline => "Verify internet connectivity and DNS resolution",
            Self::RateLimit => "Wait before re-running; the server asked for fewer requests",
            Self::ServerError(_) => "The clearinghouse may be degraded, try again later",
            Self::AuthFailed => "Verify the API_KEY_FAC value",
            Self::NotFound => "Check the endpoint name against the API documentation",
            Self::ClientError(_) => "Reduce --batch-size; very long id lists can be rejected",
            Self::InvalidRequest => "Check the command arguments",
            Self::MalformedBody => "Re-run the batch; the server returned an unexpected body",
            Self::Cancelled => "Re-run the failed batches from the checkpoint",
            Self::RequestFailed => "Check network connectivity and try again",
        }
    }

    /// Whether the batch collector retries this failure with backoff.
    ///
    /// Only connection and timeout failures are transient from the batch
    /// loop's point of view; 429 is already handled below it.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::NetworkTimeout | Self::NetworkOffline)
    }
}

/// Context for one failed batch attempt.
#[derive(Debug, Clone)]
pub struct BatchRetryContext {
    /// 1-based batch number
    pub batch_number: usize,
    /// Total batches in the run
    pub total_batches: usize,
    /// 1-based attempt number
    pub attempt: u32,
    /// Configured attempt cap
    pub max_attempts: u32,
    /// Classified failure
    pub error_type: RetryErrorType,
    /// Delay before the next attempt
    pub backoff: Duration,
    /// Number of report ids in the batch
    pub batch_len: usize,
    /// Original error text
    pub error_message: String,
}

impl BatchRetryContext {
    /// Build a context from a fetcher error.
    pub fn new(
        batch_number: usize,
        total_batches: usize,
        attempt: u32,
        max_attempts: u32,
        backoff: Duration,
        batch_len: usize,
        err: &FetcherError,
    ) -> Self {
        Self {
            batch_number,
            total_batches,
            attempt,
            max_attempts,
            error_type: RetryErrorType::from_error(err),
            backoff,
            batch_len,
            error_message: err.to_string(),
        }
    }

    /// "Retrying batch 3/40 (attempt 1/3) after connection failed - waiting 5.0 seconds..."
    pub fn format_retry(&self) -> String {
        format!(
            "Retrying batch {}/{} (attempt {}/{}) after {} - waiting {:.1} seconds...",
            self.batch_number,
            self.total_batches,
            self.attempt,
            self.max_attempts,
            self.error_type.description(),
            self.backoff.as_secs_f64()
        )
    }

    /// Multi-line summary for a batch that is given up on.
    pub fn format_failure(&self) -> String {
        [
            format!(
                "[FAILED] Batch {}/{} ({} report ids) after {} attempt(s)",
                self.batch_number, self.total_batches, self.batch_len, self.attempt
            ),
            format!("  Last error: {}", self.error_message),
            format!("  Suggestion: {}", self.error_type.suggestion()),
        ]
        .join("\n")
    }
}
