//! Rate-limit policy for HTTP 429 responses
//!
//! The FAC API answers bursts with 429 and a `Retry-After` header in seconds.
//! Whether to wait that out, and for how many rounds, is a per-call policy.

use std::time::Duration;

/// How many 429 rounds to wait out before giving up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryLimit {
    /// Keep waiting for as long as the server keeps asking
    Unlimited,
    /// Give up after this many waits
    Limited(u32),
}

impl RetryLimit {
    /// Whether another wait is allowed after `waits_so_far` waits
    pub fn allows(&self, waits_so_far: u32) -> bool {
        match self {
            RetryLimit::Unlimited => true,
            RetryLimit::Limited(max) => waits_so_far < *max,
        }
    }
}

/// What the request executor does on HTTP 429
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RateLimitPolicy {
    /// Surface [`crate::fetcher::FetcherError::RateLimited`] immediately
    #[default]
    Fail,
    /// Sleep for the server's `Retry-After` and reissue the same request
    WaitAndRetry(RetryLimit),
}

impl RateLimitPolicy {
    /// Policy used by collectors: wait indefinitely
    pub const PATIENT: RateLimitPolicy = RateLimitPolicy::WaitAndRetry(RetryLimit::Unlimited);

    /// `handle_429 = true` waits indefinitely; `false` fails fast
    pub fn from_handle_429(handle_429: bool) -> Self {
        if handle_429 {
            Self::PATIENT
        } else {
            RateLimitPolicy::Fail
        }
    }
}

/// Parse a `Retry-After` value given in seconds
///
/// Accepts any finite, non-negative number (fractions allowed). HTTP-date
/// values and garbage yield `None`, which callers treat as "no usable hint".
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    let secs: f64 = value.trim().parse().ok()?;
    if !secs.is_finite() || secs < 0.0 {
        return None;
    }
    Duration::try_from_secs_f64(secs).ok()
}
