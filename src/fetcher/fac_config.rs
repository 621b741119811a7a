//! FAC client configuration
//!
//! Everything the request executor needs is carried in one immutable
//! [`ClientConfig`]: host, credentials, endpoint descriptor, partition keys
//! and timeouts. Nothing is read from ambient state after construction.

use std::fmt;
use std::time::Duration;

use crate::fetcher::{FetcherError, FetcherResult};
use crate::jurisdiction::Jurisdiction;
use crate::{YearRange, MAX_SINGLE_REQUEST_SIZE};

/// Production API host
pub const DEFAULT_BASE_URL: &str = "https://api.fac.gov";

/// Header carrying the API key on every request
pub const API_KEY_HEADER: &str = "X-API-Key";

/// Environment variable holding the API key
pub const API_KEY_ENV: &str = "API_KEY_FAC";

/// Optional environment override for the API host
pub const BASE_URL_ENV: &str = "FAC_BASE_URL";

/// Default overall request timeout
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default TCP connect timeout
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Resource name to remote path
///
/// Names are matched case-insensitively after trimming.
pub const ENDPOINTS: [(&str, &str); 10] = [
    ("general", "/general"),
    ("federal_awards", "/federal_awards"),
    ("additional_eins", "/additional_eins"),
    ("additional_ueis", "/additional_ueis"),
    ("corrective_action_plans", "/corrective_action_plans"),
    ("findings", "/findings"),
    ("findings_text", "/findings_text"),
    ("notes_to_sefa", "/notes_to_sefa"),
    ("passthrough", "/passthrough"),
    ("secondary_auditors", "/secondary_auditors"),
];

/// Normalize an endpoint name and look up its remote path
///
/// Returns the canonical (lowercase) name together with the path.
pub fn resolve_endpoint(name: &str) -> FetcherResult<(&'static str, &'static str)> {
    let normalized = name.trim().to_lowercase();
    ENDPOINTS
        .iter()
        .find(|(n, _)| *n == normalized)
        .copied()
        .ok_or_else(|| FetcherError::InvalidEndpoint {
            name: name.to_string(),
            available: ENDPOINTS
                .iter()
                .map(|(n, _)| *n)
                .collect::<Vec<_>>()
                .join(", "),
        })
}

/// Immutable client configuration
#[derive(Clone)]
pub struct ClientConfig {
    base_url: String,
    api_key: String,
    jurisdictions: Vec<Jurisdiction>,
    years: YearRange,
    request_timeout: Duration,
    connect_timeout: Duration,
    max_single_request_size: usize,
}

impl ClientConfig {
    /// Build a configuration for `api_key` with production defaults
    ///
    /// # Errors
    /// Returns [`FetcherError::Configuration`] if the key is blank.
    pub fn new(api_key: impl Into<String>) -> FetcherResult<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(FetcherError::Configuration(format!(
                "API key is required. Set {API_KEY_ENV} environment variable."
            )));
        }

        Ok(Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.trim().to_string(),
            jurisdictions: Jurisdiction::all(),
            years: YearRange::through_current_year(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            max_single_request_size: MAX_SINGLE_REQUEST_SIZE,
        })
    }

    /// Read the API key (and optional host override) from the environment
    pub fn from_env() -> FetcherResult<Self> {
        let api_key = std::env::var(API_KEY_ENV).unwrap_or_default();
        let config = Self::new(api_key)?;
        match std::env::var(BASE_URL_ENV) {
            Ok(url) if !url.trim().is_empty() => Ok(config.with_base_url(url)),
            _ => Ok(config),
        }
    }

    /// Override the API host; a trailing slash is dropped
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim().trim_end_matches('/').to_string();
        self
    }

    /// Restrict sweeps to the given jurisdictions, in the given order
    pub fn with_jurisdictions(mut self, jurisdictions: Vec<Jurisdiction>) -> Self {
        self.jurisdictions = jurisdictions;
        self
    }

    /// Restrict sweeps to the given audit years
    pub fn with_years(mut self, years: YearRange) -> Self {
        self.years = years;
        self
    }

    /// Overall per-request timeout
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// TCP connect timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// API host without trailing slash
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// API key sent under [`API_KEY_HEADER`]
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Jurisdictions in sweep order
    pub fn jurisdictions(&self) -> &[Jurisdiction] {
        &self.jurisdictions
    }

    /// Audit years covered by sweeps
    pub fn years(&self) -> YearRange {
        self.years
    }

    /// Overall request timeout
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Connect timeout
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// Server-side row cap per request
    pub fn max_single_request_size(&self) -> usize {
        self.max_single_request_size
    }

    /// Full URL for a resolved endpoint path
    pub fn url_for(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

// The key never appears in logs.
impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("jurisdictions", &self.jurisdictions.len())
            .field("years", &self.years)
            .field("request_timeout", &self.request_timeout)
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}
