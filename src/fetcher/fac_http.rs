//! FAC HTTP client: request executor and rate-limit handler
//!
//! [`FacHttpClient::query`] is the single entry point every collector uses:
//!
//! 1. Validate the endpoint name before any network activity
//! 2. Issue one GET through the configured [`Transport`]
//! 3. Classify the outcome into [`FetcherError`]
//! 4. On HTTP 429, consult the [`RateLimitPolicy`]: wait for exactly the
//!    server's `Retry-After` and reissue the identical request, or fail
//!
//! Exactly one record vector or one error comes out, however many silent
//! rate-limit rounds happened inside.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, RETRY_AFTER};
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::downloader::rate_limit::{parse_retry_after, RateLimitPolicy};
use crate::downloader::sleep::{Pause, Sleeper};
use crate::fetcher::fac_config::{resolve_endpoint, ClientConfig, API_KEY_HEADER};
use crate::fetcher::query::{FederalAwardsQuery, FilterSet, GeneralQuery};
use crate::fetcher::{FetcherError, FetcherResult, RawResponse, Transport, TransportError};
use crate::metrics;
use crate::shutdown::SharedShutdown;
use crate::Record;

/// Longest body excerpt carried in an HTTP error
const ERROR_BODY_EXCERPT: usize = 200;

/// [`Transport`] backed by a shared reqwest client
///
/// The API key header and both timeouts are fixed at construction.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Build a client carrying the API key on every request
    ///
    /// # Errors
    /// [`FetcherError::Configuration`] if the key is not a valid header value
    /// or the TLS backend cannot be initialized.
    pub fn new(config: &ClientConfig) -> FetcherResult<Self> {
        let mut key = HeaderValue::from_str(config.api_key()).map_err(|e| {
            FetcherError::Configuration(format!("API key is not a valid header value: {e}"))
        })?;
        key.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(API_KEY_HEADER, key);

        let client = Client::builder()
            .default_headers(headers)
            .connect_timeout(config.connect_timeout())
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| {
                FetcherError::Configuration(format!("Failed to build HTTP client: {e}"))
            })?;

        Ok(Self { client })
    }
}

fn classify_reqwest_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout(err.to_string())
    } else if err.is_connect() {
        TransportError::Connect(err.to_string())
    } else {
        TransportError::Other(err.to_string())
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn get(
        &self,
        url: &str,
        params: &[(String, String)],
    ) -> Result<RawResponse, TransportError> {
        let response = self
            .client
            .get(url)
            .query(params)
            .send()
            .await
            .map_err(classify_reqwest_error)?;

        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.text().await.map_err(classify_reqwest_error)?;

        Ok(RawResponse {
            status,
            retry_after,
            body,
        })
    }
}

/// Request executor for the FAC API
pub struct FacHttpClient {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
    pause: Pause,
}

impl FacHttpClient {
    /// Create a client over an explicit transport
    pub fn new(config: ClientConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            config,
            transport,
            pause: Pause::default(),
        }
    }

    /// Create a client talking to the real API through reqwest
    pub fn from_config(config: ClientConfig) -> FetcherResult<Self> {
        let transport = ReqwestTransport::new(&config)?;
        Ok(Self::new(config, Arc::new(transport)))
    }

    /// Replace the sleeper used for rate-limit waits
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.pause = self.pause.with_sleeper(sleeper);
        self
    }

    /// Let a shutdown request interrupt rate-limit waits
    pub fn with_shutdown(mut self, shutdown: SharedShutdown) -> Self {
        self.pause = self.pause.with_shutdown(shutdown);
        self
    }

    /// Client configuration
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Whether a shutdown has been requested
    pub fn is_cancelled(&self) -> bool {
        self.pause.is_cancelled()
    }

    /// Run one filtered query against `endpoint`
    ///
    /// # Errors
    /// See [`FetcherError`]. A successful status with a body that is not a
    /// JSON array is not an error: it yields an empty vector and a warning.
    pub async fn query(
        &self,
        endpoint: &str,
        filters: &FilterSet,
        policy: RateLimitPolicy,
    ) -> FetcherResult<Vec<Record>> {
        let (name, path) = resolve_endpoint(endpoint)?;
        let url = self.config.url_for(path);
        let params = filters.to_query_params();
        let mut waits: u32 = 0;

        loop {
            debug!(endpoint = name, params = params.len(), "Sending GET request");

            let response = match self.transport.get(&url, &params).await {
                Ok(response) => response,
                Err(e) => {
                    metrics::record_request(name, "network_error");
                    return Err(FetcherError::from_transport(name, e));
                }
            };
            metrics::record_request(name, &response.status.to_string());

            match response.status {
                200..=299 => return Ok(lenient_records(name, &response.body)),
                401 => {
                    return Err(FetcherError::AuthenticationFailure {
                        endpoint: name.to_string(),
                    })
                }
                404 => {
                    return Err(FetcherError::NotFound {
                        endpoint: name.to_string(),
                    })
                }
                429 => {
                    let rate_limited = || FetcherError::RateLimited {
                        endpoint: name.to_string(),
                        retry_after: response.retry_after.clone(),
                    };

                    let limit = match policy {
                        RateLimitPolicy::Fail => {
                            metrics::record_rate_limited(name, None);
                            return Err(rate_limited());
                        }
                        RateLimitPolicy::WaitAndRetry(limit) => limit,
                    };

                    let Some(wait) = response.retry_after.as_deref().and_then(parse_retry_after)
                    else {
                        metrics::record_rate_limited(name, None);
                        warn!(
                            endpoint = name,
                            retry_after = ?response.retry_after,
                            "Rate limited without a usable Retry-After; giving up on this request"
                        );
                        return Err(rate_limited());
                    };

                    if !limit.allows(waits) {
                        metrics::record_rate_limited(name, None);
                        warn!(endpoint = name, waits, "Rate-limit wait budget exhausted");
                        return Err(rate_limited());
                    }

                    metrics::record_rate_limited(name, Some(wait));
                    info!(
                        endpoint = name,
                        wait_secs = wait.as_secs_f64(),
                        "Rate limit hit; waiting as requested by server"
                    );
                    if !self.pause.wait(wait).await {
                        return Err(FetcherError::Cancelled {
                            endpoint: name.to_string(),
                        });
                    }
                    waits += 1;
                }
                status => {
                    return Err(FetcherError::Http {
                        endpoint: name.to_string(),
                        status,
                        message: excerpt(&response.body),
                    })
                }
            }
        }
    }

    /// Query the `general` endpoint
    pub async fn get_general(
        &self,
        query: &GeneralQuery,
        handle_429: bool,
    ) -> FetcherResult<Vec<Record>> {
        let filters = query.build()?;
        self.query("general", &filters, RateLimitPolicy::from_handle_429(handle_429))
            .await
    }

    /// Query the `federal_awards` endpoint
    pub async fn get_federal_awards(
        &self,
        query: &FederalAwardsQuery,
        handle_429: bool,
    ) -> FetcherResult<Vec<Record>> {
        let filters = query.build()?;
        self.query(
            "federal_awards",
            &filters,
            RateLimitPolicy::from_handle_429(handle_429),
        )
        .await
    }
}

/// Decode a successful body into records
///
/// # Errors
/// [`FetcherError::MalformedResponse`] if the body is not JSON or not an array.
pub fn decode_records(endpoint: &str, body: &str) -> FetcherResult<Vec<Record>> {
    let malformed = |message: String| FetcherError::MalformedResponse {
        endpoint: endpoint.to_string(),
        message,
    };

    let value: Value =
        serde_json::from_str(body).map_err(|e| malformed(format!("invalid JSON: {e}")))?;

    let items = match value {
        Value::Array(items) => items,
        other => {
            return Err(malformed(format!(
                "expected a JSON array, got {}",
                json_kind(&other)
            )))
        }
    };

    let total = items.len();
    let records: Vec<Record> = items
        .into_iter()
        .filter_map(|item| match item {
            Value::Object(map) => Some(map),
            _ => None,
        })
        .collect();

    if records.len() < total {
        warn!(
            endpoint,
            skipped = total - records.len(),
            "Skipped non-object elements in response array"
        );
    }

    Ok(records)
}

fn lenient_records(endpoint: &str, body: &str) -> Vec<Record> {
    match decode_records(endpoint, body) {
        Ok(records) => {
            debug!(endpoint, records = records.len(), "Request succeeded");
            records
        }
        Err(e) => {
            warn!(endpoint, error = %e, "Unexpected response shape; returning no records");
            Vec::new()
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn excerpt(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= ERROR_BODY_EXCERPT {
        trimmed.to_string()
    } else {
        let cut: String = trimmed.chars().take(ERROR_BODY_EXCERPT).collect();
        format!("{cut}...")
    }
}
