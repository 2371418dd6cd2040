//! HTTP transport for SOAP calls.
//!
//! The [`Transport`] trait is the seam between the SOAP client and the
//! network: it takes an operation name and an encoded envelope and returns
//! the raw response body. [`HttpTransport`] implements it with `reqwest`.
//!
//! # Retry Logic
//!
//! The transport retries failures where the server did not process the call:
//! - HTTP 429 (rate limit): Exponential backoff starting at 100ms
//! - HTTP 502/503/504: Fixed 500ms delay
//! - Connection errors: Exponential backoff
//!
//! Timeouts and other errors are not retried, since the call may already
//! have taken effect.
//!
//! # Security
//!
//! The payload carries the password; it is never logged, and response
//! bodies are sanitized before they end up in errors.

use std::future::Future;
use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode};

use crate::config::Config;
use crate::error::MantisError;

/// Path of the SOAP endpoint below the Mantis base URL.
pub const SOAP_PATH: &str = "/api/soap/mantisconnect.php";

/// Maximum number of attempts for transient failures.
const MAX_RETRY_ATTEMPTS: u32 = 3;

/// Initial delay for exponential backoff (milliseconds).
const INITIAL_BACKOFF_MS: u64 = 100;

/// Delay before retrying after server error (milliseconds).
const SERVER_ERROR_DELAY_MS: u64 = 500;

/// Maximum length for HTTP error response bodies kept in errors.
const MAX_ERROR_BODY_LEN: usize = 500;

/// Sends an encoded envelope and returns the response body.
///
/// Implementations must be cancel-safe: dropping the returned future aborts
/// the call.
pub trait Transport: Send + Sync {
    /// Performs one remote call.
    ///
    /// A SOAP fault is a successful transport result; it is returned as the
    /// body and decoded by the caller.
    fn call(
        &self,
        operation: &str,
        payload: Vec<u8>,
    ) -> impl Future<Output = Result<String, MantisError>> + Send;
}

/// SOAP over HTTP(S) with `reqwest`.
#[derive(Clone)]
pub struct HttpTransport {
    /// The underlying HTTP client (cloning is cheap).
    http: Client,

    /// Full endpoint URL (`<base>/api/soap/mantisconnect.php`).
    endpoint: String,

    /// Configured request timeout, reported in `Timeout` errors.
    timeout: Duration,

    /// Secret redacted from error bodies.
    /// SECURITY: Never log this value!
    secret: String,
}

impl HttpTransport {
    /// Creates a transport from configuration.
    ///
    /// # Errors
    ///
    /// Returns `MantisError::HttpClient` if the HTTP client fails to initialize.
    pub fn new(config: &Config) -> Result<Self, MantisError> {
        Self::with_endpoint(
            Self::endpoint_url(&config.base_url),
            config.timeout,
            config.password(),
        )
    }

    /// Creates a transport for an explicit endpoint URL.
    ///
    /// # Errors
    ///
    /// Returns `MantisError::HttpClient` if the HTTP client fails to initialize.
    pub fn with_endpoint(
        endpoint: impl Into<String>,
        timeout: Duration,
        secret: impl Into<String>,
    ) -> Result<Self, MantisError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(MantisError::HttpClient)?;

        Ok(Self {
            http,
            endpoint: endpoint.into(),
            timeout,
            secret: secret.into(),
        })
    }

    /// Appends the SOAP endpoint path to a base URL, unless already present.
    pub fn endpoint_url(base_url: &str) -> String {
        let url = base_url.trim_end_matches('/');
        if url.ends_with(SOAP_PATH) {
            url.to_string()
        } else {
            format!("{}{}", url, SOAP_PATH)
        }
    }

    /// The endpoint URL calls are posted to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Executes an operation with retry logic for transient failures.
    async fn with_retry<T, F, Fut>(&self, operation: &str, f: F) -> Result<T, MantisError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, MantisError>>,
    {
        let mut delay = Duration::from_millis(INITIAL_BACKOFF_MS);
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            match f().await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_retryable() && attempts < MAX_RETRY_ATTEMPTS => {
                    let actual_delay = if e.is_rate_limit() {
                        e.retry_after().unwrap_or(delay)
                    } else if matches!(e, MantisError::ServiceUnavailable { .. }) {
                        Duration::from_millis(SERVER_ERROR_DELAY_MS)
                    } else {
                        delay
                    };

                    tracing::debug!(
                        operation = operation,
                        attempt = attempts,
                        max_attempts = MAX_RETRY_ATTEMPTS,
                        delay_ms = actual_delay.as_millis() as u64,
                        error = %e.sanitized_display(&self.secret),
                        "Retrying after transient error"
                    );

                    tokio::time::sleep(actual_delay).await;

                    if !matches!(e, MantisError::ServiceUnavailable { .. }) {
                        delay *= 2;
                    }
                }
                Err(e) => {
                    if attempts > 1 {
                        tracing::debug!(
                            operation = operation,
                            attempts = attempts,
                            "All retry attempts exhausted"
                        );
                    }
                    return Err(e);
                }
            }
        }
    }

    /// Posts the envelope once, without retries.
    async fn post(&self, operation: &str, payload: Vec<u8>) -> Result<String, MantisError> {
        tracing::debug!(
            operation = operation,
            bytes = payload.len(),
            "Sending SOAP request"
        );

        let response = self
            .http
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "text/xml; charset=utf-8")
            .header("SOAPAction", format!("\"{}/{}\"", self.endpoint, operation))
            .body(payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    return MantisError::timeout(self.timeout, operation);
                }
                MantisError::Transport(e)
            })?;
        let status = response.status();

        if status.is_success() {
            let body = response.text().await.map_err(MantisError::Transport)?;
            tracing::trace!(operation = operation, body = %body, "SOAP response");
            return Ok(body);
        }

        // SOAP 1.1 reports faults with HTTP 500; the body is decoded upstream.
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            let retry_after = retry_after_header(&response);
            let body = response.text().await.unwrap_or_default();
            if looks_like_fault(&body) {
                tracing::debug!(operation = operation, "SOAP fault response");
                return Ok(body);
            }
            return Err(self.classify(status, retry_after, body));
        }

        let retry_after = retry_after_header(&response);
        let body = response.text().await.unwrap_or_default();
        Err(self.classify(status, retry_after, body))
    }

    /// Converts a non-success HTTP response into a `MantisError`.
    ///
    /// Classifies errors into specific types for proper retry handling.
    fn classify(
        &self,
        status: StatusCode,
        retry_after: Option<Duration>,
        body: String,
    ) -> MantisError {
        // Sanitize the body to ensure no password leakage
        let body = MantisError::sanitize_message(&body, &self.secret);
        let body = truncate(body, MAX_ERROR_BODY_LEN);

        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => MantisError::Authentication,
            StatusCode::TOO_MANY_REQUESTS => {
                tracing::warn!("Rate limited by Mantis server");
                MantisError::RateLimited { retry_after }
            }
            StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT => {
                tracing::warn!(status = %status, "Mantis server temporarily unavailable");
                MantisError::ServiceUnavailable { status }
            }
            _ => MantisError::HttpStatus { status, body },
        }
    }
}

impl Transport for HttpTransport {
    async fn call(&self, operation: &str, payload: Vec<u8>) -> Result<String, MantisError> {
        self.with_retry(operation, || self.post(operation, payload.clone()))
            .await
    }
}

/// Reads a `Retry-After` header given in seconds.
pub(crate) fn retry_after_header(response: &reqwest::Response) -> Option<Duration> {
    response
        .headers()
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// Cuts `body` to at most `max` bytes on a character boundary.
pub(crate) fn truncate(body: String, max: usize) -> String {
    if body.len() <= max {
        return body;
    }
    let mut end = max;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...[truncated]", &body[..end])
}

fn looks_like_fault(body: &str) -> bool {
    body.contains(":Fault>") || body.contains("<Fault>")
}
