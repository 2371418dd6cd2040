//! Error types for the Mantis client.
//!
//! This module defines `MantisError`, the unified error type used throughout
//! the crate for consistent error handling and propagation.
//!
//! # Security
//!
//! Passwords and API tokens must never appear in logs or error text.
//! Use `sanitize_message()` when building messages from external sources
//! such as response bodies.

use std::time::Duration;
use thiserror::Error;

/// Maximum number of body bytes shown in the `Display` of body-carrying errors.
const MAX_DISPLAY_BODY_LEN: usize = 500;

/// Unified error type for all Mantis operations.
///
/// Every failure is per-call. Variants carry the offending text or value so
/// the caller can diagnose what went wrong without re-running the call.
#[derive(Error, Debug)]
pub enum MantisError {
    /// A timestamp could not be parsed under any truncation of the pattern.
    #[error("malformed timestamp: {text:?}")]
    MalformedTimestamp {
        /// The text that failed to parse.
        text: String,
    },

    /// An identifier was empty or not numeric after stripping `#` markers.
    #[error("invalid identifier: {text:?}")]
    InvalidIdentifier {
        /// The text that failed to parse.
        text: String,
    },

    /// A request parameter could not be represented in the XML envelope.
    #[error("cannot marshal {value}: {reason}")]
    Marshal {
        /// Debug rendering of the offending value.
        value: String,
        /// Why it could not be written.
        reason: String,
    },

    /// The response body did not have the expected envelope structure.
    #[error("cannot decode response: {message} (body: {})", truncate_body(.body))]
    Decode {
        /// What was wrong with the response.
        message: String,
        /// The raw response body.
        body: String,
    },

    /// The server answered with a SOAP fault.
    #[error("SOAP fault {code}: {message}")]
    Fault {
        /// The `faultcode` value.
        code: String,
        /// The `faultstring` value.
        message: String,
    },

    /// HTTP request failed during transmission.
    #[error("HTTP request failed: {0}")]
    Transport(#[source] reqwest::Error),

    /// HTTP client initialization failed.
    #[error("HTTP client error: {0}")]
    HttpClient(#[source] reqwest::Error),

    /// HTTP response returned a non-success status code.
    #[error("HTTP {status}: {}", truncate_body(.body))]
    HttpStatus {
        /// The HTTP status code returned.
        status: reqwest::StatusCode,
        /// The response body, potentially containing error details.
        body: String,
    },

    /// Request timed out.
    #[error("request timed out after {duration:?} - the server may be slow or unreachable")]
    Timeout {
        /// How long we waited before timing out.
        duration: Duration,
        /// The operation that timed out.
        operation: String,
    },

    /// Rate limited by the server (HTTP 429).
    #[error("rate limited by server - please wait before retrying")]
    RateLimited {
        /// Suggested retry delay, if provided by server.
        retry_after: Option<Duration>,
    },

    /// Server temporarily unavailable (HTTP 502/503/504).
    #[error("service temporarily unavailable ({status})")]
    ServiceUnavailable {
        /// The specific status code.
        status: reqwest::StatusCode,
    },

    /// Authentication failed - wrong credentials or token.
    #[error("authentication failed - check MANTIS_USERNAME and MANTIS_PASSWORD")]
    Authentication,

    /// Reading the attachment source failed.
    #[error("attachment source error: {0}")]
    Attachment(#[source] std::io::Error),

    /// The call was cancelled before it completed.
    #[error("call cancelled")]
    Cancelled,

    /// Configuration error - missing or invalid environment variables.
    #[error("configuration error: {0}")]
    Config(String),

    /// Input validation failed.
    #[error("validation error: {0}")]
    Validation(String),

    /// JSON serialization or deserialization failed (REST API).
    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

fn truncate_body(body: &str) -> String {
    if body.len() <= MAX_DISPLAY_BODY_LEN {
        return body.to_string();
    }
    let mut end = MAX_DISPLAY_BODY_LEN;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...[truncated]", &body[..end])
}

impl MantisError {
    /// Creates a timestamp parse error for the given text.
    pub fn malformed_timestamp(text: impl Into<String>) -> Self {
        MantisError::MalformedTimestamp { text: text.into() }
    }

    /// Creates an identifier parse error for the given text.
    pub fn invalid_identifier(text: impl Into<String>) -> Self {
        MantisError::InvalidIdentifier { text: text.into() }
    }

    /// Creates a marshal error for an offending value.
    pub fn marshal(value: impl std::fmt::Debug, reason: impl Into<String>) -> Self {
        MantisError::Marshal {
            value: format!("{:?}", value),
            reason: reason.into(),
        }
    }

    /// Creates a decode error carrying the raw response body.
    pub fn decode(message: impl Into<String>, body: impl Into<String>) -> Self {
        MantisError::Decode {
            message: message.into(),
            body: body.into(),
        }
    }

    /// Creates a SOAP fault error.
    pub fn fault(code: impl Into<String>, message: impl Into<String>) -> Self {
        MantisError::Fault {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Creates a configuration error for a missing environment variable.
    pub fn missing_env(var_name: &str) -> Self {
        MantisError::Config(format!(
            "missing required environment variable: {}",
            var_name
        ))
    }

    /// Creates a configuration error for an invalid value.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        MantisError::Config(message.into())
    }

    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        MantisError::Validation(message.into())
    }

    /// Creates a timeout error.
    pub fn timeout(duration: Duration, operation: impl Into<String>) -> Self {
        MantisError::Timeout {
            duration,
            operation: operation.into(),
        }
    }

    /// Returns true if the transport may retry the call.
    ///
    /// Only responses that tell us the server did not process the request
    /// are retryable, so non-idempotent calls are never duplicated.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            MantisError::RateLimited { .. } => true,
            MantisError::ServiceUnavailable { .. } => true,
            MantisError::Transport(e) => e.is_connect(),
            _ => false,
        }
    }

    /// Returns true if this is a rate limit error, indicating we should back off.
    #[must_use]
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, MantisError::RateLimited { .. })
    }

    /// Returns the suggested delay before retry, if any.
    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            MantisError::RateLimited { retry_after } => *retry_after,
            MantisError::ServiceUnavailable { .. } => Some(Duration::from_millis(500)),
            _ => None,
        }
    }

    /// Replaces every occurrence of `secret` in `message` with `[REDACTED]`.
    #[must_use]
    pub fn sanitize_message(message: &str, secret: &str) -> String {
        if secret.is_empty() {
            return message.to_string();
        }
        message.replace(secret, "[REDACTED]")
    }

    /// Returns this error's display message with `secret` redacted.
    #[must_use]
    pub fn sanitized_display(&self, secret: &str) -> String {
        Self::sanitize_message(&self.to_string(), secret)
    }
}
