//! Configuration management for the Mantis client.
//!
//! This module handles loading configuration from environment variables,
//! with validation to ensure all required values are present.

use std::env;
use std::fmt;
use std::time::Duration;

use url::Url;

use crate::envelope::Credentials;
use crate::error::MantisError;

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Configuration for connecting to a MantisBT server.
///
/// The password and API token are stored but never logged or exposed in
/// error messages.
#[derive(Clone)]
pub struct Config {
    /// Base URL of the Mantis installation (e.g., `https://bugs.example.com/mantis`).
    pub base_url: String,

    /// Login name for SOAP calls.
    pub username: String,

    /// Password for SOAP calls.
    /// This value must never be logged or included in error messages.
    password: String,

    /// API token for REST calls, if configured.
    api_token: Option<String>,

    /// Per-request timeout.
    pub timeout: Duration,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("api_token", &self.api_token.as_ref().map(|_| "[REDACTED]"))
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// # Required Environment Variables
    ///
    /// - `MANTIS_BASE_URL`: The base URL of the Mantis installation
    /// - `MANTIS_USERNAME`: The login name
    /// - `MANTIS_PASSWORD`: The password
    ///
    /// # Optional Environment Variables
    ///
    /// - `MANTIS_API_TOKEN`: API token for the REST interface
    /// - `MANTIS_TIMEOUT_SECS`: Request timeout (default 30)
    ///
    /// # Errors
    ///
    /// Returns `MantisError::Config` if any required variable is missing
    /// or if values fail validation.
    ///
    /// # Example
    ///
    /// ```ignore
    /// dotenvy::dotenv().ok();
    /// let config = Config::from_env()?;
    /// ```
    pub fn from_env() -> Result<Self, MantisError> {
        let base_url = Self::get_required_env("MANTIS_BASE_URL")?;
        let username = Self::get_required_env("MANTIS_USERNAME")?;
        let password = Self::get_required_env("MANTIS_PASSWORD")?;
        let api_token = Self::get_optional_env("MANTIS_API_TOKEN");
        let timeout = match Self::get_optional_env("MANTIS_TIMEOUT_SECS") {
            Some(value) => Self::parse_timeout(&value)?,
            None => Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        };

        let base_url = Self::validate_base_url(base_url)?;
        Self::validate_secret("MANTIS_PASSWORD", &password)?;
        if let Some(token) = &api_token {
            Self::validate_secret("MANTIS_API_TOKEN", token)?;
        }

        Ok(Config {
            base_url,
            username: username.trim().to_string(),
            password,
            api_token,
            timeout,
        })
    }

    /// Builds a configuration directly, e.g. for tests or embedding.
    ///
    /// # Errors
    ///
    /// Returns `MantisError::Config` if the base URL is not http(s).
    pub fn new(
        base_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self, MantisError> {
        Ok(Config {
            base_url: Self::validate_base_url(base_url.into())?,
            username: username.into(),
            password: password.into(),
            api_token: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        })
    }

    /// Sets the REST API token.
    pub fn with_api_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(token.into());
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// SOAP credentials built from username and password.
    pub fn credentials(&self) -> Credentials {
        Credentials::new(&self.username, &self.password)
    }

    /// Returns the password.
    ///
    /// This should ONLY be used for authentication and sanitization, never for logging.
    pub fn password(&self) -> &str {
        &self.password
    }

    /// Returns the REST API token, if configured.
    pub fn api_token(&self) -> Option<&str> {
        self.api_token.as_deref()
    }

    /// Gets a required environment variable, returning an error if missing or empty.
    fn get_required_env(name: &str) -> Result<String, MantisError> {
        Self::get_optional_env(name).ok_or_else(|| MantisError::missing_env(name))
    }

    /// Gets an environment variable, treating empty values as unset.
    fn get_optional_env(name: &str) -> Option<String> {
        env::var(name).ok().filter(|value| !value.trim().is_empty())
    }

    /// Validates and normalizes the base URL.
    fn validate_base_url(url: String) -> Result<String, MantisError> {
        let url = url.trim().trim_end_matches('/').to_string();

        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(MantisError::invalid_config(
                "MANTIS_BASE_URL must start with http:// or https://",
            ));
        }
        Url::parse(&url).map_err(|e| {
            MantisError::invalid_config(format!("MANTIS_BASE_URL is not a valid URL: {}", e))
        })?;

        Ok(url)
    }

    fn parse_timeout(value: &str) -> Result<Duration, MantisError> {
        match value.trim().parse::<u64>() {
            Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
            _ => Err(MantisError::invalid_config(
                "MANTIS_TIMEOUT_SECS must be a positive number of seconds",
            )),
        }
    }

    /// Rejects obvious placeholder values for secrets.
    fn validate_secret(name: &str, value: &str) -> Result<(), MantisError> {
        let lower = value.to_lowercase();
        let placeholder_patterns = [
            "your_password",
            "your_token",
            "placeholder",
            "xxx",
            "changeme",
        ];

        if placeholder_patterns.iter().any(|p| lower.contains(p)) {
            return Err(MantisError::invalid_config(format!(
                "{} appears to be a placeholder value",
                name
            )));
        }

        Ok(())
    }
}
