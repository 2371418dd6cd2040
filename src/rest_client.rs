//! HTTP client for the MantisBT REST API.
//!
//! Only the user and API-token endpoints are covered. Requests are
//! authenticated with an API token sent verbatim in the `Authorization`
//! header.
//!
//! # Security
//!
//! The token is never logged and is scrubbed from error bodies.

use std::time::Duration;

use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::Config;
use crate::error::MantisError;
use crate::models::{ApiToken, CreateTokenRequest, RestUser};
use crate::transport::{retry_after_header, truncate};

/// Path of the REST API below the base URL.
pub const REST_PATH: &str = "/api/rest";

/// Maximum length of error bodies kept in errors.
const MAX_ERROR_BODY_LEN: usize = 500;

/// Client for the MantisBT REST API.
///
/// # Example
///
/// ```ignore
/// let config = Config::from_env()?;
/// let client = RestClient::new(&config)?;
///
/// let token = client.create_token("ci").await?;
/// println!("{}", token.token);
/// ```
#[derive(Clone)]
pub struct RestClient {
    http: Client,
    base_url: String,
    timeout: Duration,
    /// SECURITY: Never log this value!
    api_token: String,
}

impl RestClient {
    /// Creates a REST client from configuration.
    ///
    /// # Errors
    ///
    /// - `MantisError::Config` if `MANTIS_API_TOKEN` is not set
    /// - `MantisError::HttpClient` if the HTTP client fails to initialize
    pub fn new(config: &Config) -> Result<Self, MantisError> {
        let token = config
            .api_token()
            .ok_or_else(|| MantisError::missing_env("MANTIS_API_TOKEN"))?;
        Self::with_token(&config.base_url, token, config.timeout)
    }

    /// Creates a REST client for an explicit base URL and token.
    ///
    /// # Errors
    ///
    /// Returns `MantisError::HttpClient` if the HTTP client fails to initialize.
    pub fn with_token(
        base_url: &str,
        api_token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, MantisError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(MantisError::HttpClient)?;

        Ok(Self {
            http,
            base_url: format!("{}{}", base_url.trim_end_matches('/'), REST_PATH),
            timeout,
            api_token: api_token.into(),
        })
    }

    /// Returns the account the token belongs to.
    pub async fn current_user(&self) -> Result<RestUser, MantisError> {
        self.request::<(), RestUser>(Method::GET, "/users/me", None)
            .await
    }

    /// Creates an API token for the current user.
    ///
    /// The token value is only ever returned by this call.
    ///
    /// # Errors
    ///
    /// Returns `MantisError::Validation` if `name` is blank, or any HTTP error.
    pub async fn create_token(&self, name: &str) -> Result<ApiToken, MantisError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(MantisError::validation("token name must not be empty"));
        }
        let body = CreateTokenRequest::new(name);
        self.request(Method::POST, "/users/me/token", Some(&body))
            .await
    }

    /// Revokes one of the current user's API tokens.
    pub async fn revoke_token(&self, token_id: u64) -> Result<(), MantisError> {
        let path = format!("/users/me/token/{}", token_id);
        self.send::<()>(Method::DELETE, &path, None).await?;
        Ok(())
    }

    /// Makes a request and parses the JSON response.
    async fn request<B, T>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<T, MantisError>
    where
        B: Serialize,
        T: DeserializeOwned,
    {
        let text = self.send(method, path, body).await?;
        serde_json::from_str(&text).map_err(MantisError::Serialization)
    }

    /// Makes a request and returns the raw body of a successful response.
    async fn send<B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<String, MantisError> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(method = %method, path = %path, "Making Mantis REST request");

        let mut req = self
            .http
            .request(method.clone(), &url)
            .header("Authorization", &self.api_token)
            .header("Accept", "application/json");
        if let Some(body) = body {
            req = req.json(body);
        }

        let response = req.send().await.map_err(|e| {
            if e.is_timeout() {
                return MantisError::timeout(self.timeout, format!("{} {}", method, path));
            }
            MantisError::Transport(e)
        })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = retry_after_header(&response);
            let body = response.text().await.unwrap_or_default();
            return Err(self.classify(status, retry_after, body));
        }

        let text = response.text().await.map_err(MantisError::Transport)?;
        tracing::trace!(body = %text, "Mantis REST response");
        Ok(text)
    }

    fn classify(
        &self,
        status: StatusCode,
        retry_after: Option<Duration>,
        body: String,
    ) -> MantisError {
        let body = MantisError::sanitize_message(&body, &self.api_token);
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
