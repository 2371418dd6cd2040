//! REST API models for user and API token management.
//!
//! These travel as JSON over `<base>/api/rest`, not as SOAP.

use serde::{Deserialize, Serialize};

/// An API token as returned by `POST /users/me/token`.
///
/// The token value is only ever returned once, at creation time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApiToken {
    /// Token ID, used to revoke it.
    pub id: u64,

    /// Name given at creation.
    pub name: String,

    /// The secret itself.
    pub token: String,
}

/// Body of a token creation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTokenRequest {
    pub name: String,
}

impl CreateTokenRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// An access level as rendered by the REST API.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct AccessLevel {
    pub id: u64,

    #[serde(default)]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// The authenticated user, as returned by `GET /users/me`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RestUser {
    pub id: u64,

    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub real_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_level: Option<AccessLevel>,

    /// ISO 8601 creation time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}
