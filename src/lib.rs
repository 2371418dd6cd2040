//! # mantis-connect
//!
//! Client library for MantisBT's MantisConnect SOAP API, with a small REST
//! client for API-token management and the `mantis` command-line tool.
//!
//! ## Features
//!
//! - **Issues**: get, add, update, delete, notes, monitors, status changes
//! - **Attachments**: uploaded by streaming base64 straight into the request
//! - **Projects**: accessible projects, users, issues, versions, filters
//! - **Cancellation**: every call takes a [`CallContext`] with a cancellation token
//! - **Error handling**: automatic retry for rate limits and unavailable servers
//! - **Security**: passwords and tokens are never logged or exposed in error messages
//!
//! ## Architecture
//!
//! - [`codec`] - timestamp, identifier and attachment field codecs
//! - [`xml`] - XML tree and the `FromXml`/`ToXml` traits
//! - [`models`] - wire records (issues, projects, versions, filters, tokens)
//! - [`envelope`] - SOAP envelope building, response decoding, call phases
//! - [`requests`] - one type per remote procedure
//! - [`transport`] - HTTP transport with retry and error classification
//! - [`soap_client`] - the MantisConnect client
//! - [`rest_client`] - the REST token client
//! - [`config`] - configuration from environment variables
//! - [`error`] - error type with secret sanitization
//! - [`cli`] - the `mantis` command line
//!
//! ## Configuration
//!
//! - `MANTIS_BASE_URL`: Base URL of the Mantis installation
//! - `MANTIS_USERNAME` / `MANTIS_PASSWORD`: SOAP credentials
//! - `MANTIS_API_TOKEN` (optional): REST API token
//! - `MANTIS_TIMEOUT_SECS` (optional): per-request timeout, default 30
//! - `RUST_LOG` (optional): log filter, e.g. `mantis_connect=debug`
//!
//! ## Example
//!
//! ```ignore
//! use mantis_connect::{CallContext, Config, SoapClient};
//!
//! async fn example() -> Result<(), mantis_connect::MantisError> {
//!     let config = Config::from_env()?;
//!     let ctx = CallContext::new();
//!     let client = SoapClient::connect(&config, &ctx).await?;
//!
//!     let issue = client.issue_get(&ctx, 1000).await?;
//!     for note in &issue.notes {
//!         println!("{}", note.text.as_deref().unwrap_or_default());
//!     }
//!
//!     Ok(())
//! }
//! ```

#![warn(rustdoc::missing_crate_level_docs)]

pub mod cli;
pub mod codec;
pub mod config;
pub mod envelope;
pub mod error;
pub mod models;
pub mod requests;
pub mod rest_client;
pub mod soap_client;
pub mod transport;
pub mod xml;

pub use codec::Timestamp;
pub use config::Config;
pub use envelope::Credentials;
pub use error::MantisError;
pub use rest_client::RestClient;
pub use soap_client::{CallContext, SoapClient};
pub use transport::{HttpTransport, Transport};
