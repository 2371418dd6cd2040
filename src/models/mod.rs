//! Data models for the MantisConnect API.
//!
//! SOAP wire records (accounts, issues, notes, attachments, projects,
//! versions, filters) decode with [`FromXml`](crate::xml::FromXml) and, where
//! they are sent back to the server, encode with [`ToXml`](crate::xml::ToXml).
//! REST token types are plain serde JSON.

mod common;
mod filter;
mod issue;
mod project;
mod token;

pub use common::*;
pub use filter::*;
pub use issue::*;
pub use project::*;
pub use token::*;
