//! Field codecs used while marshaling requests and decoding responses.
//!
//! - [`timestamp`] - lenient RFC 3339 timestamps
//! - [`identifier`] - numeric identifiers with optional `#` markers
//! - [`attachment`] - streaming base64 encoding of attachment content

pub mod attachment;
pub mod identifier;
pub mod timestamp;

pub use timestamp::Timestamp;
