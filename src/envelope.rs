//! SOAP request/response envelopes.
//!
//! A request is written into a call-local buffer:
//!
//! ```text
//! <?xml version="1.0" encoding="UTF-8"?>
//! <soapenv:Envelope xmlns:soapenv="..." xmlns:ns1="http://futureware.biz/mantisconnect">
//!   <soapenv:Body>
//!     <ns1:mc_issue_get>
//!       <username>..</username><password>..</password><issue_id>42</issue_id>
//!     </ns1:mc_issue_get>
//!   </soapenv:Body>
//! </soapenv:Envelope>
//! ```
//!
//! A response carries its payload in `Body/<operation>Response/return`, or a
//! `Body/Fault`.

use std::fmt;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::Writer;

use crate::error::MantisError;
use crate::xml::{write_text, FromXml, XmlNode};

/// MantisConnect target namespace.
pub const NAMESPACE: &str = "http://futureware.biz/mantisconnect";

/// SOAP 1.1 envelope namespace.
pub const SOAP_ENV_NAMESPACE: &str = "http://schemas.xmlsoap.org/soap/envelope/";

const ENVELOPE: &str = "soapenv:Envelope";
const BODY: &str = "soapenv:Body";

/// Username and password sent with every authenticated call.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// The password, for redacting it from error text.
    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// An outgoing envelope under construction.
///
/// Created open (operation element started, credentials written); the caller
/// appends parameters through [`writer`](Self::writer) and closes it with
/// [`finish`](Self::finish).
pub struct Envelope {
    writer: Writer<Vec<u8>>,
    operation: String,
}

impl Envelope {
    /// Opens an envelope for `operation`.
    ///
    /// `credentials` is `None` for the few operations that take no
    /// authentication (`mc_version`).
    ///
    /// # Errors
    ///
    /// Returns `MantisError::Marshal` if the credentials contain characters
    /// XML cannot carry.
    pub fn begin(operation: &str, credentials: Option<&Credentials>) -> Result<Self, MantisError> {
        let mut writer = Writer::new(Vec::new());
        let operation = format!("ns1:{}", operation);

        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(|e| MantisError::marshal(&operation, e.to_string()))?;
        writer
            .write_event(Event::Start(BytesStart::new(ENVELOPE).with_attributes([
                ("xmlns:soapenv", SOAP_ENV_NAMESPACE),
                ("xmlns:ns1", NAMESPACE),
            ])))
            .map_err(|e| MantisError::marshal(&operation, e.to_string()))?;
        writer
            .write_event(Event::Start(BytesStart::new(BODY)))
            .map_err(|e| MantisError::marshal(&operation, e.to_string()))?;
        writer
            .write_event(Event::Start(BytesStart::new(operation.as_str())))
            .map_err(|e| MantisError::marshal(&operation, e.to_string()))?;

        if let Some(credentials) = credentials {
            write_text(&mut writer, "username", &credentials.username)?;
            write_text(&mut writer, "password", &credentials.password).map_err(|_| {
                MantisError::marshal("password", "contains characters XML cannot represent")
            })?;
        }

        Ok(Self { writer, operation })
    }

    /// The writer for operation parameters.
    pub fn writer(&mut self) -> &mut Writer<Vec<u8>> {
        &mut self.writer
    }

    /// Closes the operation, body and envelope and returns the payload.
    pub fn finish(mut self) -> Result<Vec<u8>, MantisError> {
        for tag in [self.operation.as_str(), BODY, ENVELOPE] {
            self.writer
                .write_event(Event::End(BytesEnd::new(tag)))
                .map_err(|e| MantisError::marshal(tag, e.to_string()))?;
        }
        Ok(self.writer.into_inner())
    }
}

/// Decodes the `return` value of an `operation` response.
///
/// # Errors
///
/// - `MantisError::Fault` if the body holds a SOAP fault
/// - `MantisError::Decode` (with the raw body) if the envelope structure is
///   not as expected
/// - codec errors (`InvalidIdentifier`, `MalformedTimestamp`) from the
///   payload, unchanged
pub fn decode_response<T: FromXml>(operation: &str, body: &str) -> Result<T, MantisError> {
    let root = XmlNode::parse(body).map_err(|message| MantisError::decode(message, body))?;
    if root.name != "Envelope" {
        return Err(MantisError::decode(
            format!("expected <Envelope>, found <{}>", root.name),
            body,
        ));
    }
    let soap_body = root
        .child("Body")
        .ok_or_else(|| MantisError::decode("envelope has no <Body>", body))?;

    if let Some(fault) = soap_body.child("Fault") {
        return Err(fault_error(fault));
    }

    let response_name = format!("{}Response", operation);
    let response = soap_body.child(&response_name).ok_or_else(|| {
        MantisError::decode(format!("body has no <{}>", response_name), body)
    })?;
    let value = response.child("return").ok_or_else(|| {
        MantisError::decode(format!("<{}> has no <return>", response_name), body)
    })?;

    let decoded = if value.is_nil() {
        T::from_xml(&XmlNode {
            name: value.name.clone(),
            ..Default::default()
        })
    } else {
        T::from_xml(value)
    };
    decoded.map_err(|e| match e {
        MantisError::Decode { message, body: b } if b.is_empty() => MantisError::Decode {
            message,
            body: body.to_string(),
        },
        other => other,
    })
}

fn fault_error(fault: &XmlNode) -> MantisError {
    let text = |name: &str| {
        fault
            .child(name)
            .map(|n| n.text.trim().to_string())
            .unwrap_or_default()
    };
    MantisError::fault(text("faultcode"), text("faultstring"))
}

/// Where a call currently is.
///
/// Calls move strictly forward through
/// `Idle -> Encoding -> Sent -> Decoding -> Done`, and may drop to `Failed`
/// from any step before `Done`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallPhase {
    Idle,
    Encoding,
    Sent,
    Decoding,
    Done,
    Failed,
}

impl CallPhase {
    /// Returns true if moving from `self` to `next` is a legal transition.
    #[must_use]
    pub fn can_advance_to(self, next: CallPhase) -> bool {
        use CallPhase::*;
        matches!(
            (self, next),
            (Idle, Encoding)
                | (Encoding, Sent)
                | (Sent, Decoding)
                | (Decoding, Done)
                | (Idle | Encoding | Sent | Decoding, Failed)
        )
    }

    /// Returns true for `Done` and `Failed`.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, CallPhase::Done | CallPhase::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CallPhase::Idle => "idle",
            CallPhase::Encoding => "encoding",
            CallPhase::Sent => "sent",
            CallPhase::Decoding => "decoding",
            CallPhase::Done => "done",
            CallPhase::Failed => "failed",
        }
    }
}

impl fmt::Display for CallPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tracks and logs the phase of one call.
#[derive(Debug)]
pub struct CallState {
    operation: &'static str,
    phase: CallPhase,
}

impl CallState {
    pub fn new(operation: &'static str) -> Self {
        Self {
            operation,
            phase: CallPhase::Idle,
        }
    }

    pub fn phase(&self) -> CallPhase {
        self.phase
    }

    /// Moves to `next`, logging the transition.
    ///
    /// Illegal transitions are logged and ignored.
    pub fn advance(&mut self, next: CallPhase) {
        if !self.phase.can_advance_to(next) {
            tracing::warn!(
                operation = self.operation,
                from = %self.phase,
                to = %next,
                "ignoring illegal call phase transition"
            );
            return;
        }
        tracing::debug!(operation = self.operation, from = %self.phase, to = %next, "call phase");
        self.phase = next;
    }

    /// Moves to `Failed` and hands the error back.
    pub fn fail(&mut self, error: MantisError) -> MantisError {
        tracing::debug!(operation = self.operation, phase = %self.phase, error = %error, "call failed");
        self.advance(CallPhase::Failed);
        error
    }
}
