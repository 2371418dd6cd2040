//! Issue models for MantisConnect.

use std::io::Write;

use quick_xml::Writer;
use serde::Serialize;

use super::common::{AccountData, CustomFieldValue, ObjectRef};
use crate::codec::Timestamp;
use crate::error::MantisError;
use crate::xml::{end, start, write_field, FromXml, ToXml, XmlNode};

/// A bug tracker issue.
///
/// Every field is optional on the wire; empty collections and zero
/// timestamps are omitted when the issue is sent back in an update.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IssueData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub view_state: Option<ObjectRef>,

    #[serde(skip_serializing_if = "Timestamp::is_zero")]
    pub last_updated: Timestamp,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<ObjectRef>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<ObjectRef>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<ObjectRef>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ObjectRef>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub reporter: Option<AccountData>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub build: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub os: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub os_build: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub reproducibility: Option<ObjectRef>,

    #[serde(skip_serializing_if = "Timestamp::is_zero")]
    pub date_submitted: Timestamp,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub sponsorship_total: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub handler: Option<AccountData>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub projection: Option<ObjectRef>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub eta: Option<ObjectRef>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<ObjectRef>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub fixed_in_version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub steps_to_reproduce: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_information: Option<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<AttachmentData>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub relationships: Vec<RelationshipData>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<IssueNoteData>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub custom_fields: Vec<CustomFieldValue>,

    #[serde(skip_serializing_if = "Timestamp::is_zero")]
    pub due_date: Timestamp,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub monitors: Vec<AccountData>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub sticky: Option<bool>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<ObjectRef>,
}

impl IssueData {
    /// Returns the status ID, or 0 if the issue carries no status.
    pub fn status_id(&self) -> u64 {
        self.status.as_ref().and_then(|s| s.id).unwrap_or(0)
    }

    /// Returns true if an account with login `name` monitors the issue.
    #[must_use]
    pub fn is_monitored_by(&self, name: &str) -> bool {
        self.monitors
            .iter()
            .any(|m| m.name.as_deref() == Some(name))
    }

    /// Finds an attachment with the given file name that has content.
    pub fn find_attachment(&self, filename: &str) -> Option<&AttachmentData> {
        self.attachments
            .iter()
            .find(|a| a.filename.as_deref() == Some(filename) && a.size.unwrap_or(0) > 0)
    }
}

impl FromXml for IssueData {
    fn from_xml(node: &XmlNode) -> Result<Self, MantisError> {
        Ok(Self {
            id: node.field("id")?,
            view_state: node.field("view_state")?,
            last_updated: node.field_or_default("last_updated")?,
            project: node.field("project")?,
            category: node.field("category")?,
            priority: node.field("priority")?,
            severity: node.field("severity")?,
            status: node.field("status")?,
            reporter: node.field("reporter")?,
            summary: node.field("summary")?,
            version: node.field("version")?,
            build: node.field("build")?,
            platform: node.field("platform")?,
            os: node.field("os")?,
            os_build: node.field("os_build")?,
            reproducibility: node.field("reproducibility")?,
            date_submitted: node.field_or_default("date_submitted")?,
            sponsorship_total: node.field("sponsorship_total")?,
            handler: node.field("handler")?,
            projection: node.field("projection")?,
            eta: node.field("eta")?,
            resolution: node.field("resolution")?,
            fixed_in_version: node.field("fixed_in_version")?,
            target_version: node.field("target_version")?,
            description: node.field("description")?,
            steps_to_reproduce: node.field("steps_to_reproduce")?,
            additional_information: node.field("additional_information")?,
            attachments: node.field_or_default("attachments")?,
            relationships: node.field_or_default("relationships")?,
            notes: node.field_or_default("notes")?,
            custom_fields: node.field_or_default("custom_fields")?,
            due_date: node.field_or_default("due_date")?,
            monitors: node.field_or_default("monitors")?,
            sticky: node.field("sticky")?,
            tags: node.field_or_default("tags")?,
        })
    }
}

impl ToXml for IssueData {
    fn write_xml<W: Write>(&self, tag: &str, writer: &mut Writer<W>) -> Result<(), MantisError> {
        start(writer, tag)?;
        write_field(writer, "id", &self.id)?;
        write_field(writer, "view_state", &self.view_state)?;
        write_field(writer, "last_updated", &self.last_updated)?;
        write_field(writer, "project", &self.project)?;
        write_field(writer, "category", &self.category)?;
        write_field(writer, "priority", &self.priority)?;
        write_field(writer, "severity", &self.severity)?;
        write_field(writer, "status", &self.status)?;
        write_field(writer, "reporter", &self.reporter)?;
        write_field(writer, "summary", &self.summary)?;
        write_field(writer, "version", &self.version)?;
        write_field(writer, "build", &self.build)?;
        write_field(writer, "platform", &self.platform)?;
        write_field(writer, "os", &self.os)?;
        write_field(writer, "os_build", &self.os_build)?;
        write_field(writer, "reproducibility", &self.reproducibility)?;
        write_field(writer, "date_submitted", &self.date_submitted)?;
        write_field(writer, "sponsorship_total", &self.sponsorship_total)?;
        write_field(writer, "handler", &self.handler)?;
        write_field(writer, "projection", &self.projection)?;
        write_field(writer, "eta", &self.eta)?;
        write_field(writer, "resolution", &self.resolution)?;
        write_field(writer, "fixed_in_version", &self.fixed_in_version)?;
        write_field(writer, "target_version", &self.target_version)?;
        write_field(writer, "description", &self.description)?;
        write_field(writer, "steps_to_reproduce", &self.steps_to_reproduce)?;
        write_field(writer, "additional_information", &self.additional_information)?;
        write_field(writer, "attachments", &self.attachments)?;
        write_field(writer, "relationships", &self.relationships)?;
        write_field(writer, "notes", &self.notes)?;
        write_field(writer, "custom_fields", &self.custom_fields)?;
        write_field(writer, "due_date", &self.due_date)?;
        write_field(writer, "monitors", &self.monitors)?;
        write_field(writer, "sticky", &self.sticky)?;
        write_field(writer, "tags", &self.tags)?;
        end(writer, tag)
    }
}

/// Metadata of a file attached to an issue.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AttachmentData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,

    /// Size in bytes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,

    #[serde(skip_serializing_if = "Timestamp::is_zero")]
    pub date_submitted: Timestamp,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,

    /// Uploader's user ID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<u64>,
}

impl FromXml for AttachmentData {
    fn from_xml(node: &XmlNode) -> Result<Self, MantisError> {
        Ok(Self {
            id: node.field("id")?,
            filename: node.field("filename")?,
            size: node.field("size")?,
            content_type: node.field("content_type")?,
            date_submitted: node.field_or_default("date_submitted")?,
            download_url: node.field("download_url")?,
            user_id: node.field("user_id")?,
        })
    }
}

impl ToXml for AttachmentData {
    fn write_xml<W: Write>(&self, tag: &str, writer: &mut Writer<W>) -> Result<(), MantisError> {
        start(writer, tag)?;
        write_field(writer, "id", &self.id)?;
        write_field(writer, "filename", &self.filename)?;
        write_field(writer, "size", &self.size)?;
        write_field(writer, "content_type", &self.content_type)?;
        write_field(writer, "date_submitted", &self.date_submitted)?;
        write_field(writer, "download_url", &self.download_url)?;
        write_field(writer, "user_id", &self.user_id)?;
        end(writer, tag)
    }
}

/// A link between two issues ("duplicate of", "related to", ...).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RelationshipData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,

    /// Relationship kind.
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<ObjectRef>,

    /// ID of the issue on the other end.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_id: Option<u64>,
}

impl FromXml for RelationshipData {
    fn from_xml(node: &XmlNode) -> Result<Self, MantisError> {
        Ok(Self {
            id: node.field("id")?,
            kind: node.field("type")?,
            target_id: node.field("target_id")?,
        })
    }
}

impl ToXml for RelationshipData {
    fn write_xml<W: Write>(&self, tag: &str, writer: &mut Writer<W>) -> Result<(), MantisError> {
        start(writer, tag)?;
        write_field(writer, "id", &self.id)?;
        write_field(writer, "type", &self.kind)?;
        write_field(writer, "target_id", &self.target_id)?;
        end(writer, tag)
    }
}

/// A note (comment) on an issue.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IssueNoteData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub reporter: Option<AccountData>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub view_state: Option<ObjectRef>,

    #[serde(skip_serializing_if = "Timestamp::is_zero")]
    pub date_submitted: Timestamp,

    #[serde(skip_serializing_if = "Timestamp::is_zero")]
    pub last_modified: Timestamp,

    /// Minutes spent, when time tracking is enabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_tracking: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub note_type: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub note_attr: Option<String>,
}

impl IssueNoteData {
    /// Creates a note with the given text, reported by `reporter`.
    pub fn new(reporter: AccountData, text: impl Into<String>) -> Self {
        Self {
            reporter: Some(reporter),
            text: Some(text.into()),
            ..Default::default()
        }
    }
}

impl FromXml for IssueNoteData {
    fn from_xml(node: &XmlNode) -> Result<Self, MantisError> {
        Ok(Self {
            id: node.field("id")?,
            reporter: node.field("reporter")?,
            text: node.field("text")?,
            view_state: node.field("view_state")?,
            date_submitted: node.field_or_default("date_submitted")?,
            last_modified: node.field_or_default("last_modified")?,
            time_tracking: node.field("time_tracking")?,
            note_type: node.field("note_type")?,
            note_attr: node.field("note_attr")?,
        })
    }
}

impl ToXml for IssueNoteData {
    fn write_xml<W: Write>(&self, tag: &str, writer: &mut Writer<W>) -> Result<(), MantisError> {
        start(writer, tag)?;
        write_field(writer, "id", &self.id)?;
        write_field(writer, "reporter", &self.reporter)?;
        write_field(writer, "text", &self.text)?;
        write_field(writer, "view_state", &self.view_state)?;
        write_field(writer, "date_submitted", &self.date_submitted)?;
        write_field(writer, "last_modified", &self.last_modified)?;
        write_field(writer, "time_tracking", &self.time_tracking)?;
        write_field(writer, "note_type", &self.note_type)?;
        write_field(writer, "note_attr", &self.note_attr)?;
        end(writer, tag)
    }
}
