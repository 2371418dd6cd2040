//! Stored filters and ad-hoc issue search criteria.

use std::io::Write;

use quick_xml::Writer;
use serde::Serialize;

use super::common::AccountData;
use crate::error::MantisError;
use crate::xml::{end, start, write_field, FromXml, ToXml, XmlNode};

/// A filter saved by a user in the web interface.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<AccountData>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_public: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Serialized filter criteria, opaque to clients.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter_string: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl FromXml for FilterData {
    fn from_xml(node: &XmlNode) -> Result<Self, MantisError> {
        Ok(Self {
            id: node.field("id")?,
            owner: node.field("owner")?,
            project_id: node.field("project_id")?,
            is_public: node.field("is_public")?,
            name: node.field("name")?,
            filter_string: node.field("filter_string")?,
            url: node.field("url")?,
        })
    }
}

/// Criteria for `mc_filter_search_issues`.
///
/// Empty lists place no restriction on that attribute.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterSearchData {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub project_id: Vec<u64>,

    /// Free-text search over summary, description and notes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub category: Vec<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub severity_id: Vec<u64>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub status_id: Vec<u64>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub priority_id: Vec<u64>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub reporter_id: Vec<u64>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub handler_id: Vec<u64>,

    /// Issues with these statuses (or higher) are excluded.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub hide_status_id: Vec<u64>,

    /// Sort column, e.g. `last_updated`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<String>,

    /// `ASC` or `DESC`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_direction: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub sticky: Option<bool>,
}

impl FilterSearchData {
    /// Returns true if no criterion is set.
    #[must_use]
    pub fn is_unrestricted(&self) -> bool {
        *self == Self::default()
    }
}

impl ToXml for FilterSearchData {
    fn write_xml<W: Write>(&self, tag: &str, writer: &mut Writer<W>) -> Result<(), MantisError> {
        start(writer, tag)?;
        write_field(writer, "project_id", &self.project_id)?;
        write_field(writer, "search", &self.search)?;
        write_field(writer, "category", &self.category)?;
        write_field(writer, "severity_id", &self.severity_id)?;
        write_field(writer, "status_id", &self.status_id)?;
        write_field(writer, "priority_id", &self.priority_id)?;
        write_field(writer, "reporter_id", &self.reporter_id)?;
        write_field(writer, "handler_id", &self.handler_id)?;
        write_field(writer, "hide_status_id", &self.hide_status_id)?;
        write_field(writer, "sort", &self.sort)?;
        write_field(writer, "sort_direction", &self.sort_direction)?;
        write_field(writer, "sticky", &self.sticky)?;
        end(writer, tag)
    }
}
