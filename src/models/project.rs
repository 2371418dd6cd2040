//! Project and version models for MantisConnect.

use std::io::Write;

use quick_xml::Writer;
use serde::Serialize;

use super::common::ObjectRef;
use crate::codec::Timestamp;
use crate::error::MantisError;
use crate::xml::{end, start, write_field, FromXml, ToXml, XmlNode};

/// A project, possibly with nested subprojects.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProjectData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Development status (development, release, stable, obsolete).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ObjectRef>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub view_state: Option<ObjectRef>,

    /// Minimum access level required to see the project.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_min: Option<ObjectRef>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub subprojects: Vec<ProjectData>,

    /// Whether global categories are inherited.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inherit_global: Option<bool>,
}

impl ProjectData {
    /// Walks the project tree depth-first, yielding this project first.
    pub fn flatten(&self) -> Vec<&ProjectData> {
        let mut out = vec![self];
        for sub in &self.subprojects {
            out.extend(sub.flatten());
        }
        out
    }
}

/// Searches a project forest (including subprojects) by name.
pub fn find_project<'a>(projects: &'a [ProjectData], name: &str) -> Option<&'a ProjectData> {
    projects
        .iter()
        .flat_map(ProjectData::flatten)
        .find(|p| p.name.as_deref() == Some(name))
}

impl FromXml for ProjectData {
    fn from_xml(node: &XmlNode) -> Result<Self, MantisError> {
        Ok(Self {
            id: node.field("id")?,
            name: node.field("name")?,
            status: node.field("status")?,
            enabled: node.field("enabled")?,
            view_state: node.field("view_state")?,
            access_min: node.field("access_min")?,
            file_path: node.field("file_path")?,
            description: node.field("description")?,
            subprojects: node.field_or_default("subprojects")?,
            inherit_global: node.field("inherit_global")?,
        })
    }
}

/// A version (release) defined in a project.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProjectVersionData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<u64>,

    /// Release date, used for ordering versions.
    #[serde(skip_serializing_if = "Timestamp::is_zero")]
    pub date_order: Timestamp,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub released: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub obsolete: Option<bool>,
}

impl ProjectVersionData {
    /// Creates a new, unreleased version for `project_id`.
    pub fn new(project_id: u64, name: impl Into<String>) -> Self {
        Self {
            project_id: Some(project_id),
            name: Some(name.into()),
            ..Default::default()
        }
    }
}

impl FromXml for ProjectVersionData {
    fn from_xml(node: &XmlNode) -> Result<Self, MantisError> {
        Ok(Self {
            id: node.field("id")?,
            name: node.field("name")?,
            project_id: node.field("project_id")?,
            date_order: node.field_or_default("date_order")?,
            description: node.field("description")?,
            released: node.field("released")?,
            obsolete: node.field("obsolete")?,
        })
    }
}

impl ToXml for ProjectVersionData {
    fn write_xml<W: Write>(&self, tag: &str, writer: &mut Writer<W>) -> Result<(), MantisError> {
        start(writer, tag)?;
        write_field(writer, "id", &self.id)?;
        write_field(writer, "name", &self.name)?;
        write_field(writer, "project_id", &self.project_id)?;
        write_field(writer, "date_order", &self.date_order)?;
        write_field(writer, "description", &self.description)?;
        write_field(writer, "released", &self.released)?;
        write_field(writer, "obsolete", &self.obsolete)?;
        end(writer, tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn named(name: &str, subprojects: Vec<ProjectData>) -> ProjectData {
        ProjectData {
            name: Some(name.to_string()),
            subprojects,
            ..Default::default()
        }
    }

    #[test]
    fn test_project_decode_nested() {
        let node = XmlNode::parse(
            "<item><id>1</id><name>kobe</name><enabled>true</enabled>\
             <subprojects><item><id>7</id><name>kobe-web</name><subprojects/></item></subprojects>\
             </item>",
        )
        .unwrap();
        let project = ProjectData::from_xml(&node).unwrap();
        assert_eq!(project.id, Some(1));
        assert_eq!(project.enabled, Some(true));
        assert_eq!(project.subprojects.len(), 1);
        assert_eq!(project.subprojects[0].id, Some(7));
        assert!(project.subprojects[0].subprojects.is_empty());
    }

    #[test]
    fn test_find_project_searches_subprojects() {
        let forest = vec![
            named("a", vec![named("a1", vec![named("a1x", vec![])])]),
            named("b", vec![]),
        ];
        assert!(find_project(&forest, "a1x").is_some());
        assert!(find_project(&forest, "b").is_some());
        assert!(find_project(&forest, "c").is_none());
    }

    #[test]
    fn test_version_encode() {
        let mut version = ProjectVersionData::new(4, "1.2.0");
        version.released = Some(false);
        let mut writer = Writer::new(Vec::new());
        write_field(&mut writer, "version", &version).unwrap();
        assert_eq!(
            String::from_utf8(writer.into_inner()).unwrap(),
            "<version><name>1.2.0</name><project_id>4</project_id>\
             <released>false</released></version>"
        );
    }

    #[test]
    fn test_version_decode() {
        let node = XmlNode::parse(
            "<item><id>31</id><name>2.0</name><project_id>4</project_id>\
             <date_order>2020-05-01T12:00:00+02:00</date_order>\
             <description></description><released>1</released><obsolete>0</obsolete></item>",
        )
        .unwrap();
        let version = ProjectVersionData::from_xml(&node).unwrap();
        assert_eq!(version.id, Some(31));
        assert_eq!(version.description.as_deref(), Some(""));
        assert_eq!(version.released, Some(true));
        assert_eq!(version.obsolete, Some(false));
        assert!(!version.date_order.is_zero());
    }
}
