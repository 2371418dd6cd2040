//! Common types shared across MantisConnect models.
//!
//! Object references and account records appear inside nearly every
//! other structure the server returns.

use std::io::Write;

use quick_xml::Writer;
use serde::Serialize;

use crate::error::MantisError;
use crate::xml::{end, start, write_field, FromXml, ToXml, XmlNode};

/// A reference to an enumeration value or entity by ID and name.
///
/// Status, priority, severity, view state and similar fields all use
/// this shape.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ObjectRef {
    /// Unique identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,

    /// Display name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ObjectRef {
    /// Creates a reference by ID only; the server resolves the name.
    pub fn with_id(id: u64) -> Self {
        Self {
            id: Some(id),
            name: None,
        }
    }

    /// Creates a reference by name only.
    pub fn with_name(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: Some(name.into()),
        }
    }

    /// Returns the name if present, otherwise a placeholder.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("Unknown")
    }
}

impl FromXml for ObjectRef {
    fn from_xml(node: &XmlNode) -> Result<Self, MantisError> {
        Ok(Self {
            id: node.field("id")?,
            name: node.field("name")?,
        })
    }
}

impl ToXml for ObjectRef {
    fn write_xml<W: Write>(&self, tag: &str, writer: &mut Writer<W>) -> Result<(), MantisError> {
        start(writer, tag)?;
        write_field(writer, "id", &self.id)?;
        write_field(writer, "name", &self.name)?;
        end(writer, tag)
    }
}

/// A user account as seen by other users.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AccountData {
    /// Unique user ID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,

    /// Login name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Full name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub real_name: Option<String>,

    /// Email address.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl AccountData {
    /// Returns the real name, falling back to the login name.
    pub fn display_name(&self) -> &str {
        self.real_name
            .as_deref()
            .filter(|n| !n.is_empty())
            .or(self.name.as_deref())
            .unwrap_or("Unknown")
    }
}

impl FromXml for AccountData {
    fn from_xml(node: &XmlNode) -> Result<Self, MantisError> {
        Ok(Self {
            id: node.field("id")?,
            name: node.field("name")?,
            real_name: node.field("real_name")?,
            email: node.field("email")?,
        })
    }
}

impl ToXml for AccountData {
    fn write_xml<W: Write>(&self, tag: &str, writer: &mut Writer<W>) -> Result<(), MantisError> {
        start(writer, tag)?;
        write_field(writer, "id", &self.id)?;
        write_field(writer, "name", &self.name)?;
        write_field(writer, "real_name", &self.real_name)?;
        write_field(writer, "email", &self.email)?;
        end(writer, tag)
    }
}

/// The logged-in user, as returned by `mc_login`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UserData {
    /// The account itself.
    pub account_data: AccountData,

    /// Global access level (e.g. 90 for administrators).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_level: Option<u64>,

    /// Preferred timezone name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
}

impl FromXml for UserData {
    fn from_xml(node: &XmlNode) -> Result<Self, MantisError> {
        Ok(Self {
            account_data: node.field_or_default("account_data")?,
            access_level: node.field("access_level")?,
            timezone: node.field("timezone")?,
        })
    }
}

/// The value of one custom field on an issue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CustomFieldValue {
    /// The custom field definition.
    pub field: ObjectRef,

    /// The stored value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl CustomFieldValue {
    /// Returns true if the field has no (or an empty) value.
    pub fn is_empty(&self) -> bool {
        self.value.as_deref().is_none_or(str::is_empty)
    }
}

impl FromXml for CustomFieldValue {
    fn from_xml(node: &XmlNode) -> Result<Self, MantisError> {
        Ok(Self {
            field: node.field_or_default("field")?,
            value: node.field("value")?,
        })
    }
}

impl ToXml for CustomFieldValue {
    fn write_xml<W: Write>(&self, tag: &str, writer: &mut Writer<W>) -> Result<(), MantisError> {
        start(writer, tag)?;
        write_field(writer, "field", &self.field)?;
        write_field(writer, "value", &self.value)?;
        end(writer, tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render<T: ToXml>(tag: &str, value: &T) -> String {
        let mut writer = Writer::new(Vec::new());
        write_field(&mut writer, tag, value).unwrap();
        String::from_utf8(writer.into_inner()).unwrap()
    }

    #[test]
    fn test_object_ref_decode() {
        let node = XmlNode::parse(
            r#"<status xsi:type="ns1:ObjectRef"><id xsi:type="xsd:integer">402</id><name>ajánlat elfogadva</name></status>"#,
        )
        .unwrap();
        let status = ObjectRef::from_xml(&node).unwrap();
        assert_eq!(status.id, Some(402));
        assert_eq!(status.display_name(), "ajánlat elfogadva");
    }

    #[test]
    fn test_object_ref_encode_omits_missing_name() {
        assert_eq!(
            render("status", &ObjectRef::with_id(80)),
            "<status><id>80</id></status>"
        );
    }

    #[test]
    fn test_account_display_name_fallbacks() {
        let mut account = AccountData {
            name: Some("jdoe".to_string()),
            ..Default::default()
        };
        assert_eq!(account.display_name(), "jdoe");
        account.real_name = Some(String::new());
        assert_eq!(account.display_name(), "jdoe");
        account.real_name = Some("John Doe".to_string());
        assert_eq!(account.display_name(), "John Doe");
        assert_eq!(AccountData::default().display_name(), "Unknown");
    }

    #[test]
    fn test_user_data_decode() {
        let node = XmlNode::parse(
            "<return><account_data><id>3</id><name>T</name><email>T@devco.com</email></account_data>\
             <access_level>90</access_level><timezone>Europe/Budapest</timezone></return>",
        )
        .unwrap();
        let user = UserData::from_xml(&node).unwrap();
        assert_eq!(user.account_data.id, Some(3));
        assert_eq!(user.account_data.email.as_deref(), Some("T@devco.com"));
        assert_eq!(user.access_level, Some(90));
        assert_eq!(user.timezone.as_deref(), Some("Europe/Budapest"));
    }

    #[test]
    fn test_custom_field_is_empty() {
        let mut value = CustomFieldValue::default();
        assert!(value.is_empty());
        value.value = Some(String::new());
        assert!(value.is_empty());
        value.value = Some(".5".to_string());
        assert!(!value.is_empty());
    }

    #[test]
    fn test_account_serializes_without_missing_fields() {
        let account = AccountData {
            id: Some(48),
            name: Some("r".to_string()),
            ..Default::default()
        };
        let json = serde_json::to_value(&account).unwrap();
        assert_eq!(json["id"], 48);
        assert!(json.get("email").is_none());
    }
}
