//! XML marshaling helpers.
//!
//! Responses are parsed into a small element tree ([`XmlNode`]) and decoded
//! with [`FromXml`]; requests are written straight to a `quick_xml::Writer`
//! with [`ToXml`]. Optional values are omitted entirely when absent, never
//! written as empty or nil elements.

use std::io::Write;

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Reader;
use quick_xml::Writer;

use crate::codec::{identifier, timestamp, Timestamp};
use crate::error::MantisError;

/// Element name used for SOAP-encoded array members.
pub const ITEM: &str = "item";

/// One element of a parsed document.
///
/// Names are local names (namespace prefixes stripped); attribute keys keep
/// their prefix (`xsi:nil`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct XmlNode {
    /// Local element name.
    pub name: String,
    /// Attributes in document order.
    pub attributes: Vec<(String, String)>,
    /// Unescaped character data directly inside this element.
    pub text: String,
    /// Child elements in document order.
    pub children: Vec<XmlNode>,
}

impl XmlNode {
    /// Parses a document and returns its root element.
    ///
    /// # Errors
    ///
    /// Returns a description of the first syntax error; callers attach the
    /// document itself when reporting it.
    pub fn parse(input: &str) -> Result<XmlNode, String> {
        let mut reader = Reader::from_str(input);
        let mut stack: Vec<XmlNode> = Vec::new();
        let mut root: Option<XmlNode> = None;

        loop {
            match reader.read_event() {
                Ok(Event::Start(e)) => stack.push(Self::from_start(&e)?),
                Ok(Event::Empty(e)) => {
                    let node = Self::from_start(&e)?;
                    Self::attach(&mut stack, &mut root, node)?;
                }
                Ok(Event::End(_)) => {
                    let node = stack
                        .pop()
                        .ok_or_else(|| "unexpected closing tag".to_string())?;
                    Self::attach(&mut stack, &mut root, node)?;
                }
                Ok(Event::Text(t)) => {
                    if let Some(top) = stack.last_mut() {
                        let text = t.unescape().map_err(|e| e.to_string())?;
                        top.text.push_str(&text);
                    }
                }
                Ok(Event::CData(c)) => {
                    if let Some(top) = stack.last_mut() {
                        top.text.push_str(&String::from_utf8_lossy(&c.into_inner()));
                    }
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => {
                    return Err(format!(
                        "XML error at position {}: {}",
                        reader.buffer_position(),
                        e
                    ))
                }
            }
        }

        if !stack.is_empty() {
            return Err("document ended inside an element".to_string());
        }
        root.ok_or_else(|| "document has no root element".to_string())
    }

    fn from_start(start: &BytesStart<'_>) -> Result<XmlNode, String> {
        let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
        let mut attributes = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|e| e.to_string())?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr.unescape_value().map_err(|e| e.to_string())?.into_owned();
            attributes.push((key, value));
        }
        Ok(XmlNode {
            name,
            attributes,
            ..Default::default()
        })
    }

    fn attach(
        stack: &mut [XmlNode],
        root: &mut Option<XmlNode>,
        node: XmlNode,
    ) -> Result<(), String> {
        match stack.last_mut() {
            Some(parent) => parent.children.push(node),
            None if root.is_none() => *root = Some(node),
            None => return Err("document has more than one root element".to_string()),
        }
        Ok(())
    }

    /// Returns the first child element with the given local name.
    pub fn child(&self, name: &str) -> Option<&XmlNode> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Returns the first child element, whatever its name.
    pub fn first_child(&self) -> Option<&XmlNode> {
        self.children.first()
    }

    /// Depth-first search for the first descendant (or self) with `name`.
    pub fn find(&self, name: &str) -> Option<&XmlNode> {
        if self.name == name {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(name))
    }

    /// Looks up an attribute by qualified (`xsi:nil`) or local (`nil`) name.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name || key.rsplit(':').next() == Some(name))
            .map(|(_, value)| value.as_str())
    }

    /// Returns true if the element is marked `xsi:nil="true"`.
    pub fn is_nil(&self) -> bool {
        matches!(self.attribute("nil"), Some("true") | Some("1"))
    }

    /// Decodes child `name`, treating a missing or nil element as `None`.
    pub fn field<T: FromXml>(&self, name: &str) -> Result<Option<T>, MantisError> {
        match self.child(name) {
            Some(node) if !node.is_nil() => T::from_xml(node).map(Some),
            _ => Ok(None),
        }
    }

    /// Decodes child `name`, falling back to `T::default()` when absent.
    pub fn field_or_default<T: FromXml + Default>(&self, name: &str) -> Result<T, MantisError> {
        Ok(self.field(name)?.unwrap_or_default())
    }
}

/// Types that can be decoded from a response element.
pub trait FromXml: Sized {
    /// Decodes `node` into `Self`.
    fn from_xml(node: &XmlNode) -> Result<Self, MantisError>;
}

impl FromXml for String {
    fn from_xml(node: &XmlNode) -> Result<Self, MantisError> {
        Ok(node.text.clone())
    }
}

impl FromXml for u64 {
    fn from_xml(node: &XmlNode) -> Result<Self, MantisError> {
        identifier::decode(&node.text)
    }
}

impl FromXml for bool {
    fn from_xml(node: &XmlNode) -> Result<Self, MantisError> {
        match node.text.trim() {
            "true" | "1" => Ok(true),
            "false" | "0" | "" => Ok(false),
            other => Err(MantisError::decode(
                format!("invalid boolean {:?} in <{}>", other, node.name),
                String::new(),
            )),
        }
    }
}

impl FromXml for Timestamp {
    fn from_xml(node: &XmlNode) -> Result<Self, MantisError> {
        timestamp::parse(&node.text)
    }
}

impl<T: FromXml> FromXml for Vec<T> {
    fn from_xml(node: &XmlNode) -> Result<Self, MantisError> {
        node.children
            .iter()
            .filter(|c| c.name == ITEM && !c.is_nil())
            .map(T::from_xml)
            .collect()
    }
}

/// Types that can be written as a request element.
pub trait ToXml {
    /// Writes `self` as an element named `tag`.
    fn write_xml<W: Write>(&self, tag: &str, writer: &mut Writer<W>) -> Result<(), MantisError>;

    /// Whether the element is left out of the request.
    fn is_absent(&self) -> bool {
        false
    }
}

/// Writes `value` as element `tag` unless it is absent.
pub fn write_field<W, T>(writer: &mut Writer<W>, tag: &str, value: &T) -> Result<(), MantisError>
where
    W: Write,
    T: ToXml + ?Sized,
{
    if value.is_absent() {
        return Ok(());
    }
    value.write_xml(tag, writer)
}

/// Writes `<tag>text</tag>`, escaping markup characters.
///
/// # Errors
///
/// Returns `MantisError::Marshal` if `text` contains characters XML 1.0
/// cannot carry (most control characters, U+FFFE, U+FFFF).
pub fn write_text<W: Write>(writer: &mut Writer<W>, tag: &str, text: &str) -> Result<(), MantisError> {
    if let Some(bad) = text.chars().find(|&c| !is_xml_char(c)) {
        return Err(MantisError::marshal(
            text,
            format!("<{}> contains U+{:04X}, which XML cannot represent", tag, bad as u32),
        ));
    }
    start(writer, tag)?;
    writer
        .write_event(Event::Text(BytesText::new(text)))
        .map_err(|e| MantisError::marshal(text, e.to_string()))?;
    end(writer, tag)
}

/// Writes a start tag.
pub fn start<W: Write>(writer: &mut Writer<W>, tag: &str) -> Result<(), MantisError> {
    writer
        .write_event(Event::Start(BytesStart::new(tag)))
        .map_err(|e| MantisError::marshal(tag, e.to_string()))
}

/// Writes an end tag.
pub fn end<W: Write>(writer: &mut Writer<W>, tag: &str) -> Result<(), MantisError> {
    writer
        .write_event(Event::End(BytesEnd::new(tag)))
        .map_err(|e| MantisError::marshal(tag, e.to_string()))
}

fn is_xml_char(c: char) -> bool {
    matches!(c,
        '\t' | '\n' | '\r'
        | '\u{20}'..='\u{D7FF}'
        | '\u{E000}'..='\u{FFFD}'
        | '\u{10000}'..='\u{10FFFF}')
}

impl ToXml for str {
    fn write_xml<W: Write>(&self, tag: &str, writer: &mut Writer<W>) -> Result<(), MantisError> {
        write_text(writer, tag, self)
    }
}

impl ToXml for String {
    fn write_xml<W: Write>(&self, tag: &str, writer: &mut Writer<W>) -> Result<(), MantisError> {
        write_text(writer, tag, self)
    }
}

impl ToXml for u64 {
    fn write_xml<W: Write>(&self, tag: &str, writer: &mut Writer<W>) -> Result<(), MantisError> {
        write_text(writer, tag, &identifier::encode(*self))
    }
}

impl ToXml for bool {
    fn write_xml<W: Write>(&self, tag: &str, writer: &mut Writer<W>) -> Result<(), MantisError> {
        write_text(writer, tag, if *self { "true" } else { "false" })
    }
}

impl ToXml for Timestamp {
    fn write_xml<W: Write>(&self, tag: &str, writer: &mut Writer<W>) -> Result<(), MantisError> {
        write_text(writer, tag, &self.format())
    }

    fn is_absent(&self) -> bool {
        self.is_zero()
    }
}

impl<T: ToXml> ToXml for Option<T> {
    fn write_xml<W: Write>(&self, tag: &str, writer: &mut Writer<W>) -> Result<(), MantisError> {
        match self {
            Some(value) => value.write_xml(tag, writer),
            None => Ok(()),
        }
    }

    fn is_absent(&self) -> bool {
        self.as_ref().is_none_or(ToXml::is_absent)
    }
}

impl<T: ToXml> ToXml for Vec<T> {
    fn write_xml<W: Write>(&self, tag: &str, writer: &mut Writer<W>) -> Result<(), MantisError> {
        start(writer, tag)?;
        for item in self {
            item.write_xml(ITEM, writer)?;
        }
        end(writer, tag)
    }

    fn is_absent(&self) -> bool {
        self.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(f: impl FnOnce(&mut Writer<Vec<u8>>) -> Result<(), MantisError>) -> String {
        let mut writer = Writer::new(Vec::new());
        f(&mut writer).unwrap();
        String::from_utf8(writer.into_inner()).unwrap()
    }

    #[test]
    fn test_parse_strips_prefixes_and_keeps_attributes() {
        let doc = r#"<?xml version="1.0"?>
            <ns1:root xmlns:ns1="urn:x" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">
              <id xsi:type="xsd:integer">7</id>
              <due xsi:nil="true"/>
            </ns1:root>"#;
        let root = XmlNode::parse(doc).unwrap();
        assert_eq!(root.name, "root");
        assert_eq!(root.child("id").unwrap().text, "7");
        assert_eq!(root.child("id").unwrap().attribute("xsi:type"), Some("xsd:integer"));
        assert_eq!(root.child("id").unwrap().attribute("type"), Some("xsd:integer"));
        assert!(root.child("due").unwrap().is_nil());
    }

    #[test]
    fn test_parse_unescapes_entities_and_char_refs() {
        let root = XmlNode::parse("<t>a &amp; b&#13;\nc</t>").unwrap();
        assert_eq!(root.text, "a & b\r\nc");
    }

    #[test]
    fn test_parse_cdata() {
        let root = XmlNode::parse("<t><![CDATA[<raw>]]></t>").unwrap();
        assert_eq!(root.text, "<raw>");
    }

    #[test]
    fn test_parse_errors() {
        assert!(XmlNode::parse("").is_err());
        assert!(XmlNode::parse("<a><b></a>").is_err());
        assert!(XmlNode::parse("<a>").is_err());
        assert!(XmlNode::parse("<a/><b/>").is_err());
        assert!(XmlNode::parse("not xml at all").is_err());
    }

    #[test]
    fn test_find_descends() {
        let root = XmlNode::parse("<a><b><c>x</c></b></a>").unwrap();
        assert_eq!(root.find("c").unwrap().text, "x");
        assert!(root.find("d").is_none());
    }

    #[test]
    fn test_field_absent_and_nil_are_none() {
        let root = XmlNode::parse(r#"<r><n xsi:nil="true"/></r>"#).unwrap();
        assert_eq!(root.field::<u64>("missing").unwrap(), None);
        assert_eq!(root.field::<Timestamp>("n").unwrap(), None);
    }

    #[test]
    fn test_field_propagates_codec_errors() {
        let root = XmlNode::parse("<r><id>abc</id><at>soon</at></r>").unwrap();
        assert!(matches!(
            root.field::<u64>("id"),
            Err(MantisError::InvalidIdentifier { .. })
        ));
        assert!(matches!(
            root.field::<Timestamp>("at"),
            Err(MantisError::MalformedTimestamp { .. })
        ));
    }

    #[test]
    fn test_vec_reads_items() {
        let root = XmlNode::parse("<r><ids><item>#1</item><item>2</item></ids></r>").unwrap();
        let ids: Vec<u64> = root.field_or_default("ids").unwrap();
        assert_eq!(ids, vec![1, 2]);
        let none: Vec<u64> = root.field_or_default("other").unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn test_bool_decoding() {
        let root = XmlNode::parse("<r><a>true</a><b>0</b><c>maybe</c></r>").unwrap();
        assert_eq!(root.field::<bool>("a").unwrap(), Some(true));
        assert_eq!(root.field::<bool>("b").unwrap(), Some(false));
        assert!(root.field::<bool>("c").is_err());
    }

    #[test]
    fn test_write_text_escapes() {
        let xml = render(|w| write_text(w, "summary", "a < b & \"c\""));
        assert_eq!(xml, "<summary>a &lt; b &amp; &quot;c&quot;</summary>");
    }

    #[test]
    fn test_write_text_rejects_control_characters() {
        let mut writer = Writer::new(Vec::new());
        let err = write_text(&mut writer, "text", "bell\u{7}").unwrap_err();
        match err {
            MantisError::Marshal { value, reason } => {
                assert!(value.contains("bell"));
                assert!(reason.contains("U+0007"));
            }
            other => panic!("expected marshal error, got {other:?}"),
        }
    }

    #[test]
    fn test_optional_fields_are_omitted() {
        let xml = render(|w| {
            write_field(w, "a", &None::<String>)?;
            write_field(w, "b", &Timestamp::ZERO)?;
            write_field(w, "c", &Vec::<u64>::new())?;
            write_field(w, "d", &Some(5u64))
        });
        assert_eq!(xml, "<d>5</d>");
    }

    #[test]
    fn test_vec_written_as_items() {
        let xml = render(|w| write_field(w, "ids", &vec![3u64, 4]));
        assert_eq!(xml, "<ids><item>3</item><item>4</item></ids>");
    }
}
