//! JSON form of node trees.
//!
//! Every node is an object tagged with a `type` field:
//!
//! ```json
//! [
//!   {"type": "pi", "target": "xml", "content": "version=\"1.0\""},
//!   {"type": "elem", "name": {"local": "one"}, "nodes": [{"type": "text", "content": "two"}]}
//! ]
//! ```
//!
//! Empty strings and empty lists are left out when encoding and read back as
//! empty when absent. The `name` object of elements and attributes is always
//! written.

use crate::{
    Attr, Elem, JsonError, Name, Node, Nodes, Pi, Result, TYPE_COMMENT, TYPE_DECL, TYPE_ELEM,
    TYPE_PI, TYPE_TEXT,
};
use serde::de::{Deserialize, Deserializer};
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;
use std::io::{Read, Write};

/// Parse a JSON array of tagged node objects.
///
/// # Example
///
/// ```rust
/// use quarto_xml_tree::{from_json_str, Node};
///
/// let nodes = from_json_str(r#"[{"type": "text", "content": "hi"}]"#).unwrap();
/// assert_eq!(nodes, vec![Node::text("hi")]);
/// ```
pub fn from_json_str(input: &str) -> Result<Nodes> {
    nodes_from_values(serde_json::from_str(input)?)
}

/// Parse a JSON array of tagged node objects from bytes.
pub fn from_json_slice(input: &[u8]) -> Result<Nodes> {
    nodes_from_values(serde_json::from_slice(input)?)
}

/// Parse a JSON array of tagged node objects from a reader.
pub fn from_json_reader<R: Read>(reader: R) -> Result<Nodes> {
    nodes_from_values(serde_json::from_reader(reader)?)
}

/// Serialize nodes as a compact JSON array.
pub fn to_json_string(nodes: &[Node]) -> Result<String> {
    Ok(serde_json::to_string(nodes)?)
}

/// Serialize nodes as a JSON array indented with two spaces.
pub fn to_json_string_pretty(nodes: &[Node]) -> Result<String> {
    Ok(serde_json::to_string_pretty(nodes)?)
}

/// Serialize nodes as JSON into a writer.
pub fn to_json_writer<W: Write>(writer: W, nodes: &[Node], pretty: bool) -> Result<()> {
    if pretty {
        serde_json::to_writer_pretty(writer, nodes)?;
    } else {
        serde_json::to_writer(writer, nodes)?;
    }
    Ok(())
}

fn nodes_from_values(values: Vec<Value>) -> Result<Nodes> {
    values
        .into_iter()
        .map(|value| node_from_value(value).map_err(Into::into))
        .collect()
}

/// Decode one tagged node object.
///
/// The `type` field is read first and selects the shape used for the rest of
/// the object. A `null` node, or a `type` that is absent, `null` or empty, is
/// reported as [`JsonError::MissingType`]. Nested nodes of elements are decoded the same way, so the
/// discriminator errors are reported at any depth.
pub fn node_from_value(value: Value) -> std::result::Result<Node, JsonError> {
    let head = if value.is_null() {
        TypeHead::default()
    } else {
        TypeHead::deserialize(&value)?
    };

    let node = match head.kind.as_deref().unwrap_or_default() {
        "" => {
            return Err(JsonError::MissingType {
                raw: value.to_string(),
            });
        }
        TYPE_PI => {
            let pi = PiShape::deserialize(&value)?;
            Node::Pi(Pi::new(pi.target, pi.content))
        }
        TYPE_DECL => Node::Decl(ContentShape::deserialize(&value)?.content),
        TYPE_COMMENT => Node::Comment(ContentShape::deserialize(&value)?.content),
        TYPE_TEXT => Node::Text(ContentShape::deserialize(&value)?.content),
        TYPE_ELEM => {
            let elem = ElemShape::deserialize(value)?;
            let nodes = elem
                .nodes
                .into_iter()
                .map(node_from_value)
                .collect::<std::result::Result<Nodes, _>>()?;
            Node::Elem(Elem {
                name: elem.name.into(),
                attrs: elem.attrs.into_iter().map(Into::into).collect(),
                nodes,
            })
        }
        other => {
            return Err(JsonError::UnknownType {
                value: other.to_string(),
            });
        }
    };
    Ok(node)
}

#[derive(Default, serde::Deserialize)]
struct TypeHead {
    #[serde(rename = "type", default)]
    kind: Option<String>,
}

#[derive(Default, serde::Deserialize)]
#[serde(default)]
struct NameShape {
    space: String,
    local: String,
}

#[derive(Default, serde::Deserialize)]
#[serde(default)]
struct AttrShape {
    name: NameShape,
    value: String,
}

#[derive(Default, serde::Deserialize)]
#[serde(default)]
struct PiShape {
    target: String,
    content: String,
}

#[derive(Default, serde::Deserialize)]
#[serde(default)]
struct ContentShape {
    content: String,
}

#[derive(Default, serde::Deserialize)]
#[serde(default)]
struct ElemShape {
    name: NameShape,
    attrs: Vec<AttrShape>,
    nodes: Vec<Value>,
}

impl From<NameShape> for Name {
    fn from(shape: NameShape) -> Self {
        Name::new(shape.space, shape.local)
    }
}

impl From<AttrShape> for Attr {
    fn from(shape: AttrShape) -> Self {
        Attr::new(shape.name.into(), shape.value)
    }
}

impl Serialize for Name {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        if !self.space.is_empty() {
            map.serialize_entry("space", &self.space)?;
        }
        if !self.local.is_empty() {
            map.serialize_entry("local", &self.local)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Name {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        NameShape::deserialize(deserializer).map(Into::into)
    }
}

impl Serialize for Attr {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("name", &self.name)?;
        if !self.value.is_empty() {
            map.serialize_entry("value", &self.value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Attr {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        AttrShape::deserialize(deserializer).map(Into::into)
    }
}

impl Serialize for Node {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("type", self.kind())?;
        match self {
            Node::Pi(pi) => {
                if !pi.target.is_empty() {
                    map.serialize_entry("target", &pi.target)?;
                }
                if !pi.content.is_empty() {
                    map.serialize_entry("content", &pi.content)?;
                }
            }
            Node::Decl(content) | Node::Comment(content) | Node::Text(content) => {
                if !content.is_empty() {
                    map.serialize_entry("content", content)?;
                }
            }
            Node::Elem(elem) => {
                map.serialize_entry("name", &elem.name)?;
                if !elem.attrs.is_empty() {
                    map.serialize_entry("attrs", &elem.attrs)?;
                }
                if !elem.nodes.is_empty() {
                    map.serialize_entry("nodes", &elem.nodes)?;
                }
            }
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Node {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        node_from_value(value).map_err(serde::de::Error::custom)
    }
}
