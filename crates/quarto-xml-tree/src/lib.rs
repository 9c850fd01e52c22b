//! Generic XML node trees for Quarto, with a tagged JSON form.
//!
//! This crate represents arbitrary XML documents as a tree of [`Node`]s
//! without needing a schema. The tree keeps what a document-only model
//! usually drops: processing instructions, declarations, comments, the exact
//! order of attributes and child nodes, and namespace declarations (as
//! ordinary attributes).
//!
//! # Overview
//!
//! - [`Node`], [`Elem`], [`Pi`], [`Name`], [`Attr`]: the tree
//! - [`decode`] / [`decode_token`]: build a tree from any [`TokenSource`]
//! - [`encode`] / [`encode_node`]: write a tree into any [`TokenSink`]
//! - [`XmlTokenReader`] / [`XmlTokenWriter`]: quick-xml backed source and sink
//! - [`from_json_str`] / [`to_json_string_pretty`]: the JSON form
//!
//! # Example
//!
//! ```rust
//! use quarto_xml_tree::{from_json_str, from_xml_str, to_json_string, to_xml_string};
//!
//! let nodes = from_xml_str(r#"<one two="three">four</one>"#).unwrap();
//! let json = to_json_string(&nodes).unwrap();
//! assert_eq!(
//!     json,
//!     r#"[{"type":"elem","name":{"local":"one"},"attrs":[{"name":{"local":"two"},"value":"three"}],"nodes":[{"type":"text","content":"four"}]}]"#
//! );
//!
//! let back = from_json_str(&json).unwrap();
//! assert_eq!(back, nodes);
//! assert_eq!(to_xml_string(&back).unwrap(), r#"<one two="three">four</one>"#);
//! ```
//!
//! # Fidelity
//!
//! JSON round trips are exact. XML round trips are equivalent but not always
//! byte-identical: namespace prefixes may be spelled differently, CDATA
//! sections come back as escaped text, and self-closing tags are written with
//! an explicit end tag. Line endings in the markup are normalized to `\n`
//! when reading; a carriage return in the tree is written as `&#xD;` so it
//! survives.
//!
//! Comments containing `--`, instructions containing `?>` and declarations
//! with unbalanced markup have no faithful XML spelling and are rejected by
//! [`to_xml_string`] with [`Error::InvalidContent`].
//!
//! Parsing JSON is limited to 128 levels of arrays and objects, which is
//! about 60 levels of element nesting.

pub mod decode;
pub mod encode;
pub mod error;
pub mod json;
pub mod reader;
pub mod token;
pub mod types;
pub mod writer;

// Re-export main types
pub use decode::{
    DecodeOptions, decode, decode_element, decode_element_with, decode_token, decode_token_with,
    decode_with,
};
pub use encode::{encode, encode_node, validate};
pub use error::{Error, JsonError, Result};
pub use json::{
    from_json_reader, from_json_slice, from_json_str, node_from_value, to_json_string,
    to_json_string_pretty, to_json_writer,
};
pub use reader::{XmlTokenReader, from_xml_reader, from_xml_str};
pub use token::{Token, TokenSink, TokenSource};
pub use types::{
    Attr, Elem, Name, Node, Nodes, Pi, TYPE_COMMENT, TYPE_DECL, TYPE_ELEM, TYPE_PI, TYPE_TEXT,
    XML_NAMESPACE,
};
pub use writer::{XmlTokenWriter, to_xml_string, to_xml_writer};
