//! Token source reading XML text with quick-xml.

use crate::{Attr, Error, Name, Nodes, Result, Token, TokenSource, XML_NAMESPACE, decode};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use std::collections::HashMap;
use std::io::BufRead;

/// Decode a whole XML document held in a string.
///
/// # Example
///
/// ```rust
/// use quarto_xml_tree::from_xml_str;
///
/// let nodes = from_xml_str("<root attr=\"value\">text</root>").unwrap();
/// let root = nodes[0].as_elem().unwrap();
/// assert_eq!(root.name.local, "root");
/// assert_eq!(root.attr("", "attr"), Some("value"));
/// assert_eq!(root.text(), "text");
/// ```
///
/// # Errors
///
/// Returns an error if the XML is malformed.
pub fn from_xml_str(content: &str) -> Result<Nodes> {
    decode(&mut XmlTokenReader::from_str(content))
}

/// Decode a whole XML document from a buffered reader.
pub fn from_xml_reader<R: BufRead>(reader: R) -> Result<Nodes> {
    decode(&mut XmlTokenReader::new(reader))
}

/// [`TokenSource`] over XML text.
///
/// Element and attribute names come out with their namespace prefix resolved
/// to the bound URI. Namespace declarations are passed through as ordinary
/// attributes: `xmlns` as `{space: "", local: "xmlns"}` and `xmlns:p` as
/// `{space: "xmlns", local: "p"}`. A prefix with no binding in scope is kept
/// as the space verbatim.
///
/// CDATA sections become plain character data. `<?xml ...?>` declarations are
/// reported as processing instructions with the target `xml`. Line endings
/// (`\r\n` and a lone `\r`) are normalized to `\n` before entities are
/// expanded, so `&#13;` still yields a carriage return.
pub struct XmlTokenReader<R> {
    reader: Reader<R>,
    buf: Vec<u8>,
    namespaces: Namespaces,
    /// End tag owed for a self-closing element.
    pending_end: Option<Name>,
}

impl<'a> XmlTokenReader<&'a [u8]> {
    /// Create a reader over a string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &'a str) -> Self {
        Self::new(content.as_bytes())
    }
}

impl<R: BufRead> XmlTokenReader<R> {
    pub fn new(inner: R) -> Self {
        let mut reader = Reader::from_reader(inner);
        reader.config_mut().trim_text_start = false;
        reader.config_mut().trim_text_end = false;

        Self {
            reader,
            buf: Vec::new(),
            namespaces: Namespaces::default(),
            pending_end: None,
        }
    }

    /// Byte offset of the reader in the input.
    pub fn buffer_position(&self) -> u64 {
        self.reader.buffer_position() as u64
    }

    pub fn into_inner(self) -> R {
        self.reader.into_inner()
    }
}

impl<R: BufRead> TokenSource for XmlTokenReader<R> {
    fn next_token(&mut self) -> Result<Option<Token>> {
        if let Some(name) = self.pending_end.take() {
            self.namespaces.pop();
            return Ok(Some(Token::End { name }));
        }

        self.buf.clear();
        let event = match self.reader.read_event_into(&mut self.buf) {
            Ok(event) => event,
            Err(source) => {
                return Err(Error::Syntax {
                    source,
                    position: self.reader.error_position(),
                });
            }
        };
        let position = self.reader.buffer_position() as u64;
        let syntax = |source: quick_xml::Error| Error::Syntax { source, position };

        let token = match event {
            Event::Start(e) => self.namespaces.open(&e).map_err(syntax)?,
            Event::Empty(e) => {
                let token = self.namespaces.open(&e).map_err(syntax)?;
                if let Token::Start { name, .. } = &token {
                    self.pending_end = Some(name.clone());
                }
                token
            }
            Event::End(e) => Token::End {
                name: self.namespaces.close(&lossy(e.name().as_ref())),
            },
            Event::Text(e) => Token::CharData(unescape(&e).map_err(syntax)?),
            Event::CData(e) => Token::CharData(lossy(&e)),
            Event::Comment(e) => Token::Comment(lossy(&e)),
            Event::PI(e) => instruction(&lossy(&e)),
            Event::Decl(e) => instruction(&lossy(&e)),
            Event::DocType(e) => Token::Directive(format!("DOCTYPE {}", lossy(&e).trim_start())),
            Event::Eof => return Ok(None),
        };
        Ok(Some(token))
    }
}

/// Decode raw bytes with line endings normalized to `\n`.
fn lossy(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    if text.contains('\r') {
        text.replace("\r\n", "\n").replace('\r', "\n")
    } else {
        text.into_owned()
    }
}

fn unescape(raw: &[u8]) -> std::result::Result<String, quick_xml::Error> {
    Ok(quick_xml::escape::unescape(&lossy(raw))?.into_owned())
}

/// Split the body of `<?target content?>` at the first whitespace.
fn instruction(body: &str) -> Token {
    let (target, content) = match body.find(|c: char| c.is_ascii_whitespace()) {
        Some(pos) => (&body[..pos], body[pos..].trim_start()),
        None => (body, ""),
    };
    Token::ProcInst {
        target: target.to_string(),
        content: content.to_string(),
    }
}

/// Namespace bindings of the currently open elements.
///
/// Each prefix has its own stack of URIs, innermost last, so resolving a
/// prefix doesn't depend on how deeply elements are nested. The empty prefix
/// stands for the default namespace; binding it to the empty string
/// undeclares it.
#[derive(Debug, Default)]
struct Namespaces {
    bindings: HashMap<String, Vec<String>>,
    /// Prefixes declared by each open element.
    scopes: Vec<Vec<String>>,
}

impl Namespaces {
    fn open(&mut self, e: &BytesStart<'_>) -> std::result::Result<Token, quick_xml::Error> {
        let mut raw = Vec::new();
        for attr in e.attributes() {
            let attr = attr?;
            let key = lossy(attr.key.as_ref());
            let value = unescape(&attr.value)?;
            raw.push((key, value));
        }

        let mut declared = Vec::new();
        for (key, value) in &raw {
            let prefix = if key == "xmlns" {
                ""
            } else if let Some(prefix) = key.strip_prefix("xmlns:") {
                prefix
            } else {
                continue;
            };
            self.bindings
                .entry(prefix.to_string())
                .or_default()
                .push(value.clone());
            declared.push(prefix.to_string());
        }
        self.scopes.push(declared);

        let name = self.element_name(&lossy(e.name().as_ref()));
        let attrs = raw
            .into_iter()
            .map(|(key, value)| Attr::new(self.attr_name(&key), value))
            .collect();
        Ok(Token::Start { name, attrs })
    }

    fn close(&mut self, qname: &str) -> Name {
        let name = self.element_name(qname);
        self.pop();
        name
    }

    fn pop(&mut self) {
        let Some(declared) = self.scopes.pop() else {
            return;
        };
        for prefix in declared {
            if let Some(uris) = self.bindings.get_mut(&prefix) {
                uris.pop();
                if uris.is_empty() {
                    self.bindings.remove(&prefix);
                }
            }
        }
    }

    fn resolve(&self, prefix: &str) -> Option<&str> {
        self.bindings
            .get(prefix)
            .and_then(|uris| uris.last())
            .map(String::as_str)
    }

    fn element_name(&self, qname: &str) -> Name {
        match qname.split_once(':') {
            Some((prefix, local)) => Name::new(self.translate(prefix), local),
            None => Name::new(self.resolve("").unwrap_or_default(), qname),
        }
    }

    fn attr_name(&self, qname: &str) -> Name {
        match qname.split_once(':') {
            Some(("xmlns", local)) => Name::new("xmlns", local),
            Some((prefix, local)) => Name::new(self.translate(prefix), local),
            None => Name::local(qname),
        }
    }

    fn translate(&self, prefix: &str) -> String {
        if prefix == "xml" {
            return XML_NAMESPACE.to_string();
        }
        match self.resolve(prefix) {
            Some(uri) => uri.to_string(),
            None => {
                tracing::trace!(prefix, "unbound namespace prefix kept as namespace");
                prefix.to_string()
            }
        }
    }
}
