//! Token sink writing XML text with quick-xml.

use crate::{Attr, Error, Name, Node, Result, Token, TokenSink, XML_NAMESPACE, encode};
use quick_xml::Writer;
use quick_xml::events::attributes::Attribute;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::name::QName;
use std::borrow::Cow;
use std::collections::HashMap;
use std::io::Write;

/// Encode nodes as an XML string.
///
/// # Example
///
/// ```rust
/// use quarto_xml_tree::{from_xml_str, to_xml_string};
///
/// let nodes = from_xml_str("<a b=\"c\">d &amp; e</a>").unwrap();
/// assert_eq!(to_xml_string(&nodes).unwrap(), "<a b=\"c\">d &amp; e</a>");
/// ```
///
/// # Errors
///
/// Returns an error if a node has no valid XML spelling, such as an element
/// with an empty name or a comment containing `--`.
pub fn to_xml_string(nodes: &[Node]) -> Result<String> {
    let bytes = to_xml_writer(Vec::new(), nodes)?;
    String::from_utf8(bytes)
        .map_err(|err| Error::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, err)))
}

/// Encode nodes as XML into a writer, returning the writer.
///
/// Nothing is written when any node can't be encoded.
pub fn to_xml_writer<W: Write>(inner: W, nodes: &[Node]) -> Result<W> {
    check_markup(nodes)?;
    let mut writer = XmlTokenWriter::new(inner);
    encode(nodes, &mut writer)?;
    Ok(writer.finish())
}

/// Check the raw parts of a tree (comments, instructions and declarations)
/// that the writer copies into the output unescaped.
fn check_markup(nodes: &[Node]) -> Result<()> {
    let mut pending: Vec<&Node> = nodes.iter().collect();
    while let Some(node) = pending.pop() {
        match node {
            Node::Pi(pi) => check_instruction(&pi.target, &pi.content)?,
            Node::Decl(content) => check_directive(content)?,
            Node::Comment(content) => check_comment(content)?,
            Node::Text(_) => {}
            Node::Elem(elem) => pending.extend(elem.nodes.iter()),
        }
    }
    Ok(())
}

fn check_comment(content: &str) -> Result<()> {
    let reason = if content.contains("--") {
        "comments must not contain \"--\""
    } else if content.ends_with('-') {
        "comments must not end with \"-\""
    } else {
        return Ok(());
    };
    Err(Error::InvalidContent {
        kind: "comment",
        reason,
    })
}

fn check_instruction(target: &str, content: &str) -> Result<()> {
    if target.is_empty() {
        return Err(Error::EmptyPiTarget);
    }
    let reason = if !target.split(':').all(is_name) {
        "target is not a valid name"
    } else if content.contains("?>") {
        "content must not contain \"?>\""
    } else {
        return Ok(());
    };
    Err(Error::InvalidContent {
        kind: "processing instruction",
        reason,
    })
}

/// A directive must not close its own markup early: every `<` needs a
/// matching `>`, quotes must be closed, and comments inside it must end.
fn check_directive(content: &str) -> Result<()> {
    let bytes = content.as_bytes();
    let mut depth = 0usize;
    let mut quote: Option<u8> = None;
    let mut in_comment = false;

    for (i, &c) in bytes.iter().enumerate() {
        if in_comment {
            if c == b'>' && bytes[..=i].ends_with(b"-->") {
                in_comment = false;
            }
        } else if let Some(q) = quote {
            if c == q {
                quote = None;
            }
        } else if c == b'\'' || c == b'"' {
            quote = Some(c);
        } else if c == b'<' {
            if bytes[i..].starts_with(b"<!--") {
                in_comment = true;
            } else {
                depth += 1;
            }
        } else if c == b'>' {
            if depth == 0 {
                return Err(invalid_directive());
            }
            depth -= 1;
        }
    }

    if depth == 0 && quote.is_none() && !in_comment {
        Ok(())
    } else {
        Err(invalid_directive())
    }
}

fn invalid_directive() -> Error {
    Error::InvalidContent {
        kind: "declaration",
        reason: "unbalanced markup, quote or comment",
    }
}

/// Escape text for content or attribute values. Carriage returns are written
/// as references, because a reader turns literal ones into line feeds.
fn escape(raw: &str) -> Cow<'_, str> {
    let escaped = quick_xml::escape::escape(raw);
    if escaped.contains('\r') {
        Cow::Owned(escaped.replace('\r', "&#xD;"))
    } else {
        escaped
    }
}

/// [`TokenSink`] writing XML text.
///
/// Text and attribute values are escaped; comments, processing instructions
/// and declarations are written verbatim after checking that they can't end
/// their own markup early. Namespaced names are spelled with a prefix already
/// bound to their URI when there is one in scope. Otherwise a default
/// namespace declaration is added for elements, and a generated prefix for
/// attributes.
pub struct XmlTokenWriter<W: Write> {
    writer: Writer<W>,
    bindings: Bindings,
    /// Qualified names of the open elements, for their end tags.
    open: Vec<String>,
    /// Counter for disambiguating generated prefixes.
    seq: usize,
}

/// Prefix bindings in scope while writing.
///
/// Both directions are kept as stacks so that lookups stay cheap however
/// deeply elements are nested.
#[derive(Debug, Default)]
struct Bindings {
    /// URIs bound to each prefix, innermost last. The empty prefix is the
    /// default namespace.
    by_prefix: HashMap<String, Vec<String>>,
    /// Prefixes bound to each URI, most recent last. Entries may be shadowed
    /// by a later binding of the same prefix.
    by_uri: HashMap<String, Vec<String>>,
    /// Prefixes bound by each open element.
    scopes: Vec<Vec<String>>,
}

impl Bindings {
    fn open(&mut self) {
        self.scopes.push(Vec::new());
    }

    fn bind(&mut self, prefix: &str, uri: &str) {
        self.by_prefix
            .entry(prefix.to_string())
            .or_default()
            .push(uri.to_string());
        self.by_uri
            .entry(uri.to_string())
            .or_default()
            .push(prefix.to_string());
        if let Some(scope) = self.scopes.last_mut() {
            scope.push(prefix.to_string());
        }
    }

    fn close(&mut self) {
        let Some(scope) = self.scopes.pop() else {
            return;
        };
        // Undo in reverse so both stacks pop the entries this scope pushed.
        for prefix in scope.into_iter().rev() {
            let Some(uris) = self.by_prefix.get_mut(&prefix) else {
                continue;
            };
            let uri = uris.pop();
            if uris.is_empty() {
                self.by_prefix.remove(&prefix);
            }
            let Some(uri) = uri else {
                continue;
            };
            if let Some(prefixes) = self.by_uri.get_mut(&uri) {
                prefixes.pop();
                if prefixes.is_empty() {
                    self.by_uri.remove(&uri);
                }
            }
        }
    }

    fn resolve(&self, prefix: &str) -> Option<&str> {
        self.by_prefix
            .get(prefix)
            .and_then(|uris| uris.last())
            .map(String::as_str)
    }

    /// Most recent prefix bound to `uri` that isn't shadowed.
    fn find_prefix(&self, uri: &str, allow_default: bool) -> Option<String> {
        self.by_uri
            .get(uri)?
            .iter()
            .rev()
            .filter(|p| allow_default || !p.is_empty())
            .find(|p| self.resolve(p) == Some(uri))
            .cloned()
    }
}

impl<W: Write> XmlTokenWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            writer: Writer::new(inner),
            bindings: Bindings::default(),
            open: Vec::new(),
            seq: 0,
        }
    }

    pub fn get_ref(&self) -> &W {
        self.writer.get_ref()
    }

    /// Consume the writer, returning the underlying output.
    pub fn finish(self) -> W {
        self.writer.into_inner()
    }

    /// Pick an unused prefix for `uri`, from the last segment of its path
    /// when that is a usable name.
    fn generate_prefix(&mut self, uri: &str) -> String {
        let trimmed = uri.trim_end_matches('/');
        let base = trimmed.rsplit('/').next().unwrap_or(trimmed);

        let mut prefix = if is_name(base) {
            base.to_string()
        } else {
            "_".to_string()
        };
        if prefix
            .get(..3)
            .is_some_and(|head| head.eq_ignore_ascii_case("xml"))
        {
            prefix.insert(0, '_');
        }

        if self.bindings.resolve(&prefix).is_some() {
            loop {
                self.seq += 1;
                let candidate = format!("{}_{}", prefix, self.seq);
                if self.bindings.resolve(&candidate).is_none() {
                    prefix = candidate;
                    break;
                }
            }
        }

        tracing::debug!(prefix = %prefix, uri, "declaring generated namespace prefix");
        prefix
    }

    fn write_start(&mut self, name: Name, attrs: Vec<Attr>) -> Result<()> {
        if name.local.is_empty() {
            return Err(Error::EmptyElementName);
        }

        self.bindings.open();
        let mut declares_default = false;
        for attr in &attrs {
            if attr.name.is_default_ns_decl() {
                declares_default = true;
                self.bindings.bind("", &attr.value);
            } else if attr.name.is_prefix_ns_decl() {
                self.bindings.bind(&attr.name.local, &attr.value);
            }
        }
        // Declarations the tag needs on top of its own attributes.
        let mut decls: Vec<(String, String)> = Vec::new();

        let qname = if name.space.is_empty() {
            let inherited = self.bindings.resolve("").unwrap_or_default();
            if !declares_default && !inherited.is_empty() {
                decls.push(("xmlns".to_string(), String::new()));
                self.bindings.bind("", "");
            }
            name.local
        } else if name.space == XML_NAMESPACE {
            format!("xml:{}", name.local)
        } else {
            match self.bindings.find_prefix(&name.space, true) {
                Some(prefix) if prefix.is_empty() => name.local,
                Some(prefix) => format!("{}:{}", prefix, name.local),
                None if !declares_default => {
                    decls.push(("xmlns".to_string(), name.space.clone()));
                    self.bindings.bind("", &name.space);
                    name.local
                }
                None => {
                    let prefix = self.generate_prefix(&name.space);
                    decls.push((format!("xmlns:{}", prefix), name.space.clone()));
                    self.bindings.bind(&prefix, &name.space);
                    format!("{}:{}", prefix, name.local)
                }
            }
        };

        let mut keyed = Vec::with_capacity(attrs.len());
        for attr in attrs {
            let Attr { name, value } = attr;
            if name.local.is_empty() {
                tracing::debug!(element = %qname, "skipping attribute with empty name");
                continue;
            }
            let key = if name.space.is_empty() {
                name.local
            } else if name.is_prefix_ns_decl() {
                format!("xmlns:{}", name.local)
            } else if name.space == XML_NAMESPACE {
                format!("xml:{}", name.local)
            } else {
                let prefix = match self.bindings.find_prefix(&name.space, false) {
                    Some(prefix) => prefix,
                    None => {
                        let prefix = self.generate_prefix(&name.space);
                        decls.push((format!("xmlns:{}", prefix), name.space.clone()));
                        self.bindings.bind(&prefix, &name.space);
                        prefix
                    }
                };
                format!("{}:{}", prefix, name.local)
            };
            keyed.push((key, value));
        }

        let mut start = BytesStart::new(qname.as_str());
        for (key, value) in decls.iter().chain(keyed.iter()) {
            start.push_attribute(Attribute {
                key: QName(key.as_bytes()),
                value: Cow::Owned(escape(value).into_owned().into_bytes()),
            });
        }
        self.open.push(qname.clone());
        self.writer.write_event(Event::Start(start))?;
        Ok(())
    }

    fn write_end(&mut self, name: Name) -> Result<()> {
        let Some(qname) = self.open.pop() else {
            return Err(Error::UnexpectedToken {
                token: format!("{:?}", Token::End { name }),
            });
        };
        self.bindings.close();
        self.writer.write_event(Event::End(BytesEnd::new(qname)))?;
        Ok(())
    }

    fn write_raw(&mut self, parts: &[&str]) -> Result<()> {
        let out = self.writer.get_mut();
        for part in parts {
            out.write_all(part.as_bytes())?;
        }
        Ok(())
    }
}

impl<W: Write> TokenSink for XmlTokenWriter<W> {
    fn write_token(&mut self, token: Token) -> Result<()> {
        match token {
            Token::Start { name, attrs } => self.write_start(name, attrs),
            Token::End { name } => self.write_end(name),
            Token::CharData(content) => {
                self.writer
                    .write_event(Event::Text(BytesText::from_escaped(escape(&content))))?;
                Ok(())
            }
            Token::Comment(content) => {
                check_comment(&content)?;
                self.writer
                    .write_event(Event::Comment(BytesText::from_escaped(content)))?;
                Ok(())
            }
            Token::ProcInst { target, content } => {
                check_instruction(&target, &content)?;
                if content.is_empty() {
                    self.write_raw(&["<?", &target, "?>"])
                } else {
                    self.write_raw(&["<?", &target, " ", &content, "?>"])
                }
            }
            Token::Directive(content) => {
                check_directive(&content)?;
                self.write_raw(&["<!", &content, ">"])
            }
        }
    }
}

/// Whether `s` can be used as a namespace prefix.
fn is_name(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(tokens: Vec<Token>) -> String {
        let mut writer = XmlTokenWriter::new(Vec::new());
        for token in tokens {
            writer.write_token(token).unwrap();
        }
        String::from_utf8(writer.finish()).unwrap()
    }

    fn start(name: Name, attrs: Vec<Attr>) -> Token {
        Token::Start { name, attrs }
    }

    fn end(name: Name) -> Token {
        Token::End { name }
    }

    #[test]
    fn test_write_escapes_text_and_attributes() {
        let out = write(vec![
            start(Name::local("a"), vec![Attr::new(Name::local("q"), "\"<&>\"")]),
            Token::CharData("1 < 2 & 3".to_string()),
            Token::Comment(" raw <b> ".to_string()),
            end(Name::local("a")),
        ]);
        assert_eq!(
            out,
            "<a q=\"&quot;&lt;&amp;&gt;&quot;\">1 &lt; 2 &amp; 3<!-- raw <b> --></a>"
        );
    }

    #[test]
    fn test_write_instructions_and_directives() {
        let out = write(vec![
            Token::ProcInst {
                target: "xml".to_string(),
                content: "version=\"1.0\"".to_string(),
            },
            Token::ProcInst {
                target: "bare".to_string(),
                content: String::new(),
            },
            Token::Directive("DOCTYPE html".to_string()),
        ]);
        assert_eq!(out, "<?xml version=\"1.0\"?><?bare?><!DOCTYPE html>");
    }

    #[test]
    fn test_write_declares_default_namespace_once() {
        let out = write(vec![
            start(Name::new("urn:a", "one"), vec![]),
            start(Name::new("urn:a", "two"), vec![]),
            end(Name::new("urn:a", "two")),
            start(Name::local("three"), vec![]),
            end(Name::local("three")),
            end(Name::new("urn:a", "one")),
        ]);
        assert_eq!(
            out,
            "<one xmlns=\"urn:a\"><two></two><three xmlns=\"\"></three></one>"
        );
    }

    #[test]
    fn test_write_reuses_bound_prefix() {
        let out = write(vec![
            start(
                Name::new("urn:a", "one"),
                vec![
                    Attr::new(Name::new("xmlns", "a"), "urn:a"),
                    Attr::new(Name::new("urn:a", "attr"), "v"),
                ],
            ),
            start(Name::new("urn:a", "two"), vec![]),
            end(Name::new("urn:a", "two")),
            end(Name::new("urn:a", "one")),
        ]);
        assert_eq!(
            out,
            "<a:one xmlns:a=\"urn:a\" a:attr=\"v\"><a:two></a:two></a:one>"
        );
    }

    #[test]
    fn test_write_suppressed_name_with_default_declaration() {
        let out = write(vec![
            start(
                Name::local("one"),
                vec![Attr::new(Name::local("xmlns"), "urn:a")],
            ),
            start(Name::local("two"), vec![]),
            end(Name::local("two")),
            end(Name::local("one")),
        ]);
        assert_eq!(
            out,
            "<one xmlns=\"urn:a\"><two xmlns=\"\"></two></one>"
        );
    }

    #[test]
    fn test_write_generates_attribute_prefixes() {
        let out = write(vec![
            start(
                Name::local("a"),
                vec![
                    Attr::new(Name::new("http://example.com/ns/", "x"), "1"),
                    Attr::new(Name::new("http://other.org/ns", "y"), "2"),
                    Attr::new(Name::new(XML_NAMESPACE, "lang"), "en"),
                    Attr::new(Name::new("urn:z", "z"), "3"),
                ],
            ),
            end(Name::local("a")),
        ]);
        assert_eq!(
            out,
            concat!(
                "<a xmlns:ns=\"http://example.com/ns/\" xmlns:ns_1=\"http://other.org/ns\" ",
                "xmlns:_=\"urn:z\" ns:x=\"1\" ns_1:y=\"2\" xml:lang=\"en\" _:z=\"3\"></a>"
            )
        );
    }

    #[test]
    fn test_write_element_namespace_conflicting_with_own_default() {
        let out = write(vec![
            start(
                Name::new("urn:a", "one"),
                vec![Attr::new(Name::local("xmlns"), "urn:b")],
            ),
            end(Name::new("urn:a", "one")),
        ]);
        assert_eq!(out, "<_:one xmlns:_=\"urn:a\" xmlns=\"urn:b\"></_:one>");
    }

    #[test]
    fn test_write_end_without_start_is_an_error() {
        let mut writer = XmlTokenWriter::new(Vec::new());
        let err = writer.write_token(end(Name::local("a"))).unwrap_err();
        assert!(matches!(err, Error::UnexpectedToken { .. }));
    }

    fn write_err(token: Token) -> Error {
        let mut writer = XmlTokenWriter::new(Vec::new());
        let err = writer.write_token(token).unwrap_err();
        assert!(writer.finish().is_empty());
        err
    }

    #[test]
    fn test_write_rejects_comment_that_ends_early() {
        let err = write_err(Token::Comment("a -- b".to_string()));
        assert_eq!(
            err.to_string(),
            "cannot encode comment: comments must not contain \"--\""
        );

        let err = write_err(Token::Comment("trailing-".to_string()));
        assert!(matches!(err, Error::InvalidContent { kind: "comment", .. }));
    }

    #[test]
    fn test_write_rejects_instruction_that_ends_early() {
        let err = write_err(Token::ProcInst {
            target: "t".to_string(),
            content: "a ?> <b/>".to_string(),
        });
        assert_eq!(
            err.to_string(),
            "cannot encode processing instruction: content must not contain \"?>\""
        );

        let err = write_err(Token::ProcInst {
            target: "a b".to_string(),
            content: String::new(),
        });
        assert!(matches!(
            err,
            Error::InvalidContent {
                kind: "processing instruction",
                ..
            }
        ));
    }

    #[test]
    fn test_write_rejects_unbalanced_directive() {
        for content in ["DOCTYPE a> <b", "DOCTYPE a \"unclosed", "DOCTYPE a [<!ENTITY x"] {
            let err = write_err(Token::Directive(content.to_string()));
            assert!(
                matches!(err, Error::InvalidContent { kind: "declaration", .. }),
                "{} gave {:?}",
                content,
                err
            );
        }
    }

    #[test]
    fn test_write_accepts_directive_with_internal_subset() {
        let out = write(vec![Token::Directive(
            "DOCTYPE a [<!ENTITY x \"y>\"><!-- c > d -->]".to_string(),
        )]);
        assert_eq!(out, "<!DOCTYPE a [<!ENTITY x \"y>\"><!-- c > d -->]>");
    }

    #[test]
    fn test_write_escapes_carriage_returns() {
        let out = write(vec![
            start(Name::local("a"), vec![Attr::new(Name::local("k"), "1\r2")]),
            Token::CharData("x\r\ny".to_string()),
            end(Name::local("a")),
        ]);
        assert_eq!(out, "<a k=\"1&#xD;2\">x&#xD;\ny</a>");
    }

    #[test]
    fn test_to_xml_writer_checks_before_writing() {
        let nodes = vec![
            Node::Elem(crate::Elem::new(Name::local("ok"), vec![])),
            Node::comment("bad -- comment"),
        ];
        let mut out = Vec::new();
        let err = to_xml_writer(&mut out, &nodes).unwrap_err();
        assert!(matches!(err, Error::InvalidContent { .. }));
        assert!(out.is_empty());
    }

    #[test]
    fn test_write_prefix_rebinding_is_scoped() {
        let out = write(vec![
            start(
                Name::new("urn:1", "a"),
                vec![Attr::new(Name::new("xmlns", "p"), "urn:1")],
            ),
            start(
                Name::new("urn:2", "b"),
                vec![Attr::new(Name::new("xmlns", "p"), "urn:2")],
            ),
            end(Name::new("urn:2", "b")),
            start(Name::new("urn:1", "c"), vec![]),
            end(Name::new("urn:1", "c")),
            start(Name::new("urn:2", "d"), vec![]),
            end(Name::new("urn:2", "d")),
            end(Name::new("urn:1", "a")),
        ]);
        assert_eq!(
            out,
            concat!(
                "<p:a xmlns:p=\"urn:1\"><p:b xmlns:p=\"urn:2\"></p:b>",
                "<p:c></p:c><d xmlns=\"urn:2\"></d></p:a>"
            )
        );
    }

    #[test]
    fn test_is_name() {
        assert!(is_name("ns_outer"));
        assert!(is_name("a-b.c"));
        assert!(!is_name(""));
        assert!(!is_name("1abc"));
        assert!(!is_name("urn:x"));
    }
}
