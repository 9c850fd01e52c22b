//! Core types for the generic XML node tree.

/// Namespace URI permanently bound to the `xml` prefix.
pub const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// Discriminators used by the JSON form of [`Node`].
pub const TYPE_PI: &str = "pi";
pub const TYPE_DECL: &str = "decl";
pub const TYPE_COMMENT: &str = "comment";
pub const TYPE_TEXT: &str = "text";
pub const TYPE_ELEM: &str = "elem";

/// An XML name with a namespace part and a local part.
///
/// The namespace part is the resolved URI, not the prefix used in the source
/// document. For namespace declarations (`xmlns:foo="..."`) the space is the
/// literal `xmlns` and the local part is the declared prefix.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Name {
    /// Namespace URI, or empty when the name is not in a namespace.
    pub space: String,

    /// Local part of the name.
    pub local: String,
}

/// An XML attribute.
///
/// Namespace declarations are ordinary attributes: `xmlns="uri"` has the name
/// `{space: "", local: "xmlns"}` and `xmlns:p="uri"` has the name
/// `{space: "xmlns", local: "p"}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Attr {
    pub name: Name,
    pub value: String,
}

/// A processing instruction such as `<?xml version="1.0"?>`.
///
/// The content is kept as raw text and is not parsed into pseudo-attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Pi {
    pub target: String,
    pub content: String,
}

/// An arbitrary XML element.
///
/// Attributes are kept as a list so that their order, and anything that looks
/// like a duplicate, survives a round trip.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Elem {
    pub name: Name,
    pub attrs: Vec<Attr>,
    pub nodes: Nodes,
}

/// Any XML node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Node {
    /// Processing instruction.
    Pi(Pi),

    /// Declaration such as `<!DOCTYPE html>`, stored without the `<!` and `>`.
    Decl(String),

    /// Comment body, without `<!--` and `-->`.
    Comment(String),

    /// Character data, unescaped.
    Text(String),

    /// Element with its attributes and child nodes.
    Elem(Elem),
}

/// A sequence of nodes: the children of an element, or a whole document
/// including its prolog.
pub type Nodes = Vec<Node>;

impl Name {
    /// Create a name in the given namespace.
    pub fn new(space: impl Into<String>, local: impl Into<String>) -> Self {
        Self {
            space: space.into(),
            local: local.into(),
        }
    }

    /// Create a name with no namespace.
    pub fn local(local: impl Into<String>) -> Self {
        Self::new(String::new(), local)
    }

    /// Whether this is the default namespace declaration `xmlns`.
    pub fn is_default_ns_decl(&self) -> bool {
        self.space.is_empty() && self.local == "xmlns"
    }

    /// Whether this is a prefixed namespace declaration `xmlns:<prefix>`.
    pub fn is_prefix_ns_decl(&self) -> bool {
        self.space == "xmlns"
    }
}

impl Attr {
    pub fn new(name: Name, value: impl Into<String>) -> Self {
        Self {
            name,
            value: value.into(),
        }
    }
}

impl Pi {
    pub fn new(target: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            content: content.into(),
        }
    }
}

impl Elem {
    /// Create an element without children.
    pub fn new(name: Name, attrs: Vec<Attr>) -> Self {
        Self {
            name,
            attrs,
            nodes: Vec::new(),
        }
    }

    /// Builder-style helper to set the child nodes.
    pub fn with_nodes(mut self, nodes: Nodes) -> Self {
        self.nodes = nodes;
        self
    }

    /// Get the value of the first attribute with the given name.
    pub fn attr(&self, space: &str, local: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|a| a.name.space == space && a.name.local == local)
            .map(|a| a.value.as_str())
    }

    /// Check for an attribute matching name and value exactly.
    pub fn has_exact_attr(&self, space: &str, local: &str, value: &str) -> bool {
        self.attrs
            .iter()
            .any(|a| a.name.space == space && a.name.local == local && a.value == value)
    }

    /// Direct child elements, skipping text, comments and the rest.
    pub fn child_elems(&self) -> impl Iterator<Item = &Elem> {
        self.nodes.iter().filter_map(Node::as_elem)
    }

    /// Concatenated direct text children.
    pub fn text(&self) -> String {
        self.nodes
            .iter()
            .filter_map(|n| match n {
                Node::Text(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Name to use for the start tag when re-encoding.
    ///
    /// An element carrying `xmlns="<its own namespace>"` already declares its
    /// namespace through that attribute, so the tag name is emitted without a
    /// space. Otherwise the writer would add a second declaration, and those
    /// accumulate over repeated decode/encode cycles.
    pub fn encoding_name(&self) -> Name {
        if !self.name.space.is_empty() && self.has_exact_attr("", "xmlns", &self.name.space) {
            Name::local(self.name.local.clone())
        } else {
            self.name.clone()
        }
    }
}

impl Node {
    pub fn pi(target: impl Into<String>, content: impl Into<String>) -> Self {
        Node::Pi(Pi::new(target, content))
    }

    pub fn decl(content: impl Into<String>) -> Self {
        Node::Decl(content.into())
    }

    pub fn comment(content: impl Into<String>) -> Self {
        Node::Comment(content.into())
    }

    pub fn text(content: impl Into<String>) -> Self {
        Node::Text(content.into())
    }

    /// The JSON discriminator for this node.
    pub fn kind(&self) -> &'static str {
        match self {
            Node::Pi(_) => TYPE_PI,
            Node::Decl(_) => TYPE_DECL,
            Node::Comment(_) => TYPE_COMMENT,
            Node::Text(_) => TYPE_TEXT,
            Node::Elem(_) => TYPE_ELEM,
        }
    }

    pub fn as_elem(&self) -> Option<&Elem> {
        match self {
            Node::Elem(elem) => Some(elem),
            _ => None,
        }
    }

    /// Whether this is a text node containing only whitespace.
    pub fn is_blank_text(&self) -> bool {
        matches!(self, Node::Text(text) if text.trim().is_empty())
    }
}

/// Children are released with an explicit stack so that dropping a deeply
/// nested tree doesn't overflow the call stack.
impl Drop for Elem {
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.nodes);
        while let Some(node) = pending.pop() {
            if let Node::Elem(mut elem) = node {
                pending.append(&mut elem.nodes);
            }
        }
    }
}

impl From<Pi> for Node {
    fn from(pi: Pi) -> Self {
        Node::Pi(pi)
    }
}

impl From<Elem> for Node {
    fn from(elem: Elem) -> Self {
        Node::Elem(elem)
    }
}
