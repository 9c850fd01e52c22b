//! Decoder that builds node trees from a token stream.
//!
//! Elements are assembled on an explicit stack of open elements rather than
//! by recursion, and [`Elem`] releases its children the same way, so decoding
//! and dropping a tree are limited by memory and not by the call stack.
//!
//! Cloning, comparing, formatting and serializing a tree to JSON still
//! recurse. Use [`DecodeOptions::with_max_depth`] to bound the depth of
//! untrusted input before doing any of those.

use crate::{Attr, Elem, Error, Name, Node, Nodes, Result, Token, TokenSource};

/// Options controlling [`decode_with`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Maximum element nesting depth. A top-level element has depth 1.
    pub max_depth: Option<usize>,
}

impl DecodeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = Some(max_depth);
        self
    }

    fn check_depth(&self, depth: usize) -> Result<()> {
        match self.max_depth {
            Some(limit) if depth > limit => Err(Error::DepthLimitExceeded { limit }),
            _ => Ok(()),
        }
    }
}

/// What a token contributes to the tree being built.
enum Step {
    Leaf(Node),
    Open(Name, Vec<Attr>),
    Close(Name),
}

impl From<Token> for Step {
    fn from(token: Token) -> Self {
        match token {
            Token::ProcInst { target, content } => Step::Leaf(Node::pi(target, content)),
            Token::Directive(content) => Step::Leaf(Node::Decl(content)),
            Token::Comment(content) => Step::Leaf(Node::Comment(content)),
            Token::CharData(content) => Step::Leaf(Node::Text(content)),
            Token::Start { name, attrs } => Step::Open(name, attrs),
            Token::End { name } => Step::Close(name),
        }
    }
}

/// Decode an arbitrary sequence of nodes, such as a whole document, until the
/// source is exhausted.
///
/// # Example
///
/// ```rust
/// use quarto_xml_tree::{decode, Node, XmlTokenReader};
///
/// let mut reader = XmlTokenReader::from_str("<?xml version=\"1.0\"?><a/>");
/// let nodes = decode(&mut reader).unwrap();
/// assert_eq!(nodes[0], Node::pi("xml", "version=\"1.0\""));
/// assert_eq!(nodes[1].as_elem().unwrap().name.local, "a");
/// ```
///
/// # Errors
///
/// Returns the first error reported by the source, or
/// [`Error::UnexpectedToken`] for an end tag that doesn't close anything.
pub fn decode<S: TokenSource + ?Sized>(source: &mut S) -> Result<Nodes> {
    decode_with(source, &DecodeOptions::default())
}

/// Like [`decode`], with explicit options.
pub fn decode_with<S: TokenSource + ?Sized>(
    source: &mut S,
    options: &DecodeOptions,
) -> Result<Nodes> {
    let mut nodes = Vec::new();
    while let Some(token) = source.next_token()? {
        nodes.push(decode_token_with(source, token, options)?);
    }
    Ok(nodes)
}

/// Decode one node starting at an already fetched token.
///
/// For a start tag this consumes the whole element, including its children
/// and its end tag.
pub fn decode_token<S: TokenSource + ?Sized>(source: &mut S, token: Token) -> Result<Node> {
    decode_token_with(source, token, &DecodeOptions::default())
}

/// Like [`decode_token`], with explicit options.
pub fn decode_token_with<S: TokenSource + ?Sized>(
    source: &mut S,
    token: Token,
    options: &DecodeOptions,
) -> Result<Node> {
    match Step::from(token) {
        Step::Leaf(node) => Ok(node),
        Step::Open(name, attrs) => decode_element_with(source, name, attrs, options).map(Node::Elem),
        Step::Close(name) => Err(Error::UnexpectedToken {
            token: format!("{:?}", Token::End { name }),
        }),
    }
}

/// Decode the rest of an element whose start tag has already been read.
pub fn decode_element<S: TokenSource + ?Sized>(
    source: &mut S,
    name: Name,
    attrs: Vec<Attr>,
) -> Result<Elem> {
    decode_element_with(source, name, attrs, &DecodeOptions::default())
}

/// Like [`decode_element`], with explicit options.
///
/// If the source ends before the matching end tag, every element still open
/// is closed as it stands and the result is returned without error.
pub fn decode_element_with<S: TokenSource + ?Sized>(
    source: &mut S,
    name: Name,
    attrs: Vec<Attr>,
    options: &DecodeOptions,
) -> Result<Elem> {
    options.check_depth(1)?;

    let mut current = Elem::new(name, attrs);
    let mut ancestors: Vec<Elem> = Vec::new();

    while let Some(token) = source.next_token()? {
        match Step::from(token) {
            Step::Leaf(node) => current.nodes.push(node),
            Step::Open(name, attrs) => {
                options.check_depth(ancestors.len() + 2)?;
                ancestors.push(std::mem::replace(&mut current, Elem::new(name, attrs)));
            }
            Step::Close(_) => match ancestors.pop() {
                Some(parent) => {
                    let child = std::mem::replace(&mut current, parent);
                    current.nodes.push(Node::Elem(child));
                }
                None => return Ok(current),
            },
        }
    }

    tracing::debug!(
        element = %current.name.local,
        open = ancestors.len() + 1,
        "input ended inside an element; closing open elements"
    );
    while let Some(parent) = ancestors.pop() {
        let child = std::mem::replace(&mut current, parent);
        current.nodes.push(Node::Elem(child));
    }
    Ok(current)
}
