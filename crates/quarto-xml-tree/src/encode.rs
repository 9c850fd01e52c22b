//! Markup encoder turning node trees back into tokens.

use crate::{Error, Name, Node, Result, Token, TokenSink};

/// Pending work while walking the tree.
enum Step<'a> {
    Emit(&'a Node),
    Close(Name),
}

/// Encode a sequence of nodes into a sink, in order and without separators.
///
/// The whole sequence is checked before anything is written, so a tree that
/// can't be encoded leaves the sink untouched.
///
/// # Example
///
/// ```rust
/// use quarto_xml_tree::{encode, Elem, Name, Node, Token};
///
/// let nodes = vec![Node::Elem(Elem::new(Name::local("a"), vec![]))];
/// let mut tokens: Vec<Token> = Vec::new();
/// encode(&nodes, &mut tokens).unwrap();
/// assert_eq!(tokens.len(), 2);
/// ```
///
/// # Errors
///
/// Returns [`Error::EmptyPiTarget`] or [`Error::EmptyElementName`] for nodes
/// that have no valid XML spelling, and any error reported by the sink.
pub fn encode<K: TokenSink + ?Sized>(nodes: &[Node], sink: &mut K) -> Result<()> {
    validate(nodes)?;

    let mut steps: Vec<Step<'_>> = nodes.iter().rev().map(Step::Emit).collect();
    while let Some(step) = steps.pop() {
        let node = match step {
            Step::Emit(node) => node,
            Step::Close(name) => {
                sink.write_token(Token::End { name })?;
                continue;
            }
        };

        match node {
            Node::Pi(pi) => sink.write_token(Token::ProcInst {
                target: pi.target.clone(),
                content: pi.content.clone(),
            })?,
            Node::Decl(content) => sink.write_token(Token::Directive(content.clone()))?,
            Node::Comment(content) => sink.write_token(Token::Comment(content.clone()))?,
            Node::Text(content) => sink.write_token(Token::CharData(content.clone()))?,
            Node::Elem(elem) => {
                let name = elem.encoding_name();
                sink.write_token(Token::Start {
                    name: name.clone(),
                    attrs: elem.attrs.clone(),
                })?;
                steps.push(Step::Close(name));
                steps.extend(elem.nodes.iter().rev().map(Step::Emit));
            }
        }
    }
    Ok(())
}

/// Encode a single node. See [`encode`].
pub fn encode_node<K: TokenSink + ?Sized>(node: &Node, sink: &mut K) -> Result<()> {
    encode(std::slice::from_ref(node), sink)
}

/// Check that every node in the tree can be written.
pub fn validate(nodes: &[Node]) -> Result<()> {
    let mut pending: Vec<&Node> = nodes.iter().collect();
    while let Some(node) = pending.pop() {
        match node {
            Node::Pi(pi) if pi.target.is_empty() => return Err(Error::EmptyPiTarget),
            Node::Elem(elem) => {
                if elem.name.local.is_empty() {
                    return Err(Error::EmptyElementName);
                }
                pending.extend(elem.nodes.iter());
            }
            _ => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Attr, Elem};

    #[test]
    fn test_encode_element_tokens_in_order() {
        let nodes = vec![
            Node::pi("xml", "version=\"1.0\""),
            Node::Elem(
                Elem::new(
                    Name::local("a"),
                    vec![
                        Attr::new(Name::local("z"), "1"),
                        Attr::new(Name::local("y"), "2"),
                    ],
                )
                .with_nodes(vec![
                    Node::text("x"),
                    Elem::new(Name::local("b"), vec![])
                        .with_nodes(vec![Node::comment("c")])
                        .into(),
                    Node::decl("odd but allowed"),
                ]),
            ),
        ];

        let mut tokens = Vec::new();
        encode(&nodes, &mut tokens).unwrap();

        assert_eq!(
            tokens,
            vec![
                Token::ProcInst {
                    target: "xml".to_string(),
                    content: "version=\"1.0\"".to_string(),
                },
                Token::Start {
                    name: Name::local("a"),
                    attrs: vec![
                        Attr::new(Name::local("z"), "1"),
                        Attr::new(Name::local("y"), "2"),
                    ],
                },
                Token::CharData("x".to_string()),
                Token::Start {
                    name: Name::local("b"),
                    attrs: vec![],
                },
                Token::Comment("c".to_string()),
                Token::End {
                    name: Name::local("b"),
                },
                Token::Directive("odd but allowed".to_string()),
                Token::End {
                    name: Name::local("a"),
                },
            ]
        );
    }

    #[test]
    fn test_encode_empty_pi_target_writes_nothing() {
        let nodes = vec![Node::text("before"), Node::pi("", "content")];
        let mut tokens = Vec::new();

        let err = encode(&nodes, &mut tokens).unwrap_err();
        assert!(matches!(err, Error::EmptyPiTarget));
        assert!(tokens.is_empty());
    }

    #[test]
    fn test_encode_nested_empty_element_name_writes_nothing() {
        let nodes = vec![Node::Elem(
            Elem::new(Name::local("ok"), vec![]).with_nodes(vec![
                Node::text("fine"),
                Elem::new(Name::new("urn:x", ""), vec![]).into(),
            ]),
        )];
        let mut tokens = Vec::new();

        let err = encode(&nodes, &mut tokens).unwrap_err();
        assert!(matches!(err, Error::EmptyElementName));
        assert!(tokens.is_empty());
    }

    #[test]
    fn test_encode_suppresses_redundant_namespace_on_tag() {
        let node = Node::Elem(Elem::new(
            Name::new("urn:a", "one"),
            vec![Attr::new(Name::local("xmlns"), "urn:a")],
        ));
        let mut tokens = Vec::new();
        encode_node(&node, &mut tokens).unwrap();

        assert_eq!(
            tokens[0],
            Token::Start {
                name: Name::local("one"),
                attrs: vec![Attr::new(Name::local("xmlns"), "urn:a")],
            }
        );
        assert_eq!(
            tokens[1],
            Token::End {
                name: Name::local("one"),
            }
        );
    }

    #[test]
    fn test_encode_reports_sink_errors() {
        struct Closed;

        impl TokenSink for Closed {
            fn write_token(&mut self, _token: Token) -> Result<()> {
                Err(Error::Io(std::io::Error::other("closed")))
            }
        }

        let err = encode_node(&Node::text("x"), &mut Closed).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
