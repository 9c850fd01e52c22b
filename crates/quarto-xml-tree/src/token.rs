//! Token vocabulary shared by the decoder and the encoder.
//!
//! A [`TokenSource`] yields tokens in document order and a [`TokenSink`]
//! accepts them in the same order. The decoder and encoder only talk to these
//! traits; tokenizing bytes and escaping text belong to the implementations,
//! such as [`XmlTokenReader`](crate::XmlTokenReader) and
//! [`XmlTokenWriter`](crate::XmlTokenWriter).

use crate::{Attr, Name, Result};

/// One lexical unit of an XML document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Start tag with its attributes in source order.
    Start { name: Name, attrs: Vec<Attr> },

    /// End tag.
    End { name: Name },

    /// Character data, already unescaped.
    CharData(String),

    /// Comment body.
    Comment(String),

    /// Processing instruction.
    ProcInst { target: String, content: String },

    /// Markup declaration such as `DOCTYPE html`.
    Directive(String),
}

/// Pull interface over a stream of tokens.
pub trait TokenSource {
    /// Fetch the next token. `Ok(None)` is a clean end of stream.
    fn next_token(&mut self) -> Result<Option<Token>>;
}

/// Push interface accepting tokens to serialize.
pub trait TokenSink {
    fn write_token(&mut self, token: Token) -> Result<()>;
}

impl<S: TokenSource + ?Sized> TokenSource for &mut S {
    fn next_token(&mut self) -> Result<Option<Token>> {
        (**self).next_token()
    }
}

impl<S: TokenSink + ?Sized> TokenSink for &mut S {
    fn write_token(&mut self, token: Token) -> Result<()> {
        (**self).write_token(token)
    }
}

/// In-memory token streams.
impl TokenSource for std::vec::IntoIter<Token> {
    fn next_token(&mut self) -> Result<Option<Token>> {
        Ok(self.next())
    }
}

/// Collects tokens in memory.
impl TokenSink for Vec<Token> {
    fn write_token(&mut self, token: Token) -> Result<()> {
        self.push(token);
        Ok(())
    }
}
