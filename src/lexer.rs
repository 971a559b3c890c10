use std::ops::Range;

use tracing::trace;

use crate::scanner::{Tag, TagKind, DELIMITER_LEN};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Text,
    Print,
    Instruction,
}

/// A classified piece of template text.
///
/// For print and instruction tokens `text` is the trimmed tag content and
/// `span` covers the whole tag including its delimiters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub span: Range<usize>,
}

impl Token {
    fn new(kind: TokenKind, text: &str, span: Range<usize>) -> Self {
        Self {
            kind,
            text: text.to_string(),
            span,
        }
    }

    /// First whitespace-separated word of an instruction.
    pub fn keyword(&self) -> &str {
        self.text.split_whitespace().next().unwrap_or("")
    }
}

/// Split `text` into tokens at the tags returned by [`crate::scanner::scan`].
///
/// `tags` must already be validated: alternating opening and matching closing
/// tags.
pub fn tokenize(text: &str, tags: &[Tag]) -> Vec<Token> {
    let mut tokens = Vec::with_capacity(tags.len() + 1);
    let mut cursor = 0;

    for pair in tags.chunks_exact(2) {
        let (open, close) = (pair[0], pair[1]);

        // Text before a tag loses its trailing whitespace so a tag on its own
        // line does not leave a blank line behind.
        let before = text[cursor..open.position].trim_end();
        if !before.is_empty() {
            push(&mut tokens, Token::new(TokenKind::Text, before, cursor..open.position));
        }

        let content = text[open.end()..close.position].trim();
        let span = open.position..close.end();
        match open.kind() {
            TagKind::Comment => trace!(?span, "skipping comment"),
            TagKind::Print => push(&mut tokens, Token::new(TokenKind::Print, content, span)),
            TagKind::Instruction => {
                push(&mut tokens, Token::new(TokenKind::Instruction, content, span))
            }
        }

        cursor = close.position + DELIMITER_LEN;
    }

    let rest = &text[cursor..];
    if !rest.is_empty() {
        push(&mut tokens, Token::new(TokenKind::Text, rest, cursor..text.len()));
    }

    tokens
}

fn push(tokens: &mut Vec<Token>, token: Token) {
    trace!(kind = ?token.kind, text = %token.text, span = ?token.span, "token");
    tokens.push(token);
}
