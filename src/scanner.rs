//! Tag scanning: find every delimiter in the template and check that they
//! form a flat sequence of matched, non-nesting pairs.

use crate::error::SyntaxError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagKind {
    Comment,
    Instruction,
    Print,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delimiter {
    CommentOpen,  // {#
    CommentClose, // #}
    BlockOpen,    // {%
    BlockClose,   // %}
    PrintOpen,    // {{
    PrintClose,   // }}
}

pub const DELIMITERS: [Delimiter; 6] = [
    Delimiter::CommentOpen,
    Delimiter::CommentClose,
    Delimiter::BlockOpen,
    Delimiter::BlockClose,
    Delimiter::PrintOpen,
    Delimiter::PrintClose,
];

/// Every delimiter is exactly two bytes.
pub const DELIMITER_LEN: usize = 2;

impl Delimiter {
    pub fn as_str(self) -> &'static str {
        match self {
            Delimiter::CommentOpen => "{#",
            Delimiter::CommentClose => "#}",
            Delimiter::BlockOpen => "{%",
            Delimiter::BlockClose => "%}",
            Delimiter::PrintOpen => "{{",
            Delimiter::PrintClose => "}}",
        }
    }

    pub fn kind(self) -> TagKind {
        match self {
            Delimiter::CommentOpen | Delimiter::CommentClose => TagKind::Comment,
            Delimiter::BlockOpen | Delimiter::BlockClose => TagKind::Instruction,
            Delimiter::PrintOpen | Delimiter::PrintClose => TagKind::Print,
        }
    }

    pub fn is_opening(self) -> bool {
        matches!(
            self,
            Delimiter::CommentOpen | Delimiter::BlockOpen | Delimiter::PrintOpen
        )
    }

    /// The closing delimiter an opening one expects. Closing delimiters map
    /// to themselves.
    pub fn partner(self) -> Delimiter {
        match self {
            Delimiter::CommentOpen => Delimiter::CommentClose,
            Delimiter::BlockOpen => Delimiter::BlockClose,
            Delimiter::PrintOpen => Delimiter::PrintClose,
            closing => closing,
        }
    }
}

/// One delimiter occurrence in the template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tag {
    pub position: usize,
    pub delimiter: Delimiter,
}

impl Tag {
    pub fn kind(&self) -> TagKind {
        self.delimiter.kind()
    }

    pub fn is_opening(&self) -> bool {
        self.delimiter.is_opening()
    }

    /// Byte offset just past the delimiter.
    pub fn end(&self) -> usize {
        self.position + DELIMITER_LEN
    }
}

/// Find all tags in `text`, ordered by position, and validate their balance.
///
/// On success the result alternates opening and closing tags, each closing
/// tag matching the opening tag before it.
pub fn scan(text: &str) -> Result<Vec<Tag>, SyntaxError> {
    let tags = find_all(text);
    validate(&tags)?;
    Ok(tags)
}

fn find_all(text: &str) -> Vec<Tag> {
    let mut found: Vec<Tag> = DELIMITERS
        .iter()
        .flat_map(|&delimiter| {
            text.match_indices(delimiter.as_str())
                .map(move |(position, _)| Tag {
                    position,
                    delimiter,
                })
        })
        .collect();
    found.sort_by_key(|tag| tag.position);

    // Different delimiters can overlap (`{%}`); the earlier one wins.
    let mut tags: Vec<Tag> = Vec::with_capacity(found.len());
    for tag in found {
        match tags.last() {
            Some(prev) if tag.position < prev.end() => continue,
            _ => tags.push(tag),
        }
    }
    tags
}

fn validate(tags: &[Tag]) -> Result<(), SyntaxError> {
    let mut open: Option<Tag> = None;

    for tag in tags {
        let delimiter = tag.delimiter;
        match open {
            Some(_) if delimiter.is_opening() => {
                return Err(SyntaxError::ConsecutiveOpeningTag {
                    tag: delimiter.as_str(),
                    position: tag.position,
                });
            }
            None if delimiter.is_opening() => open = Some(*tag),
            None => {
                return Err(SyntaxError::UnmatchedClosingTag {
                    tag: delimiter.as_str(),
                    position: tag.position,
                });
            }
            Some(opening) => {
                let expected = opening.delimiter.partner();
                if expected != delimiter {
                    return Err(SyntaxError::MismatchedClosingTag {
                        opening: opening.delimiter.as_str(),
                        expected: expected.as_str(),
                        found: delimiter.as_str(),
                        position: tag.position,
                    });
                }
                open = None;
            }
        }
    }

    match open {
        Some(opening) => Err(SyntaxError::UnterminatedOpeningTag {
            tag: opening.delimiter.as_str(),
            position: opening.position,
        }),
        None => Ok(()),
    }
}
