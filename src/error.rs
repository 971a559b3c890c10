use thiserror::Error;

/// Errors raised while compiling a template.
///
/// Every variant carries the byte offset of the offending tag or instruction
/// in the template source. Compilation stops at the first error.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SyntaxError {
    #[error("opening tag `{tag}` at offset {position} found while another tag is still open")]
    ConsecutiveOpeningTag { tag: &'static str, position: usize },
    #[error("closing tag `{tag}` at offset {position} has no opening tag")]
    UnmatchedClosingTag { tag: &'static str, position: usize },
    #[error("closing tag `{found}` at offset {position} does not match opening `{opening}`, expected `{expected}`")]
    MismatchedClosingTag {
        opening: &'static str,
        expected: &'static str,
        found: &'static str,
        position: usize,
    },
    #[error("opening tag `{tag}` at offset {position} is never closed")]
    UnterminatedOpeningTag { tag: &'static str, position: usize },

    #[error("invalid if syntax at offset {position}: `{instruction}`")]
    InvalidIfSyntax { instruction: String, position: usize },
    #[error("invalid for syntax at offset {position}: `{instruction}`")]
    InvalidForSyntax { instruction: String, position: usize },
    #[error("`elif` at offset {position} is not inside a block")]
    OrphanElif { position: usize },
    #[error("`else` at offset {position} is not inside a block")]
    OrphanElse { position: usize },
    #[error("`endif` at offset {position} has no matching if")]
    MissingIf { position: usize },
    #[error("`endfor` at offset {position} has no matching for")]
    MissingFor { position: usize },
    #[error("`{found}` at offset {position} closes a block that expects `{expected}`")]
    MismatchedEnd {
        expected: &'static str,
        found: &'static str,
        position: usize,
    },
    #[error("block is never closed, expected `{expected}`")]
    UnterminatedBlock { expected: &'static str },
    #[error("blocks nested deeper than {limit} at offset {position}")]
    NestingTooDeep { limit: usize, position: usize },
    #[error("unknown instruction at offset {position}: `{instruction}`")]
    UnknownInstruction { instruction: String, position: usize },
}

impl SyntaxError {
    /// Byte offset of the offending tag, if the error points at one.
    pub fn position(&self) -> Option<usize> {
        use SyntaxError::*;

        match self {
            ConsecutiveOpeningTag { position, .. }
            | UnmatchedClosingTag { position, .. }
            | MismatchedClosingTag { position, .. }
            | UnterminatedOpeningTag { position, .. }
            | InvalidIfSyntax { position, .. }
            | InvalidForSyntax { position, .. }
            | OrphanElif { position }
            | OrphanElse { position }
            | MissingIf { position }
            | MissingFor { position }
            | MismatchedEnd { position, .. }
            | NestingTooDeep { position, .. }
            | UnknownInstruction { position, .. } => Some(*position),
            UnterminatedBlock { .. } => None,
        }
    }
}

/// Errors from the expression sub-language parser.
///
/// These never escape a render; an expression that fails to parse simply
/// renders as absent.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExprError {
    #[error("empty expression")]
    Empty,
    #[error("unexpected character `{0}`")]
    UnexpectedChar(char),
    #[error("unterminated string literal")]
    UnterminatedString,
    #[error("invalid number `{0}`")]
    InvalidNumber(String),
    #[error("expected {expected}, got {found}")]
    UnexpectedToken { expected: &'static str, found: String },
    #[error("expression nested too deeply")]
    TooDeep,
}

/// Errors while evaluating a parsed expression against a scope.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum EvalError {
    #[error("undefined name `{0}`")]
    Undefined(String),
    #[error("cannot apply `{op}` to {lhs} and {rhs}")]
    TypeMismatch {
        op: &'static str,
        lhs: &'static str,
        rhs: &'static str,
    },
    #[error("cannot negate {0}")]
    BadNegation(&'static str),
    #[error("key `{0}` not found")]
    MissingKey(String),
    #[error("index {0} out of range")]
    IndexOutOfRange(i64),
    #[error("cannot index {container} with {index}")]
    BadIndex {
        container: &'static str,
        index: &'static str,
    },
    #[error("integer overflow")]
    Overflow,
    #[error("expression did not parse: {0}")]
    Parse(#[from] ExprError),
}
