use tracing::trace;

use crate::ast::{Expression, Node};
use crate::error::SyntaxError;
use crate::lexer::{Token, TokenKind};
use crate::options::Options;

/// Names that cannot be used as a loop variable.
const RESERVED: [&str; 10] = [
    "and", "or", "not", "in", "True", "False", "None", "true", "false", "none",
];

/// An entry in a block's flat child list before `elif`/`else` folding.
#[derive(Debug, Clone, PartialEq)]
pub enum Child {
    Node(Node),
    Elif { condition: Expression },
    Else,
}

#[derive(Debug)]
enum Block {
    If {
        condition: Expression,
    },
    For {
        target: String,
        iterable: Expression,
    },
}

#[derive(Debug)]
struct Frame {
    block: Block,
    children: Vec<Child>,
    // Tree depth of the content currently being collected. Each `elif`
    // pushes later content one level deeper.
    depth: usize,
}

/// Builds the tree from a token sequence with a stack of open blocks.
///
/// The root block is kept apart from the stack, so `open` and `expecting`
/// always have the same length.
pub struct Parser<'o> {
    options: &'o Options,
    root: Vec<Child>,
    open: Vec<Frame>,
    expecting: Vec<&'static str>,
}

/// Parse `tokens` into a `Node::Root`.
pub fn parse(tokens: Vec<Token>, options: &Options) -> Result<Node, SyntaxError> {
    Parser::new(options).parse(tokens)
}

impl<'o> Parser<'o> {
    pub fn new(options: &'o Options) -> Self {
        Self {
            options,
            root: Vec::new(),
            open: Vec::new(),
            expecting: Vec::new(),
        }
    }

    pub fn parse(mut self, tokens: Vec<Token>) -> Result<Node, SyntaxError> {
        for token in tokens {
            match token.kind {
                TokenKind::Text => self.push(Child::Node(Node::Text(token.text))),
                TokenKind::Print => self.push(Child::Node(Node::Print(Expression::new(&token.text)))),
                TokenKind::Instruction => self.instruction(&token)?,
            }
        }

        if let Some(&expected) = self.expecting.last() {
            return Err(SyntaxError::UnterminatedBlock { expected });
        }

        Ok(Node::Root(into_nodes(self.root)))
    }

    fn push(&mut self, child: Child) {
        self.children().push(child);
    }

    fn children(&mut self) -> &mut Vec<Child> {
        match self.open.last_mut() {
            Some(frame) => &mut frame.children,
            None => &mut self.root,
        }
    }

    fn current_depth(&self) -> usize {
        self.open.last().map_or(0, |frame| frame.depth)
    }

    fn instruction(&mut self, token: &Token) -> Result<(), SyntaxError> {
        let position = token.span.start;
        let text = token.text.as_str();

        match token.keyword() {
            "if" => {
                let condition = if_condition(text, "if").ok_or_else(|| SyntaxError::InvalidIfSyntax {
                    instruction: text.to_string(),
                    position,
                })?;
                self.open_block(Block::If { condition }, "endif", position)
            }
            "for" => {
                let (target, iterable) = for_header(text).ok_or_else(|| SyntaxError::InvalidForSyntax {
                    instruction: text.to_string(),
                    position,
                })?;
                self.open_block(Block::For { target, iterable }, "endfor", position)
            }
            "elif" => self.elif(text, position),
            "else" => self.else_(position),
            "endif" => self.close_block("endif", position),
            "endfor" => self.close_block("endfor", position),
            _ => Err(SyntaxError::UnknownInstruction {
                instruction: text.to_string(),
                position,
            }),
        }
    }

    fn open_block(&mut self, block: Block, end: &'static str, position: usize) -> Result<(), SyntaxError> {
        let depth = self.current_depth() + 1;
        if depth > self.options.max_depth {
            return Err(SyntaxError::NestingTooDeep {
                limit: self.options.max_depth,
                position,
            });
        }

        trace!(end, depth, position, "open block");
        self.open.push(Frame {
            block,
            children: Vec::new(),
            depth,
        });
        self.expecting.push(end);
        Ok(())
    }

    fn elif(&mut self, text: &str, position: usize) -> Result<(), SyntaxError> {
        let max_depth = self.options.max_depth;
        let Some(frame) = self.open.last_mut() else {
            return Err(SyntaxError::OrphanElif { position });
        };
        let condition = if_condition(text, "elif").ok_or_else(|| SyntaxError::InvalidIfSyntax {
            instruction: text.to_string(),
            position,
        })?;
        // A `for` body has no branches to switch to.
        if matches!(frame.block, Block::For { .. }) {
            trace!(position, "elif inside for ignored");
            return Ok(());
        }

        // The branch after an `elif` lives in a nested `If`.
        frame.depth += 1;
        if frame.depth > max_depth {
            return Err(SyntaxError::NestingTooDeep {
                limit: max_depth,
                position,
            });
        }
        frame.children.push(Child::Elif { condition });
        Ok(())
    }

    fn else_(&mut self, position: usize) -> Result<(), SyntaxError> {
        match self.open.last_mut() {
            None => Err(SyntaxError::OrphanElse { position }),
            Some(Frame {
                block: Block::For { .. },
                ..
            }) => {
                trace!(position, "else inside for ignored");
                Ok(())
            }
            Some(frame) => {
                frame.children.push(Child::Else);
                Ok(())
            }
        }
    }

    fn close_block(&mut self, keyword: &'static str, position: usize) -> Result<(), SyntaxError> {
        let Some(&expected) = self.expecting.last() else {
            return Err(match keyword {
                "endif" => SyntaxError::MissingIf { position },
                _ => SyntaxError::MissingFor { position },
            });
        };
        if expected != keyword {
            return Err(SyntaxError::MismatchedEnd {
                expected,
                found: keyword,
                position,
            });
        }

        self.expecting.pop();
        if let Some(frame) = self.open.pop() {
            trace!(keyword, position, "close block");
            let node = match frame.block {
                Block::If { condition, .. } => fold_if(condition, frame.children),
                Block::For { target, iterable } => Node::For {
                    target,
                    iterable,
                    body: into_nodes(frame.children),
                },
            };
            self.push(Child::Node(node));
        }
        Ok(())
    }
}

/// Fold an `if` block's flat child list into its branches.
///
/// Content before the first marker is the true branch. An `else` with no
/// `elif` before it switches to the false branch; a repeated `else` keeps
/// appending there. The first `elif` replaces the false branch with a nested
/// `If` that collects everything after it, including later `elif`s and the
/// `else`, and is folded the same way.
pub fn fold_if(condition: Expression, children: Vec<Child>) -> Node {
    let mut true_branch = Vec::new();
    let mut false_branch = Vec::new();
    let mut in_else = false;
    let mut nested: Option<(Expression, Vec<Child>)> = None;

    for child in children {
        if let Some((_, pending)) = nested.as_mut() {
            pending.push(child);
            continue;
        }
        match child {
            Child::Elif { condition } => nested = Some((condition, Vec::new())),
            Child::Else => in_else = true,
            Child::Node(node) if in_else => false_branch.push(node),
            Child::Node(node) => true_branch.push(node),
        }
    }

    if let Some((condition, pending)) = nested {
        false_branch = vec![fold_if(condition, pending)];
    }

    Node::If {
        condition,
        true_branch,
        false_branch,
    }
}

fn into_nodes(children: Vec<Child>) -> Vec<Node> {
    // Markers only ever reach `if` blocks, which are folded instead.
    children
        .into_iter()
        .filter_map(|child| match child {
            Child::Node(node) => Some(node),
            Child::Elif { .. } | Child::Else => None,
        })
        .collect()
}

/// `if <expr>` / `elif <expr>`.
fn if_condition(text: &str, keyword: &str) -> Option<Expression> {
    let expr = text.strip_prefix(keyword)?;
    if !expr.starts_with(char::is_whitespace) || expr.trim().is_empty() {
        return None;
    }
    Some(Expression::new(expr))
}

/// `for <name> in <expr>`.
fn for_header(text: &str) -> Option<(String, Expression)> {
    let rest = text.strip_prefix("for")?;
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let (target, rest) = rest.trim_start().split_once(char::is_whitespace)?;
    if !is_identifier(target) {
        return None;
    }
    let iterable = rest.trim_start().strip_prefix("in")?;
    if !iterable.starts_with(char::is_whitespace) || iterable.trim().is_empty() {
        return None;
    }
    Some((target.to_string(), Expression::new(iterable)))
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let starts_well = chars
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_');
    starts_well && chars.all(|c| c.is_alphanumeric() || c == '_') && !RESERVED.contains(&name)
}
