use crate::context::Context;
use crate::error::ExprError;
use crate::eval::Evaluator;
use crate::expr::{self, Expr};

/// Expression text from a tag, parsed once at compile time.
///
/// A parse failure is kept rather than reported: the expression simply
/// renders as absent unless its exact text is bound as a name.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    source: String,
    parsed: Result<Expr, ExprError>,
}

impl Expression {
    pub fn new(source: &str) -> Self {
        let source = source.trim();
        Self {
            source: source.to_string(),
            parsed: expr::parse(source),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn parsed(&self) -> Result<&Expr, &ExprError> {
        self.parsed.as_ref()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Root(Vec<Node>),
    Text(String),
    Print(Expression),
    If {
        condition: Expression,
        true_branch: Vec<Node>,
        // A single nested `If` for `elif`, empty without `else`.
        false_branch: Vec<Node>,
    },
    For {
        target: String,
        iterable: Expression,
        body: Vec<Node>,
    },
}

impl Node {
    pub fn children(&self) -> &[Node] {
        match self {
            Node::Root(children) => children,
            Node::For { body, .. } => body,
            Node::Text(_) | Node::Print(_) | Node::If { .. } => &[],
        }
    }

    pub fn render(&self, ctx: &mut Context<'_>) -> String {
        let mut out = String::new();
        self.render_into(ctx, &mut out);
        out
    }

    fn render_into(&self, ctx: &mut Context<'_>, out: &mut String) {
        match self {
            Node::Root(children) => render_all(children, ctx, out),
            Node::Text(text) => out.push_str(text),
            Node::Print(expr) => {
                out.push_str(&Evaluator::new(ctx.current()).evaluate_printable(expr))
            }
            Node::If {
                condition,
                true_branch,
                false_branch,
            } => {
                let branch = if Evaluator::new(ctx.current()).evaluate_boolean(condition) {
                    true_branch
                } else {
                    false_branch
                };
                render_all(branch, ctx, out);
            }
            Node::For {
                target,
                iterable,
                body,
            } => {
                let Some(items) = Evaluator::new(ctx.current()).evaluate_iterable(iterable) else {
                    return;
                };
                for item in items {
                    ctx.with_scope(|ctx| {
                        ctx.bind(target.as_str(), item);
                        render_all(body, ctx, out);
                    });
                }
            }
        }
    }
}

fn render_all(nodes: &[Node], ctx: &mut Context<'_>, out: &mut String) {
    for node in nodes {
        node.render_into(ctx, out);
    }
}
