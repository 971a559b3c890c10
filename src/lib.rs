//! tinytmpl: a small tag-based text template engine.
//!
//! Templates mix literal text with three kinds of tags:
//!
//! - `{# ... #}` comments, dropped from the output.
//! - `{{ expr }}` prints an expression.
//! - `{% ... %}` instructions: `if <expr>`, `elif <expr>`, `else`, `endif`,
//!   `for <name> in <expr>`, `endfor`.
//!
//! Compiling a template validates the tags and the block structure and
//! builds a tree; rendering walks the tree against a data mapping and never
//! fails. Expressions that cannot be evaluated render as nothing, conditions
//! as false, and loops over non-collections as empty.
//!
//! ```
//! use tinytmpl::{Map, Template, Value};
//!
//! let template = Template::compile(
//!     "{% for item in basket %}{% if item != 'Banana' %}{{ item }}{% endif %}{% endfor %}",
//! )
//! .unwrap();
//!
//! let mut data = Map::new();
//! data.insert("basket".into(), Value::from(vec!["Apple", "Banana", "Cherry"]));
//! assert_eq!(template.render(Some(&data)), "AppleCherry");
//! ```
//!
//! Variable lookup sees only the innermost scope: inside a `for` body only
//! the loop variable is visible, not the names from the enclosing data.
//!
//! The expression language is intentionally small (literals, names,
//! `.attr`/`[key]` access, comparisons, `in`, `+`/`-`, `and`/`or`/`not`) and
//! has no way to call functions or reach outside the data it is given.

pub mod ast;
pub mod context;
pub mod error;
pub mod eval;
pub mod expr;
pub mod lexer;
pub mod options;
pub mod parser;
pub mod scanner;

use std::str::FromStr;

use serde::Serialize;
use tracing::{debug, warn};

pub use ast::{Expression, Node};
pub use context::Context;
pub use error::{EvalError, ExprError, SyntaxError};
pub use eval::{Map, Value};
pub use options::Options;

/// A compiled template. Immutable, and cheap to render many times.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    root: Node,
    options: Options,
}

impl Template {
    /// Compile with default [`Options`].
    pub fn compile(text: &str) -> Result<Self, SyntaxError> {
        Self::compile_with(text, &Options::default())
    }

    pub fn compile_with(text: &str, options: &Options) -> Result<Self, SyntaxError> {
        let tags = scanner::scan(text)?;
        let tokens = lexer::tokenize(text, &tags);
        debug!(tags = tags.len(), tokens = tokens.len(), "tokenized template");

        let root = parser::parse(tokens, options)?;
        Ok(Self {
            root,
            options: options.clone(),
        })
    }

    /// Render against `data`; `None` renders with no variables bound.
    pub fn render(&self, data: Option<&Map>) -> String {
        let empty = Map::new();
        let mut ctx = Context::new(data.unwrap_or(&empty));
        let output = self.root.render(&mut ctx);
        self.finish(output)
    }

    /// Render against any serializable value that serializes to a map.
    /// Anything else renders as if no data were given.
    pub fn render_serialize<S: Serialize + ?Sized>(&self, data: &S) -> String {
        let data = match serde_json::to_value(data).map(Value::from) {
            Ok(Value::Map(map)) => map,
            Ok(other) => {
                warn!(kind = other.type_name(), "template data is not a map, rendering without it");
                Map::new()
            }
            Err(err) => {
                warn!(%err, "template data failed to serialize, rendering without it");
                Map::new()
            }
        };
        self.render(Some(&data))
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    fn finish(&self, output: String) -> String {
        if !self.options.trim_output {
            return output;
        }
        output.trim().replace("\n\n", "\n")
    }
}

impl FromStr for Template {
    type Err = SyntaxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::compile(s)
    }
}

/// Compile `text` with default options.
pub fn compile(text: &str) -> Result<Template, SyntaxError> {
    Template::compile(text)
}

/// Render a compiled template; `None` means no data.
pub fn render(template: &Template, data: Option<&Map>) -> String {
    template.render(data)
}
