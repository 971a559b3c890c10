//! The expression sub-language used inside `{{ }}` and after `if`, `elif`
//! and `for ... in`.
//!
//! Deliberately small: literals, names, attribute and index access,
//! comparison, `+`/`-`, and boolean operators. There are no calls and no way
//! to reach anything outside the render scope.

use crate::error::ExprError;

/// Maximum depth of the parsed tree. Every operand of a binary operator
/// chain, postfix access, unary operator and parenthesis counts.
pub const MAX_EXPR_DEPTH: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    NotIn,
    Add,
    Sub,
    And,
    Or,
}

impl BinOp {
    pub fn as_str(self) -> &'static str {
        match self {
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::In => "in",
            BinOp::NotIn => "not in",
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::And => "and",
            BinOp::Or => "or",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    StringLit(String),
    IntLit(i64),
    FloatLit(f64),
    BoolLit(bool),
    NoneLit,
    Var(String),
    Attribute(Box<Expr>, String), // foo.bar
    Index(Box<Expr>, Box<Expr>),  // foo['bar']
    Not(Box<Expr>),
    Neg(Box<Expr>),
    BinOp(Box<Expr>, BinOp, Box<Expr>),
    /// `a < b <= c`: each comparison against the previous operand.
    Compare(Box<Expr>, Vec<(BinOp, Expr)>),
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    // Keywords
    And,
    Or,
    Not,
    In,
    True,
    False,
    None,

    // Symbols
    EqEq,     // ==
    NotEq,    // !=
    Lt,       // <
    LtEq,     // <=
    Gt,       // >
    GtEq,     // >=
    Plus,     // +
    Minus,    // -
    Dot,      // .
    LBracket, // [
    RBracket, // ]
    LParen,   // (
    RParen,   // )

    // Data
    Ident(String),
    StringLit(String),
    Int(i64),
    Float(f64),
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Ident(name) => format!("name `{name}`"),
            Token::StringLit(s) => format!("string {s:?}"),
            Token::Int(i) => format!("number {i}"),
            Token::Float(f) => format!("number {f}"),
            other => format!("{other:?}"),
        }
    }
}

struct Tokenizer<'a> {
    input: &'a str,
    cursor: usize,
}

impl<'a> Tokenizer<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, cursor: 0 }
    }

    fn remaining(&self) -> &'a str {
        &self.input[self.cursor..]
    }

    fn advance(&mut self, n: usize) {
        self.cursor += n;
    }

    fn next_token(&mut self) -> Result<Option<Token>, ExprError> {
        let rest = self.remaining();
        let trimmed = rest.trim_start();
        self.advance(rest.len() - trimmed.len());

        let rest = self.remaining();
        let Some(first) = rest.chars().next() else {
            return Ok(None);
        };

        const SYMBOLS: [(&str, Token); 13] = [
            ("==", Token::EqEq),
            ("!=", Token::NotEq),
            ("<=", Token::LtEq),
            (">=", Token::GtEq),
            ("<", Token::Lt),
            (">", Token::Gt),
            ("+", Token::Plus),
            ("-", Token::Minus),
            (".", Token::Dot),
            ("[", Token::LBracket),
            ("]", Token::RBracket),
            ("(", Token::LParen),
            (")", Token::RParen),
        ];
        // A dot followed by a digit starts a float, not an attribute.
        let leading_dot_number = first == '.' && rest[1..].starts_with(|c: char| c.is_ascii_digit());
        if !leading_dot_number {
            for (symbol, token) in SYMBOLS {
                if rest.starts_with(symbol) {
                    self.advance(symbol.len());
                    return Ok(Some(token));
                }
            }
        }

        if first == '\'' || first == '"' {
            return self.string(first).map(Some);
        }

        if first.is_ascii_digit() || leading_dot_number {
            return self.number().map(Some);
        }

        if first.is_alphabetic() || first == '_' {
            let len: usize = rest
                .chars()
                .take_while(|c| c.is_alphanumeric() || *c == '_')
                .map(char::len_utf8)
                .sum();
            let ident = &rest[..len];
            self.advance(len);

            return Ok(Some(match ident {
                "and" => Token::And,
                "or" => Token::Or,
                "not" => Token::Not,
                "in" => Token::In,
                "True" | "true" => Token::True,
                "False" | "false" => Token::False,
                "None" | "none" => Token::None,
                _ => Token::Ident(ident.to_string()),
            }));
        }

        Err(ExprError::UnexpectedChar(first))
    }

    fn string(&mut self, quote: char) -> Result<Token, ExprError> {
        let rest = self.remaining();
        let mut s = String::new();
        let mut chars = rest.char_indices().skip(1);

        while let Some((idx, c)) = chars.next() {
            if c == quote {
                self.advance(idx + c.len_utf8());
                return Ok(Token::StringLit(s));
            }
            if c == '\\' {
                match chars.next() {
                    Some((_, 'n')) => s.push('\n'),
                    Some((_, 't')) => s.push('\t'),
                    Some((_, 'r')) => s.push('\r'),
                    Some((_, esc)) => s.push(esc),
                    None => break,
                }
            } else {
                s.push(c);
            }
        }

        Err(ExprError::UnterminatedString)
    }

    fn number(&mut self) -> Result<Token, ExprError> {
        let rest = self.remaining();
        let mut len = 0;
        let mut seen_dot = false;
        for (idx, c) in rest.char_indices() {
            match c {
                '0'..='9' | '_' => {}
                // `1.x` is attribute access on an int, not a float.
                '.' if !seen_dot
                    && rest[idx + 1..].starts_with(|c: char| c.is_ascii_digit()) =>
                {
                    seen_dot = true
                }
                _ => break,
            }
            len = idx + c.len_utf8();
        }

        let exponent = exponent_len(&rest[len..]);
        len += exponent;

        let literal = &rest[..len];
        self.advance(len);
        let digits = literal.replace('_', "");

        if seen_dot || exponent > 0 {
            digits
                .parse::<f64>()
                .map(Token::Float)
                .map_err(|_| ExprError::InvalidNumber(literal.to_string()))
        } else {
            digits
                .parse::<i64>()
                .map(Token::Int)
                .map_err(|_| ExprError::InvalidNumber(literal.to_string()))
        }
    }
}

/// Length of an `e`/`E` exponent suffix such as `e3` or `E-05`, or 0.
fn exponent_len(rest: &str) -> usize {
    let Some(after_e) = rest.strip_prefix(|c: char| c == 'e' || c == 'E') else {
        return 0;
    };
    let sign = usize::from(after_e.starts_with(|c: char| c == '+' || c == '-'));
    let digits = after_e[sign..]
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(after_e.len() - sign);
    if digits == 0 {
        0
    } else {
        1 + sign + digits
    }
}

/// Parse an expression source string.
pub fn parse(source: &str) -> Result<Expr, ExprError> {
    let mut tokens = Vec::new();
    let mut lexer = Tokenizer::new(source);
    while let Some(token) = lexer.next_token()? {
        tokens.push(token);
    }
    if tokens.is_empty() {
        return Err(ExprError::Empty);
    }

    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let expr = parser.parse_expr()?;
    match parser.peek() {
        None => Ok(expr),
        Some(t) => Err(ExprError::UnexpectedToken {
            expected: "end of expression",
            found: t.describe(),
        }),
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, n: usize) -> Option<&Token> {
        self.tokens.get(self.pos + n)
    }

    fn consume(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, token: Token, expected: &'static str) -> Result<(), ExprError> {
        match self.consume() {
            Some(t) if t == token => Ok(()),
            Some(t) => Err(ExprError::UnexpectedToken {
                expected,
                found: t.describe(),
            }),
            None => Err(ExprError::UnexpectedToken {
                expected,
                found: "end of expression".to_string(),
            }),
        }
    }

    fn descend(&mut self) -> Result<(), ExprError> {
        self.depth += 1;
        if self.depth > MAX_EXPR_DEPTH {
            return Err(ExprError::TooDeep);
        }
        Ok(())
    }

    fn parse_expr(&mut self) -> Result<Expr, ExprError> {
        self.descend()?;
        let expr = self.parse_or();
        self.depth -= 1;
        expr
    }

    // Binary chains fold to the left, so each operand adds a level.
    fn parse_or(&mut self) -> Result<Expr, ExprError> {
        let depth = self.depth;
        let mut lhs = self.parse_and()?;
        while let Some(Token::Or) = self.peek() {
            self.consume();
            self.descend()?;
            let rhs = self.parse_and()?;
            lhs = Expr::BinOp(Box::new(lhs), BinOp::Or, Box::new(rhs));
        }
        self.depth = depth;
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, ExprError> {
        let depth = self.depth;
        let mut lhs = self.parse_not()?;
        while let Some(Token::And) = self.peek() {
            self.consume();
            self.descend()?;
            let rhs = self.parse_not()?;
            lhs = Expr::BinOp(Box::new(lhs), BinOp::And, Box::new(rhs));
        }
        self.depth = depth;
        Ok(lhs)
    }

    fn parse_not(&mut self) -> Result<Expr, ExprError> {
        if let Some(Token::Not) = self.peek() {
            self.consume();
            self.descend()?;
            let inner = self.parse_not();
            self.depth -= 1;
            return Ok(Expr::Not(Box::new(inner?)));
        }
        self.parse_comparison()
    }

    fn comparison_op(&self) -> Option<(BinOp, usize)> {
        let op = match self.peek()? {
            Token::EqEq => BinOp::Eq,
            Token::NotEq => BinOp::Ne,
            Token::Lt => BinOp::Lt,
            Token::LtEq => BinOp::Le,
            Token::Gt => BinOp::Gt,
            Token::GtEq => BinOp::Ge,
            Token::In => BinOp::In,
            Token::Not if self.peek_at(1) == Some(&Token::In) => return Some((BinOp::NotIn, 2)),
            _ => return None,
        };
        Some((op, 1))
    }

    fn parse_comparison(&mut self) -> Result<Expr, ExprError> {
        let lhs = self.parse_additive()?;
        if self.comparison_op().is_none() {
            return Ok(lhs);
        }

        // The chain is stored flat, so it costs one level however long it is.
        self.descend()?;
        let mut rest = Vec::new();
        while let Some((op, width)) = self.comparison_op() {
            self.pos += width;
            rest.push((op, self.parse_additive()?));
        }
        self.depth -= 1;

        if rest.len() == 1 {
            if let Some((op, rhs)) = rest.pop() {
                return Ok(Expr::BinOp(Box::new(lhs), op, Box::new(rhs)));
            }
        }
        Ok(Expr::Compare(Box::new(lhs), rest))
    }

    fn parse_additive(&mut self) -> Result<Expr, ExprError> {
        let depth = self.depth;
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinOp::Add,
                Some(Token::Minus) => BinOp::Sub,
                _ => break,
            };
            self.consume();
            self.descend()?;
            let rhs = self.parse_unary()?;
            lhs = Expr::BinOp(Box::new(lhs), op, Box::new(rhs));
        }
        self.depth = depth;
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, ExprError> {
        if let Some(Token::Minus) = self.peek() {
            self.consume();
            self.descend()?;
            let inner = self.parse_unary();
            self.depth -= 1;
            return Ok(match inner? {
                Expr::IntLit(i) => Expr::IntLit(-i),
                Expr::FloatLit(f) => Expr::FloatLit(-f),
                other => Expr::Neg(Box::new(other)),
            });
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expr, ExprError> {
        let depth = self.depth;
        let mut expr = self.parse_primary()?;

        loop {
            match self.peek() {
                Some(Token::Dot) => {
                    self.consume();
                    self.descend()?;
                    match self.consume() {
                        Some(Token::Ident(attr)) => {
                            expr = Expr::Attribute(Box::new(expr), attr);
                        }
                        Some(t) => {
                            return Err(ExprError::UnexpectedToken {
                                expected: "attribute name",
                                found: t.describe(),
                            })
                        }
                        None => {
                            return Err(ExprError::UnexpectedToken {
                                expected: "attribute name",
                                found: "end of expression".to_string(),
                            })
                        }
                    }
                }
                Some(Token::LBracket) => {
                    self.consume();
                    self.descend()?;
                    let idx = self.parse_expr()?;
                    self.expect(Token::RBracket, "`]`")?;
                    expr = Expr::Index(Box::new(expr), Box::new(idx));
                }
                _ => break,
            }
        }

        self.depth = depth;
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expr, ExprError> {
        match self.consume() {
            Some(Token::StringLit(s)) => Ok(Expr::StringLit(s)),
            Some(Token::Int(i)) => Ok(Expr::IntLit(i)),
            Some(Token::Float(f)) => Ok(Expr::FloatLit(f)),
            Some(Token::True) => Ok(Expr::BoolLit(true)),
            Some(Token::False) => Ok(Expr::BoolLit(false)),
            Some(Token::None) => Ok(Expr::NoneLit),
            Some(Token::Ident(s)) => Ok(Expr::Var(s)),
            Some(Token::LParen) => {
                let e = self.parse_expr()?;
                self.expect(Token::RParen, "`)`")?;
                Ok(e)
            }
            Some(t) => Err(ExprError::UnexpectedToken {
                expected: "expression",
                found: t.describe(),
            }),
            None => Err(ExprError::UnexpectedToken {
                expected: "expression",
                found: "end of expression".to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn var(name: &str) -> Box<Expr> {
        Box::new(Expr::Var(name.to_string()))
    }

    #[test]
    fn literals() {
        assert_eq!(parse("'a\\'b'"), Ok(Expr::StringLit("a'b".into())));
        assert_eq!(parse("\"line\\n\""), Ok(Expr::StringLit("line\n".into())));
        assert_eq!(parse("42"), Ok(Expr::IntLit(42)));
        assert_eq!(parse("-1_000"), Ok(Expr::IntLit(-1000)));
        assert_eq!(parse("2.5"), Ok(Expr::FloatLit(2.5)));
        assert_eq!(parse(".5"), Ok(Expr::FloatLit(0.5)));
        assert_eq!(parse("True"), Ok(Expr::BoolLit(true)));
        assert_eq!(parse("false"), Ok(Expr::BoolLit(false)));
        assert_eq!(parse("None"), Ok(Expr::NoneLit));
    }

    #[test]
    fn precedence_not_binds_looser_than_comparison() {
        assert_eq!(
            parse("not a == b and c"),
            Ok(Expr::BinOp(
                Box::new(Expr::Not(Box::new(Expr::BinOp(var("a"), BinOp::Eq, var("b"))))),
                BinOp::And,
                var("c"),
            ))
        );
    }

    #[test]
    fn or_is_loosest() {
        assert_eq!(
            parse("a and b or c"),
            Ok(Expr::BinOp(
                Box::new(Expr::BinOp(var("a"), BinOp::And, var("b"))),
                BinOp::Or,
                var("c"),
            ))
        );
    }

    #[test]
    fn not_in_is_one_operator() {
        assert_eq!(
            parse("x not in xs"),
            Ok(Expr::BinOp(var("x"), BinOp::NotIn, var("xs")))
        );
    }

    #[test]
    fn attribute_and_index_chain() {
        assert_eq!(
            parse("user.tags[0]"),
            Ok(Expr::Index(
                Box::new(Expr::Attribute(var("user"), "tags".into())),
                Box::new(Expr::IntLit(0)),
            ))
        );
    }

    #[test]
    fn parentheses_group() {
        assert_eq!(
            parse("(a or b) and c"),
            Ok(Expr::BinOp(
                Box::new(Expr::BinOp(var("a"), BinOp::Or, var("b"))),
                BinOp::And,
                var("c"),
            ))
        );
    }

    #[test]
    fn unicode_identifier() {
        assert_eq!(parse("존재하지않는변수"), Ok(Expr::Var("존재하지않는변수".into())));
    }

    #[test]
    fn errors() {
        assert_eq!(parse("   "), Err(ExprError::Empty));
        assert_eq!(parse("'open"), Err(ExprError::UnterminatedString));
        assert_eq!(parse("a ; b"), Err(ExprError::UnexpectedChar(';')));
        assert!(matches!(parse("a b"), Err(ExprError::UnexpectedToken { .. })));
        assert!(matches!(parse("(a"), Err(ExprError::UnexpectedToken { .. })));
        assert!(matches!(parse("a."), Err(ExprError::UnexpectedToken { .. })));
        assert!(matches!(
            parse("99999999999999999999"),
            Err(ExprError::InvalidNumber(_))
        ));
    }

    #[test]
    fn no_calls_or_list_literals() {
        assert!(parse("f(x)").is_err());
        assert!(parse("[1, 2, 3]").is_err());
    }

    #[test]
    fn deep_nesting_is_rejected() {
        let deep = format!("{}x{}", "(".repeat(200), ")".repeat(200));
        assert_eq!(parse(&deep), Err(ExprError::TooDeep));
        let nots = format!("{}x", "not ".repeat(200));
        assert_eq!(parse(&nots), Err(ExprError::TooDeep));
    }

    #[test]
    fn long_operator_chains_are_rejected() {
        for op in [" + ", " and ", " or ", " - "] {
            let chain = vec!["1"; 100_000].join(op);
            assert_eq!(parse(&chain), Err(ExprError::TooDeep), "{op}");
        }
        let attrs = format!("a{}", ".b".repeat(200));
        assert_eq!(parse(&attrs), Err(ExprError::TooDeep));
        let subscripts = format!("a{}", "[0]".repeat(200));
        assert_eq!(parse(&subscripts), Err(ExprError::TooDeep));

        let short = vec!["1"; 30].join(" + ");
        assert!(parse(&short).is_ok());
    }

    #[test]
    fn comparison_chain_is_flat() {
        assert_eq!(
            parse("a < b <= c"),
            Ok(Expr::Compare(
                var("a"),
                vec![(BinOp::Lt, Expr::Var("b".into())), (BinOp::Le, Expr::Var("c".into()))],
            ))
        );
        assert_eq!(parse("a < b"), Ok(Expr::BinOp(var("a"), BinOp::Lt, var("b"))));
        let long = vec!["1"; 1_000].join(" < ");
        assert!(parse(&long).is_ok());
    }

    #[test]
    fn exponent_literals() {
        assert_eq!(parse("1e3"), Ok(Expr::FloatLit(1000.0)));
        assert_eq!(parse("2.5E-2"), Ok(Expr::FloatLit(0.025)));
        assert_eq!(parse("1e+20"), Ok(Expr::FloatLit(1e20)));
        // No digits after `e`: the `e` is a separate name.
        assert!(matches!(parse("1e"), Err(ExprError::UnexpectedToken { .. })));
    }
}
