use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ast::Expression;
use crate::error::EvalError;
use crate::expr::{BinOp, Expr};

/// A mapping of names to values: template data, one scope, or a map value.
pub type Map = BTreeMap<String, Value>;

#[derive(Clone, Debug, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Array(Vec<Value>),
    Map(Map),
}

impl Value {
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::Array(a) => !a.is_empty(),
            Value::Map(m) => !m.is_empty(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "none",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Map(_) => "map",
        }
    }

    /// Elements to loop over: array items, or map keys in order.
    pub fn iter_values(&self) -> Option<Vec<Value>> {
        match self {
            Value::Array(items) => Some(items.clone()),
            Value::Map(map) => Some(map.keys().cloned().map(Value::String).collect()),
            _ => None,
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Equality as the template language sees it: ints and floats compare
    /// numerically, everything else structurally.
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => {
                (*a as f64) == *b
            }
            (Value::Array(a), Value::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.loose_eq(y))
            }
            _ => self == other,
        }
    }

    fn compare(&self, other: &Value, op: BinOp) -> Result<Ordering, EvalError> {
        let ordering = match (self, other) {
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            _ => match (self.as_f64(), other.as_f64()) {
                (Some(a), Some(b)) => a.partial_cmp(&b),
                _ => None,
            },
        };
        ordering.ok_or(EvalError::TypeMismatch {
            op: op.as_str(),
            lhs: self.type_name(),
            rhs: other.type_name(),
        })
    }

    fn write_repr(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "'{}'", s.replace('\\', "\\\\").replace('\'', "\\'")),
            other => write!(f, "{other}"),
        }
    }
}

/// Float text: at least one fractional digit, exponent form outside
/// `1e-4..1e16` (`1e+20`, `1.5e-05`).
fn write_float(f: &mut fmt::Formatter<'_>, x: f64) -> fmt::Result {
    if x.is_nan() {
        return f.write_str("nan");
    }
    if x.is_infinite() {
        return f.write_str(if x > 0.0 { "inf" } else { "-inf" });
    }
    let magnitude = x.abs();
    if magnitude != 0.0 && !(1e-4..1e16).contains(&magnitude) {
        let text = format!("{x:e}");
        let (mantissa, exp) = text.split_once('e').unwrap_or((text.as_str(), "0"));
        let (sign, digits) = match exp.strip_prefix('-') {
            Some(digits) => ('-', digits),
            None => ('+', exp),
        };
        return write!(f, "{mantissa}e{sign}{digits:0>2}");
    }
    if x.fract() == 0.0 {
        write!(f, "{x:.1}")
    } else {
        write!(f, "{x}")
    }
}

/// Printable form: strings verbatim, containers in a literal-like form.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("None"),
            Value::Bool(true) => f.write_str("True"),
            Value::Bool(false) => f.write_str("False"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write_float(f, *x),
            Value::String(s) => f.write_str(s),
            Value::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    item.write_repr(f)?;
                }
                f.write_str("]")
            }
            Value::Map(map) => {
                f.write_str("{")?;
                for (i, (key, value)) in map.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "'{key}': ")?;
                    value.write_repr(f)?;
                }
                f.write_str("}")
            }
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => n.as_f64().map_or(Value::Null, Value::Float),
            },
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => {
                Value::Map(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

macro_rules! impl_from_value {
    ($($ty:ty => $variant:ident),+ $(,)?) => {$(
        impl From<$ty> for Value {
            fn from(v: $ty) -> Self {
                Value::$variant(v.into())
            }
        }
    )+};
}

impl_from_value!(
    bool => Bool,
    i32 => Int,
    i64 => Int,
    u32 => Int,
    f64 => Float,
    String => String,
    &str => String,
    Map => Map,
);

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::Array(items.into_iter().map(Into::into).collect())
    }
}

/// Evaluates template expressions against one scope.
///
/// A name bound in the scope under the expression's exact source text wins.
/// Otherwise the parsed expression is evaluated, with its names looked up in
/// the same scope. Anything that fails degrades to the absent value of the
/// requested shape; nothing is reported to the caller.
pub struct Evaluator<'a> {
    scope: &'a Map,
}

impl<'a> Evaluator<'a> {
    pub fn new(scope: &'a Map) -> Self {
        Self { scope }
    }

    pub fn evaluate_boolean(&self, expr: &Expression) -> bool {
        match self.resolve(expr) {
            Ok(value) => value.is_truthy(),
            Err(err) => {
                debug!(expr = expr.source(), %err, "condition treated as false");
                false
            }
        }
    }

    pub fn evaluate_iterable(&self, expr: &Expression) -> Option<Vec<Value>> {
        match self.resolve(expr) {
            Ok(value) => {
                let items = value.iter_values();
                if items.is_none() {
                    debug!(expr = expr.source(), kind = value.type_name(), "not iterable");
                }
                items
            }
            Err(err) => {
                debug!(expr = expr.source(), %err, "loop collection treated as empty");
                None
            }
        }
    }

    pub fn evaluate_printable(&self, expr: &Expression) -> String {
        match self.resolve(expr) {
            Ok(value) => value.to_string(),
            Err(err) => {
                debug!(expr = expr.source(), %err, "printed as empty");
                String::new()
            }
        }
    }

    pub fn resolve(&self, expr: &Expression) -> Result<Value, EvalError> {
        if let Some(value) = self.scope.get(expr.source()) {
            return Ok(value.clone());
        }
        match expr.parsed() {
            Ok(parsed) => self.eval_expr(parsed),
            Err(err) => Err(err.clone().into()),
        }
    }

    pub fn eval_expr(&self, expr: &Expr) -> Result<Value, EvalError> {
        match expr {
            Expr::StringLit(s) => Ok(Value::String(s.clone())),
            Expr::IntLit(i) => Ok(Value::Int(*i)),
            Expr::FloatLit(f) => Ok(Value::Float(*f)),
            Expr::BoolLit(b) => Ok(Value::Bool(*b)),
            Expr::NoneLit => Ok(Value::Null),
            Expr::Var(name) => self
                .scope
                .get(name)
                .cloned()
                .ok_or_else(|| EvalError::Undefined(name.clone())),
            Expr::Attribute(obj, attr) => match self.eval_expr(obj)? {
                Value::Map(mut m) => m
                    .remove(attr)
                    .ok_or_else(|| EvalError::MissingKey(attr.clone())),
                other => Err(EvalError::BadIndex {
                    container: other.type_name(),
                    index: "attribute",
                }),
            },
            Expr::Index(obj, idx) => {
                let val = self.eval_expr(obj)?;
                let idx_val = self.eval_expr(idx)?;
                index(val, idx_val)
            }
            Expr::Not(inner) => Ok(Value::Bool(!self.eval_expr(inner)?.is_truthy())),
            Expr::Neg(inner) => match self.eval_expr(inner)? {
                Value::Int(i) => i.checked_neg().map(Value::Int).ok_or(EvalError::Overflow),
                Value::Float(f) => Ok(Value::Float(-f)),
                other => Err(EvalError::BadNegation(other.type_name())),
            },
            Expr::BinOp(lhs, BinOp::And, rhs) => {
                let l = self.eval_expr(lhs)?;
                if !l.is_truthy() {
                    return Ok(l);
                }
                self.eval_expr(rhs)
            }
            Expr::BinOp(lhs, BinOp::Or, rhs) => {
                let l = self.eval_expr(lhs)?;
                if l.is_truthy() {
                    return Ok(l);
                }
                self.eval_expr(rhs)
            }
            Expr::BinOp(lhs, op, rhs) => {
                let l = self.eval_expr(lhs)?;
                let r = self.eval_expr(rhs)?;
                binary(*op, l, r)
            }
            Expr::Compare(first, rest) => {
                let mut lhs = self.eval_expr(first)?;
                for (op, operand) in rest {
                    let rhs = self.eval_expr(operand)?;
                    if !binary(*op, lhs, rhs.clone())?.is_truthy() {
                        return Ok(Value::Bool(false));
                    }
                    lhs = rhs;
                }
                Ok(Value::Bool(true))
            }
        }
    }
}

fn binary(op: BinOp, l: Value, r: Value) -> Result<Value, EvalError> {
    let mismatch = |l: &Value, r: &Value| EvalError::TypeMismatch {
        op: op.as_str(),
        lhs: l.type_name(),
        rhs: r.type_name(),
    };

    match op {
        BinOp::Eq => Ok(Value::Bool(l.loose_eq(&r))),
        BinOp::Ne => Ok(Value::Bool(!l.loose_eq(&r))),
        BinOp::Lt => Ok(Value::Bool(l.compare(&r, op)? == Ordering::Less)),
        BinOp::Le => Ok(Value::Bool(l.compare(&r, op)? != Ordering::Greater)),
        BinOp::Gt => Ok(Value::Bool(l.compare(&r, op)? == Ordering::Greater)),
        BinOp::Ge => Ok(Value::Bool(l.compare(&r, op)? != Ordering::Less)),
        BinOp::In | BinOp::NotIn => {
            let found = match (&l, &r) {
                (needle, Value::Array(items)) => items.iter().any(|item| item.loose_eq(needle)),
                (Value::String(key), Value::Map(map)) => map.contains_key(key),
                (Value::String(needle), Value::String(haystack)) => haystack.contains(needle.as_str()),
                _ => return Err(mismatch(&l, &r)),
            };
            Ok(Value::Bool(found == (op == BinOp::In)))
        }
        BinOp::Add => match (l, r) {
            (Value::Int(a), Value::Int(b)) => a.checked_add(b).map(Value::Int).ok_or(EvalError::Overflow),
            (Value::String(a), Value::String(b)) => Ok(Value::String(a + &b)),
            (Value::Array(mut a), Value::Array(b)) => {
                a.extend(b);
                Ok(Value::Array(a))
            }
            (l, r) => match (l.as_f64(), r.as_f64()) {
                (Some(a), Some(b)) => Ok(Value::Float(a + b)),
                _ => Err(mismatch(&l, &r)),
            },
        },
        BinOp::Sub => match (&l, &r) {
            (Value::Int(a), Value::Int(b)) => a.checked_sub(*b).map(Value::Int).ok_or(EvalError::Overflow),
            _ => match (l.as_f64(), r.as_f64()) {
                (Some(a), Some(b)) => Ok(Value::Float(a - b)),
                _ => Err(mismatch(&l, &r)),
            },
        },
        BinOp::And => Ok(if l.is_truthy() { r } else { l }),
        BinOp::Or => Ok(if l.is_truthy() { l } else { r }),
    }
}

fn index(container: Value, idx: Value) -> Result<Value, EvalError> {
    match (container, idx) {
        (Value::Map(mut m), Value::String(key)) => {
            m.remove(&key).ok_or(EvalError::MissingKey(key))
        }
        (Value::Array(mut items), Value::Int(i)) => {
            let at = position(i, items.len())?;
            Ok(items.swap_remove(at))
        }
        (Value::String(s), Value::Int(i)) => {
            let chars: Vec<char> = s.chars().collect();
            let at = position(i, chars.len())?;
            Ok(Value::String(chars[at].to_string()))
        }
        (container, idx) => Err(EvalError::BadIndex {
            container: container.type_name(),
            index: idx.type_name(),
        }),
    }
}

/// Resolve a possibly negative index against a length.
fn position(i: i64, len: usize) -> Result<usize, EvalError> {
    let len = len as i64;
    let at = if i < 0 { len + i } else { i };
    if (0..len).contains(&at) {
        Ok(at as usize)
    } else {
        Err(EvalError::IndexOutOfRange(i))
    }
}
