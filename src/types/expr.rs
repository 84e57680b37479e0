use std::fmt;
use std::ops::Not;

use super::condition::Condition;
use super::{Fact, Value};
use crate::error::EvalError;
use crate::parse::ParseError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl CompareOp {
    /// The operator as written in expression text.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::Neq => "!=",
            CompareOp::Gt => ">",
            CompareOp::Gte => ">=",
            CompareOp::Lt => "<",
            CompareOp::Lte => "<=",
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// A boolean test over the values of a fact.
///
/// Built with [`field()`] and [`Expr::and`] / [`Expr::or`] / `!`, or parsed
/// from text with [`Expr::parse`]:
///
/// ```
/// use firerule::{field, Expr, Fact};
///
/// let built = field("temp").gt(90_i64).and(!field("muted").is_true());
/// let parsed = Expr::parse("temp > 90 AND NOT muted").unwrap();
/// assert_eq!(built, parsed);
/// assert!(parsed.matches(&Fact::new("boiler").set("temp", 95_i64)));
/// ```
///
/// A comparison whose field is absent, or whose value kind does not match
/// the literal, is `false`. `NOT` of such a comparison is therefore `true`.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Compare {
        field: String,
        op: CompareOp,
        value: Value,
    },
    /// The field holds `Bool(true)`.
    Flag(String),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
}

impl Expr {
    /// # Errors
    ///
    /// Returns [`ParseError`] when `text` is not a well-formed expression.
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        crate::parse::parse(text)
    }

    #[must_use]
    pub fn and(self, rhs: Expr) -> Expr {
        Expr::And(Box::new(self), Box::new(rhs))
    }

    #[must_use]
    pub fn or(self, rhs: Expr) -> Expr {
        Expr::Or(Box::new(self), Box::new(rhs))
    }

    #[must_use]
    pub fn matches(&self, fact: &Fact) -> bool {
        match self {
            Expr::Compare { field, op, value } => {
                matches!(fact.get(field).and_then(|v| v.compare(*op, value)), Some(true))
            }
            Expr::Flag(field) => fact.get(field).and_then(Value::as_bool) == Some(true),
            Expr::Not(inner) => !inner.matches(fact),
            Expr::And(lhs, rhs) => lhs.matches(fact) && rhs.matches(fact),
            Expr::Or(lhs, rhs) => lhs.matches(fact) || rhs.matches(fact),
        }
    }
}

impl Not for Expr {
    type Output = Expr;

    fn not(self) -> Expr {
        Expr::Not(Box::new(self))
    }
}

/// Fully parenthesized, so the output parses back to the same tree.
impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Compare { field, op, value } => write!(f, "({field} {op} {value})"),
            Expr::Flag(field) => f.write_str(field),
            Expr::Not(inner) => write!(f, "(NOT {inner})"),
            Expr::And(lhs, rhs) => write!(f, "({lhs} AND {rhs})"),
            Expr::Or(lhs, rhs) => write!(f, "({lhs} OR {rhs})"),
        }
    }
}

impl Condition for Expr {
    fn evaluate(&self, fact: &Fact) -> Result<bool, EvalError> {
        Ok(self.matches(fact))
    }
}

/// A field awaiting its comparison. See [`field()`].
#[derive(Debug, Clone)]
pub struct FieldExpr {
    name: String,
}

macro_rules! comparisons {
    ($($method:ident => $op:ident,)*) => {
        $(
            #[must_use]
            pub fn $method(self, value: impl Into<Value>) -> Expr {
                Expr::Compare {
                    field: self.name,
                    op: CompareOp::$op,
                    value: value.into(),
                }
            }
        )*
    };
}

impl FieldExpr {
    comparisons! {
        eq => Eq,
        neq => Neq,
        gt => Gt,
        gte => Gte,
        lt => Lt,
        lte => Lte,
    }

    #[must_use]
    pub fn is_true(self) -> Expr {
        Expr::Flag(self.name)
    }
}

/// Start a comparison on the named fact value.
#[must_use]
pub fn field(name: impl Into<String>) -> FieldExpr {
    FieldExpr { name: name.into() }
}
