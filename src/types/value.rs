use std::cmp::Ordering;
use std::fmt;

use super::expr::CompareOp;

/// One named attribute of a [`Fact`](super::Fact).
///
/// Integers and floats compare with each other numerically. Any other mix of
/// kinds is incomparable, so every operator (including `!=`) yields `None`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum Value {
    Int(i64),
    Float(f64),
    Bool(bool),
    String(String),
}

impl Value {
    /// `self OP other`, or `None` when the two kinds cannot be ordered.
    #[must_use]
    pub fn compare(&self, op: CompareOp, other: &Value) -> Option<bool> {
        self.order(other).map(|ord| op.holds(ord))
    }

    fn order(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            // NaN on either side is unordered.
            _ => self.as_f64()?.partial_cmp(&other.as_f64()?),
        }
    }

    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        if let Value::Int(v) = self {
            Some(*v)
        } else {
            None
        }
    }

    /// Numeric view: floats as-is, integers widened.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::Float(v) => Some(v),
            Value::Int(v) => Some(v as f64),
            Value::Bool(_) | Value::String(_) => None,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        if let Value::Bool(v) = self {
            Some(*v)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        if let Value::String(v) = self {
            Some(v)
        } else {
            None
        }
    }
}

impl CompareOp {
    /// Whether an ordering between two operands satisfies this operator.
    #[must_use]
    pub fn holds(self, ord: Ordering) -> bool {
        match self {
            CompareOp::Eq => ord.is_eq(),
            CompareOp::Neq => ord.is_ne(),
            CompareOp::Gt => ord.is_gt(),
            CompareOp::Gte => ord.is_ge(),
            CompareOp::Lt => ord.is_lt(),
            CompareOp::Lte => ord.is_le(),
        }
    }
}

macro_rules! value_from {
    ($($source:ty => |$v:ident| $make:expr;)*) => {
        $(
            impl From<$source> for Value {
                fn from($v: $source) -> Self {
                    $make
                }
            }
        )*
    };
}

value_from! {
    i64 => |v| Value::Int(v);
    i32 => |v| Value::Int(v.into());
    u32 => |v| Value::Int(v.into());
    f64 => |v| Value::Float(v);
    bool => |v| Value::Bool(v);
    String => |v| Value::String(v);
    &str => |v| Value::String(v.to_owned());
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => v.fmt(f),
            Value::Float(v) => v.fmt(f),
            Value::Bool(v) => v.fmt(f),
            Value::String(v) => write!(f, "{v:?}"),
        }
    }
}
