mod error;
mod grammar;

pub use error::ParseError;

use crate::Expr;

/// Parse a condition expression such as `temp > 30 AND NOT muted`.
///
/// Grammar (loosest binding first): `OR`, `AND`, `NOT`, then either a
/// parenthesized expression, a comparison `name OP literal`, or a bare
/// `name`, which holds when that value is `true`. Keywords are accepted in
/// upper or lower case.
///
/// # Errors
///
/// Returns [`ParseError`] if the input is not a valid expression or has
/// trailing input.
pub fn parse(input: &str) -> Result<Expr, ParseError> {
    use winnow::Parser;
    grammar::parse_expr
        .parse(input)
        .map_err(|e| ParseError::new(e.to_string()))
}
