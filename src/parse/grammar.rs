use winnow::ascii::{digit1, multispace0};
use winnow::combinator::{alt, cut_err, delimited, not, opt, preceded, repeat, terminated};
use winnow::error::{ErrMode, ModalResult, StrContext, StrContextValue};
use winnow::prelude::*;
use winnow::token::{none_of, one_of, take_while};

use crate::{CompareOp, Expr, Value};

// -- Lexical pieces ---------------------------------------------------------

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '.'
}

const KEYWORDS: [&str; 8] = ["AND", "and", "OR", "or", "NOT", "not", "true", "false"];

/// `text` as a whole word, not the prefix of a longer name.
fn word<'i>(text: &'static str) -> impl FnMut(&mut &'i str) -> ModalResult<&'i str> {
    move |input: &mut &'i str| terminated(text, not(one_of(is_ident_char))).parse_next(input)
}

/// A keyword, accepted in upper or lower case.
fn keyword<'i>(
    upper: &'static str,
    lower: &'static str,
) -> impl FnMut(&mut &'i str) -> ModalResult<&'i str> {
    move |input: &mut &'i str| alt((word(upper), word(lower))).parse_next(input)
}

/// Field name: a letter or `_`, then letters, digits, `_` or `.`.
fn name<'i>(input: &mut &'i str) -> ModalResult<&'i str> {
    (
        one_of(|c: char| c.is_ascii_alphabetic() || c == '_'),
        take_while(0.., is_ident_char),
    )
        .take()
        .verify(|word: &str| !KEYWORDS.contains(&word))
        .context(StrContext::Expected(StrContextValue::Description("field name")))
        .parse_next(input)
}

// -- Literals ---------------------------------------------------------------

fn escape(input: &mut &str) -> ModalResult<char> {
    alt(('n'.value('\n'), 't'.value('\t'), '"', '\\')).parse_next(input)
}

fn quoted(input: &mut &str) -> ModalResult<String> {
    delimited(
        '"',
        repeat(0.., alt((preceded('\\', escape), none_of(['"', '\\'])))),
        cut_err('"'),
    )
    .parse_next(input)
}

fn to_number(text: &str) -> Option<Value> {
    if text.contains('.') {
        text.parse().ok().map(Value::Float)
    } else {
        text.parse().ok().map(Value::Int)
    }
}

/// Integer or decimal, optionally negative. Integers that overflow `i64`
/// are rejected rather than widened.
fn number(input: &mut &str) -> ModalResult<Value> {
    (opt('-'), digit1, opt(('.', digit1)))
        .take()
        .verify_map(to_number)
        .parse_next(input)
}

fn literal(input: &mut &str) -> ModalResult<Value> {
    preceded(
        multispace0,
        alt((
            quoted.map(Value::String),
            word("true").value(Value::Bool(true)),
            word("false").value(Value::Bool(false)),
            number,
        )),
    )
    .context(StrContext::Expected(StrContextValue::Description("literal")))
    .parse_next(input)
}

fn operator(input: &mut &str) -> ModalResult<CompareOp> {
    preceded(
        multispace0,
        alt((
            "==".value(CompareOp::Eq),
            "!=".value(CompareOp::Neq),
            ">=".value(CompareOp::Gte),
            "<=".value(CompareOp::Lte),
            ">".value(CompareOp::Gt),
            "<".value(CompareOp::Lt),
        )),
    )
    .parse_next(input)
}

// -- Expressions ------------------------------------------------------------
//
// or    := and ("OR" and)*
// and   := unary ("AND" unary)*
// unary := "NOT" unary | atom
// atom  := "(" or ")" | name [op literal]

/// `name OP literal`, or a bare `name` meaning "this flag is true".
fn comparison_or_flag(input: &mut &str) -> ModalResult<Expr> {
    let field = name.parse_next(input)?;
    Ok(match opt(operator).parse_next(input)? {
        Some(op) => Expr::Compare {
            field: field.to_owned(),
            op,
            value: cut_err(literal).parse_next(input)?,
        },
        None => Expr::Flag(field.to_owned()),
    })
}

fn atom(input: &mut &str) -> ModalResult<Expr> {
    preceded(
        multispace0,
        alt((
            delimited('(', or_expr, preceded(multispace0, cut_err(')'))),
            comparison_or_flag,
        )),
    )
    .context(StrContext::Expected(StrContextValue::Description("expression")))
    .parse_next(input)
}

fn unary(input: &mut &str) -> ModalResult<Expr> {
    let negated = opt(preceded(multispace0, keyword("NOT", "not"))).parse_next(input)?;
    match negated {
        Some(_) => Ok(!cut_err(unary).parse_next(input)?),
        None => atom(input),
    }
}

/// Left-folds `operand (KEYWORD operand)*` with `combine`. An operand is
/// mandatory after the keyword.
fn chain<'i>(
    input: &mut &'i str,
    op: (&'static str, &'static str),
    operand: fn(&mut &'i str) -> ModalResult<Expr>,
    combine: fn(Expr, Expr) -> Expr,
) -> ModalResult<Expr> {
    let mut acc = operand(input)?;
    while opt(preceded(multispace0, keyword(op.0, op.1)))
        .parse_next(input)?
        .is_some()
    {
        let rhs = operand(input).map_err(ErrMode::cut)?;
        acc = combine(acc, rhs);
    }
    Ok(acc)
}

fn and_expr(input: &mut &str) -> ModalResult<Expr> {
    chain(input, ("AND", "and"), unary, Expr::and)
}

fn or_expr(input: &mut &str) -> ModalResult<Expr> {
    chain(input, ("OR", "or"), and_expr, Expr::or)
}

/// A whole expression, surrounding whitespace allowed.
pub fn parse_expr(input: &mut &str) -> ModalResult<Expr> {
    terminated(or_expr, multispace0).parse_next(input)
}

#[cfg(test)]
mod tests {
    use crate::parse::parse;

    use super::*;

    fn compare(field: &str, op: CompareOp, value: impl Into<Value>) -> Expr {
        Expr::Compare {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    #[test]
    fn comparison_and_flag() {
        assert_eq!(parse("v > 5").unwrap(), compare("v", CompareOp::Gt, 5_i64));
        assert_eq!(parse("  alarm  ").unwrap(), Expr::Flag("alarm".into()));
    }

    #[test]
    fn operators() {
        let table = [
            ("==", CompareOp::Eq),
            ("!=", CompareOp::Neq),
            (">", CompareOp::Gt),
            (">=", CompareOp::Gte),
            ("<", CompareOp::Lt),
            ("<=", CompareOp::Lte),
        ];
        for (text, op) in table {
            assert_eq!(
                parse(&format!("x {text} 1")).unwrap(),
                compare("x", op, 1_i64),
                "operator {text}"
            );
        }
    }

    #[test]
    fn literals() {
        let table = [
            ("42", Value::Int(42)),
            ("-5", Value::Int(-5)),
            ("2.5", Value::Float(2.5)),
            ("-0.5", Value::Float(-0.5)),
            ("true", Value::Bool(true)),
            ("false", Value::Bool(false)),
            (r#""hello""#, Value::String("hello".into())),
            (r#""a\"b\\c""#, Value::String("a\"b\\c".into())),
            (r#""tab\there""#, Value::String("tab\there".into())),
        ];
        for (text, value) in table {
            assert_eq!(
                parse(&format!("x == {text}")).unwrap(),
                compare("x", CompareOp::Eq, value),
                "literal {text}"
            );
        }
    }

    #[test]
    fn keywords_in_either_case() {
        let upper = parse("a AND NOT b OR c").unwrap();
        let lower = parse("a and not b or c").unwrap();
        assert_eq!(upper, lower);
    }

    #[test]
    fn keyword_prefix_is_a_name() {
        assert_eq!(parse("notify").unwrap(), Expr::Flag("notify".into()));
        assert_eq!(parse("order > 1").unwrap(), compare("order", CompareOp::Gt, 1_i64));
        assert!(parse("x == trueish").is_err());
    }

    #[test]
    fn and_binds_tighter_than_or() {
        assert_eq!(parse("a OR b AND c").unwrap().to_string(), "(a OR (b AND c))");
        assert_eq!(parse("(a OR b) AND c").unwrap().to_string(), "((a OR b) AND c)");
    }

    #[test]
    fn chains_fold_left() {
        assert_eq!(parse("a AND b AND c").unwrap().to_string(), "((a AND b) AND c)");
        assert_eq!(parse("NOT NOT a").unwrap().to_string(), "(NOT (NOT a))");
    }

    #[test]
    fn dotted_names() {
        assert_eq!(
            parse("sensor.temp >= 30").unwrap(),
            compare("sensor.temp", CompareOp::Gte, 30_i64)
        );
    }

    #[test]
    fn rejects_malformed_input() {
        for text in [
            "",
            "v >",
            "(v > 1",
            "v > 1 v",
            "AND",
            "a AND",
            "NOT",
            "x == 99999999999999999999",
            r#"x == "open"#,
            r#"x == "bad\q""#,
        ] {
            assert!(parse(text).is_err(), "accepted {text:?}");
        }
    }
}
