//! Tree walker evaluating a parsed expression against a fact table.

use super::lexer::is_number_literal;
use super::parser::{BinaryOp, Expr};
use super::ExprError;
use crate::models::Facts;
use rust_decimal::Decimal;
use std::str::FromStr;

/// Intermediate value of an evaluation.
///
/// Operands stay as raw text until arithmetic needs them, so a lone
/// literal or fact is rendered exactly as it was written or gathered.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Raw(String),
    Number(Decimal),
}

impl Value {
    /// Render the final result. Computed numbers lose trailing zeros.
    pub fn render(self) -> String {
        match self {
            Value::Raw(text) => text,
            Value::Number(number) => number.normalize().to_string(),
        }
    }

    fn into_decimal(self, source: &str) -> Result<Decimal, ExprError> {
        match self {
            Value::Number(number) => Ok(number),
            Value::Raw(text) => parse_decimal(&text, source),
        }
    }
}

/// Parse text as a base-10 number, accepting scientific notation for
/// facts such as `1.5e3`.
///
/// Values carry at most 28 significant digits. Digits beyond that are
/// rounded away, so `0.00000000000000000000000000001` reads as zero.
/// Well-formed numbers whose integer part does not fit are an overflow
/// of `source`; anything else is not a number.
fn parse_decimal(text: &str, source: &str) -> Result<Decimal, ExprError> {
    let trimmed = text.trim();
    Decimal::from_str(trimmed)
        .or_else(|_| Decimal::from_scientific(trimmed))
        .map_err(|_| {
            if is_number_literal(trimmed) {
                ExprError::Overflow(source.to_string())
            } else {
                ExprError::NotANumber(text.to_string())
            }
        })
}

/// Evaluate `expr`. `source` names the whole expression in overflow errors.
pub fn evaluate(expr: &Expr, facts: &Facts, source: &str) -> Result<Value, ExprError> {
    match expr {
        Expr::Number(literal) => Ok(Value::Raw(literal.clone())),
        Expr::Variable(name) => facts
            .get(name)
            .map(|value| Value::Raw(value.clone()))
            .ok_or_else(|| ExprError::UndefinedVariable(name.clone())),
        Expr::Negate(inner) => {
            let value = evaluate(inner, facts, source)?.into_decimal(source)?;
            Ok(Value::Number(-value))
        }
        Expr::Binary { op, lhs, rhs } => {
            let lhs = evaluate(lhs, facts, source)?.into_decimal(source)?;
            let rhs = evaluate(rhs, facts, source)?.into_decimal(source)?;
            apply(*op, lhs, rhs, source).map(Value::Number)
        }
    }
}

fn apply(op: BinaryOp, lhs: Decimal, rhs: Decimal, source: &str) -> Result<Decimal, ExprError> {
    let result = match op {
        BinaryOp::Add => lhs.checked_add(rhs),
        BinaryOp::Sub => lhs.checked_sub(rhs),
        BinaryOp::Mul => lhs.checked_mul(rhs),
        BinaryOp::Div => {
            if rhs.is_zero() {
                return Err(ExprError::DivisionByZero);
            }
            lhs.checked_div(rhs)
        }
    };
    result.ok_or_else(|| ExprError::Overflow(source.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_normalizes_numbers_only() {
        assert_eq!(Value::Raw("1.50".to_string()).render(), "1.50");
        assert_eq!(
            Value::Number(Decimal::from_str("3.00").unwrap()).render(),
            "3"
        );
        assert_eq!(
            Value::Number(Decimal::from_str("-0.50").unwrap()).render(),
            "-0.5"
        );
    }

    #[test]
    fn test_parse_decimal() {
        assert_eq!(parse_decimal(" 42 ", "42").unwrap(), Decimal::from(42));
        assert_eq!(
            parse_decimal("1.5e3", "x").unwrap(),
            Decimal::from(1500)
        );
        assert_eq!(
            parse_decimal("HEY", "x"),
            Err(ExprError::NotANumber("HEY".to_string()))
        );
    }

    #[test]
    fn test_parse_decimal_out_of_range() {
        assert_eq!(
            parse_decimal("123456789012345678901234567890123", "big * 1"),
            Err(ExprError::Overflow("big * 1".to_string()))
        );
    }

    #[test]
    fn test_parse_decimal_rounds_excess_digits() {
        assert!(parse_decimal("0.00000000000000000000000000001", "x")
            .unwrap()
            .is_zero());
    }
}
