//! Arithmetic expression engine over gathered facts.
//!
//! Expressions combine numeric literals, fact names, parentheses and
//! `* / + -` with the usual precedence. All arithmetic is base-10
//! decimal, never binary floating point, so results stay textually
//! stable across platforms.
//!
//! Evaluation happens in three stages: [`lexer::tokenize`] splits the
//! text, [`parser::parse`] builds an [`parser::Expr`] tree and
//! [`eval::evaluate`] walks it against the fact table.

pub mod eval;
pub mod lexer;
pub mod parser;

use crate::models::Facts;
use thiserror::Error;

/// Why an expression could not be evaluated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExprError {
    /// The text does not follow the expression grammar.
    #[error("cannot parse expression '{0}'")]
    Parse(String),

    /// A referenced fact does not exist.
    #[error("undefined variable '{0}'")]
    UndefinedVariable(String),

    /// A divisor evaluated to zero.
    #[error("division by zero")]
    DivisionByZero,

    /// An arithmetic operand is not a decimal number.
    #[error("cannot convert '{0}' to a decimal number")]
    NotANumber(String),

    /// A result does not fit the decimal range.
    #[error("arithmetic overflow in '{0}'")]
    Overflow(String),
}

/// Evaluate an expression against the fact table.
///
/// A bare numeric literal is returned verbatim and a string matching a
/// fact name exactly yields that fact's value, before any parsing.
pub fn evaluate(expression: &str, facts: &Facts) -> Result<String, ExprError> {
    let trimmed = expression.trim();

    if lexer::is_number_literal(trimmed) {
        return Ok(trimmed.to_string());
    }
    if let Some(value) = facts.get(trimmed) {
        return Ok(value.clone());
    }

    let tokens = lexer::tokenize(trimmed)?;
    let tree = parser::parse(&tokens, trimmed)?;
    eval::evaluate(&tree, facts, trimmed).map(eval::Value::render)
}
