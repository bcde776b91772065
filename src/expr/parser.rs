//! Recursive-descent parser building an expression tree.
//!
//! ```text
//! expr           := additive EOF
//! additive       := multiplicative (('+' | '-') multiplicative)*
//! multiplicative := unary (('*' | '/') unary)*
//! unary          := '-' '(' additive ')' | terminal
//! terminal       := number | variable | '(' additive ')'
//! ```
//!
//! Binary operators fold to the left, so `8/4/2` is `(8/4)/2`.

use super::lexer::Token;
use super::ExprError;

/// Binary arithmetic operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

/// Parsed expression tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    /// Numeric literal as written.
    Number(String),
    /// Reference to a fact.
    Variable(String),
    /// Negated parenthesized group, `-(...)`.
    Negate(Box<Expr>),
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
}

/// Parse a token stream. `source` is only used for error messages.
pub fn parse(tokens: &[Token], source: &str) -> Result<Expr, ExprError> {
    let mut parser = Parser {
        tokens,
        pos: 0,
        source,
    };
    let expr = parser.additive()?;
    if parser.pos != tokens.len() {
        return Err(parser.error());
    }
    Ok(expr)
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    source: &'a str,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<&Token> {
        let token = self.tokens.get(self.pos);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn error(&self) -> ExprError {
        ExprError::Parse(self.source.to_string())
    }

    fn additive(&mut self) -> Result<Expr, ExprError> {
        let mut lhs = self.multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.multiplicative()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
    }

    fn multiplicative(&mut self) -> Result<Expr, ExprError> {
        let mut lhs = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.unary()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
    }

    fn unary(&mut self) -> Result<Expr, ExprError> {
        if self.peek() == Some(&Token::Minus)
            && self.tokens.get(self.pos + 1) == Some(&Token::LParen)
        {
            self.pos += 1;
            let group = self.terminal()?;
            return Ok(Expr::Negate(Box::new(group)));
        }
        self.terminal()
    }

    fn terminal(&mut self) -> Result<Expr, ExprError> {
        match self.advance().cloned() {
            Some(Token::Number(literal)) => Ok(Expr::Number(literal)),
            Some(Token::Ident(name)) => Ok(Expr::Variable(name)),
            Some(Token::LParen) => {
                let inner = self.additive()?;
                if self.advance() == Some(&Token::RParen) {
                    Ok(inner)
                } else {
                    Err(self.error())
                }
            }
            _ => Err(self.error()),
        }
    }
}
