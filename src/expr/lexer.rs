//! Tokenizer for fact expressions.

use super::ExprError;

/// A lexical token of the expression grammar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Numeric literal, kept as written (may carry a leading minus).
    Number(String),
    /// Fact name: a letter followed by letters, digits, `_` or `.`.
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
}

/// Split an expression into tokens.
///
/// A `-` that appears where an operand is expected and is immediately
/// followed by a digit belongs to the numeric literal, so `-12/-4` lexes
/// as two signed literals around `/`.
pub fn tokenize(input: &str) -> Result<Vec<Token>, ExprError> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < chars.len() {
        let c = chars[pos];

        if c.is_whitespace() {
            pos += 1;
            continue;
        }

        let expects_operand = matches!(
            tokens.last(),
            None | Some(Token::Plus)
                | Some(Token::Minus)
                | Some(Token::Star)
                | Some(Token::Slash)
                | Some(Token::LParen)
        );

        let signed_literal = c == '-'
            && expects_operand
            && chars.get(pos + 1).is_some_and(|next| next.is_ascii_digit());

        if c.is_ascii_digit() || signed_literal {
            let (literal, next) = read_number(&chars, pos);
            tokens.push(Token::Number(literal));
            pos = next;
            continue;
        }

        if c.is_ascii_alphabetic() {
            let start = pos;
            while pos < chars.len()
                && (chars[pos].is_ascii_alphanumeric() || chars[pos] == '_' || chars[pos] == '.')
            {
                pos += 1;
            }
            tokens.push(Token::Ident(chars[start..pos].iter().collect()));
            continue;
        }

        let token = match c {
            '+' => Token::Plus,
            '-' => Token::Minus,
            '*' => Token::Star,
            '/' => Token::Slash,
            '(' => Token::LParen,
            ')' => Token::RParen,
            _ => return Err(ExprError::Parse(input.to_string())),
        };
        tokens.push(token);
        pos += 1;
    }

    Ok(tokens)
}

/// Read `-?\d+(\.\d+)?` starting at `start`; returns the literal and the
/// position right after it. A `.` not followed by a digit is left unread.
fn read_number(chars: &[char], start: usize) -> (String, usize) {
    let mut pos = start;
    if chars[pos] == '-' {
        pos += 1;
    }
    while pos < chars.len() && chars[pos].is_ascii_digit() {
        pos += 1;
    }
    if pos + 1 < chars.len() && chars[pos] == '.' && chars[pos + 1].is_ascii_digit() {
        pos += 1;
        while pos < chars.len() && chars[pos].is_ascii_digit() {
            pos += 1;
        }
    }
    (chars[start..pos].iter().collect(), pos)
}

/// Whether the whole string is a single numeric literal (`-?\d+(\.\d+)?`).
pub fn is_number_literal(text: &str) -> bool {
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() {
        return false;
    }
    let first_digit = if chars[0] == '-' { 1 } else { 0 };
    if !chars.get(first_digit).is_some_and(|c| c.is_ascii_digit()) {
        return false;
    }
    let (_, end) = read_number(&chars, 0);
    end == chars.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn num(s: &str) -> Token {
        Token::Number(s.to_string())
    }

    #[test]
    fn test_signed_literals_after_operators() {
        let tokens = tokenize("1*-12/-4").unwrap();
        assert_eq!(
            tokens,
            vec![num("1"), Token::Star, num("-12"), Token::Slash, num("-4")]
        );
    }

    #[test]
    fn test_minus_after_operand_is_an_operator() {
        let tokens = tokenize("3 -2").unwrap();
        assert_eq!(tokens, vec![num("3"), Token::Minus, num("2")]);

        let tokens = tokenize("(1)-2").unwrap();
        assert_eq!(
            tokens,
            vec![Token::LParen, num("1"), Token::RParen, Token::Minus, num("2")]
        );
    }

    #[test]
    fn test_dotted_identifiers() {
        let tokens = tokenize("cpu.load_1 + mem.free").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Ident("cpu.load_1".to_string()),
                Token::Plus,
                Token::Ident("mem.free".to_string()),
            ]
        );
    }

    #[test]
    fn test_dangling_dot_is_rejected() {
        assert!(matches!(tokenize("1.="), Err(ExprError::Parse(_))));
        assert!(matches!(tokenize("."), Err(ExprError::Parse(_))));
    }

    #[test]
    fn test_is_number_literal() {
        assert!(is_number_literal("1"));
        assert!(is_number_literal("-12.50"));
        assert!(is_number_literal("007"));
        assert!(!is_number_literal("-"));
        assert!(!is_number_literal("1."));
        assert!(!is_number_literal(".5"));
        assert!(!is_number_literal("1e3"));
        assert!(!is_number_literal(""));
    }
}
