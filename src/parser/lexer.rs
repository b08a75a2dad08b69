//! Tokenizer for PQL text.

use std::fmt;

use crate::ast::Value;
use crate::error::{PqlError, Result};

/// Token kinds produced by the tokenizer.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// Keyword, field name or dotted path.
    Ident(String),
    /// Quoted string with escapes resolved.
    Str(String),
    /// Integer or float literal.
    Number(Value),
    OpenParen,
    CloseParen,
    Comma,
    Plus,
    Minus,
    Star,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Ident(s) => write!(f, "'{s}'"),
            TokenKind::Str(s) => write!(f, "string {}", Value::String(s.clone())),
            TokenKind::Number(n) => write!(f, "number {n}"),
            TokenKind::OpenParen => f.write_str("'('"),
            TokenKind::CloseParen => f.write_str("')'"),
            TokenKind::Comma => f.write_str("','"),
            TokenKind::Plus => f.write_str("'+'"),
            TokenKind::Minus => f.write_str("'-'"),
            TokenKind::Star => f.write_str("'*'"),
        }
    }
}

/// A token with the byte offset it starts at.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub position: usize,
}

/// Splits PQL text into tokens. Yields `Err` once and then stops on bad input.
pub struct Tokenizer<'a> {
    input: &'a str,
    tail: &'a str,
    position: usize,
    failed: bool,
}

impl<'a> From<&'a str> for Tokenizer<'a> {
    fn from(input: &'a str) -> Self {
        Self {
            input,
            tail: input,
            position: 0,
            failed: false,
        }
    }
}

impl Iterator for Tokenizer<'_> {
    type Item = Result<Token>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        self.skip_whitespace();
        let c = self.tail.chars().next()?;
        let position = self.position;

        let result = match c {
            '(' => Ok(self.punct(TokenKind::OpenParen)),
            ')' => Ok(self.punct(TokenKind::CloseParen)),
            ',' => Ok(self.punct(TokenKind::Comma)),
            '+' => Ok(self.punct(TokenKind::Plus)),
            '*' => Ok(self.punct(TokenKind::Star)),
            '-' if self.starts_number(1) => self.next_number(),
            '-' => Ok(self.punct(TokenKind::Minus)),
            '\'' | '"' => self.next_string(c),
            c if c.is_ascii_digit() => self.next_number(),
            c if c.is_ascii_alphabetic() || c == '_' => Ok(self.next_ident()),
            c => Err(PqlError::syntax(
                position,
                format!("unexpected character '{c}'"),
            )),
        };

        match result {
            Ok(kind) => Some(Ok(Token { kind, position })),
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

impl<'a> Tokenizer<'a> {
    /// Total length of the input, used as the position of "end of input".
    pub fn end(&self) -> usize {
        self.input.len()
    }

    fn skip_whitespace(&mut self) {
        self.advance_bytes(self.try_chars(|c| c.is_whitespace()));
    }

    fn punct(&mut self, kind: TokenKind) -> TokenKind {
        self.advance_bytes(1);
        kind
    }

    fn starts_number(&self, offset: usize) -> bool {
        self.tail
            .as_bytes()
            .get(offset)
            .is_some_and(|b| b.is_ascii_digit())
    }

    fn next_ident(&mut self) -> TokenKind {
        let count = self.try_chars(|&c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
        TokenKind::Ident(self.advance_bytes(count).to_string())
    }

    fn next_number(&mut self) -> Result<TokenKind> {
        let position = self.position;
        let bytes = self.tail.as_bytes();
        let mut end = usize::from(bytes.first() == Some(&b'-'));
        let mut is_float = false;

        end += count_digits(&bytes[end..]);
        if bytes.get(end) == Some(&b'.') && bytes.get(end + 1).is_some_and(u8::is_ascii_digit) {
            is_float = true;
            end += 1 + count_digits(&bytes[end + 1..]);
        }
        if matches!(bytes.get(end), Some(b'e' | b'E')) {
            let mut exp = end + 1;
            if matches!(bytes.get(exp), Some(b'+' | b'-')) {
                exp += 1;
            }
            let digits = count_digits(&bytes[exp..]);
            if digits > 0 {
                is_float = true;
                end = exp + digits;
            }
        }

        let text = self.advance_bytes(end);
        let value = if is_float {
            text.parse::<f64>()
                .ok()
                .filter(|x| x.is_finite())
                .map(Value::Float)
        } else {
            text.parse::<i64>().ok().map(Value::Integer)
        };
        value
            .map(TokenKind::Number)
            .ok_or_else(|| PqlError::syntax(position, format!("invalid number '{text}'")))
    }

    fn next_string(&mut self, quote: char) -> Result<TokenKind> {
        let position = self.position;
        let mut value = String::new();
        let mut chars = self.tail.char_indices().skip(1);

        while let Some((i, c)) = chars.next() {
            match c {
                '\\' => match chars.next() {
                    Some((_, escaped)) => value.push(escaped),
                    None => break,
                },
                c if c == quote => {
                    self.advance_bytes(i + c.len_utf8());
                    return Ok(TokenKind::Str(value));
                }
                c => value.push(c),
            }
        }

        Err(PqlError::syntax(
            position,
            format!("unterminated string starting with {quote}"),
        ))
    }

    fn try_chars(&self, f: impl FnMut(&char) -> bool) -> usize {
        self.tail.chars().take_while(f).map(char::len_utf8).sum()
    }

    fn advance_bytes(&mut self, count: usize) -> &'a str {
        let (word, tail) = self.tail.split_at(count);
        self.position += count;
        self.tail = tail;
        word
    }
}

fn count_digits(bytes: &[u8]) -> usize {
    bytes.iter().take_while(|b| b.is_ascii_digit()).count()
}

/// Tokenize the whole input.
pub fn tokenize(input: &str) -> Result<Vec<Token>> {
    Tokenizer::from(input).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        tokenize(input)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    fn ident(s: &str) -> TokenKind {
        TokenKind::Ident(s.to_string())
    }

    #[test]
    fn test_empty() {
        assert!(tokenize("").unwrap().is_empty());
        assert!(tokenize("   ").unwrap().is_empty());
    }

    #[test]
    fn test_function_call() {
        assert_eq!(
            kinds("eq(donor.id,'DO1')"),
            vec![
                ident("eq"),
                TokenKind::OpenParen,
                ident("donor.id"),
                TokenKind::Comma,
                TokenKind::Str("DO1".to_string()),
                TokenKind::CloseParen,
            ]
        );
    }

    #[test]
    fn test_positions() {
        let tokens = tokenize("in( a , 1)").unwrap();
        let positions: Vec<usize> = tokens.iter().map(|t| t.position).collect();
        assert_eq!(positions, vec![0, 2, 4, 6, 8, 9]);
    }

    #[test]
    fn test_numbers() {
        assert_eq!(
            kinds("1 -2 3.5 1e3 -0.25"),
            vec![
                TokenKind::Number(Value::Integer(1)),
                TokenKind::Number(Value::Integer(-2)),
                TokenKind::Number(Value::Float(3.5)),
                TokenKind::Number(Value::Float(1000.0)),
                TokenKind::Number(Value::Float(-0.25)),
            ]
        );
    }

    #[test]
    fn test_sort_signs() {
        assert_eq!(
            kinds("sort(+a,-b)"),
            vec![
                ident("sort"),
                TokenKind::OpenParen,
                TokenKind::Plus,
                ident("a"),
                TokenKind::Comma,
                TokenKind::Minus,
                ident("b"),
                TokenKind::CloseParen,
            ]
        );
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(
            kinds(r#"'it\'s' "say \"hi\"" 'a\\b' "mixed 'quotes'""#),
            vec![
                TokenKind::Str("it's".to_string()),
                TokenKind::Str("say \"hi\"".to_string()),
                TokenKind::Str("a\\b".to_string()),
                TokenKind::Str("mixed 'quotes'".to_string()),
            ]
        );
    }

    #[test]
    fn test_unicode_string() {
        let tokens = tokenize("'Опа' x").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Str("Опа".to_string()));
        assert_eq!(tokens[1].position, 9);
    }

    #[test]
    fn test_unterminated_string() {
        let err = tokenize("eq(a,'oops)").unwrap_err();
        assert_eq!(err.position(), Some(5));
    }

    #[test]
    fn test_unexpected_character() {
        let err = tokenize("eq(a;1)").unwrap_err();
        assert_eq!(err.position(), Some(4));
        assert!(err.to_string().contains("';'"));
    }

    #[test]
    fn test_integer_overflow() {
        assert!(tokenize("99999999999999999999").is_err());
    }

    #[test]
    fn test_float_overflow() {
        assert!(tokenize("1e400").is_err());
        assert!(tokenize("-1.0e999").is_err());
        assert_eq!(kinds("1e300").len(), 1);
    }
}
