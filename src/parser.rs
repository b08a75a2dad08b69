//! PQL parser producing a [`Statement`] parse tree.
//!
//! Supported syntax:
//! - Projections: `select(*)`, `select(a,b)`, `facets(*)`, `count()`
//! - Comparisons: `eq(f,v)`, `ne`, `gt`, `ge`, `lt`, `le`
//! - Sets: `in(f,v1,v2)`, `nin(f,v1,v2)`
//! - Boolean groups: `and(...)`, `or(...)`, `not(...)`, nested up to [`MAX_DEPTH`]
//! - Existence: `exists(f)` (alias `has(f)`), `missing(f)`
//! - Nesting scope: `nested(path,filter,...)`
//! - Ordering and paging: `sort(+a,-b,c)`, `limit(size)`, `limit(from,size)`
//!
//! Values are quoted strings (`'...'` or `"..."`, backslash escapes),
//! integers, floats and `true`/`false`.

pub mod lexer;

use std::iter::Peekable;
use std::vec::IntoIter;

use crate::ast::{CompareOp, Direction, Filter, Limit, Node, SortField, Statement, Value};
use crate::error::{PqlError, Result};

use self::lexer::{Token, TokenKind, Tokenizer};

/// Every word with a meaning in function position.
pub const KEYWORDS: [&str; 20] = [
    "select", "facets", "count", "eq", "ne", "gt", "ge", "lt", "le", "in", "nin", "and", "or",
    "not", "exists", "has", "missing", "nested", "sort", "limit",
];

/// Deepest allowed nesting of `and`, `or`, `not` and `nested` groups.
pub const MAX_DEPTH: usize = 256;

/// Parse PQL text into a statement.
///
/// Empty (or whitespace-only) input yields an empty statement.
pub fn parse(pql: &str) -> Result<Statement> {
    PqlParser::new().parse(pql)
}

/// Stateless PQL parser.
#[derive(Debug, Default, Clone, Copy)]
pub struct PqlParser;

impl PqlParser {
    /// Create a new parser.
    pub fn new() -> Self {
        PqlParser
    }

    /// Parse PQL text into a statement.
    pub fn parse(&self, pql: &str) -> Result<Statement> {
        let tokenizer = Tokenizer::from(pql);
        let end = tokenizer.end();
        let tokens = tokenizer.collect::<Result<Vec<Token>>>()?;
        if tokens.is_empty() {
            return Ok(Statement::default());
        }

        let mut parser = StatementParser::new(tokens, end);
        parser.parse_statement()
    }

    /// Parse a single filter expression, such as `and(eq(a.b,1),exists(a.c))`.
    pub fn parse_filter(&self, pql: &str) -> Result<Filter> {
        let tokenizer = Tokenizer::from(pql);
        let end = tokenizer.end();
        let tokens = tokenizer.collect::<Result<Vec<Token>>>()?;

        let mut parser = StatementParser::new(tokens, end);
        let filter = parser.parse_filter()?;
        parser.expect_end()?;
        Ok(filter)
    }
}

/// Internal recursive-descent parser over a token stream.
struct StatementParser {
    tokens: Peekable<IntoIter<Token>>,
    end: usize,
    depth: usize,
}

impl StatementParser {
    fn new(tokens: Vec<Token>, end: usize) -> Self {
        StatementParser {
            tokens: tokens.into_iter().peekable(),
            end,
            depth: 0,
        }
    }

    fn parse_statement(&mut self) -> Result<Statement> {
        let mut nodes = vec![self.parse_node()?];

        while self.tokens.peek().is_some() {
            self.expect(TokenKind::Comma, "',' or end of input")?;
            nodes.push(self.parse_node()?);
        }

        Ok(Statement::new(nodes))
    }

    fn parse_node(&mut self) -> Result<Node> {
        let (name, position) = self.peek_keyword("a function")?;

        let node = match name.as_str() {
            "select" => {
                self.tokens.next();
                Node::Select(self.parse_projection()?)
            }
            "facets" => {
                self.tokens.next();
                Node::Facets(self.parse_projection()?)
            }
            "count" => {
                self.tokens.next();
                self.expect(TokenKind::OpenParen, "'('")?;
                self.expect(TokenKind::CloseParen, "')'")?;
                Node::Count
            }
            "sort" => {
                self.tokens.next();
                Node::Sort(self.parse_sort()?)
            }
            "limit" => {
                self.tokens.next();
                Node::Limit(self.parse_limit()?)
            }
            _ if is_filter_keyword(&name) => Node::Filter(self.parse_filter()?),
            _ => {
                return Err(PqlError::syntax(
                    position,
                    format!("unknown function '{name}'"),
                ));
            }
        };

        Ok(node)
    }

    fn parse_filter(&mut self) -> Result<Filter> {
        let (name, position) = self.peek_keyword("a filter")?;
        self.tokens.next();

        if let Some(op) = CompareOp::from_keyword(&name) {
            self.expect(TokenKind::OpenParen, "'('")?;
            let field = self.parse_field()?;
            self.expect(TokenKind::Comma, "','")?;
            let value = self.parse_value()?;
            self.expect(TokenKind::CloseParen, "')'")?;
            return Ok(Filter::Compare { op, field, value });
        }

        let filter = match name.as_str() {
            "in" | "nin" => {
                self.expect(TokenKind::OpenParen, "'('")?;
                let field = self.parse_field()?;
                let mut values = Vec::new();
                while self.consume(&TokenKind::Comma) {
                    values.push(self.parse_value()?);
                }
                if values.is_empty() {
                    return Err(self.unexpected("','"));
                }
                self.expect(TokenKind::CloseParen, "')'")?;
                if name == "in" {
                    Filter::In { field, values }
                } else {
                    Filter::Nin { field, values }
                }
            }
            "and" | "or" | "not" | "nested" => self.parse_group(&name, position)?,
            "exists" | "has" | "missing" => {
                self.expect(TokenKind::OpenParen, "'('")?;
                let field = self.parse_field()?;
                self.expect(TokenKind::CloseParen, "')'")?;
                if name == "missing" {
                    Filter::Missing(field)
                } else {
                    Filter::Exists(field)
                }
            }
            _ => {
                return Err(PqlError::syntax(
                    position,
                    format!("'{name}' is not a filter"),
                ));
            }
        };

        Ok(filter)
    }

    fn parse_group(&mut self, name: &str, position: usize) -> Result<Filter> {
        if self.depth >= MAX_DEPTH {
            return Err(PqlError::syntax(position, "filter nesting too deep"));
        }
        self.depth += 1;

        self.expect(TokenKind::OpenParen, "'('")?;
        let filter = match name {
            "not" => Filter::Not(Box::new(self.parse_filter()?)),
            "nested" => {
                let path = self.parse_field()?;
                self.expect(TokenKind::Comma, "','")?;
                Filter::Nested {
                    path,
                    filters: self.parse_filter_list()?,
                }
            }
            "and" => Filter::And(self.parse_filter_list()?),
            _ => Filter::Or(self.parse_filter_list()?),
        };
        self.expect(TokenKind::CloseParen, "')'")?;

        self.depth -= 1;
        Ok(filter)
    }

    fn parse_filter_list(&mut self) -> Result<Vec<Filter>> {
        let mut filters = vec![self.parse_filter()?];
        while self.consume(&TokenKind::Comma) {
            filters.push(self.parse_filter()?);
        }
        Ok(filters)
    }

    fn parse_projection(&mut self) -> Result<Vec<String>> {
        self.expect(TokenKind::OpenParen, "'('")?;

        let fields = if self.consume(&TokenKind::Star) {
            vec!["*".to_string()]
        } else {
            let mut fields = vec![self.parse_field()?];
            while self.consume(&TokenKind::Comma) {
                fields.push(self.parse_field()?);
            }
            fields
        };

        self.expect(TokenKind::CloseParen, "')'")?;
        Ok(fields)
    }

    fn parse_sort(&mut self) -> Result<Vec<SortField>> {
        self.expect(TokenKind::OpenParen, "'('")?;

        let mut fields = vec![self.parse_sort_field()?];
        while self.consume(&TokenKind::Comma) {
            fields.push(self.parse_sort_field()?);
        }

        self.expect(TokenKind::CloseParen, "')'")?;
        Ok(fields)
    }

    fn parse_sort_field(&mut self) -> Result<SortField> {
        let direction = if self.consume(&TokenKind::Minus) {
            Direction::Desc
        } else {
            self.consume(&TokenKind::Plus);
            Direction::Asc
        };

        Ok(SortField::new(self.parse_field()?, direction))
    }

    fn parse_limit(&mut self) -> Result<Limit> {
        self.expect(TokenKind::OpenParen, "'('")?;

        let first = self.parse_count()?;
        let limit = if self.consume(&TokenKind::Comma) {
            Limit::new(first, self.parse_count()?)
        } else {
            Limit::size(first)
        };

        self.expect(TokenKind::CloseParen, "')'")?;
        Ok(limit)
    }

    fn parse_count(&mut self) -> Result<u64> {
        match self.tokens.next() {
            Some(Token {
                kind: TokenKind::Number(Value::Integer(n)),
                position,
            }) => u64::try_from(n)
                .map_err(|_| PqlError::syntax(position, format!("negative limit {n}"))),
            Some(token) => Err(PqlError::syntax(
                token.position,
                format!("expected a non-negative integer but found {}", token.kind),
            )),
            None => Err(self.end_of_input("a non-negative integer")),
        }
    }

    fn parse_field(&mut self) -> Result<String> {
        match self.tokens.next() {
            Some(Token {
                kind: TokenKind::Ident(name),
                ..
            }) => Ok(name),
            Some(token) => Err(PqlError::syntax(
                token.position,
                format!("expected a field name but found {}", token.kind),
            )),
            None => Err(self.end_of_input("a field name")),
        }
    }

    fn parse_value(&mut self) -> Result<Value> {
        match self.tokens.next() {
            Some(Token { kind, position }) => match kind {
                TokenKind::Str(s) => Ok(Value::String(s)),
                TokenKind::Number(n) => Ok(n),
                TokenKind::Ident(word) if word == "true" => Ok(Value::Boolean(true)),
                TokenKind::Ident(word) if word == "false" => Ok(Value::Boolean(false)),
                kind => Err(PqlError::syntax(
                    position,
                    format!("expected a value but found {kind}"),
                )),
            },
            None => Err(self.end_of_input("a value")),
        }
    }

    fn peek_keyword(&mut self, expected: &str) -> Result<(String, usize)> {
        match self.tokens.peek() {
            Some(Token {
                kind: TokenKind::Ident(name),
                position,
            }) => Ok((name.clone(), *position)),
            Some(token) => Err(PqlError::syntax(
                token.position,
                format!("expected {expected} but found {}", token.kind),
            )),
            None => Err(self.end_of_input(expected)),
        }
    }

    fn consume(&mut self, kind: &TokenKind) -> bool {
        self.tokens.next_if(|t| &t.kind == kind).is_some()
    }

    fn expect(&mut self, kind: TokenKind, expected: &str) -> Result<()> {
        if self.consume(&kind) {
            Ok(())
        } else {
            Err(self.unexpected(expected))
        }
    }

    fn expect_end(&mut self) -> Result<()> {
        match self.tokens.peek() {
            None => Ok(()),
            Some(_) => Err(self.unexpected("end of input")),
        }
    }

    fn unexpected(&mut self, expected: &str) -> PqlError {
        match self.tokens.peek() {
            Some(token) => PqlError::syntax(
                token.position,
                format!("expected {expected} but found {}", token.kind),
            ),
            None => self.end_of_input(expected),
        }
    }

    fn end_of_input(&self, expected: &str) -> PqlError {
        PqlError::syntax(
            self.end,
            format!("unexpected end of input, expected {expected}"),
        )
    }
}

fn is_filter_keyword(name: &str) -> bool {
    CompareOp::from_keyword(name).is_some()
        || matches!(
            name,
            "in" | "nin" | "and" | "or" | "not" | "exists" | "has" | "missing" | "nested"
        )
}
