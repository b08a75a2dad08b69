//! Parse tree for PQL statements.
//!
//! A [`Statement`] is what the parser produces and what the translation
//! service serializes. Every node implements [`Display`](fmt::Display), which
//! renders valid PQL: parsing the rendered text yields an equal tree.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A literal value inside a filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// A quoted string.
    String(String),
    /// An integer literal.
    Integer(i64),
    /// A floating point literal.
    Float(f64),
    /// `true` or `false`.
    Boolean(bool),
}

impl Value {
    /// Returns true for the empty string, which mutations treat as "no term".
    pub fn is_blank(&self) -> bool {
        matches!(self, Value::String(s) if s.is_empty())
    }

    /// Returns false for values PQL has no literal for (NaN and infinities).
    pub fn is_literal(&self) -> bool {
        !matches!(self, Value::Float(x) if !x.is_finite())
    }

    /// The string payload, if this is a string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<&String> for Value {
    fn from(value: &String) -> Self {
        Value::String(value.clone())
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Integer(i64::from(value))
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Value::Integer(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => {
                f.write_str("\"")?;
                for ch in s.chars() {
                    if ch == '"' || ch == '\\' {
                        f.write_str("\\")?;
                    }
                    write!(f, "{ch}")?;
                }
                f.write_str("\"")
            }
            Value::Integer(n) => write!(f, "{n}"),
            // Keep a fractional part so the literal lexes back as a float.
            Value::Float(x) if x.is_finite() && x.fract() == 0.0 => write!(f, "{x:.1}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Boolean(b) => write!(f, "{b}"),
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Ascending, written `+field` (or a bare `field`).
    Asc,
    /// Descending, written `-field`.
    Desc,
}

impl Direction {
    /// The sign used in PQL text.
    pub fn sign(&self) -> char {
        match self {
            Direction::Asc => '+',
            Direction::Desc => '-',
        }
    }
}

/// One entry of a `sort(...)` clause.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortField {
    /// The (possibly dotted) field name.
    pub field: String,
    /// The direction.
    pub direction: Direction,
}

impl SortField {
    /// Create a sort entry.
    pub fn new<S: Into<String>>(field: S, direction: Direction) -> Self {
        SortField {
            field: field.into(),
            direction,
        }
    }

    /// Ascending sort on `field`.
    pub fn asc<S: Into<String>>(field: S) -> Self {
        Self::new(field, Direction::Asc)
    }

    /// Descending sort on `field`.
    pub fn desc<S: Into<String>>(field: S) -> Self {
        Self::new(field, Direction::Desc)
    }
}

impl fmt::Display for SortField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.direction.sign(), self.field)
    }
}

/// Paging window: `limit(size)` or `limit(from,size)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Limit {
    /// Offset of the first hit, when given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<u64>,
    /// Page size.
    pub size: u64,
}

impl Limit {
    /// `limit(from,size)`.
    pub fn new(from: u64, size: u64) -> Self {
        Limit {
            from: Some(from),
            size,
        }
    }

    /// `limit(size)`.
    pub fn size(size: u64) -> Self {
        Limit { from: None, size }
    }
}

impl fmt::Display for Limit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.from {
            Some(from) => write!(f, "limit({},{})", from, self.size),
            None => write!(f, "limit({})", self.size),
        }
    }
}

/// Single-value comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl CompareOp {
    /// The PQL keyword.
    pub fn keyword(&self) -> &'static str {
        match self {
            CompareOp::Eq => "eq",
            CompareOp::Ne => "ne",
            CompareOp::Gt => "gt",
            CompareOp::Ge => "ge",
            CompareOp::Lt => "lt",
            CompareOp::Le => "le",
        }
    }

    /// Look up an operator by keyword.
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "eq" => Some(CompareOp::Eq),
            "ne" => Some(CompareOp::Ne),
            "gt" => Some(CompareOp::Gt),
            "ge" => Some(CompareOp::Ge),
            "lt" => Some(CompareOp::Lt),
            "le" => Some(CompareOp::Le),
            _ => None,
        }
    }
}

/// A filter expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// `eq(field,value)`, `ne(...)`, `gt(...)` and friends.
    Compare {
        op: CompareOp,
        field: String,
        value: Value,
    },
    /// `in(field,v1,v2,...)`
    In { field: String, values: Vec<Value> },
    /// `nin(field,v1,v2,...)`
    Nin { field: String, values: Vec<Value> },
    /// `and(f1,f2,...)`
    And(Vec<Filter>),
    /// `or(f1,f2,...)`
    Or(Vec<Filter>),
    /// `not(f)`
    Not(Box<Filter>),
    /// `exists(field)`, also accepted as `has(field)`.
    Exists(String),
    /// `missing(field)`
    Missing(String),
    /// `nested(path,f1,f2,...)`
    Nested { path: String, filters: Vec<Filter> },
}

impl Filter {
    /// `eq(field,value)`.
    pub fn eq<F: Into<String>, V: Into<Value>>(field: F, value: V) -> Self {
        Filter::Compare {
            op: CompareOp::Eq,
            field: field.into(),
            value: value.into(),
        }
    }

    /// `eq` for one value, `in` for several.
    pub fn eq_or_in<F: Into<String>>(field: F, mut values: Vec<Value>) -> Self {
        if values.len() == 1 {
            Filter::Compare {
                op: CompareOp::Eq,
                field: field.into(),
                value: values.remove(0),
            }
        } else {
            Filter::In {
                field: field.into(),
                values,
            }
        }
    }

    /// The field a leaf filter applies to.
    pub fn field(&self) -> Option<&str> {
        match self {
            Filter::Compare { field, .. }
            | Filter::In { field, .. }
            | Filter::Nin { field, .. }
            | Filter::Exists(field)
            | Filter::Missing(field) => Some(field),
            _ => None,
        }
    }
}

fn write_joined<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(",")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::Compare { op, field, value } => {
                write!(f, "{}({},{})", op.keyword(), field, value)
            }
            Filter::In { field, values } => {
                write!(f, "in({field},")?;
                write_joined(f, values)?;
                f.write_str(")")
            }
            Filter::Nin { field, values } => {
                write!(f, "nin({field},")?;
                write_joined(f, values)?;
                f.write_str(")")
            }
            Filter::And(filters) => {
                f.write_str("and(")?;
                write_joined(f, filters)?;
                f.write_str(")")
            }
            Filter::Or(filters) => {
                f.write_str("or(")?;
                write_joined(f, filters)?;
                f.write_str(")")
            }
            Filter::Not(inner) => write!(f, "not({inner})"),
            Filter::Exists(field) => write!(f, "exists({field})"),
            Filter::Missing(field) => write!(f, "missing({field})"),
            Filter::Nested { path, filters } => {
                write!(f, "nested({path},")?;
                write_joined(f, filters)?;
                f.write_str(")")
            }
        }
    }
}

/// A top-level statement term.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// `select(*)` or `select(a,b)`
    Select(Vec<String>),
    /// `facets(*)` or `facets(a,b)`
    Facets(Vec<String>),
    /// `count()`
    Count,
    /// `sort(+a,-b)`
    Sort(Vec<SortField>),
    /// `limit(size)` or `limit(from,size)`
    Limit(Limit),
    /// Any filter expression.
    Filter(Filter),
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Select(fields) => write!(f, "select({})", fields.join(",")),
            Node::Facets(fields) => write!(f, "facets({})", fields.join(",")),
            Node::Count => f.write_str("count()"),
            Node::Sort(fields) => {
                f.write_str("sort(")?;
                write_joined(f, fields)?;
                f.write_str(")")
            }
            Node::Limit(limit) => write!(f, "{limit}"),
            Node::Filter(filter) => write!(f, "{filter}"),
        }
    }
}

/// A whole PQL statement: comma-separated nodes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Statement {
    /// Nodes in source order.
    pub nodes: Vec<Node>,
}

impl Statement {
    /// Create a statement from nodes.
    pub fn new(nodes: Vec<Node>) -> Self {
        Statement { nodes }
    }

    /// True for the statement parsed from empty input.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// True if the statement contains `count()`.
    pub fn is_count(&self) -> bool {
        self.nodes.iter().any(|n| matches!(n, Node::Count))
    }

    /// Top-level filter expressions.
    pub fn filters(&self) -> impl Iterator<Item = &Filter> {
        self.nodes.iter().filter_map(|n| match n {
            Node::Filter(filter) => Some(filter),
            _ => None,
        })
    }

    /// Field lists of every `select(...)`.
    pub fn selects(&self) -> impl Iterator<Item = &[String]> {
        self.nodes.iter().filter_map(|n| match n {
            Node::Select(fields) => Some(fields.as_slice()),
            _ => None,
        })
    }

    /// Field lists of every `facets(...)`.
    pub fn facets(&self) -> impl Iterator<Item = &[String]> {
        self.nodes.iter().filter_map(|n| match n {
            Node::Facets(fields) => Some(fields.as_slice()),
            _ => None,
        })
    }

    /// The first `sort(...)`, if any.
    pub fn sort(&self) -> Option<&[SortField]> {
        self.nodes.iter().find_map(|n| match n {
            Node::Sort(fields) => Some(fields.as_slice()),
            _ => None,
        })
    }

    /// The first `limit(...)`, if any.
    pub fn limit(&self) -> Option<Limit> {
        self.nodes.iter().find_map(|n| match n {
            Node::Limit(limit) => Some(*limit),
            _ => None,
        })
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_joined(f, &self.nodes)
    }
}
