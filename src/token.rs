//! The token definition for the filter language.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime};
use std::fmt;

/// A token is a single unit of the language, with a specific kind and location.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// The matched source text.
    pub text: String,
    /// The payload coerced from `text` at tokenization time.
    pub value: TokenValue,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, value: TokenValue, span: Span) -> Self {
        Self {
            kind,
            text: text.into(),
            value,
            span,
        }
    }

    /// The textual payload, for kinds that carry one.
    pub fn as_text(&self) -> Option<&str> {
        self.value.as_text()
    }
}

/// The kind of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // Punctuation
    OpenParen,  // (
    CloseParen, // )
    Comma,      // ,
    Whitespace, // never emitted

    // Operators and functions
    Logical, // eq ne gt ge lt le and or
    Func,    // contains endswith startswith

    // Literals
    Float,
    Integer,
    String, // single quoted, quotes included
    Date,
    Time,
    DateTime,
    Boolean,
    Literal, // bare identifier, e.g. a field name
}

/// Typed payload of a token.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenValue {
    None,
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Text(String),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(DateTime<FixedOffset>),
}

impl TokenValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            TokenValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for TokenValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenValue::None => Ok(()),
            TokenValue::Integer(n) => write!(f, "{}", n),
            TokenValue::Float(n) => write!(f, "{}", n),
            TokenValue::Boolean(b) => write!(f, "{}", b),
            TokenValue::Text(s) => f.write_str(s),
            TokenValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            TokenValue::Time(t) => write!(f, "{}", t),
            TokenValue::DateTime(dt) => f.write_str(&dt.to_rfc3339()),
        }
    }
}

/// Represents a span in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    /// The starting byte offset.
    pub start: usize,
    /// The ending byte offset.
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}
