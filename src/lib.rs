//! OData-style query options (`$filter`, `$orderby`, `$top`, `$skip`,
//! `$select`, `$count`, `$inlinecount`) parsed from URL query strings and
//! translated into a storage-agnostic filter.
//!
//! ```text
//! query string ─► QueryParser ─► QueryDescriptor
//!                     │
//!                     └─ $filter ─► Tokenizer ─► Parser ─► ParseNode ─► translate ─► BackendFilter
//!                                                                                     ├─► document::to_document
//!                                                                                     └─► SqlCompiler
//! ```

pub mod ast;
pub mod backend;
pub mod config;
pub mod document;
pub mod grammar;
pub mod lexer;
pub mod orderby;
pub mod parser;
pub mod query;
pub mod sql_compiler;
pub mod token;
pub mod translator;

pub use ast::ParseNode;
pub use backend::{BackendFilter, BooleanOp, ComparisonOp, FilterValue, ObjectId};
pub use config::{ConfigError, QueryConfig};
pub use grammar::Grammar;
pub use lexer::{TokenizeError, Tokenizer};
pub use orderby::{parse_orderby, OrderByError, OrderByItem, SortDirection};
pub use parser::{FilterError, FilterParser, ParseError, ParseLimits, Parser};
pub use query::{InlineCount, KeywordError, QueryDescriptor, QueryError, QueryParser, QueryValues};
pub use token::{Span, Token, TokenKind, TokenValue};
pub use translator::{translate, TranslateError};

/// Tokenizes and parses a `$filter` expression with the default grammar.
///
/// Builds a fresh [`FilterParser`] on every call; long-lived callers should
/// build one and reuse it.
pub fn parse_filter(input: &str) -> Result<ParseNode, FilterError> {
    FilterParser::odata()?.parse_filter(input)
}
