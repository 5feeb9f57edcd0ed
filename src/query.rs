//! URL query → [`QueryDescriptor`].
//!
//! Every keyword is checked independently and all failures are reported
//! together in one [`QueryError`].

use crate::ast::ParseNode;
use crate::config::QueryConfig;
use crate::lexer::TokenizeError;
use crate::orderby::{parse_orderby, OrderByError, OrderByItem};
use crate::parser::{FilterError, FilterParser};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;
use tracing::debug;

pub const SELECT: &str = "$select";
pub const TOP: &str = "$top";
pub const SKIP: &str = "$skip";
pub const COUNT: &str = "$count";
pub const ORDERBY: &str = "$orderby";
pub const INLINE_COUNT: &str = "$inlinecount";
pub const FILTER: &str = "$filter";

/// Query parameters, each key mapped to every value it was given.
pub type QueryValues = BTreeMap<String, Vec<String>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InlineCount {
    AllPages,
    #[default]
    None,
}

impl InlineCount {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "allpages" => Some(InlineCount::AllPages),
            "none" => Some(InlineCount::None),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InlineCount::AllPages => "allpages",
            InlineCount::None => "none",
        }
    }
}

impl fmt::Display for InlineCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parsed form of every recognized keyword in one request.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryDescriptor {
    pub select: Option<Vec<String>>,
    pub top: Option<u64>,
    pub skip: Option<u64>,
    pub count: bool,
    pub inline_count: InlineCount,
    pub orderby: Option<Vec<OrderByItem>>,
    pub filter: Option<ParseNode>,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum KeywordError {
    #[error("{0} was specified more than once")]
    DuplicateKeyword(String),

    #[error("{0} requires a value")]
    MissingValue(String),

    #[error("$count and $inlinecount cannot be used together")]
    MutuallyExclusiveKeywords,

    #[error("{0} is not valid")]
    UnknownKeyword(String),

    #[error("{keyword} value '{value}' is not a non-negative integer")]
    InvalidInteger { keyword: String, value: String },

    #[error("$top value {value} exceeds the maximum of {max}")]
    TopTooLarge { value: u64, max: u64 },

    #[error("{keyword} value '{value}' is not a boolean")]
    InvalidBoolean { keyword: String, value: String },

    #[error("$inlinecount value '{0}' must be 'allpages' or 'none'")]
    InvalidInlineCount(String),

    #[error("invalid $filter: {0}")]
    Filter(#[from] FilterError),

    #[error("invalid $orderby: {0}")]
    OrderBy(#[from] OrderByError),
}

/// All keyword errors of one query, reported together.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{}", join_messages(.errors))]
pub struct QueryError {
    pub errors: Vec<KeywordError>,
}

fn join_messages(errors: &[KeywordError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Decodes a raw `key=value&...` query string, with or without a leading `?`.
pub fn query_values(raw: &str) -> QueryValues {
    let mut values = QueryValues::new();
    let raw = raw.strip_prefix('?').unwrap_or(raw);
    for (key, value) in url::form_urlencoded::parse(raw.as_bytes()) {
        values.entry(key.into_owned()).or_default().push(value.into_owned());
    }
    values
}

pub struct QueryParser {
    filter_parser: FilterParser,
    max_top: Option<u64>,
}

impl QueryParser {
    pub fn new(filter_parser: FilterParser) -> Self {
        Self {
            filter_parser,
            max_top: None,
        }
    }

    pub fn odata() -> Result<Self, TokenizeError> {
        Ok(Self::new(FilterParser::odata()?))
    }

    pub fn from_config(config: &QueryConfig) -> Result<Self, TokenizeError> {
        let filter_parser = FilterParser::odata()?.with_limits(config.limits());
        Ok(Self::new(filter_parser).with_max_top(config.max_top))
    }

    pub fn with_max_top(mut self, max_top: Option<u64>) -> Self {
        self.max_top = max_top;
        self
    }

    pub fn parse_query_string(&self, raw: &str) -> Result<QueryDescriptor, QueryError> {
        self.parse_query(&query_values(raw))
    }

    pub fn parse_query(&self, values: &QueryValues) -> Result<QueryDescriptor, QueryError> {
        if values.contains_key(COUNT) && values.contains_key(INLINE_COUNT) {
            debug!("rejected query with both $count and $inlinecount");
            return Err(QueryError {
                errors: vec![KeywordError::MutuallyExclusiveKeywords],
            });
        }

        let mut descriptor = QueryDescriptor::default();
        let mut errors = Vec::new();

        for (keyword, occurrences) in values {
            let result = match occurrences.as_slice() {
                [value] if value.is_empty() && keyword != COUNT => {
                    Err(KeywordError::MissingValue(keyword.clone()))
                }
                [] if keyword != COUNT => Err(KeywordError::MissingValue(keyword.clone())),
                [] => self.apply(&mut descriptor, keyword, ""),
                [value] => self.apply(&mut descriptor, keyword, value),
                _ => Err(KeywordError::DuplicateKeyword(keyword.clone())),
            };

            if let Err(error) = result {
                debug!(keyword = %keyword, error = %error, "rejected query keyword");
                errors.push(error);
            }
        }

        if errors.is_empty() {
            Ok(descriptor)
        } else {
            Err(QueryError { errors })
        }
    }

    fn apply(&self, descriptor: &mut QueryDescriptor, keyword: &str, value: &str) -> Result<(), KeywordError> {
        match keyword {
            SELECT => {
                descriptor.select = Some(
                    value
                        .split(',')
                        .map(str::trim)
                        .filter(|field| !field.is_empty())
                        .map(str::to_string)
                        .collect(),
                );
            }
            TOP => {
                let top = parse_count_value(keyword, value)?;
                if let Some(max) = self.max_top {
                    if top > max {
                        return Err(KeywordError::TopTooLarge { value: top, max });
                    }
                }
                descriptor.top = Some(top);
            }
            SKIP => descriptor.skip = Some(parse_count_value(keyword, value)?),
            COUNT => {
                descriptor.count = match value.trim() {
                    "" | "true" => true,
                    "false" => false,
                    other => {
                        return Err(KeywordError::InvalidBoolean {
                            keyword: keyword.to_string(),
                            value: other.to_string(),
                        })
                    }
                };
            }
            ORDERBY => descriptor.orderby = Some(parse_orderby(value)?),
            INLINE_COUNT => {
                descriptor.inline_count =
                    InlineCount::parse(value).ok_or_else(|| KeywordError::InvalidInlineCount(value.to_string()))?;
            }
            FILTER => descriptor.filter = Some(self.filter_parser.parse_filter(value)?),
            _ => return Err(KeywordError::UnknownKeyword(keyword.to_string())),
        }
        Ok(())
    }
}

/// Only plain decimal digits; `u64::from_str` alone would also take a leading `+`.
fn parse_count_value(keyword: &str, value: &str) -> Result<u64, KeywordError> {
    let invalid = || KeywordError::InvalidInteger {
        keyword: keyword.to_string(),
        value: value.to_string(),
    };
    let digits = value.trim();
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    digits.parse().map_err(|_| invalid())
}
