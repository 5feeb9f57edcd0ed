//! `$orderby` parser.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Characters that may not appear in an `$orderby` item.
const DENIED_CHARACTERS: &str = "~!@#$%^&*()_+-";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderByItem {
    pub field: String,
    pub direction: SortDirection,
}

impl OrderByItem {
    pub fn new(field: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            field: field.into(),
            direction,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderByError {
    #[error("orderby has no items")]
    Empty,

    #[error("orderby contains an empty item")]
    EmptyItem,

    #[error("orderby item '{0}' contains invalid characters")]
    InvalidCharacters(String),

    #[error("too many orderby statements in '{0}'")]
    TooManyOrderByStatements(String),

    #[error("invalid orderby direction in '{0}', expected 'asc' or 'desc'")]
    InvalidOrderBy(String),
}

pub fn parse_orderby(value: &str) -> Result<Vec<OrderByItem>, OrderByError> {
    let items: Vec<&str> = value.split(',').collect();
    if items.is_empty() {
        return Err(OrderByError::Empty);
    }

    // Validate every item before building any of them.
    for item in &items {
        if item.trim().is_empty() {
            return Err(OrderByError::EmptyItem);
        }
        if item.chars().any(|c| DENIED_CHARACTERS.contains(c)) {
            return Err(OrderByError::InvalidCharacters(item.trim().to_string()));
        }
    }

    items.into_iter().map(parse_item).collect()
}

fn parse_item(item: &str) -> Result<OrderByItem, OrderByError> {
    let parts: Vec<&str> = item.split_whitespace().collect();
    match parts.as_slice() {
        [field] => Ok(OrderByItem::new(*field, SortDirection::Asc)),
        [field, "asc"] => Ok(OrderByItem::new(*field, SortDirection::Asc)),
        [field, "desc"] => Ok(OrderByItem::new(*field, SortDirection::Desc)),
        [_, _] => Err(OrderByError::InvalidOrderBy(parts.join(" "))),
        _ => Err(OrderByError::TooManyOrderByStatements(parts.join(" "))),
    }
}
