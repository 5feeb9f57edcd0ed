//! Backend filter expression produced by the translator.
//!
//! A `BackendFilter` is storage-agnostic: the `document` module renders it as a
//! document-store query and `sql_compiler` renders it as a SQL `WHERE` clause.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime};
use std::fmt;

/// A 12-byte document identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectId([u8; 12]);

impl ObjectId {
    pub const LEN: usize = 12;

    pub fn from_bytes(bytes: [u8; 12]) -> Self {
        Self(bytes)
    }

    /// Decodes a 24 character hex string.
    pub fn parse_hex(s: &str) -> Option<Self> {
        let bytes = hex::decode(s).ok()?;
        let bytes: [u8; 12] = bytes.try_into().ok()?;
        Some(Self::from_bytes(bytes))
    }

    pub fn bytes(&self) -> &[u8; 12] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Comparison operators. Each maps to one backend symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl ComparisonOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            ComparisonOp::Eq => "$eq",
            ComparisonOp::Ne => "$ne",
            ComparisonOp::Gt => "$gt",
            ComparisonOp::Gte => "$gte",
            ComparisonOp::Lt => "$lt",
            ComparisonOp::Lte => "$lte",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BooleanOp {
    And,
    Or,
}

impl BooleanOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BooleanOp::And => "$and",
            BooleanOp::Or => "$or",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Integer(i64),
    Float(f64),
    Boolean(bool),
    String(String),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(DateTime<FixedOffset>),
    ObjectId(ObjectId),
}

impl fmt::Display for FilterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterValue::Integer(n) => write!(f, "{}", n),
            FilterValue::Float(n) => write!(f, "{}", n),
            FilterValue::Boolean(b) => write!(f, "{}", b),
            FilterValue::String(s) => f.write_str(s),
            FilterValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            FilterValue::Time(t) => write!(f, "{}", t),
            FilterValue::DateTime(dt) => f.write_str(&dt.to_rfc3339()),
            FilterValue::ObjectId(id) => write!(f, "{}", id),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BackendFilter {
    Comparison {
        field: String,
        op: ComparisonOp,
        literal: FilterValue,
    },
    BooleanCombine {
        op: BooleanOp,
        left: Box<BackendFilter>,
        right: Box<BackendFilter>,
    },
    Regex {
        field: String,
        pattern: String,
        flags: String,
    },
}

impl BackendFilter {
    pub fn comparison(field: impl Into<String>, op: ComparisonOp, literal: FilterValue) -> Self {
        BackendFilter::Comparison {
            field: field.into(),
            op,
            literal,
        }
    }

    pub fn combine(op: BooleanOp, left: BackendFilter, right: BackendFilter) -> Self {
        BackendFilter::BooleanCombine {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }
}
