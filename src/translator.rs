//! Translates a `$filter` parse tree into a [`BackendFilter`].

use crate::ast::ParseNode;
use crate::backend::{BackendFilter, BooleanOp, ComparisonOp, FilterValue, ObjectId};
use crate::token::{TokenKind, TokenValue};
use thiserror::Error;
use tracing::trace;

/// Field compared as a document identifier.
const OBJECT_ID_FIELD: &str = "_id";

/// Flags attached to every regex built from a string function.
const REGEX_FLAGS: &str = "i";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranslateError {
    #[error("Unsupported operator '{operator}' in {node}")]
    UnsupportedOperator { operator: String, node: String },

    #[error("Invalid field reference in {node}")]
    InvalidFieldReference { node: String },

    #[error("Invalid object id '{value}' in {node}")]
    InvalidObjectId { value: String, node: String },

    #[error("Invalid operand in {node}")]
    InvalidOperand { node: String },
}

pub fn translate(node: &ParseNode) -> Result<BackendFilter, TranslateError> {
    trace!(operator = node.name(), "translating node");

    let [left, right] = node.children.as_slice() else {
        return Err(unsupported(node));
    };

    match (node.token.kind, node.name()) {
        (TokenKind::Logical, "eq") => comparison(node, ComparisonOp::Eq, left, right),
        (TokenKind::Logical, "ne") => comparison(node, ComparisonOp::Ne, left, right),
        (TokenKind::Logical, "gt") => comparison(node, ComparisonOp::Gt, left, right),
        (TokenKind::Logical, "lt") => comparison(node, ComparisonOp::Lt, left, right),
        // ge/le keep the right-hand literal untouched, quotes included.
        (TokenKind::Logical, "ge") => Ok(BackendFilter::comparison(
            field_name(node, left)?,
            ComparisonOp::Gte,
            literal_value(node, right, false)?,
        )),
        (TokenKind::Logical, "le") => Ok(BackendFilter::comparison(
            field_name(node, left)?,
            ComparisonOp::Lte,
            literal_value(node, right, false)?,
        )),
        (TokenKind::Logical, "and") => Ok(BackendFilter::combine(BooleanOp::And, translate(left)?, translate(right)?)),
        (TokenKind::Logical, "or") => Ok(BackendFilter::combine(BooleanOp::Or, translate(left)?, translate(right)?)),
        (TokenKind::Func, "startswith") => regex(node, left, right, |p| format!("^{}", p)),
        (TokenKind::Func, "endswith") => regex(node, left, right, |p| format!("{}$", p)),
        (TokenKind::Func, "contains") => regex(node, left, right, str::to_string),
        _ => Err(unsupported(node)),
    }
}

fn unsupported(node: &ParseNode) -> TranslateError {
    TranslateError::UnsupportedOperator {
        operator: node.name().to_string(),
        node: node.to_string(),
    }
}

fn comparison(
    node: &ParseNode,
    op: ComparisonOp,
    left: &ParseNode,
    right: &ParseNode,
) -> Result<BackendFilter, TranslateError> {
    let field = field_name(node, left)?;

    let literal = if op == ComparisonOp::Gt && field == OBJECT_ID_FIELD {
        FilterValue::ObjectId(object_id(node, right)?)
    } else {
        literal_value(node, right, true)?
    };

    Ok(BackendFilter::Comparison { field, op, literal })
}

fn regex(
    node: &ParseNode,
    left: &ParseNode,
    right: &ParseNode,
    anchor: impl Fn(&str) -> String,
) -> Result<BackendFilter, TranslateError> {
    let field = field_name(node, left)?;
    let text = string_operand(node, right)?;
    Ok(BackendFilter::Regex {
        field,
        pattern: anchor(&unquote(text)),
        flags: REGEX_FLAGS.to_string(),
    })
}

fn field_name(node: &ParseNode, field: &ParseNode) -> Result<String, TranslateError> {
    match &field.token.value {
        TokenValue::Text(name) if field.is_leaf() => Ok(name.clone()),
        _ => Err(TranslateError::InvalidFieldReference {
            node: node.to_string(),
        }),
    }
}

fn string_operand<'n>(node: &ParseNode, operand: &'n ParseNode) -> Result<&'n str, TranslateError> {
    match &operand.token.value {
        TokenValue::Text(text) if operand.is_leaf() => Ok(text),
        _ => Err(TranslateError::InvalidOperand {
            node: node.to_string(),
        }),
    }
}

fn object_id(node: &ParseNode, operand: &ParseNode) -> Result<ObjectId, TranslateError> {
    let invalid = |value: String| TranslateError::InvalidObjectId {
        value,
        node: node.to_string(),
    };
    if !operand.is_leaf() || operand.token.kind != TokenKind::String {
        return Err(invalid(operand.token.text.clone()));
    }
    let raw = unquote(&operand.token.text);
    ObjectId::parse_hex(&raw).ok_or_else(|| invalid(raw))
}

fn literal_value(node: &ParseNode, operand: &ParseNode, strip_quotes: bool) -> Result<FilterValue, TranslateError> {
    if !operand.is_leaf() {
        return Err(TranslateError::InvalidOperand {
            node: node.to_string(),
        });
    }
    let value = match &operand.token.value {
        TokenValue::Integer(n) => FilterValue::Integer(*n),
        TokenValue::Float(n) => FilterValue::Float(*n),
        TokenValue::Boolean(b) => FilterValue::Boolean(*b),
        TokenValue::Text(s) if strip_quotes => FilterValue::String(unquote(s)),
        TokenValue::Text(s) => FilterValue::String(s.clone()),
        TokenValue::Date(d) => FilterValue::Date(*d),
        TokenValue::Time(t) => FilterValue::Time(*t),
        TokenValue::DateTime(dt) => FilterValue::DateTime(*dt),
        TokenValue::None => {
            return Err(TranslateError::InvalidOperand {
                node: node.to_string(),
            })
        }
    };
    Ok(value)
}

/// Strips enclosing single quotes and unescapes `''`.
fn unquote(s: &str) -> String {
    match s.strip_prefix('\'').and_then(|rest| rest.strip_suffix('\'')) {
        Some(inner) => inner.replace("''", "'"),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::FilterParser;
    use chrono::NaiveDate;

    fn translate_str(input: &str) -> Result<BackendFilter, TranslateError> {
        let root = FilterParser::odata().unwrap().parse_filter(input).unwrap();
        translate(&root)
    }

    #[test]
    fn test_comparison_strips_quotes() {
        assert_eq!(
            translate_str("name eq 'john'").unwrap(),
            BackendFilter::comparison("name", ComparisonOp::Eq, FilterValue::String("john".to_string()))
        );
    }

    #[test]
    fn test_comparison_literal_types() {
        assert_eq!(
            translate_str("age lt 30").unwrap(),
            BackendFilter::comparison("age", ComparisonOp::Lt, FilterValue::Integer(30))
        );
        assert_eq!(
            translate_str("active ne false").unwrap(),
            BackendFilter::comparison("active", ComparisonOp::Ne, FilterValue::Boolean(false))
        );
        assert_eq!(
            translate_str("born gt 1990-05-01").unwrap(),
            BackendFilter::comparison(
                "born",
                ComparisonOp::Gt,
                FilterValue::Date(NaiveDate::from_ymd_opt(1990, 5, 1).unwrap())
            )
        );
    }

    #[test]
    fn test_escaped_quote_is_unescaped() {
        assert_eq!(
            translate_str("name eq 'o''neil'").unwrap(),
            BackendFilter::comparison("name", ComparisonOp::Eq, FilterValue::String("o'neil".to_string()))
        );
    }

    #[test]
    fn test_ge_le_use_distinct_symbols_and_raw_literal() {
        let ge = translate_str("score ge 10").unwrap();
        let le = translate_str("code le 'b'").unwrap();
        assert_eq!(ge, BackendFilter::comparison("score", ComparisonOp::Gte, FilterValue::Integer(10)));
        assert_eq!(le, BackendFilter::comparison("code", ComparisonOp::Lte, FilterValue::String("'b'".to_string())));
        assert_ne!(ComparisonOp::Gte.symbol(), ComparisonOp::Lte.symbol());
    }

    #[test]
    fn test_boolean_combination() {
        let filter = translate_str("a eq 1 or b eq 2 and c eq 3").unwrap();
        assert_eq!(
            filter,
            BackendFilter::combine(
                BooleanOp::Or,
                BackendFilter::comparison("a", ComparisonOp::Eq, FilterValue::Integer(1)),
                BackendFilter::combine(
                    BooleanOp::And,
                    BackendFilter::comparison("b", ComparisonOp::Eq, FilterValue::Integer(2)),
                    BackendFilter::comparison("c", ComparisonOp::Eq, FilterValue::Integer(3)),
                ),
            )
        );
    }

    #[test]
    fn test_boolean_side_errors_propagate() {
        let err = translate_str("a eq 1 and _id gt 'nothex'").unwrap_err();
        assert!(matches!(err, TranslateError::InvalidObjectId { .. }));
        let err = translate_str("a and b eq 1").unwrap_err();
        assert!(matches!(err, TranslateError::UnsupportedOperator { ref operator, .. } if operator == "a"));
    }

    #[test]
    fn test_string_functions() {
        assert_eq!(
            translate_str("startswith(name,'jo')").unwrap(),
            BackendFilter::Regex {
                field: "name".to_string(),
                pattern: "^jo".to_string(),
                flags: "i".to_string()
            }
        );
        assert!(matches!(
            translate_str("endswith(name,'hn')").unwrap(),
            BackendFilter::Regex { ref pattern, .. } if pattern == "hn$"
        ));
        assert!(matches!(
            translate_str("contains(name,'oh')").unwrap(),
            BackendFilter::Regex { ref pattern, ref flags, .. } if pattern == "oh" && flags == "i"
        ));
    }

    #[test]
    fn test_function_requires_string_pattern() {
        let err = translate_str("contains(name, 5)").unwrap_err();
        assert!(matches!(err, TranslateError::InvalidOperand { .. }));
    }

    #[test]
    fn test_object_id_comparison() {
        let filter = translate_str("_id gt '5f1d7f3b9c3a4e0012345678'").unwrap();
        let expected = ObjectId::parse_hex("5f1d7f3b9c3a4e0012345678").unwrap();
        assert_eq!(
            filter,
            BackendFilter::comparison("_id", ComparisonOp::Gt, FilterValue::ObjectId(expected))
        );
        if let BackendFilter::Comparison {
            literal: FilterValue::ObjectId(id),
            ..
        } = filter
        {
            assert_eq!(id.bytes().len(), ObjectId::LEN);
        }
    }

    #[test]
    fn test_invalid_object_id() {
        assert!(matches!(
            translate_str("_id gt 'xyz'").unwrap_err(),
            TranslateError::InvalidObjectId { ref value, .. } if value == "xyz"
        ));
        assert!(matches!(
            translate_str("_id gt '5f1d7f3b'").unwrap_err(),
            TranslateError::InvalidObjectId { .. }
        ));
    }

    #[test]
    fn test_object_id_requires_string_literal() {
        assert!(matches!(
            translate_str("_id gt 5").unwrap_err(),
            TranslateError::InvalidObjectId { ref value, ref node } if value == "5" && node == "gt(_id, 5)"
        ));
        assert!(matches!(
            translate_str("_id gt true").unwrap_err(),
            TranslateError::InvalidObjectId { ref value, .. } if value == "true"
        ));
    }

    #[test]
    fn test_object_id_only_special_for_gt() {
        assert_eq!(
            translate_str("_id eq 'abc'").unwrap(),
            BackendFilter::comparison("_id", ComparisonOp::Eq, FilterValue::String("abc".to_string()))
        );
    }

    #[test]
    fn test_invalid_field_reference() {
        let err = translate_str("5 eq name").unwrap_err();
        assert!(matches!(err, TranslateError::InvalidFieldReference { ref node } if node == "eq(5, name)"));
    }

    #[test]
    fn test_unsupported_root() {
        let root = FilterParser::odata().unwrap().parse_filter("name").unwrap();
        assert!(matches!(translate(&root), Err(TranslateError::UnsupportedOperator { .. })));
    }
}
