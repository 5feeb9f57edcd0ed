//! Renders translated filters and query descriptors for a document store.

use crate::backend::{BackendFilter, FilterValue};
use crate::orderby::SortDirection;
use crate::query::{InlineCount, QueryDescriptor};
use crate::translator::{translate, TranslateError};
use serde::Serialize;
use serde_json::{json, Map, Value};

pub fn to_document(filter: &BackendFilter) -> Value {
    match filter {
        BackendFilter::Comparison { field, op, literal } => {
            json!({ field.as_str(): { op.symbol(): value_to_json(literal) } })
        }
        BackendFilter::BooleanCombine { op, left, right } => {
            json!({ op.symbol(): [to_document(left), to_document(right)] })
        }
        BackendFilter::Regex { field, pattern, flags } => {
            json!({ field.as_str(): { "$regex": pattern, "$options": flags } })
        }
    }
}

fn value_to_json(value: &FilterValue) -> Value {
    match value {
        FilterValue::Integer(n) => json!(n),
        FilterValue::Float(n) => json!(n),
        FilterValue::Boolean(b) => json!(b),
        FilterValue::String(s) => json!(s),
        FilterValue::Date(_) | FilterValue::Time(_) => json!(value.to_string()),
        FilterValue::DateTime(dt) => json!({ "$date": dt.to_rfc3339() }),
        FilterValue::ObjectId(id) => json!({ "$oid": id.to_hex() }),
    }
}

/// Everything a document-store `find` needs for one request.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct FindOptions {
    pub filter: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub projection: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    pub count: bool,
}

impl FindOptions {
    pub fn from_descriptor(descriptor: &QueryDescriptor) -> Result<Self, TranslateError> {
        let filter = match &descriptor.filter {
            Some(root) => to_document(&translate(root)?),
            None => Value::Object(Map::new()),
        };

        let projection = descriptor.select.as_ref().map(|fields| {
            Value::Object(fields.iter().map(|f| (f.clone(), json!(1))).collect())
        });

        let sort = descriptor.orderby.as_ref().map(|items| {
            Value::Object(
                items
                    .iter()
                    .map(|item| {
                        let direction = match item.direction {
                            SortDirection::Asc => 1,
                            SortDirection::Desc => -1,
                        };
                        (item.field.clone(), json!(direction))
                    })
                    .collect(),
            )
        });

        Ok(Self {
            filter,
            projection,
            sort,
            skip: descriptor.skip,
            limit: descriptor.top,
            count: descriptor.count || descriptor.inline_count == InlineCount::AllPages,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::FilterParser;
    use crate::query::QueryParser;

    fn document(input: &str) -> Value {
        let root = FilterParser::odata().unwrap().parse_filter(input).unwrap();
        to_document(&translate(&root).unwrap())
    }

    #[test]
    fn test_comparison_document() {
        assert_eq!(document("name eq 'john'"), json!({ "name": { "$eq": "john" } }));
        assert_eq!(document("price le 9.5"), json!({ "price": { "$lte": 9.5 } }));
    }

    #[test]
    fn test_boolean_document() {
        assert_eq!(
            document("age ge 18 and (city eq 'Oslo' or city eq 'Bergen')"),
            json!({ "$and": [
                { "age": { "$gte": 18 } },
                { "$or": [
                    { "city": { "$eq": "Oslo" } },
                    { "city": { "$eq": "Bergen" } }
                ] }
            ] })
        );
    }

    #[test]
    fn test_regex_document() {
        assert_eq!(
            document("startswith(name,'jo')"),
            json!({ "name": { "$regex": "^jo", "$options": "i" } })
        );
    }

    #[test]
    fn test_object_id_document() {
        assert_eq!(
            document("_id gt '5f1d7f3b9c3a4e0012345678'"),
            json!({ "_id": { "$gt": { "$oid": "5f1d7f3b9c3a4e0012345678" } } })
        );
    }

    #[test]
    fn test_find_options() {
        let descriptor = QueryParser::odata()
            .unwrap()
            .parse_query_string("$filter=age gt 18&$select=name,age&$orderby=name desc,age&$top=10&$skip=20")
            .unwrap();
        let options = FindOptions::from_descriptor(&descriptor).unwrap();

        assert_eq!(options.filter, json!({ "age": { "$gt": 18 } }));
        assert_eq!(options.projection, Some(json!({ "name": 1, "age": 1 })));
        assert_eq!(
            serde_json::to_string(options.sort.as_ref().unwrap()).unwrap(),
            r#"{"name":-1,"age":1}"#
        );
        assert_eq!(options.skip, Some(20));
        assert_eq!(options.limit, Some(10));
        assert!(!options.count);
    }

    #[test]
    fn test_find_options_without_filter() {
        let descriptor = QueryParser::odata().unwrap().parse_query_string("$count=true").unwrap();
        let options = FindOptions::from_descriptor(&descriptor).unwrap();
        assert_eq!(options.filter, json!({}));
        assert!(options.count);
        assert_eq!(serde_json::to_value(&options).unwrap(), json!({ "filter": {}, "count": true }));
    }
}
