//! The `Filter` discriminated union and its JSON codec.
//!
//! The external JSON form uses "implicit tag by key presence": an object
//! containing `and`, `or`, or `not` is a logical combinator; otherwise it is
//! a field filter. A logical key wins over a stray `field` key on the same
//! object; an empty object is a decode error.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// The closed set of field-filter operators (spec Table 2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    Like,
    NotLike,
    In,
    NotIn,
    IsNull,
    IsNotNull,
    Between,
}

impl Operator {
    pub fn as_str(self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Ne => "!=",
            Operator::Gt => ">",
            Operator::Gte => ">=",
            Operator::Lt => "<",
            Operator::Lte => "<=",
            Operator::Like => "LIKE",
            Operator::NotLike => "NOT LIKE",
            Operator::In => "IN",
            Operator::NotIn => "NOT IN",
            Operator::IsNull => "IS NULL",
            Operator::IsNotNull => "IS NOT NULL",
            Operator::Between => "BETWEEN",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Some(match s {
            "=" => Operator::Eq,
            "!=" => Operator::Ne,
            ">" => Operator::Gt,
            ">=" => Operator::Gte,
            "<" => Operator::Lt,
            "<=" => Operator::Lte,
            "LIKE" => Operator::Like,
            "NOT LIKE" => Operator::NotLike,
            "IN" => Operator::In,
            "NOT IN" => Operator::NotIn,
            "IS NULL" => Operator::IsNull,
            "IS NOT NULL" => Operator::IsNotNull,
            "BETWEEN" => Operator::Between,
            _ => return None,
        })
    }

    /// Whether this operator requires a `value` payload (Table 2).
    pub fn requires_value(self) -> bool {
        !matches!(self, Operator::IsNull | Operator::IsNotNull)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single field-filter clause: `(field, operator, value?)`.
#[derive(Debug, Clone)]
pub struct FieldFilter {
    pub field: String,
    pub operator: Operator,
    pub value: Option<Value>,
}

/// The recursive filter tree used in `where`, `having`, and `join.on`.
#[derive(Debug, Clone)]
pub enum Filter {
    Field(FieldFilter),
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
}

/// Decode error for the external JSON filter form.
#[derive(Debug, thiserror::Error)]
pub enum FilterDecodeError {
    #[error("filter object is empty")]
    Empty,
    #[error("invalid operator: {0}")]
    InvalidOperator(String),
    #[error("field filter missing required key: {0}")]
    MissingKey(&'static str),
    #[error("malformed filter: {0}")]
    Malformed(String),
}

impl<'de> Deserialize<'de> for Filter {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Filter::decode(&value).map_err(serde::de::Error::custom)
    }
}

impl Serialize for Filter {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.encode().serialize(serializer)
    }
}

impl Filter {
    /// Decode a `Filter` from its external JSON object form.
    ///
    /// Dispatch is by key presence: `and` > `or` > `not` > field filter.
    /// A logical key present alongside `field` still wins.
    pub fn decode(value: &Value) -> Result<Self, FilterDecodeError> {
        let obj = value
            .as_object()
            .ok_or_else(|| FilterDecodeError::Malformed("filter must be a JSON object".into()))?;

        if obj.is_empty() {
            return Err(FilterDecodeError::Empty);
        }

        if let Some(and) = obj.get("and") {
            return Self::decode_seq(and).map(Filter::And);
        }
        if let Some(or) = obj.get("or") {
            return Self::decode_seq(or).map(Filter::Or);
        }
        if let Some(not) = obj.get("not") {
            return Filter::decode(not).map(|f| Filter::Not(Box::new(f)));
        }

        let field = obj
            .get("field")
            .and_then(Value::as_str)
            .ok_or(FilterDecodeError::MissingKey("field"))?
            .to_string();
        let op_str = obj
            .get("operator")
            .and_then(Value::as_str)
            .ok_or(FilterDecodeError::MissingKey("operator"))?;
        let operator = Operator::from_str(op_str)
            .ok_or_else(|| FilterDecodeError::InvalidOperator(op_str.to_string()))?;
        let value = obj.get("value").cloned();

        Ok(Filter::Field(FieldFilter { field, operator, value }))
    }

    fn decode_seq(value: &Value) -> Result<Vec<Filter>, FilterDecodeError> {
        let arr = value
            .as_array()
            .ok_or_else(|| FilterDecodeError::Malformed("expected an array of filters".into()))?;
        if arr.is_empty() {
            return Err(FilterDecodeError::Malformed(
                "logical combinator requires at least one filter".into(),
            ));
        }
        arr.iter().map(Filter::decode).collect()
    }

    /// Re-encode this filter into its external JSON object form, emitting
    /// only the chosen variant's shape.
    pub fn encode(&self) -> Value {
        match self {
            Filter::Field(f) => {
                let mut obj = serde_json::Map::new();
                obj.insert("field".into(), Value::String(f.field.clone()));
                obj.insert("operator".into(), Value::String(f.operator.as_str().into()));
                if let Some(v) = &f.value {
                    obj.insert("value".into(), v.clone());
                }
                Value::Object(obj)
            }
            Filter::And(items) => {
                let mut obj = serde_json::Map::new();
                obj.insert("and".into(), Value::Array(items.iter().map(Filter::encode).collect()));
                Value::Object(obj)
            }
            Filter::Or(items) => {
                let mut obj = serde_json::Map::new();
                obj.insert("or".into(), Value::Array(items.iter().map(Filter::encode).collect()));
                Value::Object(obj)
            }
            Filter::Not(inner) => {
                let mut obj = serde_json::Map::new();
                obj.insert("not".into(), inner.encode());
                Value::Object(obj)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_field_filter() {
        let v = json!({"field": "language", "operator": "=", "value": "go"});
        let f = Filter::decode(&v).unwrap();
        match f {
            Filter::Field(ff) => {
                assert_eq!(ff.field, "language");
                assert_eq!(ff.operator, Operator::Eq);
                assert_eq!(ff.value, Some(json!("go")));
            }
            _ => panic!("expected field filter"),
        }
    }

    #[test]
    fn logical_key_wins_over_stray_field_key() {
        let v = json!({
            "field": "ignored",
            "and": [{"field": "a", "operator": "IS NULL"}]
        });
        let f = Filter::decode(&v).unwrap();
        assert!(matches!(f, Filter::And(items) if items.len() == 1));
    }

    #[test]
    fn empty_object_is_an_error() {
        let v = json!({});
        assert!(matches!(Filter::decode(&v), Err(FilterDecodeError::Empty)));
    }

    #[test]
    fn unknown_operator_is_rejected() {
        let v = json!({"field": "x", "operator": "~=", "value": 1});
        assert!(matches!(
            Filter::decode(&v),
            Err(FilterDecodeError::InvalidOperator(_))
        ));
    }

    #[test]
    fn round_trip_nested_logic() {
        let v = json!({
            "and": [
                {"field": "language", "operator": "=", "value": "go"},
                {"or": [
                    {"field": "line_count_total", "operator": ">", "value": 100},
                    {"field": "is_test", "operator": "=", "value": true}
                ]}
            ]
        });
        let f = Filter::decode(&v).unwrap();
        let back = f.encode();
        assert_eq!(back, v);
    }

    #[test]
    fn round_trip_is_null_has_no_value_key() {
        let v = json!({"field": "module_id", "operator": "IS NULL"});
        let f = Filter::decode(&v).unwrap();
        let back = f.encode();
        assert_eq!(back, v);
        assert!(!back.as_object().unwrap().contains_key("value"));
    }

    #[test]
    fn round_trip_not() {
        let v = json!({"not": {"field": "is_test", "operator": "=", "value": true}});
        let f = Filter::decode(&v).unwrap();
        assert_eq!(f.encode(), v);
    }
}
