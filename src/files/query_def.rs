//! The `QueryDefinition` request shape (spec §3.2) and its JSON decoding.

use crate::files::filter::Filter;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Full,
}

impl JoinType {
    pub fn as_str(self) -> &'static str {
        match self {
            JoinType::Inner => "INNER",
            JoinType::Left => "LEFT",
            JoinType::Right => "RIGHT",
            JoinType::Full => "FULL",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AggFunction {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl AggFunction {
    pub fn as_str(self) -> &'static str {
        match self {
            AggFunction::Count => "COUNT",
            AggFunction::Sum => "SUM",
            AggFunction::Avg => "AVG",
            AggFunction::Min => "MIN",
            AggFunction::Max => "MAX",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Join {
    pub table: String,
    #[serde(rename = "type")]
    pub join_type: JoinType,
    pub on: Filter,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderByEntry {
    pub field: String,
    pub direction: Direction,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Aggregation {
    pub function: AggFunction,
    #[serde(default)]
    pub field: Option<String>,
    pub alias: String,
    #[serde(default)]
    pub distinct: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueryDefinition {
    pub from: String,
    #[serde(default)]
    pub fields: Vec<String>,
    #[serde(rename = "where", default)]
    pub where_: Option<Filter>,
    #[serde(default)]
    pub having: Option<Filter>,
    #[serde(default)]
    pub joins: Vec<Join>,
    #[serde(default)]
    pub group_by: Vec<String>,
    #[serde(default)]
    pub order_by: Vec<OrderByEntry>,
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub offset: Option<i64>,
    #[serde(default)]
    pub aggregations: Vec<Aggregation>,
}

impl QueryDefinition {
    /// Parse a `QueryDefinition` from its JSON text form.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_query() {
        let q = QueryDefinition::from_json(r#"{"from":"files"}"#).unwrap();
        assert_eq!(q.from, "files");
        assert!(q.fields.is_empty());
        assert!(q.where_.is_none());
    }

    #[test]
    fn parses_full_scenario_a() {
        let json = r#"{
            "from":"files",
            "where":{"field":"language","operator":"=","value":"go"},
            "order_by":[{"field":"line_count_total","direction":"DESC"}],
            "limit":10
        }"#;
        let q = QueryDefinition::from_json(json).unwrap();
        assert_eq!(q.from, "files");
        assert_eq!(q.limit, Some(10));
        assert_eq!(q.order_by.len(), 1);
        assert_eq!(q.order_by[0].direction, Direction::Desc);
    }
}
