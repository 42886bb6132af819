//! Translates a validated `QueryDefinition` into parameterised SQL.
//!
//! Contract: `sql_text` never contains a user-supplied value as a literal;
//! only identifier-typed fields (column/table names, aliases, directions,
//! join types, aggregation function names) appear as text. Every other
//! value is passed positionally via `args` and substituted through the
//! store's `?` placeholder.

use crate::error::FilesError;
use crate::files::filter::{FieldFilter, Filter, Operator};
use crate::files::query_def::{AggFunction, Aggregation, JoinType, QueryDefinition};
use rusqlite::types::Value as SqlValue;
use serde_json::Value as JsonValue;

/// A value ready to be bound to a `?` placeholder.
pub type SqlArg = SqlValue;

/// The rendered query: SQL text plus its positional argument list.
#[derive(Debug, Clone)]
pub struct BuiltQuery {
    pub sql: String,
    pub args: Vec<SqlArg>,
}

/// Build the `(sql_text, args)` pair for a validated `QueryDefinition`.
///
/// Callers MUST validate the query first (`files::validate::validate`); the
/// builder re-checks identifier safety as a defence-in-depth assertion but
/// does not re-run the full validator.
pub fn build(query: &QueryDefinition) -> Result<BuiltQuery, FilesError> {
    assert_identifier(&query.from);

    let mut args = Vec::new();
    let mut sql = String::new();

    sql.push_str("SELECT ");
    sql.push_str(&render_select_list(query)?);
    sql.push_str(" FROM ");
    sql.push_str(&query.from);

    for join in &query.joins {
        assert_identifier(&join.table);
        sql.push(' ');
        sql.push_str(join.join_type.as_str());
        sql.push_str(" JOIN ");
        sql.push_str(&join.table);
        sql.push_str(" ON ");
        sql.push_str(&render_join_condition(&join.on, &query.from, &join.table, &mut args)?);
    }

    if let Some(where_) = &query.where_ {
        sql.push_str(" WHERE ");
        sql.push_str(&render_filter(where_, &mut args)?);
    }

    if !query.group_by.is_empty() {
        sql.push_str(" GROUP BY ");
        for (i, g) in query.group_by.iter().enumerate() {
            assert_identifier(g);
            if i > 0 {
                sql.push_str(", ");
            }
            sql.push_str(g);
        }
    }

    if let Some(having) = &query.having {
        sql.push_str(" HAVING ");
        sql.push_str(&render_filter(having, &mut args)?);
    }

    if !query.order_by.is_empty() {
        sql.push_str(" ORDER BY ");
        for (i, entry) in query.order_by.iter().enumerate() {
            assert_identifier(&entry.field);
            if i > 0 {
                sql.push_str(", ");
            }
            sql.push_str(&entry.field);
            sql.push(' ');
            sql.push_str(entry.direction.as_str());
        }
    }

    // LIMIT/OFFSET are rendered as literal integers, not placeholders: by the
    // time the builder sees them they have already been validated into a
    // narrow numeric range (rules 9/10), so there is no injection surface,
    // and the spec's worked examples render them inline (`LIMIT 10`).
    if let Some(limit) = query.limit {
        sql.push_str(&format!(" LIMIT {limit}"));
    }

    if let Some(offset) = query.offset {
        sql.push_str(&format!(" OFFSET {offset}"));
    }

    tracing::debug!(sql = %sql, arg_count = args.len(), "built query");
    Ok(BuiltQuery { sql, args })
}

fn render_select_list(query: &QueryDefinition) -> Result<String, FilesError> {
    if !query.aggregations.is_empty() {
        let mut parts = Vec::new();
        for g in &query.group_by {
            assert_identifier(g);
            parts.push(g.clone());
        }
        for agg in &query.aggregations {
            parts.push(render_aggregation(agg)?);
        }
        Ok(parts.join(", "))
    } else if !query.fields.is_empty() {
        let mut parts = Vec::new();
        for f in &query.fields {
            if f == "*" {
                parts.push("*".to_string());
            } else {
                assert_identifier(f);
                parts.push(f.clone());
            }
        }
        Ok(parts.join(", "))
    } else {
        Ok("*".to_string())
    }
}

fn render_aggregation(agg: &Aggregation) -> Result<String, FilesError> {
    assert_identifier(&agg.alias);
    let func = agg.function.as_str();

    let args_sql = match (agg.function, &agg.field) {
        (AggFunction::Count, None) => "*".to_string(),
        (AggFunction::Count, Some(field)) => {
            assert_identifier(field);
            if agg.distinct {
                format!("DISTINCT {field}")
            } else {
                field.clone()
            }
        }
        (AggFunction::Sum, Some(field)) | (AggFunction::Avg, Some(field)) => {
            assert_identifier(field);
            if agg.distinct {
                format!("DISTINCT {field}")
            } else {
                field.clone()
            }
        }
        (AggFunction::Min, Some(field)) | (AggFunction::Max, Some(field)) => {
            assert_identifier(field);
            field.clone()
        }
        (_, None) => {
            return Err(FilesError::BuildFailed {
                reason: format!("{func} requires a field"),
            })
        }
    };

    Ok(format!("{func}({args_sql}) AS {}", agg.alias))
}

/// Lower a filter tree within WHERE/HAVING. Every value becomes a `?`.
fn render_filter(filter: &Filter, args: &mut Vec<SqlArg>) -> Result<String, FilesError> {
    match filter {
        Filter::Field(ff) => render_field_filter(ff, args),
        Filter::And(items) => render_logical(items, "AND", args),
        Filter::Or(items) => render_logical(items, "OR", args),
        Filter::Not(inner) => Ok(format!("NOT ({})", render_filter(inner, args)?)),
    }
}

fn render_logical(items: &[Filter], op: &str, args: &mut Vec<SqlArg>) -> Result<String, FilesError> {
    let mut parts = Vec::with_capacity(items.len());
    for item in items {
        parts.push(render_filter(item, args)?);
    }
    Ok(format!("({})", parts.join(&format!(" {op} "))))
}

fn render_field_filter(ff: &FieldFilter, args: &mut Vec<SqlArg>) -> Result<String, FilesError> {
    assert_identifier(&ff.field);

    match ff.operator {
        Operator::IsNull | Operator::IsNotNull => Ok(format!("{} {}", ff.field, ff.operator)),
        Operator::In | Operator::NotIn => {
            let values = ff
                .value
                .as_ref()
                .and_then(JsonValue::as_array)
                .ok_or_else(|| FilesError::BuildFailed {
                    reason: format!("{} requires an array value", ff.operator),
                })?;
            let placeholders = vec!["?"; values.len()].join(", ");
            for v in values {
                args.push(json_to_sql(v));
            }
            Ok(format!("{} {} ({})", ff.field, ff.operator, placeholders))
        }
        Operator::Between => {
            let values = ff
                .value
                .as_ref()
                .and_then(JsonValue::as_array)
                .ok_or_else(|| FilesError::BuildFailed {
                    reason: "BETWEEN requires an array value".to_string(),
                })?;
            if values.len() != 2 {
                return Err(FilesError::BuildFailed {
                    reason: "BETWEEN requires exactly 2 values".to_string(),
                });
            }
            args.push(json_to_sql(&values[0]));
            args.push(json_to_sql(&values[1]));
            Ok(format!("({field} >= ? AND {field} <= ?)", field = ff.field))
        }
        _ => {
            let value = ff.value.as_ref().ok_or_else(|| FilesError::BuildFailed {
                reason: format!("{} requires a value", ff.operator),
            })?;
            args.push(json_to_sql(value));
            Ok(format!("{} {} ?", ff.field, ff.operator))
        }
    }
}

/// Lower a join's `on` filter.
///
/// Per the open question in the design notes: when a field filter's `value`
/// is itself a canonical (optionally table-qualified) identifier string and
/// the operator is a plain comparison, both sides are column references and
/// the condition is rendered unparameterised (`lhs op rhs`). This is what
/// makes JOINs functionally useful — without it every join condition would
/// compare a column against a literal parameter, which is never what a join
/// predicate means. Any other shape falls back to the normal WHERE/HAVING
/// lowering (the right-hand side becomes a bound parameter).
fn render_join_condition(
    filter: &Filter,
    from_table: &str,
    join_table: &str,
    args: &mut Vec<SqlArg>,
) -> Result<String, FilesError> {
    match filter {
        Filter::Field(ff) if is_comparison(ff.operator) => {
            if let Some(JsonValue::String(rhs)) = &ff.value {
                if is_column_reference(rhs, from_table, join_table) {
                    assert_identifier_allow_qualified(&ff.field);
                    assert_identifier_allow_qualified(rhs);
                    return Ok(format!("{} {} {}", ff.field, ff.operator, rhs));
                }
            }
            render_field_filter(ff, args)
        }
        Filter::Field(ff) => render_field_filter(ff, args),
        Filter::And(items) => {
            let mut parts = Vec::with_capacity(items.len());
            for item in items {
                parts.push(render_join_condition(item, from_table, join_table, args)?);
            }
            Ok(format!("({})", parts.join(" AND ")))
        }
        Filter::Or(items) => {
            let mut parts = Vec::with_capacity(items.len());
            for item in items {
                parts.push(render_join_condition(item, from_table, join_table, args)?);
            }
            Ok(format!("({})", parts.join(" OR ")))
        }
        Filter::Not(inner) => Ok(format!(
            "NOT ({})",
            render_join_condition(inner, from_table, join_table, args)?
        )),
    }
}

fn is_comparison(op: Operator) -> bool {
    matches!(
        op,
        Operator::Eq | Operator::Ne | Operator::Gt | Operator::Gte | Operator::Lt | Operator::Lte
    )
}

fn is_column_reference(s: &str, from_table: &str, join_table: &str) -> bool {
    match s.split_once('.') {
        Some((qualifier, column)) => {
            (qualifier == from_table || qualifier == join_table) && is_canonical_identifier(column)
        }
        None => false,
    }
}

/// Canonical identifier check (spec §4.3, §8 invariant 4): `^[A-Za-z_][A-Za-z0-9_]*$`.
fn is_canonical_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// A known-safe field/table/alias identifier. Panics on violation: this is a
/// defence-in-depth assertion, not a recoverable error — the validator
/// should have already rejected anything that reaches here.
fn assert_identifier(s: &str) {
    assert!(is_canonical_identifier(s), "identifier safety assertion failed: {s:?} is not a canonical identifier");
}

/// As `assert_identifier`, but also accepts `table.column` qualified forms
/// (used only in join `on` lowering).
fn assert_identifier_allow_qualified(s: &str) {
    match s.split_once('.') {
        Some((q, c)) => assert!(
            is_canonical_identifier(q) && is_canonical_identifier(c),
            "identifier safety assertion failed: {s:?} is not a canonical identifier"
        ),
        None => assert_identifier(s),
    }
}

fn json_to_sql(value: &JsonValue) -> SqlArg {
    match value {
        JsonValue::Null => SqlValue::Null,
        JsonValue::Bool(b) => SqlValue::Integer(if *b { 1 } else { 0 }),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                SqlValue::Integer(i)
            } else if let Some(f) = n.as_f64() {
                SqlValue::Real(f)
            } else {
                SqlValue::Null
            }
        }
        JsonValue::String(s) => SqlValue::Text(s.clone()),
        JsonValue::Array(_) | JsonValue::Object(_) => {
            SqlValue::Text(value.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::files::query_def::QueryDefinition;

    fn build_str(json: &str) -> BuiltQuery {
        let q = QueryDefinition::from_json(json).unwrap();
        crate::files::validate::validate(&q).expect("query should validate");
        build(&q).unwrap()
    }

    #[test]
    fn scenario_a_simple_select() {
        let built = build_str(
            r#"{"from":"files","where":{"field":"language","operator":"=","value":"go"},"order_by":[{"field":"line_count_total","direction":"DESC"}],"limit":10}"#,
        );
        assert_eq!(
            built.sql,
            "SELECT * FROM files WHERE language = ? ORDER BY line_count_total DESC LIMIT 10"
        );
        assert_eq!(built.args, vec![SqlValue::Text("go".into())]);
    }

    #[test]
    fn scenario_b_aggregation_and_having() {
        let built = build_str(
            r#"{"from":"files","group_by":["language"],"aggregations":[{"function":"COUNT","alias":"file_count"},{"function":"SUM","field":"line_count_total","alias":"total_lines"}],"having":{"field":"file_count","operator":">=","value":5},"order_by":[{"field":"total_lines","direction":"DESC"}]}"#,
        );
        assert_eq!(
            built.sql,
            "SELECT language, COUNT(*) AS file_count, SUM(line_count_total) AS total_lines FROM files GROUP BY language HAVING file_count >= ? ORDER BY total_lines DESC"
        );
        assert_eq!(built.args, vec![SqlValue::Integer(5)]);
    }

    #[test]
    fn scenario_c_nested_logic() {
        let built = build_str(
            r#"{"from":"files","where":{"and":[{"field":"language","operator":"=","value":"go"},{"or":[{"field":"line_count_total","operator":">","value":100},{"field":"is_test","operator":"=","value":true}]}]}}"#,
        );
        assert_eq!(
            built.sql,
            "SELECT * FROM files WHERE (language = ? AND (line_count_total > ? OR is_test = ?))"
        );
        assert_eq!(
            built.args,
            vec![SqlValue::Text("go".into()), SqlValue::Integer(100), SqlValue::Integer(1)]
        );
    }

    #[test]
    fn between_lowering() {
        let built = build_str(
            r#"{"from":"files","where":{"field":"line_count_total","operator":"BETWEEN","value":[10,20]}}"#,
        );
        assert_eq!(built.sql, "SELECT * FROM files WHERE (line_count_total >= ? AND line_count_total <= ?)");
        assert_eq!(built.args, vec![SqlValue::Integer(10), SqlValue::Integer(20)]);
    }

    #[test]
    fn in_clause_placeholder_count() {
        let built = build_str(
            r#"{"from":"files","where":{"field":"language","operator":"IN","value":["go","rust","python"]}}"#,
        );
        assert_eq!(built.sql, "SELECT * FROM files WHERE language IN (?, ?, ?)");
        assert_eq!(built.args.len(), 3);
    }

    #[test]
    fn join_with_column_reference_is_unparameterised() {
        let built = build_str(
            r#"{"from":"files","joins":[{"table":"functions","type":"INNER","on":{"field":"files.id","operator":"=","value":"functions.file_id"}}]}"#,
        );
        assert_eq!(
            built.sql,
            "SELECT * FROM files INNER JOIN functions ON files.id = functions.file_id"
        );
        assert!(built.args.is_empty());
    }

    #[test]
    fn identifiers_never_appear_as_literal_values() {
        let built = build_str(
            r#"{"from":"files","where":{"field":"language","operator":"=","value":"DROP TABLE files"}}"#,
        );
        assert!(!built.sql.contains("DROP TABLE"));
        assert_eq!(built.args, vec![SqlValue::Text("DROP TABLE files".into())]);
    }

    #[test]
    fn unsafe_identifier_is_a_fatal_assertion() {
        // Bypasses the validator deliberately to exercise the builder's own check.
        let q = QueryDefinition::from_json(r#"{"from":"files; DROP TABLE x--"}"#).unwrap();
        let prev_hook = std::panic::take_hook();
        std::panic::set_hook(Box::new(|_| {}));
        let result = std::panic::catch_unwind(|| build(&q));
        std::panic::set_hook(prev_hook);
        assert!(result.is_err(), "expected build() to panic on an unsafe identifier");
    }
}
