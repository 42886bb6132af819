//! Validator: checks a `QueryDefinition` against the schema registry.
//!
//! Accumulates every violation rather than short-circuiting. The only
//! exception is an unknown/missing `from`, which makes every downstream
//! column check meaningless and so aborts validation immediately (rule 1).

use crate::error::{ValidationError, ValidationIssue};
use crate::files::filter::{FieldFilter, Filter, Operator};
use crate::files::query_def::{AggFunction, Aggregation, JoinType, QueryDefinition};
use crate::files::schema::{registry, SchemaRegistry};
use std::collections::HashSet;

struct Collector {
    issues: Vec<ValidationIssue>,
}

impl Collector {
    fn push(&mut self, field_path: impl Into<String>, value: impl Into<String>, message: impl Into<String>) {
        self.issues.push(ValidationIssue::new(field_path, value, message, None));
    }

    fn push_hint(
        &mut self,
        field_path: impl Into<String>,
        value: impl Into<String>,
        message: impl Into<String>,
        hint: &str,
    ) {
        self.issues
            .push(ValidationIssue::new(field_path, value, message, Some(hint)));
    }
}

/// Validate a `QueryDefinition`, returning the accumulated issues (if any).
pub fn validate(query: &QueryDefinition) -> Result<(), ValidationError> {
    let reg = registry();
    let mut c = Collector { issues: Vec::new() };

    // Rule 1: `from` must be known. Fatal — stop immediately.
    if !reg.has_table(&query.from) {
        c.push_hint(
            "from",
            query.from.clone(),
            format!("unknown table: {}", query.from),
            "valid tables: files, types, type_fields, functions, function_parameters, type_relationships, function_calls, imports, chunks, modules, cache_metadata",
        );
        return Err(ValidationError { issues: c.issues });
    }
    let table = reg.table(&query.from).expect("checked above");

    // Rule 2: fields are `*` or a column of `from`.
    for (i, field) in query.fields.iter().enumerate() {
        if field != "*" && !table.has_column(field) {
            c.push(
                format!("fields[{i}]"),
                field.clone(),
                format!("unknown column '{field}' on table '{}'", query.from),
            );
        }
    }

    // Rule 3: `where` recursively validates against `from`'s columns.
    if let Some(where_) = &query.where_ {
        validate_filter(where_, "where", table, reg, None, &mut c);
    }

    // Rule 4: joins.
    for (i, join) in query.joins.iter().enumerate() {
        let path = format!("joins[{i}]");
        if !matches!(join.join_type, JoinType::Inner | JoinType::Left | JoinType::Right | JoinType::Full) {
            // Unreachable via serde (closed enum) but kept for defence in depth.
            c.push(format!("{path}.type"), "?", "invalid join type");
        }
        if !reg.has_table(&join.table) {
            c.push(
                format!("{path}.table"),
                join.table.clone(),
                format!("unknown table: {}", join.table),
            );
            continue;
        }
        let join_table = reg.table(&join.table).expect("checked above");
        validate_join_on(&join.on, &format!("{path}.on"), table, join_table, &query.from, &join.table, &mut c);
    }

    // Rule 5: group_by entries are columns of `from`.
    for (i, g) in query.group_by.iter().enumerate() {
        if !table.has_column(g) {
            c.push(
                format!("group_by[{i}]"),
                g.clone(),
                format!("unknown column '{g}' on table '{}'", query.from),
            );
        }
    }

    // Rule 11: aggregations (validated before building the available-name set,
    // since aliases feed into it).
    let mut alias_errors: HashSet<usize> = HashSet::new();
    for (i, agg) in query.aggregations.iter().enumerate() {
        let path = format!("aggregations[{i}]");
        if agg.alias.trim().is_empty() {
            c.push(format!("{path}.alias"), agg.alias.clone(), "aggregation alias must be non-empty");
            alias_errors.insert(i);
        }
        validate_aggregation_field(agg, &path, table, &mut c);
    }

    // Available-name set for having/order_by: from-columns ∪ agg aliases ∪ group_by.
    let mut available: HashSet<String> = table.columns.iter().map(|s| s.to_string()).collect();
    for (i, agg) in query.aggregations.iter().enumerate() {
        if !alias_errors.contains(&i) {
            available.insert(agg.alias.clone());
        }
    }
    for g in &query.group_by {
        available.insert(g.clone());
    }

    // Rule 7: having validates against the available-name set.
    if let Some(having) = &query.having {
        validate_filter_against_names(having, "having", &available, &mut c);
    }

    // Rule 8: order_by entries: direction is closed-enum (always valid via serde);
    // field must be in the available-name set.
    for (i, entry) in query.order_by.iter().enumerate() {
        if !available.contains(&entry.field) {
            c.push(
                format!("order_by[{i}].field"),
                entry.field.clone(),
                format!("'{}' is not a column of '{}', an aggregation alias, or a group_by column", entry.field, query.from),
            );
        }
    }

    // Rule 9: limit in [1, 1000].
    if let Some(limit) = query.limit {
        if !(1..=1000).contains(&limit) {
            c.push_hint(
                "limit",
                limit.to_string(),
                "limit must be between 1 and 1000 inclusive",
                "pass a limit within [1, 1000]",
            );
        }
    }

    // Rule 10: offset >= 0.
    if let Some(offset) = query.offset {
        if offset < 0 {
            c.push("offset", offset.to_string(), "offset must be non-negative");
        }
    }

    if c.issues.is_empty() {
        Ok(())
    } else {
        Err(ValidationError { issues: c.issues })
    }
}

fn validate_aggregation_field(
    agg: &Aggregation,
    path: &str,
    table: &crate::files::schema::TableSchema,
    c: &mut Collector,
) {
    if agg.function != AggFunction::Count {
        match &agg.field {
            None => c.push(
                format!("{path}.field"),
                "<missing>",
                format!("{} requires a field", agg.function.as_str()),
            ),
            Some(field) if !table.has_column(field) => c.push(
                format!("{path}.field"),
                field.clone(),
                format!("unknown column '{field}'"),
            ),
            Some(_) => {}
        }
    }
}

/// Validate a filter tree against `from`'s columns (rule 3).
fn validate_filter(
    filter: &Filter,
    path: &str,
    table: &crate::files::schema::TableSchema,
    _reg: &SchemaRegistry,
    _join_context: Option<(&str, &str)>,
    c: &mut Collector,
) {
    match filter {
        Filter::Field(ff) => validate_field_filter(ff, path, &|name| table.has_column(name), c),
        Filter::And(items) | Filter::Or(items) => {
            for (i, item) in items.iter().enumerate() {
                validate_filter(item, &format!("{path}[{i}]"), table, _reg, _join_context, c);
            }
        }
        Filter::Not(inner) => validate_filter(inner, &format!("{path}.not"), table, _reg, _join_context, c),
    }
}

/// Validate a filter tree against an arbitrary available-name set (rule 7, having).
fn validate_filter_against_names(filter: &Filter, path: &str, names: &HashSet<String>, c: &mut Collector) {
    match filter {
        Filter::Field(ff) => validate_field_filter(ff, path, &|name| names.contains(name), c),
        Filter::And(items) | Filter::Or(items) => {
            for (i, item) in items.iter().enumerate() {
                validate_filter_against_names(item, &format!("{path}[{i}]"), names, c);
            }
        }
        Filter::Not(inner) => validate_filter_against_names(inner, &format!("{path}.not"), names, c),
    }
}

/// Validate a join `on` clause with relaxed rules (rule 4): qualified
/// `table.column` names resolve against the pair; unqualified names must
/// exist in at least one of the two tables.
fn validate_join_on(
    filter: &Filter,
    path: &str,
    from_table: &crate::files::schema::TableSchema,
    join_table: &crate::files::schema::TableSchema,
    from_name: &str,
    join_name: &str,
    c: &mut Collector,
) {
    match filter {
        Filter::Field(ff) => {
            let resolves = |name: &str| -> bool {
                if let Some((qualifier, column)) = name.split_once('.') {
                    if qualifier == from_name {
                        from_table.has_column(column)
                    } else if qualifier == join_name {
                        join_table.has_column(column)
                    } else {
                        false
                    }
                } else {
                    from_table.has_column(name) || join_table.has_column(name)
                }
            };
            validate_field_filter(ff, path, &resolves, c);
        }
        Filter::And(items) | Filter::Or(items) => {
            for (i, item) in items.iter().enumerate() {
                validate_join_on(item, &format!("{path}[{i}]"), from_table, join_table, from_name, join_name, c);
            }
        }
        Filter::Not(inner) => validate_join_on(inner, &format!("{path}.not"), from_table, join_table, from_name, join_name, c),
    }
}

fn validate_field_filter(ff: &FieldFilter, path: &str, field_known: &dyn Fn(&str) -> bool, c: &mut Collector) {
    if !field_known(&ff.field) {
        c.push(format!("{path}.field"), ff.field.clone(), format!("unknown field '{}'", ff.field));
    }

    match ff.operator {
        Operator::IsNull | Operator::IsNotNull => {
            if ff.value.is_some() {
                c.push(
                    format!("{path}.value"),
                    "<present>",
                    format!("{} must not have a value", ff.operator),
                );
            }
        }
        Operator::In | Operator::NotIn => match &ff.value {
            Some(serde_json::Value::Array(arr)) if !arr.is_empty() => {}
            Some(serde_json::Value::Array(_)) => {
                c.push(format!("{path}.value"), "[]", format!("{} requires a non-empty array", ff.operator));
            }
            _ => c.push(
                format!("{path}.value"),
                "<missing>",
                format!("{} requires an array value", ff.operator),
            ),
        },
        Operator::Between => match &ff.value {
            Some(serde_json::Value::Array(arr)) if arr.len() == 2 => {}
            Some(serde_json::Value::Array(arr)) => {
                c.push(
                    format!("{path}.value"),
                    arr.len().to_string(),
                    "BETWEEN requires an array of exactly 2 values",
                );
            }
            _ => c.push(format!("{path}.value"), "<missing>", "BETWEEN requires an array value"),
        },
        _ => {
            if ff.value.is_none() {
                c.push(
                    format!("{path}.value"),
                    "<missing>",
                    format!("{} requires a value", ff.operator),
                );
            }
        }
    }
}
