//! Process-wide schema registry for the Files core.
//!
//! The registry is an immutable catalogue mapping table name to the set of
//! recognised column names. It is built once (lazily, on first use) and
//! never mutated afterwards; readers take no lock.

use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet};

/// A table's recognised column set.
pub struct TableSchema {
    pub columns: HashSet<&'static str>,
}

impl TableSchema {
    fn new(columns: &[&'static str]) -> Self {
        Self {
            columns: columns.iter().copied().collect(),
        }
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains(name)
    }
}

/// The fixed, build-time catalogue of tables recognised by the Files core.
pub struct SchemaRegistry {
    tables: HashMap<&'static str, TableSchema>,
}

impl SchemaRegistry {
    pub fn table(&self, name: &str) -> Option<&TableSchema> {
        self.tables.get(name)
    }

    pub fn has_table(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    /// Ordered list of recognised table names, for tool-description metadata.
    pub fn tables(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.tables.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Ordered list of a table's recognised columns, for tool-description metadata.
    pub fn columns(&self, table: &str) -> Option<Vec<&'static str>> {
        self.tables.get(table).map(|t| {
            let mut cols: Vec<&'static str> = t.columns.iter().copied().collect();
            cols.sort_unstable();
            cols
        })
    }
}

static REGISTRY: Lazy<SchemaRegistry> = Lazy::new(build_registry);

/// Access the process-wide schema registry, building it on first use.
pub fn registry() -> &'static SchemaRegistry {
    &REGISTRY
}

fn build_registry() -> SchemaRegistry {
    let mut tables = HashMap::new();

    tables.insert(
        "files",
        TableSchema::new(&[
            "id",
            "path",
            "language",
            "line_count_total",
            "line_count_code",
            "byte_size",
            "is_test",
            "module_id",
            "indexed_at",
        ]),
    );

    tables.insert(
        "types",
        TableSchema::new(&[
            "id",
            "file_id",
            "name",
            "kind",
            "visibility",
            "start_line",
            "end_line",
        ]),
    );

    tables.insert(
        "type_fields",
        TableSchema::new(&["id", "type_id", "name", "field_type", "visibility", "ordinal"]),
    );

    tables.insert(
        "functions",
        TableSchema::new(&[
            "id",
            "file_id",
            "type_id",
            "name",
            "signature",
            "visibility",
            "is_async",
            "start_line",
            "end_line",
            "cyclomatic_complexity",
        ]),
    );

    tables.insert(
        "function_parameters",
        TableSchema::new(&["id", "function_id", "name", "param_type", "ordinal", "has_default"]),
    );

    tables.insert(
        "type_relationships",
        TableSchema::new(&["id", "from_type_id", "to_type_id", "relationship"]),
    );

    tables.insert(
        "function_calls",
        TableSchema::new(&["id", "caller_function_id", "callee_name", "call_line"]),
    );

    tables.insert(
        "imports",
        TableSchema::new(&["id", "file_id", "path", "alias", "is_external"]),
    );

    tables.insert(
        "chunks",
        TableSchema::new(&[
            "id",
            "file_id",
            "chunk_index",
            "byte_start",
            "byte_end",
            "start_line",
            "end_line",
            "content",
        ]),
    );

    tables.insert(
        "modules",
        TableSchema::new(&["id", "path", "parent_module_id", "name"]),
    );

    tables.insert(
        "cache_metadata",
        TableSchema::new(&["id", "key", "value", "updated_at"]),
    );

    SchemaRegistry { tables }
}
