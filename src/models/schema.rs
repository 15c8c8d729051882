//! Schema-related data models.
//!
//! Table and column descriptors read from a database's metadata catalog, the
//! include/exclude filters applied to them, and the synthesized schema
//! document embedded in prompts.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A user table, identified by schema and name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct TableIdentifier {
    pub schema: String,
    pub name: String,
}

impl TableIdentifier {
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
        }
    }

    /// `schema.name`, unquoted.
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.schema, self.name)
    }
}

impl std::fmt::Display for TableIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.schema, self.name)
    }
}

/// A column as reported by the metadata catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub name: String,
    pub data_type: String,
    /// Character/binary length. `-1` means unbounded (SQL Server `MAX`).
    pub max_length: Option<i64>,
    pub nullable: bool,
}

impl ColumnDescriptor {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>, nullable: bool) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            max_length: None,
            nullable,
        }
    }

    pub fn with_max_length(mut self, max_length: i64) -> Self {
        self.max_length = Some(max_length);
        self
    }
}

/// Ordered `CREATE TABLE` statements describing the queryable schema.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SchemaDocument {
    pub statements: Vec<String>,
}

impl SchemaDocument {
    pub fn new(statements: Vec<String>) -> Self {
        Self { statements }
    }

    /// Split a newline-joined DDL script back into statements.
    pub fn from_script(script: &str) -> Self {
        Self {
            statements: script
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    pub fn render(&self) -> String {
        self.statements.join("\n")
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }
}

/// A case-insensitive set of table names.
///
/// Entries of the form `schema.table` match the qualified name; entries
/// without a dot match the table name in any schema.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameSet {
    names: HashSet<String>,
}

impl NameSet {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            names: names
                .into_iter()
                .map(|n| n.as_ref().trim().to_lowercase())
                .filter(|n| !n.is_empty())
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn matches(&self, table: &TableIdentifier) -> bool {
        self.names.contains(&table.qualified_name().to_lowercase())
            || self.names.contains(&table.name.to_lowercase())
    }
}

/// Keep the tables allowed by the include/exclude sets.
///
/// A non-empty `included` set is the sole source of truth; `excluded` is
/// consulted only when nothing is included explicitly.
pub fn filter_tables(
    tables: Vec<TableIdentifier>,
    included: &NameSet,
    excluded: &NameSet,
) -> Vec<TableIdentifier> {
    if !included.is_empty() {
        tables.into_iter().filter(|t| included.matches(t)).collect()
    } else if !excluded.is_empty() {
        tables.into_iter().filter(|t| !excluded.matches(t)).collect()
    } else {
        tables
    }
}

/// Columns hidden from synthesized DDL.
///
/// `column` hides the column everywhere, `table.column` hides it in tables
/// with that name, `schema.table.column` in exactly one table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnExclusions {
    global: HashSet<String>,
    per_table: HashSet<(String, String)>,
    qualified: HashSet<(String, String, String)>,
}

impl ColumnExclusions {
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut exclusions = Self::default();
        for entry in entries {
            let entry = entry.as_ref().trim().to_lowercase();
            let parts: Vec<&str> = entry.split('.').map(str::trim).collect();
            match parts.as_slice() {
                [column] if !column.is_empty() => {
                    exclusions.global.insert(column.to_string());
                }
                [table, column] => {
                    exclusions
                        .per_table
                        .insert((table.to_string(), column.to_string()));
                }
                [schema, table, column] => {
                    exclusions.qualified.insert((
                        schema.to_string(),
                        table.to_string(),
                        column.to_string(),
                    ));
                }
                _ => {}
            }
        }
        exclusions
    }

    pub fn is_empty(&self) -> bool {
        self.global.is_empty() && self.per_table.is_empty() && self.qualified.is_empty()
    }

    pub fn excludes(&self, table: &TableIdentifier, column: &str) -> bool {
        let column = column.to_lowercase();
        if self.global.contains(&column) {
            return true;
        }
        let name = table.name.to_lowercase();
        if self.per_table.contains(&(name.clone(), column.clone())) {
            return true;
        }
        self.qualified
            .contains(&(table.schema.to_lowercase(), name, column))
    }
}

/// Everything that decides which parts of a database reach the prompt.
#[derive(Debug, Clone, Default)]
pub struct CatalogFilters {
    pub included_tables: NameSet,
    pub excluded_tables: NameSet,
    pub excluded_columns: ColumnExclusions,
}

impl CatalogFilters {
    pub fn new<S: AsRef<str>>(included: &[S], excluded: &[S], excluded_columns: &[S]) -> Self {
        Self {
            included_tables: NameSet::new(included),
            excluded_tables: NameSet::new(excluded),
            excluded_columns: ColumnExclusions::new(excluded_columns),
        }
    }
}
