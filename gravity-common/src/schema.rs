//! Explicit table registry.
//!
//! Services describe their tables in a [`SchemaRegistry`] they own and pass
//! it to [`crate::Database::create_all`]. Nothing is registered globally.

use crate::error::{GravityError, Result};

/// Columns every table receives.
pub const BASE_COLUMNS: [(&str, &str); 3] = [
    ("id", "BIGSERIAL PRIMARY KEY"),
    ("created_at", "TIMESTAMPTZ NOT NULL DEFAULT now()"),
    ("updated_at", "TIMESTAMPTZ"),
];

/// A single column definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    /// Column name
    pub name: String,
    /// SQL type and constraints
    pub sql_type: String,
}

/// Table definition including the base columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    name: String,
    columns: Vec<ColumnDef>,
}

impl TableSchema {
    /// Table with only the base columns.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let columns = BASE_COLUMNS
            .iter()
            .map(|(name, sql_type)| ColumnDef {
                name: (*name).to_string(),
                sql_type: (*sql_type).to_string(),
            })
            .collect();

        Self {
            name: name.into(),
            columns,
        }
    }

    /// Add a column.
    #[must_use]
    pub fn column(mut self, name: impl Into<String>, sql_type: impl Into<String>) -> Self {
        self.columns.push(ColumnDef {
            name: name.into(),
            sql_type: sql_type.into(),
        });
        self
    }

    /// Table name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// All columns, base columns first.
    #[must_use]
    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    /// `CREATE TABLE IF NOT EXISTS` statement for this table.
    #[must_use]
    pub fn create_statement(&self) -> String {
        let columns = self
            .columns
            .iter()
            .map(|c| format!("    {} {}", c.name, c.sql_type))
            .collect::<Vec<_>>()
            .join(",\n");
        format!("CREATE TABLE IF NOT EXISTS {} (\n{}\n)", self.name, columns)
    }

    fn validate(&self) -> Result<()> {
        if !is_identifier(&self.name) {
            return Err(GravityError::validation(format!("Invalid table name: {}", self.name)));
        }
        let mut seen = std::collections::HashSet::new();
        for column in &self.columns {
            if !is_identifier(&column.name) {
                return Err(GravityError::validation(format!(
                    "Invalid column name {} in table {}",
                    column.name, self.name
                )));
            }
            if !seen.insert(column.name.as_str()) {
                return Err(GravityError::conflict(format!(
                    "Duplicate column {} in table {}",
                    column.name, self.name
                )));
            }
        }
        Ok(())
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Ordered collection of table definitions.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    tables: Vec<TableSchema>,
}

impl SchemaRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a table.
    ///
    /// # Errors
    ///
    /// Returns a conflict error if a table with the same name is registered
    /// or a column is repeated, and a validation error for names that are not
    /// plain SQL identifiers.
    pub fn register(&mut self, table: TableSchema) -> Result<&mut Self> {
        table.validate()?;
        if self.get(table.name()).is_some() {
            return Err(GravityError::conflict(format!(
                "Table {} is already registered",
                table.name()
            )));
        }
        self.tables.push(table);
        Ok(self)
    }

    /// Registered table by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&TableSchema> {
        self.tables.iter().find(|t| t.name() == name)
    }

    /// Tables in registration order.
    #[must_use]
    pub fn tables(&self) -> &[TableSchema] {
        &self.tables
    }

    /// DDL for every table, in registration order.
    #[must_use]
    pub fn create_statements(&self) -> Vec<String> {
        self.tables.iter().map(TableSchema::create_statement).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_base_columns_first() {
        let table = TableSchema::new("users").column("email", "TEXT NOT NULL UNIQUE");
        let names: Vec<_> = table.columns().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["id", "created_at", "updated_at", "email"]);
    }

    #[test]
    fn test_create_statement() {
        let ddl = TableSchema::new("users")
            .column("email", "TEXT NOT NULL")
            .create_statement();

        assert!(ddl.starts_with("CREATE TABLE IF NOT EXISTS users ("));
        assert!(ddl.contains("id BIGSERIAL PRIMARY KEY"));
        assert!(ddl.contains("created_at TIMESTAMPTZ NOT NULL DEFAULT now()"));
        assert!(ddl.contains("email TEXT NOT NULL"));
    }

    #[test]
    fn test_registry_rejects_duplicate_table() {
        let mut registry = SchemaRegistry::new();
        registry.register(TableSchema::new("users")).unwrap();

        let err = registry.register(TableSchema::new("users")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(registry.tables().len(), 1);
    }

    #[test]
    fn test_registry_rejects_bad_names() {
        let mut registry = SchemaRegistry::new();

        let err = registry.register(TableSchema::new("users; DROP")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = registry
            .register(TableSchema::new("orders").column("id", "INT"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[test]
    fn test_registration_order_kept() {
        let mut registry = SchemaRegistry::new();
        registry
            .register(TableSchema::new("users"))
            .unwrap()
            .register(TableSchema::new("orders").column("user_id", "BIGINT REFERENCES users(id)"))
            .unwrap();

        let statements = registry.create_statements();
        assert_eq!(statements.len(), 2);
        assert!(statements[0].contains(" users "));
        assert!(statements[1].contains(" orders "));
        assert!(registry.get("orders").is_some());
    }
}
