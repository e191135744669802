//! Table catalog helpers layered on the connection manager
//!
//! Lookups go through [`ConnectionManager::execute`], so they share its
//! probe and retry behavior. Table names are checked against a plain
//! identifier grammar before they reach any SQL text, and are bound as
//! parameters wherever the dialect allows it.

use crate::error::{ManagerError, Result};
use crate::manager::ConnectionManager;
use roots_core::{ColumnMeta, Row, Value};

/// Which system catalog the connected driver exposes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dialect {
    Sqlite,
    InformationSchema,
}

impl Dialect {
    fn for_driver(driver_name: &str) -> Self {
        if driver_name.eq_ignore_ascii_case("sqlite") {
            Dialect::Sqlite
        } else {
            Dialect::InformationSchema
        }
    }
}

/// A validated `table` or `schema.table` name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableName {
    schema: Option<String>,
    table: String,
}

impl TableName {
    /// Parse a table name made of `[A-Za-z_][A-Za-z0-9_$]*` segments,
    /// optionally qualified by one schema segment.
    pub fn parse(name: &str) -> Result<Self> {
        let invalid = || ManagerError::InvalidIdentifier(name.to_string());

        let mut parts = name.split('.');
        let first = parts.next().ok_or_else(invalid)?;
        let second = parts.next();
        if parts.next().is_some() {
            return Err(invalid());
        }

        let (schema, table) = match second {
            Some(table) => (Some(first), table),
            None => (None, first),
        };
        if !is_identifier(table) || schema.is_some_and(|s| !is_identifier(s)) {
            return Err(invalid());
        }

        Ok(Self {
            schema: schema.map(str::to_string),
            table: table.to_string(),
        })
    }

    pub fn schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    pub fn table(&self) -> &str {
        &self.table
    }
}

impl std::fmt::Display for TableName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.schema {
            Some(schema) => write!(f, "{schema}.{}", self.table),
            None => f.write_str(&self.table),
        }
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

/// Catalog operations bound to one manager
pub struct Catalog<'a> {
    manager: &'a ConnectionManager,
    dialect: Dialect,
}

impl ConnectionManager {
    pub fn catalog(&self) -> Catalog<'_> {
        Catalog {
            manager: self,
            dialect: Dialect::for_driver(self.driver_name()),
        }
    }
}

impl Catalog<'_> {
    #[tracing::instrument(skip(self))]
    pub async fn table_exists(&self, name: &str) -> Result<bool> {
        let name = TableName::parse(name)?;
        let (sql, params) = match self.dialect {
            Dialect::Sqlite => {
                let master = match name.schema() {
                    Some(schema) => format!("{schema}.sqlite_master"),
                    None => "sqlite_master".to_string(),
                };
                (
                    format!(
                        "SELECT COUNT(*) FROM {master} WHERE type IN ('table', 'view') AND name = ?"
                    ),
                    vec![Value::from(name.table())],
                )
            }
            Dialect::InformationSchema => {
                let mut sql = String::from(
                    "SELECT COUNT(*) FROM information_schema.tables WHERE UPPER(table_name) = UPPER(?)",
                );
                let mut params = vec![Value::from(name.table())];
                if let Some(schema) = name.schema() {
                    sql.push_str(" AND UPPER(table_schema) = UPPER(?)");
                    params.push(Value::from(schema));
                }
                (sql, params)
            }
        };

        let result = self.manager.execute(&sql, &params).await?;
        let count = result.scalar().and_then(Value::as_i64).unwrap_or(0);
        Ok(count > 0)
    }

    /// Columns of `name` in ordinal order. Empty when the table does not exist.
    #[tracing::instrument(skip(self))]
    pub async fn table_schema(&self, name: &str) -> Result<Vec<ColumnMeta>> {
        let name = TableName::parse(name)?;
        match self.dialect {
            Dialect::Sqlite => {
                let (sql, params) = match name.schema() {
                    Some(schema) => (
                        r#"SELECT cid, name, type, "notnull" FROM pragma_table_info(?, ?) ORDER BY cid"#,
                        vec![Value::from(name.table()), Value::from(schema)],
                    ),
                    None => (
                        r#"SELECT cid, name, type, "notnull" FROM pragma_table_info(?) ORDER BY cid"#,
                        vec![Value::from(name.table())],
                    ),
                };
                let result = self.manager.execute(sql, &params).await?;
                Ok(result.rows.iter().map(sqlite_column).collect())
            }
            Dialect::InformationSchema => {
                let mut sql = String::from(
                    "SELECT column_name, data_type, character_maximum_length, numeric_precision, \
                     numeric_scale, is_nullable, ordinal_position \
                     FROM information_schema.columns WHERE UPPER(table_name) = UPPER(?)",
                );
                let mut params = vec![Value::from(name.table())];
                if let Some(schema) = name.schema() {
                    sql.push_str(" AND UPPER(table_schema) = UPPER(?)");
                    params.push(Value::from(schema));
                }
                sql.push_str(" ORDER BY ordinal_position");

                let result = self.manager.execute(&sql, &params).await?;
                Ok(result.rows.iter().map(information_schema_column).collect())
            }
        }
    }

    /// Create `name` from raw column definitions unless it already exists.
    /// Returns whether a table was created.
    ///
    /// Column definitions are trusted DDL fragments such as `"id INTEGER"`.
    #[tracing::instrument(skip(self, column_definitions), fields(columns = column_definitions.len()))]
    pub async fn create_table_if_not_exists(
        &self,
        name: &str,
        column_definitions: &[&str],
    ) -> Result<bool> {
        let table = TableName::parse(name)?;
        if column_definitions.is_empty() {
            return Err(ManagerError::InvalidIdentifier(format!(
                "{table} (no column definitions)"
            )));
        }
        if self.table_exists(name).await? {
            tracing::debug!(table = %table, "table already exists");
            return Ok(false);
        }

        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {table} ({})",
            column_definitions.join(", ")
        );
        self.manager.execute_update(&sql, &[]).await?;
        tracing::info!(table = %table, "table created");
        Ok(true)
    }

    #[tracing::instrument(skip(self))]
    pub async fn drop_table_if_exists(&self, name: &str) -> Result<()> {
        let table = TableName::parse(name)?;
        self.manager
            .execute_update(&format!("DROP TABLE IF EXISTS {table}"), &[])
            .await?;
        tracing::info!(table = %table, "table dropped if present");
        Ok(())
    }
}

fn text(row: &Row, index: usize) -> String {
    row.get(index)
        .map(|v| match v.as_str() {
            Some(s) => s.to_string(),
            None if v.is_null() => String::new(),
            None => v.to_string(),
        })
        .unwrap_or_default()
}

fn int(row: &Row, index: usize) -> Option<i64> {
    row.get(index).and_then(Value::as_i64)
}

fn sqlite_column(row: &Row) -> ColumnMeta {
    let ordinal = int(row, 0).unwrap_or(0).max(0) as usize;
    let mut column = ColumnMeta::new(text(row, 1), text(row, 2), ordinal);
    column.nullable = int(row, 3).unwrap_or(0) == 0;
    column
}

fn information_schema_column(row: &Row) -> ColumnMeta {
    let ordinal = int(row, 6).unwrap_or(1).max(1) as usize - 1;
    let mut column = ColumnMeta::new(text(row, 0), text(row, 1), ordinal);
    column.max_length = int(row, 2);
    column.precision = int(row, 3).and_then(|p| i32::try_from(p).ok());
    column.scale = int(row, 4).and_then(|s| i32::try_from(s).ok());
    column.nullable = !text(row, 5).eq_ignore_ascii_case("NO");
    column
}
