use std::collections::BTreeMap;

use log::{debug, warn};

use crate::core::{CqlValue, MapperError, Result};
use crate::executor::{Executor, Row};
use crate::query::Statement;
use crate::types::{CqlType, TypeRegistry};

use super::diff::FieldDiff;
use super::options::TableEnsure;
use super::{Schema, check_identifier};

/// Desired state of one table: column schema, key layout, and the
/// remediation policy applied when the live table disagrees.
#[derive(Debug, Clone)]
pub struct Table {
    keyspace: String,
    name: String,
    schema: Schema,
    registry: TypeRegistry,
    options: TableEnsure,
}

impl Table {
    pub fn new(
        keyspace: impl Into<String>,
        name: impl Into<String>,
        schema: Schema,
        registry: TypeRegistry,
        options: TableEnsure,
    ) -> Result<Self> {
        let keyspace = keyspace.into();
        let name = name.into();
        check_identifier(&keyspace)?;
        check_identifier(&name)?;
        Ok(Self {
            keyspace,
            name,
            schema,
            registry,
            options,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Metadata probe: one row per live column.
    pub async fn select_schema(&self, executor: &dyn Executor) -> Result<Vec<Row>> {
        let statement = Statement {
            text: "SELECT * FROM system.schema_columns WHERE keyspace_name = ? \
                   AND columnfamily_name = ? ALLOW FILTERING"
                .to_string(),
            params: vec![
                CqlValue::Text(self.keyspace.clone()),
                CqlValue::Text(self.name.clone()),
            ],
            prepare: true,
        };
        statement.log();
        executor
            .execute(&statement)
            .await
            .map_err(|e| MapperError::ProbeError(format!("table '{}': {}", self.name, e)))
    }

    pub async fn create(&self, executor: &dyn Executor, if_not_exists: bool) -> Result<()> {
        let mut text = String::from("CREATE TABLE");
        if if_not_exists {
            text.push_str(" IF NOT EXISTS");
        }
        let columns: Vec<String> = self
            .schema
            .columns()
            .iter()
            .map(|c| format!("{} {}", c.name, c.cql_type.canonical()))
            .collect();
        text.push_str(&format!(
            " {} ({}, PRIMARY KEY ({}))",
            self.name,
            columns.join(", "),
            self.schema.key().to_cql()
        ));
        let statement = Statement::new(text);
        statement.log();
        executor.execute(&statement).await?;
        Ok(())
    }

    pub async fn drop(&self, executor: &dyn Executor, if_exists: bool) -> Result<()> {
        let mut text = String::from("DROP TABLE");
        if if_exists {
            text.push_str(" IF EXISTS");
        }
        text.push_str(&format!(" {}", self.name));
        let statement = Statement::new(text);
        statement.log();
        executor.execute(&statement).await?;
        Ok(())
    }

    pub async fn add_column(
        &self,
        executor: &dyn Executor,
        column: &str,
        cql_type: &CqlType,
    ) -> Result<()> {
        check_identifier(column)?;
        let statement = Statement::new(format!(
            "ALTER TABLE {} ADD {} {}",
            self.name,
            column,
            cql_type.canonical()
        ));
        statement.log();
        executor.execute(&statement).await?;
        Ok(())
    }

    pub async fn drop_column(&self, executor: &dyn Executor, column: &str) -> Result<()> {
        check_identifier(column)?;
        let statement = Statement::new(format!("ALTER TABLE {} DROP {}", self.name, column));
        statement.log();
        executor.execute(&statement).await?;
        Ok(())
    }

    pub async fn rename_column(
        &self,
        executor: &dyn Executor,
        from: &str,
        to: &str,
    ) -> Result<()> {
        check_identifier(from)?;
        check_identifier(to)?;
        let statement = Statement::new(format!(
            "ALTER TABLE {} RENAME {} TO {}",
            self.name, from, to
        ));
        statement.log();
        executor.execute(&statement).await?;
        Ok(())
    }

    pub async fn alter_column_type(
        &self,
        executor: &dyn Executor,
        column: &str,
        cql_type: &CqlType,
    ) -> Result<()> {
        check_identifier(column)?;
        let statement = Statement::new(format!(
            "ALTER TABLE {} ALTER {} TYPE {}",
            self.name,
            column,
            cql_type.canonical()
        ));
        statement.log();
        executor.execute(&statement).await?;
        Ok(())
    }

    /// Probe, then create if absent, or diff columns if present and
    /// remediate per the policy flags. `recreate` wins over the field-level
    /// flags; unremediated mismatches are logged warnings.
    pub async fn ensure_exists(&self, executor: &dyn Executor) -> Result<()> {
        if !self.options.run {
            debug!("Ensure table skipped: {}.", self.name);
            return Ok(());
        }

        let rows = self.select_schema(executor).await?;

        if rows.is_empty() {
            warn!("Creating table: {}.", self.name);
            return self
                .create(executor, true)
                .await
                .map_err(|e| MapperError::CreateError(format!("table '{}': {}", self.name, e)));
        }

        let live = self.live_columns(&rows)?;
        let desired: Vec<(String, String)> = self
            .schema
            .columns()
            .iter()
            .map(|c| (c.name.clone(), c.cql_type.canonical()))
            .collect();
        let diff = FieldDiff::compare(&desired, &live);
        if diff.is_clean() {
            return Ok(());
        }

        for column in &diff.mismatched {
            warn!(
                "Different type found for column '{}' on existing table: {}.",
                column, self.name
            );
        }
        for column in &diff.extra {
            warn!(
                "Extra column '{}' found on existing table: {}.",
                column, self.name
            );
        }
        for column in &diff.missing {
            warn!(
                "Missing column '{}' on existing table: {}.",
                column, self.name
            );
        }

        if self.options.recreate {
            warn!("Recreating table to match schema: {}.", self.name);
            self.drop(executor, true)
                .await
                .map_err(|e| MapperError::DropError(format!("table '{}': {}", self.name, e)))?;
            return self
                .create(executor, true)
                .await
                .map_err(|e| MapperError::CreateError(format!("table '{}': {}", self.name, e)));
        }

        if self.options.recreate_column {
            for column in &diff.mismatched {
                let declared = self.schema.get_column(column).ok_or_else(|| {
                    MapperError::ColumnNotFound(column.clone(), self.name.clone())
                })?;
                warn!("Recreating column '{}' on table: {}.", column, self.name);
                self.drop_column(executor, column)
                    .await
                    .map_err(|e| MapperError::AlterError(format!("table '{}': {}", self.name, e)))?;
                self.add_column(executor, column, &declared.cql_type)
                    .await
                    .map_err(|e| MapperError::AlterError(format!("table '{}': {}", self.name, e)))?;
            }
        }
        if self.options.remove_extra {
            for column in &diff.extra {
                warn!("Removing extra column '{}' from table: {}.", column, self.name);
                self.drop_column(executor, column)
                    .await
                    .map_err(|e| MapperError::AlterError(format!("table '{}': {}", self.name, e)))?;
            }
        }
        if self.options.add_missing {
            for column in &diff.missing {
                let declared = self.schema.get_column(column).ok_or_else(|| {
                    MapperError::ColumnNotFound(column.clone(), self.name.clone())
                })?;
                warn!("Adding missing column '{}' to table: {}.", column, self.name);
                self.add_column(executor, column, &declared.cql_type)
                    .await
                    .map_err(|e| MapperError::AlterError(format!("table '{}': {}", self.name, e)))?;
            }
        }

        Ok(())
    }

    /// Live `column -> canonical type` map from probe rows. Unparseable
    /// live type strings are kept verbatim (lowercased, whitespace
    /// stripped) so they surface as mismatches instead of probe failures.
    fn live_columns(&self, rows: &[Row]) -> Result<BTreeMap<String, String>> {
        let mut live = BTreeMap::new();
        for row in rows {
            let name = row
                .get("column_name")
                .and_then(CqlValue::as_str)
                .ok_or_else(|| {
                    MapperError::ProbeError(format!(
                        "table '{}': probe row is missing column_name",
                        self.name
                    ))
                })?;
            let raw_type = row
                .get("validator")
                .and_then(CqlValue::as_str)
                .unwrap_or_default();
            let canonical = self
                .registry
                .canonicalize(raw_type)
                .unwrap_or_else(|_| raw_type.to_ascii_lowercase().replace(' ', ""));
            live.insert(name.to_string(), canonical);
        }
        Ok(live)
    }
}
