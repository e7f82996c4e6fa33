use std::collections::BTreeMap;

use log::{debug, warn};

use crate::core::{CqlValue, MapperError, Result};
use crate::executor::{Executor, Row};
use crate::query::Statement;
use crate::types::{CqlType, TypeRegistry};

use super::diff::FieldDiff;
use super::options::UdtEnsure;
use super::check_identifier;

/// Desired state of one user-defined type: ordered fields plus remediation
/// policy. Reconciled with the same probe/diff/remediate machine as tables,
/// except field type changes happen in place (`ALTER TYPE ... ALTER f TYPE`).
#[derive(Debug, Clone)]
pub struct UserDefinedType {
    keyspace: String,
    name: String,
    fields: Vec<(String, CqlType)>,
    registry: TypeRegistry,
    options: UdtEnsure,
}

impl UserDefinedType {
    pub fn new(
        keyspace: impl Into<String>,
        name: impl Into<String>,
        fields: Vec<(String, CqlType)>,
        registry: TypeRegistry,
        options: UdtEnsure,
    ) -> Result<Self> {
        let keyspace = keyspace.into();
        let name = name.into();
        check_identifier(&keyspace)?;
        check_identifier(&name)?;
        if fields.is_empty() {
            return Err(MapperError::InvalidArgument(format!(
                "type '{}' requires at least one field",
                name
            )));
        }
        for (field, _) in &fields {
            check_identifier(field)?;
        }
        Ok(Self {
            keyspace,
            name,
            fields,
            registry,
            options,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[(String, CqlType)] {
        &self.fields
    }

    /// Metadata probe: zero rows or one row carrying parallel
    /// `field_names` / `field_types` lists.
    pub async fn select_schema(&self, executor: &dyn Executor) -> Result<Vec<Row>> {
        let statement = Statement {
            text: "SELECT * FROM system.schema_usertypes WHERE keyspace_name = ? \
                   AND type_name = ? ALLOW FILTERING"
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
            .map_err(|e| MapperError::ProbeError(format!("type '{}': {}", self.name, e)))
    }

    pub async fn create(&self, executor: &dyn Executor, if_not_exists: bool) -> Result<()> {
        let mut text = String::from("CREATE TYPE");
        if if_not_exists {
            text.push_str(" IF NOT EXISTS");
        }
        let fields: Vec<String> = self
            .fields
            .iter()
            .map(|(name, ty)| format!("{} {}", name, ty.canonical()))
            .collect();
        text.push_str(&format!(" {} ({})", self.name, fields.join(", ")));
        let statement = Statement::new(text);
        statement.log();
        executor.execute(&statement).await?;
        Ok(())
    }

    pub async fn drop(&self, executor: &dyn Executor, if_exists: bool) -> Result<()> {
        let mut text = String::from("DROP TYPE");
        if if_exists {
            text.push_str(" IF EXISTS");
        }
        text.push_str(&format!(" {}", self.name));
        let statement = Statement::new(text);
        statement.log();
        executor.execute(&statement).await?;
        Ok(())
    }

    pub async fn add_field(
        &self,
        executor: &dyn Executor,
        field: &str,
        cql_type: &CqlType,
    ) -> Result<()> {
        check_identifier(field)?;
        let statement = Statement::new(format!(
            "ALTER TYPE {} ADD {} {}",
            self.name,
            field,
            cql_type.canonical()
        ));
        statement.log();
        executor.execute(&statement).await?;
        Ok(())
    }

    pub async fn drop_field(&self, executor: &dyn Executor, field: &str) -> Result<()> {
        check_identifier(field)?;
        let statement = Statement::new(format!("ALTER TYPE {} DROP {}", self.name, field));
        statement.log();
        executor.execute(&statement).await?;
        Ok(())
    }

    pub async fn rename_field(
        &self,
        executor: &dyn Executor,
        from: &str,
        to: &str,
    ) -> Result<()> {
        check_identifier(from)?;
        check_identifier(to)?;
        let statement = Statement::new(format!(
            "ALTER TYPE {} RENAME {} TO {}",
            self.name, from, to
        ));
        statement.log();
        executor.execute(&statement).await?;
        Ok(())
    }

    pub async fn alter_field_type(
        &self,
        executor: &dyn Executor,
        field: &str,
        cql_type: &CqlType,
    ) -> Result<()> {
        check_identifier(field)?;
        let statement = Statement::new(format!(
            "ALTER TYPE {} ALTER {} TYPE {}",
            self.name,
            field,
            cql_type.canonical()
        ));
        statement.log();
        executor.execute(&statement).await?;
        Ok(())
    }

    pub async fn ensure_exists(&self, executor: &dyn Executor) -> Result<()> {
        if !self.options.run {
            debug!("Ensure type skipped: {}.", self.name);
            return Ok(());
        }

        let rows = self.select_schema(executor).await?;

        if rows.is_empty() {
            warn!("Creating type: {}.", self.name);
            return self
                .create(executor, true)
                .await
                .map_err(|e| MapperError::CreateError(format!("type '{}': {}", self.name, e)));
        }

        let live = self.live_fields(&rows[0])?;
        let desired: Vec<(String, String)> = self
            .fields
            .iter()
            .map(|(name, ty)| (name.clone(), ty.canonical()))
            .collect();
        let diff = FieldDiff::compare(&desired, &live);
        if diff.is_clean() {
            return Ok(());
        }

        for field in &diff.mismatched {
            warn!(
                "Different type found for field '{}' on existing type: {}.",
                field, self.name
            );
        }
        for field in &diff.extra {
            warn!("Extra field '{}' found on existing type: {}.", field, self.name);
        }
        for field in &diff.missing {
            warn!("Missing field '{}' on existing type: {}.", field, self.name);
        }

        if self.options.recreate {
            warn!("Recreating type to match schema: {}.", self.name);
            self.drop(executor, true)
                .await
                .map_err(|e| MapperError::DropError(format!("type '{}': {}", self.name, e)))?;
            return self
                .create(executor, true)
                .await
                .map_err(|e| MapperError::CreateError(format!("type '{}': {}", self.name, e)));
        }

        if self.options.change_type {
            for field in &diff.mismatched {
                let (_, declared) = self
                    .fields
                    .iter()
                    .find(|(name, _)| name == field)
                    .ok_or_else(|| {
                        MapperError::ColumnNotFound(field.clone(), self.name.clone())
                    })?;
                warn!("Changing type of field '{}' on type: {}.", field, self.name);
                self.alter_field_type(executor, field, declared)
                    .await
                    .map_err(|e| MapperError::AlterError(format!("type '{}': {}", self.name, e)))?;
            }
        }
        if self.options.remove_extra {
            for field in &diff.extra {
                warn!("Removing extra field '{}' from type: {}.", field, self.name);
                self.drop_field(executor, field)
                    .await
                    .map_err(|e| MapperError::AlterError(format!("type '{}': {}", self.name, e)))?;
            }
        }
        if self.options.add_missing {
            for field in &diff.missing {
                let (_, declared) = self
                    .fields
                    .iter()
                    .find(|(name, _)| name == field)
                    .ok_or_else(|| {
                        MapperError::ColumnNotFound(field.clone(), self.name.clone())
                    })?;
                warn!("Adding missing field '{}' to type: {}.", field, self.name);
                self.add_field(executor, field, declared)
                    .await
                    .map_err(|e| MapperError::AlterError(format!("type '{}': {}", self.name, e)))?;
            }
        }

        Ok(())
    }

    /// Parallel field_names/field_types lists from the probe row, as the
    /// legacy metadata table reports them.
    fn live_fields(&self, row: &Row) -> Result<BTreeMap<String, String>> {
        let names = match row.get("field_names") {
            Some(CqlValue::List(items) | CqlValue::Set(items)) => items,
            _ => {
                return Err(MapperError::ProbeError(format!(
                    "type '{}': probe row is missing field_names",
                    self.name
                )));
            }
        };
        let types = match row.get("field_types") {
            Some(CqlValue::List(items) | CqlValue::Set(items)) => items,
            _ => {
                return Err(MapperError::ProbeError(format!(
                    "type '{}': probe row is missing field_types",
                    self.name
                )));
            }
        };
        let mut live = BTreeMap::new();
        for (name, raw_type) in names.iter().zip(types) {
            let (Some(name), Some(raw_type)) = (name.as_str(), raw_type.as_str()) else {
                continue;
            };
            let canonical = self
                .registry
                .canonicalize(raw_type)
                .unwrap_or_else(|_| raw_type.to_ascii_lowercase().replace(' ', ""));
            live.insert(name.to_string(), canonical);
        }
        Ok(live)
    }
}
