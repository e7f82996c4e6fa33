mod diff;
mod keyspace;
mod options;
mod replication;
mod table;
mod udt;

pub use diff::FieldDiff;
pub use keyspace::Keyspace;
pub use options::{KeyspaceEnsure, TableEnsure, UdtEnsure};
pub use replication::{Replication, StrategyClass};
pub use table::Table;
pub use udt::UserDefinedType;

use crate::core::{MapperError, Result};
use crate::executor::Executor;
use crate::types::CqlType;

/// Identifiers are spliced into statement text, never bound as parameters,
/// so they are restricted to the unquoted-identifier alphabet.
pub(crate) fn check_identifier(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(MapperError::InvalidArgument(format!(
            "'{}' is not a valid unquoted identifier",
            name
        )))
    }
}

#[derive(Debug, Clone)]
pub struct Column {
    pub name: String,
    pub cql_type: CqlType,
    /// Alternative attribute name for model access. The alias never
    /// appears in statement text; compiled CQL always uses `name`.
    pub alias: Option<String>,
}

impl Column {
    pub fn new(name: impl Into<String>, cql_type: CqlType) -> Self {
        Self {
            name: name.into(),
            cql_type,
            alias: None,
        }
    }

    pub fn with_alias(
        name: impl Into<String>,
        alias: impl Into<String>,
        cql_type: CqlType,
    ) -> Self {
        Self {
            name: name.into(),
            cql_type,
            alias: Some(alias.into()),
        }
    }
}

/// Partition key (possibly composite) plus clustering columns.
#[derive(Debug, Clone, Default)]
pub struct PrimaryKey {
    pub partition: Vec<String>,
    pub clustering: Vec<String>,
}

impl PrimaryKey {
    pub fn new(
        partition: impl IntoIterator<Item = impl Into<String>>,
        clustering: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            partition: partition.into_iter().map(Into::into).collect(),
            clustering: clustering.into_iter().map(Into::into).collect(),
        }
    }

    /// `(a, b), c` rendering for CREATE TABLE.
    pub(crate) fn to_cql(&self) -> String {
        let partition = if self.partition.len() == 1 {
            self.partition[0].clone()
        } else {
            format!("({})", self.partition.join(", "))
        };
        if self.clustering.is_empty() {
            partition
        } else {
            format!("{}, {}", partition, self.clustering.join(", "))
        }
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.partition
            .iter()
            .chain(self.clustering.iter())
            .map(String::as_str)
    }
}

/// Ordered column declarations plus the primary key.
///
/// Declaration order is load-bearing: predicate emission and insert column
/// lists follow it so compiled statements are deterministic.
#[derive(Debug, Clone)]
pub struct Schema {
    columns: Vec<Column>,
    key: PrimaryKey,
}

impl Schema {
    pub fn new(columns: Vec<Column>, key: PrimaryKey) -> Result<Self> {
        if key.partition.is_empty() {
            return Err(MapperError::InvalidArgument(
                "schema requires at least one partition key column".to_string(),
            ));
        }
        for key_col in key.columns() {
            if !columns.iter().any(|c| c.name == key_col) {
                return Err(MapperError::InvalidArgument(format!(
                    "key column '{}' is not declared in the column list",
                    key_col
                )));
            }
        }
        for (i, column) in columns.iter().enumerate() {
            let Some(alias) = column.alias.as_deref() else {
                continue;
            };
            let clash = columns.iter().enumerate().any(|(j, other)| {
                other.name == alias || (j != i && other.alias.as_deref() == Some(alias))
            });
            if clash {
                return Err(MapperError::InvalidArgument(format!(
                    "alias '{}' collides with another column",
                    alias
                )));
            }
        }
        Ok(Self { columns, key })
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn key(&self) -> &PrimaryKey {
        &self.key
    }

    pub fn get_column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Looks a column up by name or by alias.
    pub fn resolve(&self, attr: &str) -> Option<&Column> {
        self.columns
            .iter()
            .find(|c| c.name == attr || c.alias.as_deref() == Some(attr))
    }

    pub fn is_key_column(&self, name: &str) -> bool {
        self.key.columns().any(|k| k == name)
    }

    pub fn is_clustering_column(&self, name: &str) -> bool {
        self.key.clustering.iter().any(|k| k == name)
    }
}

/// Reconciles a model's schema dependencies in order: every UDT referenced
/// by the table's columns first, then the table itself. A table create that
/// references an undefined UDT fails, so the ordering is not optional.
/// Short-circuits on the first failure, leaving later entities untouched.
pub async fn ensure_model_schema(
    executor: &dyn Executor,
    udts: &[UserDefinedType],
    table: &Table,
) -> Result<()> {
    for udt in udts {
        udt.ensure_exists(executor).await?;
    }
    table.ensure_exists(executor).await
}
