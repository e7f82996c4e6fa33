use log::{debug, warn};

use crate::core::{CqlValue, MapperError, Result};
use crate::executor::{Executor, Row};
use crate::query::Statement;

use super::options::KeyspaceEnsure;
use super::replication::Replication;
use super::check_identifier;

/// Desired state of one keyspace, with probe/create/drop/alter operations
/// and the `ensure_exists` reconciliation state machine over them.
#[derive(Debug, Clone)]
pub struct Keyspace {
    name: String,
    replication: Replication,
    durable_writes: bool,
    options: KeyspaceEnsure,
}

impl Keyspace {
    pub fn new(
        name: impl Into<String>,
        replication: Replication,
        durable_writes: bool,
        options: KeyspaceEnsure,
    ) -> Result<Self> {
        let name = name.into();
        check_identifier(&name)?;
        Ok(Self {
            name,
            replication,
            durable_writes,
            options,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn replication(&self) -> &Replication {
        &self.replication
    }

    pub fn durable_writes(&self) -> bool {
        self.durable_writes
    }

    /// Metadata probe, scoped to this keyspace.
    pub async fn select_schema(&self, executor: &dyn Executor) -> Result<Vec<Row>> {
        let statement = Statement {
            text: "SELECT * FROM system.schema_keyspaces WHERE keyspace_name = ? ALLOW FILTERING"
                .to_string(),
            params: vec![CqlValue::Text(self.name.clone())],
            prepare: true,
        };
        statement.log();
        executor
            .execute(&statement)
            .await
            .map_err(|e| MapperError::ProbeError(format!("keyspace '{}': {}", self.name, e)))
    }

    pub async fn create(&self, executor: &dyn Executor, if_not_exists: bool) -> Result<()> {
        let mut text = String::from("CREATE KEYSPACE");
        if if_not_exists {
            text.push_str(" IF NOT EXISTS");
        }
        text.push_str(&format!(
            " {} WITH REPLICATION = {} AND DURABLE_WRITES = {}",
            self.name,
            self.replication.to_cql(),
            self.durable_writes
        ));
        let statement = Statement::new(text);
        statement.log();
        executor.execute(&statement).await?;
        Ok(())
    }

    pub async fn drop(&self, executor: &dyn Executor, if_exists: bool) -> Result<()> {
        let mut text = String::from("DROP KEYSPACE");
        if if_exists {
            text.push_str(" IF EXISTS");
        }
        text.push_str(&format!(" {}", self.name));
        let statement = Statement::new(text);
        statement.log();
        executor.execute(&statement).await?;
        Ok(())
    }

    /// Alters replication and/or durable-writes; passing `None` leaves that
    /// setting untouched.
    pub async fn alter(
        &self,
        executor: &dyn Executor,
        replication: Option<&Replication>,
        durable_writes: Option<bool>,
    ) -> Result<()> {
        if replication.is_none() && durable_writes.is_none() {
            return Err(MapperError::InvalidArgument(
                "alter keyspace requires replication or durable_writes".to_string(),
            ));
        }
        let mut text = format!("ALTER KEYSPACE {}", self.name);
        let mut first = true;
        if let Some(replication) = replication {
            text.push_str(&format!(" WITH REPLICATION = {}", replication.to_cql()));
            first = false;
        }
        if let Some(durable) = durable_writes {
            text.push_str(if first { " WITH" } else { " AND" });
            text.push_str(&format!(" DURABLE_WRITES = {}", durable));
        }
        let statement = Statement::new(text);
        statement.log();
        executor.execute(&statement).await?;
        Ok(())
    }

    /// Probe, then create the keyspace if absent, or diff replication and
    /// durable-writes if present. Mismatches log warnings; they are only
    /// fixed when the `alter` policy flag is on. Remediation failure is
    /// fatal.
    pub async fn ensure_exists(&self, executor: &dyn Executor) -> Result<()> {
        if !self.options.run {
            debug!("Ensure keyspace skipped: {}.", self.name);
            return Ok(());
        }

        let rows = self.select_schema(executor).await?;

        if rows.is_empty() {
            warn!("Creating keyspace: {}.", self.name);
            return self
                .create(executor, true)
                .await
                .map_err(|e| MapperError::CreateError(format!("keyspace '{}': {}", self.name, e)));
        }

        let row = &rows[0];
        let live_class = row
            .get("strategy_class")
            .and_then(CqlValue::as_str)
            .unwrap_or_default();
        let live_options = row
            .get("strategy_options")
            .and_then(CqlValue::as_str)
            .unwrap_or("{}");
        let different_replication = !self.replication.matches_live(live_class, live_options);

        let live_durable = row
            .get("durable_writes")
            .and_then(CqlValue::as_bool)
            .unwrap_or(true);
        let different_durable_writes = live_durable != self.durable_writes;

        if different_replication {
            warn!(
                "Different replication strategy found for existing keyspace: {}.",
                self.name
            );
        }
        if different_durable_writes {
            warn!(
                "Different durable writes value found for existing keyspace: {}.",
                self.name
            );
        }

        if self.options.alter && (different_replication || different_durable_writes) {
            warn!("Altering keyspace to match schema: {}.", self.name);
            self.alter(executor, Some(&self.replication), Some(self.durable_writes))
                .await
                .map_err(|e| MapperError::AlterError(format!("keyspace '{}': {}", self.name, e)))?;
        }

        Ok(())
    }
}
