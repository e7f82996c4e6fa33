use std::collections::HashMap;
use std::sync::Arc;

use futures::StreamExt;
use futures::stream::BoxStream;

use crate::core::{CqlValue, MapperError, Result};
use crate::executor::{Executor, Row};
use crate::query::{Action, PredicateOp, Query};
use crate::schema::Schema;
use crate::tracker::{ChangeTracker, Mutation};
use crate::types::{CqlType, TypeRegistry};

/// Lifecycle hook: ordered lists run sequentially with first-failure
/// short-circuit. The mechanism is opaque to the mapper; hooks are plain
/// callables over the instance.
pub type Hook = Box<dyn Fn(&mut Model) -> Result<()> + Send + Sync>;

/// Per-column value check applied on whole-value assignment, after type
/// validation. Rejection surfaces the configured message.
pub struct FieldValidator {
    column: String,
    message: String,
    check: Box<dyn Fn(&CqlValue) -> bool + Send + Sync>,
}

impl FieldValidator {
    pub fn new(
        column: impl Into<String>,
        message: impl Into<String>,
        check: impl Fn(&CqlValue) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            column: column.into(),
            message: message.into(),
            check: Box::new(check),
        }
    }
}

/// Definition shared by every instance of one model: table name, schema,
/// the type registry used for validation and row mapping, and optional
/// per-column validators.
pub struct ModelDef {
    table: String,
    schema: Schema,
    registry: TypeRegistry,
    validators: Vec<FieldValidator>,
}

impl std::fmt::Debug for ModelDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelDef")
            .field("table", &self.table)
            .field("schema", &self.schema)
            .field("validators", &self.validators.len())
            .finish_non_exhaustive()
    }
}

impl ModelDef {
    pub fn new(
        table: impl Into<String>,
        schema: Schema,
        registry: TypeRegistry,
    ) -> Result<Arc<Self>> {
        Self::with_validators(table, schema, registry, Vec::new())
    }

    pub fn with_validators(
        table: impl Into<String>,
        schema: Schema,
        registry: TypeRegistry,
        validators: Vec<FieldValidator>,
    ) -> Result<Arc<Self>> {
        let table = table.into();
        crate::schema::check_identifier(&table)?;
        for validator in &validators {
            if schema.get_column(&validator.column).is_none() {
                return Err(MapperError::ColumnNotFound(
                    validator.column.clone(),
                    table.clone(),
                ));
            }
        }
        Ok(Arc::new(Self {
            table,
            schema,
            registry,
            validators,
        }))
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    /// Select descriptor for this model's table; chain predicates and
    /// directives on it, then pass to `find`/`first`/`count`/`stream`.
    pub fn select(&self) -> Query {
        Query::new(Action::Select, self.table.clone())
    }
}

/// One tracked record: attribute values plus the pending-mutation log.
///
/// Instances are single-writer; nothing here coordinates concurrent
/// mutation of the same instance.
pub struct Model {
    def: Arc<ModelDef>,
    attributes: HashMap<String, CqlValue>,
    tracker: ChangeTracker,
    persisted: bool,
    ttl: Option<i64>,
    timestamp: Option<i64>,
    if_exists: bool,
    if_not_exists: bool,
}

impl Model {
    /// Fresh, unpersisted instance. Saving it compiles an INSERT.
    pub fn new(def: Arc<ModelDef>) -> Self {
        Self {
            def,
            attributes: HashMap::new(),
            tracker: ChangeTracker::new(),
            persisted: false,
            ttl: None,
            timestamp: None,
            if_exists: false,
            if_not_exists: false,
        }
    }

    /// Blind-update instance: key values are seeded without being tracked,
    /// so a later save compiles an UPDATE keyed on them without ever
    /// reading the row.
    pub fn upsert(def: Arc<ModelDef>, keys: Vec<(String, CqlValue)>) -> Result<Self> {
        let mut model = Self::new(def);
        for (attr, value) in keys {
            let (name, ty) = model.target(&attr)?;
            model.def.registry.validate(&ty, &value)?;
            model.attributes.insert(name, value);
        }
        model.persisted = true;
        Ok(model)
    }

    /// Maps a result row back into a persisted instance through the type
    /// registry. Columns the schema does not declare are ignored.
    pub fn from_row(def: Arc<ModelDef>, row: Row) -> Result<Self> {
        let mut attributes = HashMap::new();
        for (name, raw) in row.into_columns() {
            let Some(column) = def.schema.get_column(&name) else {
                continue;
            };
            let value = def.registry.parse_value(&column.cql_type, raw)?;
            if !value.is_null() {
                attributes.insert(name, value);
            }
        }
        let mut model = Self::new(def);
        model.attributes = attributes;
        model.persisted = true;
        Ok(model)
    }

    pub fn get(&self, attr: &str) -> Option<&CqlValue> {
        let column = self.def.schema.resolve(attr)?;
        self.attributes.get(&column.name)
    }

    pub fn is_persisted(&self) -> bool {
        self.persisted
    }

    /// Whole-value assignment; validates against the declared column type
    /// and any configured column validators, then supersedes pending
    /// mutations for the attribute.
    pub fn set(&mut self, attr: &str, value: impl Into<CqlValue>) -> Result<()> {
        let value = value.into();
        let (name, ty) = self.target(attr)?;
        self.def.registry.validate(&ty, &value)?;
        for validator in &self.def.validators {
            if validator.column == name && !(validator.check)(&value) {
                return Err(MapperError::InvalidArgument(validator.message.clone()));
            }
        }
        self.tracker.record_set(&name, value.clone());
        self.attributes.insert(name, value);
        Ok(())
    }

    pub fn append(&mut self, attr: &str, value: impl Into<CqlValue>) -> Result<()> {
        let value = value.into();
        let name = self.validate_element(attr, &value, CqlType::element_type, "list")?;
        self.tracker.record_append(&name, value);
        Ok(())
    }

    pub fn prepend(&mut self, attr: &str, value: impl Into<CqlValue>) -> Result<()> {
        let value = value.into();
        let name = self.validate_element(attr, &value, CqlType::element_type, "list")?;
        self.tracker.record_prepend(&name, value);
        Ok(())
    }

    pub fn add(&mut self, attr: &str, value: impl Into<CqlValue>) -> Result<()> {
        let value = value.into();
        let name = self.validate_element(attr, &value, CqlType::element_type, "set")?;
        self.tracker.record_add(&name, value);
        Ok(())
    }

    pub fn remove(&mut self, attr: &str, value: impl Into<CqlValue>) -> Result<()> {
        let value = value.into();
        let (name, _) = self.target(attr)?;
        self.tracker.record_remove(&name, value);
        Ok(())
    }

    pub fn increment(&mut self, attr: &str, delta: i64) -> Result<()> {
        let (name, ty) = self.target(attr)?;
        if !ty.is_counter() {
            return Err(MapperError::InvalidArgument(format!(
                "'{}' is not a counter column",
                attr
            )));
        }
        self.tracker.record_increment(&name, delta);
        Ok(())
    }

    pub fn decrement(&mut self, attr: &str, delta: i64) -> Result<()> {
        self.increment(attr, -delta)
    }

    /// Sets a list element by index; a null value nulls the element
    /// without removing it.
    pub fn inject(&mut self, attr: &str, index: i64, value: impl Into<CqlValue>) -> Result<()> {
        let value = value.into();
        let name = self.validate_element(attr, &value, CqlType::element_type, "list")?;
        self.tracker.record_inject_at_index(&name, index, value);
        Ok(())
    }

    /// Sets a map entry by key; a null value nulls the entry without
    /// removing the key.
    pub fn inject_key(
        &mut self,
        attr: &str,
        key: impl Into<CqlValue>,
        value: impl Into<CqlValue>,
    ) -> Result<()> {
        let key = key.into();
        let value = value.into();
        let (name, ty) = self.target(attr)?;
        if let Some(key_type) = ty.key_type() {
            self.def.registry.validate(key_type, &key)?;
        }
        if let Some(value_type) = ty.value_type() {
            self.def.registry.validate(value_type, &value)?;
        }
        self.tracker.record_inject_at_key(&name, key, value);
        Ok(())
    }

    pub fn remove_key(&mut self, attr: &str, key: impl Into<CqlValue>) -> Result<()> {
        let (name, _) = self.target(attr)?;
        self.tracker.record_remove_key(&name, key.into());
        Ok(())
    }

    pub fn changes(&self, attr: &str) -> &[Mutation] {
        self.def
            .schema
            .resolve(attr)
            .map(|column| self.tracker.pending_for(&column.name))
            .unwrap_or(&[])
    }

    pub fn has_changes(&self) -> bool {
        !self.tracker.is_empty()
    }

    pub fn ttl(&mut self, seconds: i64) -> &mut Self {
        self.ttl = Some(seconds);
        self
    }

    pub fn timestamp(&mut self, micros: i64) -> &mut Self {
        self.timestamp = Some(micros);
        self
    }

    pub fn if_exists(&mut self, flag: bool) -> &mut Self {
        self.if_exists = flag;
        self
    }

    pub fn if_not_exists(&mut self, flag: bool) -> &mut Self {
        self.if_not_exists = flag;
        self
    }

    /// Persists pending mutations: INSERT for a fresh instance, UPDATE for
    /// a persisted (or blind-upsert, or counter) one. Pending mutations
    /// are cleared only on success; a failed save leaves them intact.
    pub async fn save(&mut self, executor: &dyn Executor) -> Result<()> {
        if self.tracker.is_empty() {
            return Ok(());
        }
        let statement = self.build_save()?;
        statement.log();
        executor.execute(&statement).await?;
        self.tracker.clear();
        self.persisted = true;
        self.clear_directives();
        Ok(())
    }

    /// `save` wrapped in ordered before/after hook lists; the first hook
    /// failure aborts.
    pub async fn save_with_hooks(
        &mut self,
        executor: &dyn Executor,
        before: &[Hook],
        after: &[Hook],
    ) -> Result<()> {
        for hook in before {
            hook(self)?;
        }
        self.save(executor).await?;
        for hook in after {
            hook(self)?;
        }
        Ok(())
    }

    /// Deletes the whole row by key. Discards pending mutations.
    pub async fn delete(&mut self, executor: &dyn Executor) -> Result<()> {
        let mut query = Query::new(Action::Delete, self.def.table.clone());
        if let Some(timestamp) = self.timestamp {
            query = query.using_timestamp(timestamp);
        }
        query = query.if_exists(self.if_exists);
        query = self.key_predicates(query)?;
        let statement = query.compile(&self.def.schema, &ChangeTracker::new())?;
        statement.log();
        executor.execute(&statement).await?;
        self.tracker.clear();
        self.persisted = false;
        self.clear_directives();
        Ok(())
    }

    pub async fn find(
        def: &Arc<ModelDef>,
        executor: &dyn Executor,
        query: &Query,
    ) -> Result<Vec<Model>> {
        let statement = query.compile(&def.schema, &ChangeTracker::new())?;
        statement.log();
        let rows = executor.execute(&statement).await?;
        rows.into_iter()
            .map(|row| Model::from_row(Arc::clone(def), row))
            .collect()
    }

    pub async fn first(
        def: &Arc<ModelDef>,
        executor: &dyn Executor,
        query: &Query,
    ) -> Result<Option<Model>> {
        let limited = query.clone().limit(1);
        Ok(Self::find(def, executor, &limited).await?.into_iter().next())
    }

    pub async fn count(
        def: &Arc<ModelDef>,
        executor: &dyn Executor,
        query: &Query,
    ) -> Result<i64> {
        let counted = query.clone().count();
        let statement = counted.compile(&def.schema, &ChangeTracker::new())?;
        statement.log();
        let rows = executor.execute(&statement).await?;
        let count = rows
            .first()
            .and_then(|row| row.columns().first())
            .and_then(|(_, value)| value.as_i64())
            .ok_or_else(|| {
                MapperError::ExecutionError("COUNT(*) returned no usable row".to_string())
            })?;
        Ok(count)
    }

    /// Lazy, forward-only stream of mapped instances. Row mapping errors
    /// surface in-stream.
    pub async fn stream(
        def: &Arc<ModelDef>,
        executor: &dyn Executor,
        query: &Query,
    ) -> Result<BoxStream<'static, Result<Model>>> {
        let statement = query.compile(&def.schema, &ChangeTracker::new())?;
        statement.log();
        let rows = executor.stream(&statement).await?;
        let def = Arc::clone(def);
        Ok(rows
            .map(move |row| row.and_then(|row| Model::from_row(Arc::clone(&def), row)))
            .boxed())
    }

    fn build_save(&self) -> Result<crate::query::Statement> {
        let has_counter_delta = self
            .tracker
            .iter()
            .any(|(_, muts)| muts.iter().any(|m| matches!(m, Mutation::Increment(_))));

        if !self.persisted && !has_counter_delta {
            let mut query = Query::new(Action::Insert, self.def.table.clone());
            if let Some(ttl) = self.ttl {
                query = query.using_ttl(ttl);
            }
            if let Some(timestamp) = self.timestamp {
                query = query.using_timestamp(timestamp);
            }
            query = query.if_not_exists(self.if_not_exists);
            query.compile(&self.def.schema, &self.tracker)
        } else {
            let mut query = Query::new(Action::Update, self.def.table.clone());
            if let Some(ttl) = self.ttl {
                query = query.using_ttl(ttl);
            }
            if let Some(timestamp) = self.timestamp {
                query = query.using_timestamp(timestamp);
            }
            query = query.if_exists(self.if_exists);
            query = self.key_predicates(query)?;
            let mut changes = self.tracker.clone();
            changes.retain(|attr| !self.def.schema.is_key_column(attr));
            query.compile(&self.def.schema, &changes)
        }
    }

    fn key_predicates(&self, mut query: Query) -> Result<Query> {
        for key_col in self.def.schema.key().columns() {
            let value = self.attributes.get(key_col).ok_or_else(|| {
                MapperError::BuildError(format!(
                    "instance has no value for key column '{}'",
                    key_col
                ))
            })?;
            query = query.where_op(key_col, PredicateOp::Eq, value.clone());
        }
        Ok(query)
    }

    /// Resolves an attribute (name or alias) to the canonical column name
    /// and its declared type. The tracker and attribute map are always
    /// keyed by the canonical name.
    fn target(&self, attr: &str) -> Result<(String, CqlType)> {
        self.def
            .schema
            .resolve(attr)
            .map(|c| (c.name.clone(), c.cql_type.clone()))
            .ok_or_else(|| MapperError::ColumnNotFound(attr.to_string(), self.def.table.clone()))
    }

    fn validate_element(
        &self,
        attr: &str,
        value: &CqlValue,
        extract: impl Fn(&CqlType) -> Option<&CqlType>,
        expected: &str,
    ) -> Result<String> {
        let (name, ty) = self.target(attr)?;
        match extract(&ty) {
            Some(element) => {
                self.def.registry.validate(element, value)?;
                Ok(name)
            }
            None => Err(MapperError::InvalidArgument(format!(
                "'{}' is not a {} column",
                attr, expected
            ))),
        }
    }

    fn clear_directives(&mut self) {
        self.ttl = None;
        self.timestamp = None;
        self.if_exists = false;
        self.if_not_exists = false;
    }
}
