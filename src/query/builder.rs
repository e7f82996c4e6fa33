use crate::core::{CqlValue, MapperError, Result};
use crate::schema::Schema;
use crate::tracker::{ChangeTracker, Mutation};
use crate::types::CqlType;

use super::{Clause, Statement, concat_clauses};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Select,
    Insert,
    Update,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredicateOp {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
}

impl PredicateOp {
    fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::In => "IN",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    fn symbol(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// Operation descriptor: action, selectors, predicates, and directives,
/// built incrementally and immutable once compiled. `compile` borrows the
/// descriptor, so one descriptor can compile (and run) any number of times.
#[derive(Debug, Clone)]
pub struct Query {
    action: Action,
    table: String,
    selectors: Vec<String>,
    predicates: Vec<(String, PredicateOp, CqlValue)>,
    conditions: Vec<(String, PredicateOp, CqlValue)>,
    order_by: Option<(String, SortOrder)>,
    limit: Option<i64>,
    allow_filtering: bool,
    ttl: Option<i64>,
    timestamp: Option<i64>,
    if_exists: bool,
    if_not_exists: bool,
    count: bool,
}

impl Query {
    pub fn new(action: Action, table: impl Into<String>) -> Self {
        Self {
            action,
            table: table.into(),
            selectors: Vec::new(),
            predicates: Vec::new(),
            conditions: Vec::new(),
            order_by: None,
            limit: None,
            allow_filtering: false,
            ttl: None,
            timestamp: None,
            if_exists: false,
            if_not_exists: false,
            count: false,
        }
    }

    pub fn select(mut self, column: impl Into<String>) -> Self {
        self.selectors.push(column.into());
        self
    }

    pub fn select_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.selectors.extend(columns.into_iter().map(Into::into));
        self
    }

    pub fn where_eq(self, column: impl Into<String>, value: impl Into<CqlValue>) -> Self {
        self.where_op(column, PredicateOp::Eq, value)
    }

    pub fn where_op(
        mut self,
        column: impl Into<String>,
        op: PredicateOp,
        value: impl Into<CqlValue>,
    ) -> Self {
        self.predicates.push((column.into(), op, value.into()));
        self
    }

    /// Field-level lightweight-transaction condition (`IF col op ?`).
    pub fn if_condition(
        mut self,
        column: impl Into<String>,
        op: PredicateOp,
        value: impl Into<CqlValue>,
    ) -> Self {
        self.conditions.push((column.into(), op, value.into()));
        self
    }

    pub fn order_by(mut self, column: impl Into<String>, order: SortOrder) -> Self {
        self.order_by = Some((column.into(), order));
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn allow_filtering(mut self, allow: bool) -> Self {
        self.allow_filtering = allow;
        self
    }

    pub fn using_ttl(mut self, seconds: i64) -> Self {
        self.ttl = Some(seconds);
        self
    }

    pub fn using_timestamp(mut self, micros: i64) -> Self {
        self.timestamp = Some(micros);
        self
    }

    pub fn if_exists(mut self, flag: bool) -> Self {
        self.if_exists = flag;
        self
    }

    pub fn if_not_exists(mut self, flag: bool) -> Self {
        self.if_not_exists = flag;
        self
    }

    /// Emit `COUNT(*)` instead of a column list (select only).
    pub fn count(mut self) -> Self {
        self.count = true;
        self
    }

    /// Compiles to a parameterized statement. Pending mutations feed
    /// insert values and update SET clauses; selects and deletes ignore
    /// them.
    pub fn compile(&self, schema: &Schema, pending: &ChangeTracker) -> Result<Statement> {
        self.validate_directives()?;
        self.validate_columns(schema)?;

        match self.action {
            Action::Select => self.compile_select(schema),
            Action::Insert => self.compile_insert(schema, pending),
            Action::Update => self.compile_update(schema, pending),
            Action::Delete => self.compile_delete(schema),
        }
    }

    fn validate_directives(&self) -> Result<()> {
        let forbid = |cond: bool, what: &str| {
            if cond {
                Err(MapperError::BuildError(format!(
                    "{} is not valid for {:?}",
                    what, self.action
                )))
            } else {
                Ok(())
            }
        };

        if self.if_exists && !self.conditions.is_empty() {
            return Err(MapperError::BuildError(
                "IF EXISTS and field-level IF conditions are mutually exclusive".to_string(),
            ));
        }
        if let Some(ttl) = self.ttl {
            if ttl < 0 {
                return Err(MapperError::InvalidArgument(format!(
                    "TTL must be non-negative, got {}",
                    ttl
                )));
            }
        }
        if let Some(limit) = self.limit {
            if limit < 0 {
                return Err(MapperError::InvalidArgument(format!(
                    "LIMIT must be non-negative, got {}",
                    limit
                )));
            }
        }

        match self.action {
            Action::Select => {
                forbid(
                    self.count && !self.selectors.is_empty(),
                    "COUNT(*) combined with column selection",
                )?;
                forbid(self.ttl.is_some(), "USING TTL")?;
                forbid(self.timestamp.is_some(), "USING TIMESTAMP")?;
                forbid(self.if_exists, "IF EXISTS")?;
                forbid(self.if_not_exists, "IF NOT EXISTS")?;
                forbid(!self.conditions.is_empty(), "IF condition")?;
            }
            Action::Insert => {
                forbid(!self.predicates.is_empty(), "WHERE")?;
                forbid(self.order_by.is_some(), "ORDER BY")?;
                forbid(self.limit.is_some(), "LIMIT")?;
                forbid(self.allow_filtering, "ALLOW FILTERING")?;
                forbid(self.if_exists, "IF EXISTS")?;
                forbid(!self.conditions.is_empty(), "IF condition")?;
                forbid(self.count, "COUNT(*)")?;
            }
            Action::Update => {
                forbid(!self.selectors.is_empty(), "column selection")?;
                forbid(self.order_by.is_some(), "ORDER BY")?;
                forbid(self.limit.is_some(), "LIMIT")?;
                forbid(self.allow_filtering, "ALLOW FILTERING")?;
                forbid(self.if_not_exists, "IF NOT EXISTS")?;
                forbid(self.count, "COUNT(*)")?;
            }
            Action::Delete => {
                forbid(self.ttl.is_some(), "USING TTL")?;
                forbid(self.order_by.is_some(), "ORDER BY")?;
                forbid(self.limit.is_some(), "LIMIT")?;
                forbid(self.allow_filtering, "ALLOW FILTERING")?;
                forbid(self.if_not_exists, "IF NOT EXISTS")?;
                forbid(self.count, "COUNT(*)")?;
            }
        }
        Ok(())
    }

    fn validate_columns(&self, schema: &Schema) -> Result<()> {
        for name in &self.selectors {
            if schema.get_column(name).is_none() {
                return Err(MapperError::BuildError(format!(
                    "selected column '{}' is not in the schema for '{}'",
                    name, self.table
                )));
            }
        }
        for (name, _, _) in self.predicates.iter().chain(self.conditions.iter()) {
            if schema.get_column(name).is_none() {
                return Err(MapperError::BuildError(format!(
                    "predicate references unknown column '{}' in '{}'",
                    name, self.table
                )));
            }
        }
        if let Some((name, _)) = &self.order_by {
            if !schema.is_clustering_column(name) {
                return Err(MapperError::BuildError(format!(
                    "ORDER BY column '{}' is not a clustering column",
                    name
                )));
            }
        }
        Ok(())
    }

    fn compile_select(&self, schema: &Schema) -> Result<Statement> {
        let projection = if self.count {
            "COUNT(*)".to_string()
        } else if self.selectors.is_empty() {
            schema
                .columns()
                .iter()
                .map(|c| c.name.clone())
                .collect::<Vec<_>>()
                .join(", ")
        } else {
            self.selectors.join(", ")
        };

        let mut statement = Statement::new(format!(
            "SELECT {} FROM {}",
            projection, self.table
        ));
        let mut clauses = vec![self.build_where(schema)?];
        if let Some((column, order)) = &self.order_by {
            clauses.push(Clause::new(format!("ORDER BY {} {}", column, order.symbol())));
        }
        if let Some(limit) = self.limit {
            clauses.push(Clause::new(format!("LIMIT {}", limit)));
        }
        if self.allow_filtering {
            clauses.push(Clause::new("ALLOW FILTERING"));
        }
        concat_clauses(&mut statement, clauses);
        Ok(statement)
    }

    fn compile_insert(&self, schema: &Schema, pending: &ChangeTracker) -> Result<Statement> {
        let mut columns = Vec::new();
        let mut params = Vec::new();

        // Declaration order, not recording order.
        for column in schema.columns() {
            let mutations = pending.pending_for(&column.name);
            if mutations.is_empty() {
                continue;
            }
            let [Mutation::Set(value)] = mutations else {
                return Err(MapperError::BuildError(format!(
                    "insert only supports whole-value assignment, '{}' has collection or counter mutations",
                    column.name
                )));
            };
            if value.is_null() {
                continue;
            }
            columns.push(column.name.as_str());
            params.push(value.clone());
        }

        for (attr, _) in pending.iter() {
            if schema.get_column(attr).is_none() {
                return Err(MapperError::BuildError(format!(
                    "insert value references unknown column '{}' in '{}'",
                    attr, self.table
                )));
            }
        }
        for key_col in schema.key().columns() {
            if !columns.contains(&key_col) {
                return Err(MapperError::BuildError(format!(
                    "insert is missing a value for key column '{}'",
                    key_col
                )));
            }
        }

        let placeholders = vec!["?"; columns.len()].join(", ");
        let mut statement = Statement::new(format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.table,
            columns.join(", "),
            placeholders
        ));
        statement.params = params;

        let mut clauses = Vec::new();
        if self.if_not_exists {
            clauses.push(Clause::new("IF NOT EXISTS"));
        }
        clauses.push(self.build_using());
        concat_clauses(&mut statement, clauses);
        Ok(statement)
    }

    fn compile_update(&self, schema: &Schema, pending: &ChangeTracker) -> Result<Statement> {
        if pending.is_empty() {
            return Err(MapperError::BuildError(
                "update has no pending mutations".to_string(),
            ));
        }
        for key_col in schema.key().columns() {
            let keyed = self
                .predicates
                .iter()
                .any(|(name, op, _)| name == key_col && *op == PredicateOp::Eq);
            if !keyed {
                return Err(MapperError::BuildError(format!(
                    "update requires an equality predicate on key column '{}'",
                    key_col
                )));
            }
        }

        let mut statement = Statement::new(format!("UPDATE {}", self.table));
        let clauses = vec![
            self.build_using(),
            build_set(&self.table, schema, pending)?,
            self.build_where(schema)?,
            self.build_lwt(),
        ];
        concat_clauses(&mut statement, clauses);
        Ok(statement)
    }

    fn compile_delete(&self, schema: &Schema) -> Result<Statement> {
        // An empty selector list deletes the whole row; named selectors
        // delete just those columns.
        let mut statement = if self.selectors.is_empty() {
            Statement::new(format!("DELETE FROM {}", self.table))
        } else {
            Statement::new(format!(
                "DELETE {} FROM {}",
                self.selectors.join(", "),
                self.table
            ))
        };
        let clauses = vec![
            self.build_using(),
            self.build_where(schema)?,
            self.build_lwt(),
        ];
        concat_clauses(&mut statement, clauses);
        Ok(statement)
    }

    /// Predicates in schema declaration order (recording order within one
    /// column), so compiled output is deterministic.
    fn build_where(&self, schema: &Schema) -> Result<Clause> {
        let mut fragments = Vec::new();
        let mut params = Vec::new();
        for column in schema.columns() {
            for (name, op, value) in &self.predicates {
                if name != &column.name {
                    continue;
                }
                fragments.push(format!("{} {} ?", name, op.symbol()));
                params.push(value.clone());
            }
        }
        if fragments.is_empty() {
            return Ok(Clause::default());
        }
        Ok(Clause::with_params(
            format!("WHERE {}", fragments.join(" AND ")),
            params,
        ))
    }

    /// `USING TTL n AND TIMESTAMP m`. The integers are validated i64s and
    /// emitted inline, matching LIMIT.
    fn build_using(&self) -> Clause {
        let mut parts = Vec::new();
        if let Some(ttl) = self.ttl {
            parts.push(format!("TTL {}", ttl));
        }
        if let Some(timestamp) = self.timestamp {
            parts.push(format!("TIMESTAMP {}", timestamp));
        }
        if parts.is_empty() {
            Clause::default()
        } else {
            Clause::new(format!("USING {}", parts.join(" AND ")))
        }
    }

    /// `IF EXISTS` or field-level `IF` conditions, last in the statement.
    fn build_lwt(&self) -> Clause {
        if self.if_exists {
            return Clause::new("IF EXISTS");
        }
        if self.conditions.is_empty() {
            return Clause::default();
        }
        let mut fragments = Vec::new();
        let mut params = Vec::new();
        for (name, op, value) in &self.conditions {
            fragments.push(format!("{} {} ?", name, op.symbol()));
            params.push(value.clone());
        }
        Clause::with_params(format!("IF {}", fragments.join(" AND ")), params)
    }
}

/// SET clause: one fragment per pending mutation, type-appropriate per the
/// column, joined with `,`. Multiple mutations against one attribute stay
/// separate fragments.
fn build_set(table: &str, schema: &Schema, pending: &ChangeTracker) -> Result<Clause> {
    let mut fragments = Vec::new();
    let mut params = Vec::new();

    for (attr, mutations) in pending.iter() {
        let column = schema.get_column(attr).ok_or_else(|| {
            MapperError::ColumnNotFound(attr.to_string(), table.to_string())
        })?;
        let ty = column.cql_type.unfrozen();

        for mutation in mutations {
            match mutation {
                Mutation::Set(value) => {
                    if ty.is_counter() {
                        return Err(MapperError::BuildError(format!(
                            "counter column '{}' only accepts increment/decrement",
                            attr
                        )));
                    }
                    fragments.push(format!("{} = ?", attr));
                    params.push(value.clone());
                }
                Mutation::Increment(delta) => {
                    if !ty.is_counter() {
                        return Err(MapperError::BuildError(format!(
                            "'{}' is not a counter column",
                            attr
                        )));
                    }
                    if *delta >= 0 {
                        fragments.push(format!("{} = {} + ?", attr, attr));
                        params.push(CqlValue::Int(*delta));
                    } else {
                        fragments.push(format!("{} = {} - ?", attr, attr));
                        params.push(CqlValue::Int(-delta));
                    }
                }
                Mutation::Append(value) => {
                    require_kind(attr, ty, matches!(ty, CqlType::List(_)), "append", "list")?;
                    fragments.push(format!("{} = {} + ?", attr, attr));
                    params.push(CqlValue::List(vec![value.clone()]));
                }
                Mutation::Prepend(value) => {
                    require_kind(attr, ty, matches!(ty, CqlType::List(_)), "prepend", "list")?;
                    fragments.push(format!("{} = ? + {}", attr, attr));
                    params.push(CqlValue::List(vec![value.clone()]));
                }
                Mutation::Add(value) => {
                    require_kind(attr, ty, matches!(ty, CqlType::Set(_)), "add", "set")?;
                    fragments.push(format!("{} = {} + ?", attr, attr));
                    params.push(CqlValue::Set(vec![value.clone()]));
                }
                Mutation::Remove(value) => {
                    let fragment = format!("{} = {} - ?", attr, attr);
                    let param = match ty {
                        CqlType::List(_) => CqlValue::List(vec![value.clone()]),
                        CqlType::Set(_) | CqlType::Map(_, _) => {
                            CqlValue::Set(vec![value.clone()])
                        }
                        _ => {
                            return Err(MapperError::BuildError(format!(
                                "remove requires a collection column, '{}' is {}",
                                attr,
                                ty.canonical()
                            )));
                        }
                    };
                    fragments.push(fragment);
                    params.push(param);
                }
                Mutation::InjectAtIndex(index, value) => {
                    require_kind(
                        attr,
                        ty,
                        matches!(ty, CqlType::List(_)),
                        "indexed injection",
                        "list",
                    )?;
                    // Null operand nulls the element; it does not shift the
                    // list.
                    fragments.push(format!("{}[?] = ?", attr));
                    params.push(CqlValue::Int(*index));
                    params.push(value.clone());
                }
                Mutation::InjectAtKey(key, value) => {
                    require_kind(
                        attr,
                        ty,
                        matches!(ty, CqlType::Map(_, _)),
                        "keyed injection",
                        "map",
                    )?;
                    fragments.push(format!("{}[?] = ?", attr));
                    params.push(key.clone());
                    params.push(value.clone());
                }
                Mutation::RemoveKey(key) => {
                    require_kind(attr, ty, matches!(ty, CqlType::Map(_, _)), "key removal", "map")?;
                    fragments.push(format!("{} = {} - ?", attr, attr));
                    params.push(CqlValue::Set(vec![key.clone()]));
                }
            }
        }
    }

    if fragments.is_empty() {
        return Err(MapperError::BuildError(
            "update produced no SET fragments".to_string(),
        ));
    }
    Ok(Clause::with_params(
        format!("SET {}", fragments.join(", ")),
        params,
    ))
}

fn require_kind(
    attr: &str,
    ty: &CqlType,
    ok: bool,
    operation: &str,
    expected: &str,
) -> Result<()> {
    if ok {
        Ok(())
    } else {
        Err(MapperError::BuildError(format!(
            "{} requires a {} column, '{}' is {}",
            operation,
            expected,
            attr,
            ty.canonical()
        )))
    }
}
