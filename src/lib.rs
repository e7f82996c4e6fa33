// ============================================================================
// cqlmap Library
// ============================================================================

pub mod core;
pub mod executor;
pub mod model;
pub mod query;
pub mod schema;
pub mod tracker;
pub mod types;

// Re-export main types for convenience
pub use core::{CqlValue, MapperError, Result, generate_timeuuid, generate_uuid};
pub use executor::{Executor, Row, RowStream};
pub use model::{FieldValidator, Hook, Model, ModelDef};
pub use query::{Action, PredicateOp, Query, SortOrder, Statement};
pub use schema::{
    Column, FieldDiff, Keyspace, KeyspaceEnsure, PrimaryKey, Replication, Schema, StrategyClass,
    Table, TableEnsure, UdtEnsure, UserDefinedType, ensure_model_schema,
};
pub use tracker::{ChangeTracker, Mutation};
pub use types::{CqlType, TypeRegistry};
