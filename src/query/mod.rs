mod builder;
mod statement;

pub use builder::{Action, PredicateOp, Query, SortOrder};
pub use statement::Statement;

pub(crate) use statement::{Clause, concat_clauses};
