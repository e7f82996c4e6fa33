use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};

use crate::core::{CqlValue, Result};
use crate::query::Statement;

/// A result row with named columns, in the order the transport returned
/// them.
#[derive(Debug, Clone, Default)]
pub struct Row {
    columns: Vec<(String, CqlValue)>,
}

impl Row {
    pub fn new(columns: Vec<(String, CqlValue)>) -> Self {
        Self { columns }
    }

    pub fn get(&self, name: &str) -> Option<&CqlValue> {
        self.columns
            .iter()
            .find(|(col, _)| col == name)
            .map(|(_, value)| value)
    }

    pub fn columns(&self) -> &[(String, CqlValue)] {
        &self.columns
    }

    pub fn into_columns(self) -> Vec<(String, CqlValue)> {
        self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Lazy, forward-only sequence of rows. Consumption pace is the caller's;
/// backpressure is whatever the transport provides.
pub type RowStream = BoxStream<'static, Result<Row>>;

/// Transport adapter that runs compiled statements against the cluster.
///
/// The mapper always requests prepared execution (`Statement::prepare` is
/// true for everything it compiles) for reuse and parameter safety. No
/// retries, timeouts, or cancellation happen at this layer.
#[async_trait]
pub trait Executor: Send + Sync {
    async fn execute(&self, statement: &Statement) -> Result<Vec<Row>>;

    /// Default streaming falls back to a buffered execute; transports with
    /// native paging should override it.
    async fn stream(&self, statement: &Statement) -> Result<RowStream> {
        let rows = self.execute(statement).await?;
        Ok(stream::iter(rows.into_iter().map(Ok)).boxed())
    }
}
