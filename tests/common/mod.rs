#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use cqlmap::{Executor, MapperError, Result, Row, Statement};

/// Records every statement it receives and replays canned row responses in
/// order; an exhausted queue answers with no rows.
#[derive(Default)]
pub struct MockExecutor {
    executed: Mutex<Vec<Statement>>,
    responses: Mutex<VecDeque<Vec<Row>>>,
    fail_containing: Mutex<Option<String>>,
}

impl MockExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_responses(responses: Vec<Vec<Row>>) -> Self {
        Self {
            executed: Mutex::new(Vec::new()),
            responses: Mutex::new(responses.into()),
            fail_containing: Mutex::new(None),
        }
    }

    pub fn push_response(&self, rows: Vec<Row>) {
        self.responses.lock().unwrap().push_back(rows);
    }

    /// Any statement whose text contains `needle` fails with an execution
    /// error.
    pub fn fail_statements_containing(&self, needle: &str) {
        *self.fail_containing.lock().unwrap() = Some(needle.to_string());
    }

    pub fn executed(&self) -> Vec<Statement> {
        self.executed.lock().unwrap().clone()
    }

    pub fn executed_texts(&self) -> Vec<String> {
        self.executed
            .lock()
            .unwrap()
            .iter()
            .map(|s| s.text.clone())
            .collect()
    }
}

#[async_trait]
impl Executor for MockExecutor {
    async fn execute(&self, statement: &Statement) -> Result<Vec<Row>> {
        self.executed.lock().unwrap().push(statement.clone());
        if let Some(needle) = self.fail_containing.lock().unwrap().as_deref() {
            if statement.text.contains(needle) {
                return Err(MapperError::ExecutionError(format!(
                    "mock failure for '{}'",
                    needle
                )));
            }
        }
        Ok(self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_default())
    }
}
