use log::debug;

use crate::core::CqlValue;

/// A compiled statement: text, ordered bound parameters, and the prepare
/// flag. Value-shaped data only ever travels in `params`; `text` carries
/// identifiers and reserved words.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub text: String,
    pub params: Vec<CqlValue>,
    pub prepare: bool,
}

impl Statement {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            params: Vec::new(),
            prepare: true,
        }
    }

    /// Logs the statement before it is handed to the executor.
    pub fn log(&self) {
        debug!(
            "CQL: {} params: {:?} prepare: {}",
            self.text, self.params, self.prepare
        );
    }
}

/// One clause fragment plus the parameters it binds, in order.
#[derive(Debug, Default)]
pub(crate) struct Clause {
    pub text: String,
    pub params: Vec<CqlValue>,
}

impl Clause {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            params: Vec::new(),
        }
    }

    pub fn with_params(text: impl Into<String>, params: Vec<CqlValue>) -> Self {
        Self {
            text: text.into(),
            params,
        }
    }
}

/// Appends non-empty clauses to the statement in the given order,
/// space-separated, concatenating their parameter lists.
pub(crate) fn concat_clauses(statement: &mut Statement, clauses: Vec<Clause>) {
    for clause in clauses {
        if clause.text.is_empty() {
            continue;
        }
        statement.text.push(' ');
        statement.text.push_str(&clause.text);
        statement.params.extend(clause.params);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concat_skips_empty_clauses_and_orders_params() {
        let mut stmt = Statement::new("UPDATE t");
        concat_clauses(
            &mut stmt,
            vec![
                Clause::with_params("SET a = ?", vec![CqlValue::Int(1)]),
                Clause::default(),
                Clause::with_params("WHERE b = ?", vec![CqlValue::Int(2)]),
            ],
        );
        assert_eq!(stmt.text, "UPDATE t SET a = ? WHERE b = ?");
        assert_eq!(stmt.params, vec![CqlValue::Int(1), CqlValue::Int(2)]);
    }
}
