use serde::Deserialize;

/// `ensure_exists` policy for keyspaces. `run: false` short-circuits
/// reconciliation entirely; no probe is issued.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct KeyspaceEnsure {
    pub run: bool,
    /// Alter an existing keyspace whose replication or durable-writes
    /// setting differs from the desired descriptor.
    pub alter: bool,
}

impl Default for KeyspaceEnsure {
    fn default() -> Self {
        Self {
            run: true,
            alter: false,
        }
    }
}

/// `ensure_exists` policy for tables. Precedence when remediating:
/// `recreate` wins over everything, then `recreate_column`, `remove_extra`,
/// `add_missing`. Mismatches with no enabled remediation are logged and
/// left alone.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TableEnsure {
    pub run: bool,
    /// Drop and recreate the whole table on any mismatch.
    pub recreate: bool,
    /// Drop-then-add columns whose type differs from the schema.
    pub recreate_column: bool,
    /// Drop live columns that the schema does not declare.
    pub remove_extra: bool,
    /// Add declared columns missing from the live table.
    pub add_missing: bool,
}

impl Default for TableEnsure {
    fn default() -> Self {
        Self {
            run: true,
            recreate: false,
            recreate_column: false,
            remove_extra: false,
            add_missing: false,
        }
    }
}

/// `ensure_exists` policy for user-defined types. Same precedence as
/// tables, with `change_type` altering a field's type in place.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UdtEnsure {
    pub run: bool,
    pub recreate: bool,
    /// `ALTER TYPE ... ALTER field TYPE ...` for mismatched fields.
    pub change_type: bool,
    /// Drop live fields that the descriptor does not declare.
    pub remove_extra: bool,
    /// Add declared fields missing from the live type.
    pub add_missing: bool,
}

impl Default for UdtEnsure {
    fn default() -> Self {
        Self {
            run: true,
            recreate: false,
            change_type: false,
            remove_extra: false,
            add_missing: false,
        }
    }
}
