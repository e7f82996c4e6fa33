mod common;

use common::MockExecutor;

use cqlmap::{
    Column, CqlValue, Keyspace, KeyspaceEnsure, MapperError, PrimaryKey, Replication, Row, Schema,
    Table, TableEnsure, TypeRegistry, UdtEnsure, UserDefinedType, ensure_model_schema,
};

fn keyspace_row(class: &str, options_json: &str, durable: bool) -> Row {
    Row::new(vec![
        (
            "keyspace_name".to_string(),
            CqlValue::Text("app".to_string()),
        ),
        ("strategy_class".to_string(), CqlValue::Text(class.to_string())),
        (
            "strategy_options".to_string(),
            CqlValue::Text(options_json.to_string()),
        ),
        ("durable_writes".to_string(), CqlValue::Boolean(durable)),
    ])
}

fn column_row(name: &str, validator: &str) -> Row {
    Row::new(vec![
        ("column_name".to_string(), CqlValue::Text(name.to_string())),
        ("validator".to_string(), CqlValue::Text(validator.to_string())),
    ])
}

fn user_table(options: TableEnsure) -> Table {
    let registry = TypeRegistry::new();
    let schema = Schema::new(
        vec![
            Column::new("id", registry.parse_type("uuid").unwrap()),
            Column::new("name", registry.parse_type("text").unwrap()),
            Column::new("age", registry.parse_type("int").unwrap()),
        ],
        PrimaryKey::new(["id"], None::<&str>),
    )
    .unwrap();
    Table::new("app", "users", schema, registry, options).unwrap()
}

fn address_udt(options: UdtEnsure) -> UserDefinedType {
    let registry = TypeRegistry::new();
    let fields = vec![
        ("street".to_string(), registry.parse_type("text").unwrap()),
        ("zip".to_string(), registry.parse_type("int").unwrap()),
    ];
    UserDefinedType::new("app", "address", fields, registry, options).unwrap()
}

// =============
// = Keyspaces =
// =============

#[tokio::test]
async fn keyspace_mismatch_with_alter_issues_exactly_one_alter() {
    let executor = MockExecutor::with_responses(vec![vec![keyspace_row(
        "org.apache.cassandra.locator.SimpleStrategy",
        r#"{"replication_factor": "1"}"#,
        true,
    )]]);
    let keyspace = Keyspace::new(
        "app",
        Replication::simple(3),
        false,
        KeyspaceEnsure {
            run: true,
            alter: true,
        },
    )
    .unwrap();

    keyspace.ensure_exists(&executor).await.unwrap();

    let texts = executor.executed_texts();
    assert_eq!(texts.len(), 2, "probe plus one alter: {:?}", texts);
    assert!(texts[0].starts_with("SELECT * FROM system.schema_keyspaces"));
    assert_eq!(
        texts[1],
        "ALTER KEYSPACE app WITH REPLICATION = \
         {'class': 'SimpleStrategy', 'replication_factor': 3} AND DURABLE_WRITES = false"
    );
}

#[tokio::test]
async fn keyspace_mismatch_without_alter_only_probes() {
    let executor = MockExecutor::with_responses(vec![vec![keyspace_row(
        "org.apache.cassandra.locator.SimpleStrategy",
        r#"{"replication_factor": "1"}"#,
        true,
    )]]);
    let keyspace = Keyspace::new(
        "app",
        Replication::simple(3),
        false,
        KeyspaceEnsure::default(),
    )
    .unwrap();

    keyspace.ensure_exists(&executor).await.unwrap();

    assert_eq!(executor.executed_texts().len(), 1);
}

#[tokio::test]
async fn keyspace_matching_takes_no_action() {
    let executor = MockExecutor::with_responses(vec![vec![keyspace_row(
        "org.apache.cassandra.locator.SimpleStrategy",
        r#"{"replication_factor": "1"}"#,
        true,
    )]]);
    let keyspace = Keyspace::new(
        "app",
        Replication::simple(1),
        true,
        KeyspaceEnsure {
            run: true,
            alter: true,
        },
    )
    .unwrap();

    keyspace.ensure_exists(&executor).await.unwrap();
    assert_eq!(executor.executed_texts().len(), 1);
}

#[tokio::test]
async fn absent_keyspace_is_created_if_not_exists() {
    let executor = MockExecutor::new();
    let keyspace = Keyspace::new(
        "app",
        Replication::simple(1),
        true,
        KeyspaceEnsure::default(),
    )
    .unwrap();

    keyspace.ensure_exists(&executor).await.unwrap();

    let texts = executor.executed_texts();
    assert_eq!(texts.len(), 2);
    assert_eq!(
        texts[1],
        "CREATE KEYSPACE IF NOT EXISTS app WITH REPLICATION = \
         {'class': 'SimpleStrategy', 'replication_factor': 1} AND DURABLE_WRITES = true"
    );
}

#[tokio::test]
async fn run_false_short_circuits_before_the_probe() {
    let executor = MockExecutor::new();
    let keyspace = Keyspace::new(
        "app",
        Replication::simple(1),
        true,
        KeyspaceEnsure {
            run: false,
            alter: true,
        },
    )
    .unwrap();

    keyspace.ensure_exists(&executor).await.unwrap();
    assert!(executor.executed_texts().is_empty());
}

#[tokio::test]
async fn failed_creation_is_fatal() {
    let executor = MockExecutor::new();
    executor.fail_statements_containing("CREATE KEYSPACE");
    let keyspace = Keyspace::new(
        "app",
        Replication::simple(1),
        true,
        KeyspaceEnsure::default(),
    )
    .unwrap();

    let err = keyspace.ensure_exists(&executor).await.unwrap_err();
    assert!(matches!(err, MapperError::CreateError(_)));
}

// ==========
// = Tables =
// ==========

#[tokio::test]
async fn missing_column_with_add_missing_issues_one_alter_per_column() {
    let executor = MockExecutor::with_responses(vec![vec![
        column_row("id", "uuid"),
        column_row("name", "text"),
    ]]);
    let table = user_table(TableEnsure {
        add_missing: true,
        ..TableEnsure::default()
    });

    table.ensure_exists(&executor).await.unwrap();

    let texts = executor.executed_texts();
    assert_eq!(texts.len(), 2);
    assert_eq!(texts[1], "ALTER TABLE users ADD age int");
}

#[tokio::test]
async fn missing_column_without_add_missing_only_warns() {
    let executor = MockExecutor::with_responses(vec![vec![
        column_row("id", "uuid"),
        column_row("name", "text"),
    ]]);
    let table = user_table(TableEnsure::default());

    table.ensure_exists(&executor).await.unwrap();
    assert_eq!(executor.executed_texts().len(), 1);
}

#[tokio::test]
async fn mismatched_column_with_recreate_column_drops_then_adds() {
    let executor = MockExecutor::with_responses(vec![vec![
        column_row("id", "uuid"),
        column_row("name", "blob"),
        column_row("age", "int"),
    ]]);
    let table = user_table(TableEnsure {
        recreate_column: true,
        ..TableEnsure::default()
    });

    table.ensure_exists(&executor).await.unwrap();

    let texts = executor.executed_texts();
    assert_eq!(
        &texts[1..],
        &[
            "ALTER TABLE users DROP name".to_string(),
            "ALTER TABLE users ADD name text".to_string(),
        ]
    );
}

#[tokio::test]
async fn extra_column_with_remove_extra_is_dropped() {
    let executor = MockExecutor::with_responses(vec![vec![
        column_row("id", "uuid"),
        column_row("name", "text"),
        column_row("age", "int"),
        column_row("legacy", "text"),
    ]]);
    let table = user_table(TableEnsure {
        remove_extra: true,
        ..TableEnsure::default()
    });

    table.ensure_exists(&executor).await.unwrap();
    assert_eq!(
        executor.executed_texts()[1],
        "ALTER TABLE users DROP legacy"
    );
}

#[tokio::test]
async fn recreate_takes_precedence_over_field_level_flags() {
    let executor = MockExecutor::with_responses(vec![vec![
        column_row("id", "uuid"),
        column_row("name", "blob"),
    ]]);
    let table = user_table(TableEnsure {
        recreate: true,
        recreate_column: true,
        add_missing: true,
        ..TableEnsure::default()
    });

    table.ensure_exists(&executor).await.unwrap();

    let texts = executor.executed_texts();
    assert_eq!(texts.len(), 3);
    assert_eq!(texts[1], "DROP TABLE IF EXISTS users");
    assert!(texts[2].starts_with("CREATE TABLE IF NOT EXISTS users"));
}

#[tokio::test]
async fn absent_table_create_includes_composite_key_layout() {
    let registry = TypeRegistry::new();
    let schema = Schema::new(
        vec![
            Column::new("id", registry.parse_type("uuid").unwrap()),
            Column::new("name", registry.parse_type("text").unwrap()),
            Column::new("loc", registry.parse_type("text").unwrap()),
        ],
        PrimaryKey::new(["id", "name"], ["loc"]),
    )
    .unwrap();
    let table = Table::new("app", "users", schema, registry, TableEnsure::default()).unwrap();

    let executor = MockExecutor::new();
    table.ensure_exists(&executor).await.unwrap();

    assert_eq!(
        executor.executed_texts()[1],
        "CREATE TABLE IF NOT EXISTS users \
         (id uuid, name text, loc text, PRIMARY KEY ((id, name), loc))"
    );
}

#[tokio::test]
async fn live_types_compare_canonically() {
    // Whitespace and varchar aliasing in live metadata must not register
    // as a mismatch.
    let executor = MockExecutor::with_responses(vec![vec![
        column_row("id", "uuid"),
        column_row("name", "varchar"),
        column_row("age", " int "),
    ]]);
    let table = user_table(TableEnsure {
        recreate_column: true,
        remove_extra: true,
        add_missing: true,
        ..TableEnsure::default()
    });

    table.ensure_exists(&executor).await.unwrap();
    assert_eq!(executor.executed_texts().len(), 1);
}

// ======================
// = User Defined Types =
// ======================

#[tokio::test]
async fn absent_udt_is_created() {
    let executor = MockExecutor::new();
    let udt = address_udt(UdtEnsure::default());

    udt.ensure_exists(&executor).await.unwrap();

    let texts = executor.executed_texts();
    assert!(texts[0].starts_with("SELECT * FROM system.schema_usertypes"));
    assert_eq!(
        texts[1],
        "CREATE TYPE IF NOT EXISTS address (street text, zip int)"
    );
}

#[tokio::test]
async fn udt_field_mismatch_with_change_type_alters_in_place() {
    let live = Row::new(vec![
        (
            "field_names".to_string(),
            CqlValue::List(vec![
                CqlValue::Text("street".to_string()),
                CqlValue::Text("zip".to_string()),
            ]),
        ),
        (
            "field_types".to_string(),
            CqlValue::List(vec![
                CqlValue::Text("text".to_string()),
                CqlValue::Text("text".to_string()),
            ]),
        ),
    ]);
    let executor = MockExecutor::with_responses(vec![vec![live]]);
    let udt = address_udt(UdtEnsure {
        change_type: true,
        ..UdtEnsure::default()
    });

    udt.ensure_exists(&executor).await.unwrap();
    assert_eq!(
        executor.executed_texts()[1],
        "ALTER TYPE address ALTER zip TYPE int"
    );
}

#[tokio::test]
async fn udt_missing_field_with_add_missing_is_added() {
    let live = Row::new(vec![
        (
            "field_names".to_string(),
            CqlValue::List(vec![CqlValue::Text("street".to_string())]),
        ),
        (
            "field_types".to_string(),
            CqlValue::List(vec![CqlValue::Text("text".to_string())]),
        ),
    ]);
    let executor = MockExecutor::with_responses(vec![vec![live]]);
    let udt = address_udt(UdtEnsure {
        add_missing: true,
        ..UdtEnsure::default()
    });

    udt.ensure_exists(&executor).await.unwrap();
    assert_eq!(executor.executed_texts()[1], "ALTER TYPE address ADD zip int");
}

#[test]
fn field_diffs_are_computable_directly() {
    use std::collections::BTreeMap;

    use cqlmap::FieldDiff;

    let desired = vec![
        ("id".to_string(), "uuid".to_string()),
        ("age".to_string(), "int".to_string()),
    ];
    let mut live = BTreeMap::new();
    live.insert("id".to_string(), "uuid".to_string());
    live.insert("age".to_string(), "text".to_string());

    let diff = FieldDiff::compare(&desired, &live);
    assert_eq!(diff.mismatched, vec!["age"]);
    assert!(diff.missing.is_empty());
    assert!(diff.extra.is_empty());
    assert!(!diff.is_clean());
}

// ====================
// = Model-level pass =
// ====================

#[tokio::test]
async fn udts_reconcile_before_the_table() {
    let executor = MockExecutor::new();
    let udt = address_udt(UdtEnsure::default());
    let table = user_table(TableEnsure::default());

    ensure_model_schema(&executor, &[udt], &table).await.unwrap();

    let texts = executor.executed_texts();
    assert!(texts[0].contains("system.schema_usertypes"));
    assert!(texts[1].starts_with("CREATE TYPE"));
    assert!(texts[2].contains("system.schema_columns"));
    assert!(texts[3].starts_with("CREATE TABLE"));
}

#[tokio::test]
async fn model_pass_short_circuits_on_first_failure() {
    let executor = MockExecutor::new();
    executor.fail_statements_containing("CREATE TYPE");
    let udt = address_udt(UdtEnsure::default());
    let table = user_table(TableEnsure::default());

    let err = ensure_model_schema(&executor, &[udt], &table)
        .await
        .unwrap_err();
    assert!(matches!(err, MapperError::CreateError(_)));
    // The table was never probed.
    assert!(
        executor
            .executed_texts()
            .iter()
            .all(|t| !t.contains("system.schema_columns"))
    );
}
