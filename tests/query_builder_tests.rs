use cqlmap::{
    Action, ChangeTracker, Column, CqlValue, MapperError, PredicateOp, PrimaryKey, Query, Schema,
    SortOrder, TypeRegistry,
};

fn user_schema() -> Schema {
    let registry = TypeRegistry::new();
    let columns = vec![
        Column::new("id", registry.parse_type("uuid").unwrap()),
        Column::new("name", registry.parse_type("text").unwrap()),
        Column::new("loc", registry.parse_type("text").unwrap()),
        Column::new("age", registry.parse_type("int").unwrap()),
        Column::new("email", registry.parse_type("text").unwrap()),
        Column::new("thngs", registry.parse_type("list<text>").unwrap()),
        Column::new("projs", registry.parse_type("set<timeuuid>").unwrap()),
        Column::new("hash", registry.parse_type("map<text,inet>").unwrap()),
    ];
    Schema::new(columns, PrimaryKey::new(["id", "name"], ["loc"])).unwrap()
}

fn counter_schema() -> Schema {
    let registry = TypeRegistry::new();
    let columns = vec![
        Column::new("name", registry.parse_type("text").unwrap()),
        Column::new("num", registry.parse_type("counter").unwrap()),
    ];
    Schema::new(columns, PrimaryKey::new(["name"], None::<&str>)).unwrap()
}

fn no_changes() -> ChangeTracker {
    ChangeTracker::new()
}

#[test]
fn select_emits_clauses_in_fixed_order() {
    let query = Query::new(Action::Select, "users")
        .where_eq("name", "Dakota")
        .where_op("age", PredicateOp::Gte, 5)
        .order_by("loc", SortOrder::Desc)
        .limit(99)
        .allow_filtering(true);
    let statement = query.compile(&user_schema(), &no_changes()).unwrap();

    assert_eq!(
        statement.text,
        "SELECT id, name, loc, age, email, thngs, projs, hash FROM users \
         WHERE name = ? AND age >= ? ORDER BY loc DESC LIMIT 99 ALLOW FILTERING"
    );
    assert_eq!(statement.text.matches("WHERE").count(), 1);
    assert_eq!(statement.text.matches("ORDER BY").count(), 1);
    assert_eq!(statement.text.matches("LIMIT").count(), 1);
    assert_eq!(
        statement.params,
        vec![CqlValue::Text("Dakota".into()), CqlValue::Int(5)]
    );
    assert!(statement.prepare);
}

#[test]
fn select_predicate_order_follows_schema_declaration_not_call_order() {
    // age is declared after name, so it must come second no matter the
    // call order.
    let query = Query::new(Action::Select, "users")
        .where_op("age", PredicateOp::Gte, 5)
        .where_eq("name", "Dakota");
    let statement = query.compile(&user_schema(), &no_changes()).unwrap();
    assert!(statement.text.contains("WHERE name = ? AND age >= ?"));
    assert_eq!(
        statement.params,
        vec![CqlValue::Text("Dakota".into()), CqlValue::Int(5)]
    );
}

#[test]
fn select_projection_uses_explicit_selectors() {
    let query = Query::new(Action::Select, "users").select("email").select("age");
    let statement = query.compile(&user_schema(), &no_changes()).unwrap();
    assert_eq!(statement.text, "SELECT email, age FROM users");
}

#[test]
fn compile_does_not_consume_the_descriptor() {
    let query = Query::new(Action::Select, "users").where_eq("name", "Dakota");
    let schema = user_schema();
    let first = query.compile(&schema, &no_changes()).unwrap();
    let second = query.compile(&schema, &no_changes()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn update_keeps_append_then_remove_as_separate_fragments() {
    let mut pending = ChangeTracker::new();
    pending.record_append("thngs", CqlValue::Text("dog".into()));
    pending.record_remove("thngs", CqlValue::Text("dog".into()));

    let query = Query::new(Action::Update, "users")
        .where_eq("id", CqlValue::Uuid(uuid::Uuid::new_v4()))
        .where_eq("name", "Dakota")
        .where_eq("loc", "SF");
    let statement = query.compile(&user_schema(), &pending).unwrap();

    assert!(
        statement
            .text
            .contains("SET thngs = thngs + ?, thngs = thngs - ?"),
        "collection mutations must not collapse: {}",
        statement.text
    );
    assert_eq!(
        &statement.params[..2],
        &[
            CqlValue::List(vec![CqlValue::Text("dog".into())]),
            CqlValue::List(vec![CqlValue::Text("dog".into())]),
        ]
    );
}

#[test]
fn update_emits_type_appropriate_collection_clauses() {
    let mut pending = ChangeTracker::new();
    pending.record_prepend("thngs", CqlValue::Text("dragon".into()));
    let tid = CqlValue::TimeUuid(uuid::Uuid::new_v4());
    pending.record_add("projs", tid.clone());
    pending.record_inject_at_key(
        "hash",
        CqlValue::Text("dog".into()),
        CqlValue::Inet("127.0.0.1".parse().unwrap()),
    );
    pending.record_remove_key("hash", CqlValue::Text("feline".into()));

    let query = Query::new(Action::Update, "users")
        .where_eq("id", CqlValue::Uuid(uuid::Uuid::new_v4()))
        .where_eq("name", "n")
        .where_eq("loc", "l");
    let statement = query.compile(&user_schema(), &pending).unwrap();

    assert!(statement.text.contains("thngs = ? + thngs"));
    assert!(statement.text.contains("projs = projs + ?"));
    assert!(statement.text.contains("hash[?] = ?"));
    assert!(statement.text.contains("hash = hash - ?"));
    assert_eq!(statement.params[1], CqlValue::Set(vec![tid]));
}

#[test]
fn update_inject_null_keeps_null_operand() {
    let mut pending = ChangeTracker::new();
    pending.record_inject_at_index("thngs", 0, CqlValue::Null);

    let query = Query::new(Action::Update, "users")
        .where_eq("id", CqlValue::Uuid(uuid::Uuid::new_v4()))
        .where_eq("name", "n")
        .where_eq("loc", "l");
    let statement = query.compile(&user_schema(), &pending).unwrap();

    assert!(statement.text.contains("thngs[?] = ?"));
    assert_eq!(
        &statement.params[..2],
        &[CqlValue::Int(0), CqlValue::Null]
    );
}

#[test]
fn update_counter_delta_uses_plus_and_minus() {
    let mut pending = ChangeTracker::new();
    pending.record_increment("num", 5);
    let query = Query::new(Action::Update, "counters").where_eq("name", "hits");
    let statement = query.compile(&counter_schema(), &pending).unwrap();
    assert!(statement.text.contains("SET num = num + ?"));

    let mut pending = ChangeTracker::new();
    pending.record_increment("num", -7);
    let statement = query.compile(&counter_schema(), &pending).unwrap();
    assert!(statement.text.contains("SET num = num - ?"));
    assert_eq!(statement.params[0], CqlValue::Int(7));
}

#[test]
fn update_using_and_lwt_clause_placement() {
    let mut pending = ChangeTracker::new();
    pending.record_set("email", CqlValue::Text("d@d.d".into()));

    let query = Query::new(Action::Update, "users")
        .using_ttl(44300)
        .using_timestamp(1337)
        .where_eq("id", CqlValue::Uuid(uuid::Uuid::new_v4()))
        .where_eq("name", "Dakota")
        .where_eq("loc", "SF")
        .if_condition("age", PredicateOp::Gte, 5);
    let statement = query.compile(&user_schema(), &pending).unwrap();

    let using = statement.text.find("USING TTL 44300 AND TIMESTAMP 1337").unwrap();
    let set = statement.text.find("SET email = ?").unwrap();
    let where_at = statement.text.find("WHERE").unwrap();
    let if_at = statement.text.find("IF age >= ?").unwrap();
    assert!(using < set && set < where_at && where_at < if_at);
    // SET params, then WHERE params, then IF params.
    assert_eq!(statement.params[0], CqlValue::Text("d@d.d".into()));
    assert_eq!(statement.params[statement.params.len() - 1], CqlValue::Int(5));
}

#[test]
fn insert_lists_columns_in_declaration_order() {
    let mut pending = ChangeTracker::new();
    pending.record_set("email", CqlValue::Text("dakota@dakota.dakota".into()));
    pending.record_set("name", CqlValue::Text("Dakota".into()));
    let id = uuid::Uuid::new_v4();
    pending.record_set("id", CqlValue::Uuid(id));
    pending.record_set("loc", CqlValue::Text("SF".into()));

    let query = Query::new(Action::Insert, "users")
        .if_not_exists(true)
        .using_ttl(4430);
    let statement = query.compile(&user_schema(), &pending).unwrap();

    assert_eq!(
        statement.text,
        "INSERT INTO users (id, name, loc, email) VALUES (?, ?, ?, ?) IF NOT EXISTS USING TTL 4430"
    );
    assert_eq!(statement.params[0], CqlValue::Uuid(id));
    assert_eq!(statement.params[3], CqlValue::Text("dakota@dakota.dakota".into()));
}

#[test]
fn insert_requires_every_key_column() {
    let mut pending = ChangeTracker::new();
    pending.record_set("id", CqlValue::Uuid(uuid::Uuid::new_v4()));
    pending.record_set("name", CqlValue::Text("Dakota".into()));
    // loc (clustering) missing
    let query = Query::new(Action::Insert, "users");
    let err = query.compile(&user_schema(), &pending).unwrap_err();
    assert!(matches!(err, MapperError::BuildError(msg) if msg.contains("loc")));
}

#[test]
fn update_requires_equality_on_every_key_column() {
    let mut pending = ChangeTracker::new();
    pending.record_set("email", CqlValue::Text("x@y.z".into()));
    let query = Query::new(Action::Update, "users")
        .where_eq("id", CqlValue::Uuid(uuid::Uuid::new_v4()))
        .where_eq("name", "Dakota");
    let err = query.compile(&user_schema(), &pending).unwrap_err();
    assert!(matches!(err, MapperError::BuildError(msg) if msg.contains("loc")));
}

#[test]
fn delete_scopes_to_columns_and_timestamp() {
    let query = Query::new(Action::Delete, "users")
        .select_columns(["email", "age"])
        .using_timestamp(555)
        .where_eq("id", CqlValue::Uuid(uuid::Uuid::new_v4()))
        .where_eq("name", "Dakota")
        .where_eq("loc", "SF");
    let statement = query.compile(&user_schema(), &no_changes()).unwrap();
    assert!(statement.text.starts_with("DELETE email, age FROM users USING TIMESTAMP 555 WHERE"));
}

#[test]
fn delete_forbids_ttl() {
    let query = Query::new(Action::Delete, "users").using_ttl(10);
    let err = query.compile(&user_schema(), &no_changes()).unwrap_err();
    assert!(matches!(err, MapperError::BuildError(msg) if msg.contains("TTL")));
}

#[test]
fn if_exists_and_field_condition_are_mutually_exclusive() {
    let mut pending = ChangeTracker::new();
    pending.record_set("email", CqlValue::Text("x@y.z".into()));
    let query = Query::new(Action::Update, "users")
        .if_exists(true)
        .if_condition("age", PredicateOp::Gte, 5)
        .where_eq("id", CqlValue::Uuid(uuid::Uuid::new_v4()))
        .where_eq("name", "n")
        .where_eq("loc", "l");
    let err = query.compile(&user_schema(), &pending).unwrap_err();
    assert!(matches!(err, MapperError::BuildError(msg) if msg.contains("mutually exclusive")));
}

#[test]
fn count_with_column_selection_fails() {
    let query = Query::new(Action::Select, "users").select("email").count();
    let err = query.compile(&user_schema(), &no_changes()).unwrap_err();
    assert!(matches!(err, MapperError::BuildError(msg) if msg.contains("COUNT(*)")));
}

#[test]
fn predicate_on_unknown_column_fails() {
    let query = Query::new(Action::Select, "users").where_eq("nope", "x");
    let err = query.compile(&user_schema(), &no_changes()).unwrap_err();
    assert!(matches!(err, MapperError::BuildError(msg) if msg.contains("nope")));
}

#[test]
fn order_by_requires_a_clustering_column() {
    let query = Query::new(Action::Select, "users").order_by("email", SortOrder::Asc);
    let err = query.compile(&user_schema(), &no_changes()).unwrap_err();
    assert!(matches!(err, MapperError::BuildError(msg) if msg.contains("clustering")));
}

#[test]
fn set_on_counter_column_fails() {
    let mut pending = ChangeTracker::new();
    pending.record_set("num", CqlValue::Int(9));
    let query = Query::new(Action::Update, "counters").where_eq("name", "hits");
    let err = query.compile(&counter_schema(), &pending).unwrap_err();
    assert!(matches!(err, MapperError::BuildError(msg) if msg.contains("counter")));
}

#[test]
fn increment_on_non_counter_column_fails() {
    let mut pending = ChangeTracker::new();
    pending.record_increment("age", 1);
    let query = Query::new(Action::Update, "users")
        .where_eq("id", CqlValue::Uuid(uuid::Uuid::new_v4()))
        .where_eq("name", "n")
        .where_eq("loc", "l");
    let err = query.compile(&user_schema(), &pending).unwrap_err();
    assert!(matches!(err, MapperError::BuildError(msg) if msg.contains("counter")));
}
