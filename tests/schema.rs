//! Opening databases with valid and invalid schemas.

mod common;

use assert_matches::assert_matches;
use isodb::prelude::*;

#[test]
fn test_open_creates_every_namespace() {
    let harness = common::memory();
    let names: Vec<String> = harness
        .db
        .schema()
        .namespaces()
        .into_iter()
        .map(|(name, _)| name)
        .collect();
    assert_eq!(
        names,
        vec![
            "numbers",
            "words",
            "blobs",
            "users",
            "users#by_email",
            "users#by_age",
            "object#auth",
            "#meta",
        ]
    );

    let tables: Vec<&str> = harness.db.schema().table_names().collect();
    assert_eq!(tables, vec!["numbers", "words", "blobs", "users"]);

    harness
        .db
        .transact_readonly(|tx| {
            assert_eq!(tx.schema().table_names().count(), 4);
            Ok(())
        })
        .unwrap();
}

#[test]
fn test_open_rejects_reserved_characters() {
    let schema = DbDef::new().table(TableDef::<Uint32Key, String>::new("a#b"));
    assert_matches!(
        open_db(MemoryStore::new(), schema).map(|_| ()),
        Err(IsoDbError::Schema(SchemaError::InvalidName(ref name))) if name == "a#b"
    );

    let index = TableDef::<Uint32Key, String>::new("t")
        .with_index(IndexDef::new("", |_key, value: &String| Some(StringKey::from(value.as_str()))));
    assert_matches!(
        open_db(MemoryStore::new(), DbDef::new().table(index)).map(|_| ()),
        Err(IsoDbError::Schema(SchemaError::InvalidName(_)))
    );

    let object = DbDef::new().object(ObjectDef::new("x#y"));
    assert_matches!(
        open_db(MemoryStore::new(), object).map(|_| ()),
        Err(IsoDbError::Schema(SchemaError::InvalidName(_)))
    );
}

#[test]
fn test_open_rejects_duplicate_names() {
    let schema = DbDef::new()
        .table(TableDef::<Uint32Key, String>::new("things"))
        .table(TableDef::<StringKey, String>::new("things"));
    assert_matches!(
        open_db(MemoryStore::new(), schema).map(|_| ()),
        Err(IsoDbError::Schema(SchemaError::DuplicateName(ref name))) if name == "things"
    );

    let objects = DbDef::new()
        .object(ObjectDef::new("auth"))
        .object(ObjectDef::new("auth"));
    assert_matches!(
        open_db(MemoryStore::new(), objects).map(|_| ()),
        Err(IsoDbError::Schema(SchemaError::DuplicateName(_)))
    );
}

#[test]
fn test_same_schema_opens_twice_on_one_engine() {
    let store = MemoryStore::new();
    let first = open_db(store.clone(), common::schema()).unwrap();
    first
        .transact(|tx| tx.table::<StringKey, String>("words")?.set("shared", &"1".to_string()))
        .unwrap();
    assert_eq!(store.len("words"), 1);

    let second = open_db(store, common::schema()).unwrap();
    let shared = second
        .transact_readonly(|tx| tx.table::<StringKey, String>("words")?.get("shared"))
        .unwrap();
    assert_eq!(shared.as_deref(), Some("1"));
}

#[test]
fn test_table_type_checks_happen_at_lookup() {
    let harness = common::memory();
    let result = harness
        .db
        .transact_readonly(|tx| tx.table::<Uint32Key, common::UserRow>("users").map(|_| ()));
    assert_matches!(
        result,
        Err(IsoDbError::Schema(SchemaError::TypeMismatch { ref target, .. })) if target == "users key"
    );
}
