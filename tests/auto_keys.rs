//! AutoKey assignment.

mod common;

use assert_matches::assert_matches;
use common::{for_each_engine, user, UserRow};
use isodb::prelude::*;

fn add_n<E: StorageEngine>(db: &Database<E>, n: u32) -> Vec<u32> {
    db.transact(|tx| {
        let users = tx.table::<AutoKey, UserRow>("users")?;
        (0..n)
            .map(|i| users.add(&user(&format!("user{i}"), None, i)).map(|k| k.0))
            .collect()
    })
    .unwrap()
}

fn test_keys_start_at_one_and_increase<E: StorageEngine>(db: &Database<E>) {
    assert_eq!(add_n(db, 5), vec![1, 2, 3, 4, 5]);
    assert_eq!(add_n(db, 2), vec![6, 7]);

    let last = db
        .transact_readonly(|tx| tx.table::<AutoKey, UserRow>("users")?.get_last_key())
        .unwrap();
    assert_eq!(last, Some(AutoKey(7)));
}

fn test_removed_keys_are_not_reused<E: StorageEngine>(db: &Database<E>) {
    add_n(db, 3);

    db.transact(|tx| {
        let users = tx.table::<AutoKey, UserRow>("users")?;
        users.remove(AutoKey(3))?;
        users.remove(AutoKey(2))?;
        Ok(())
    })
    .unwrap();
    assert_eq!(add_n(db, 1), vec![4]);

    // removing the newest row inside the same transaction as the add
    let key = db
        .transact(|tx| {
            let users = tx.table::<AutoKey, UserRow>("users")?;
            users.remove(AutoKey(4))?;
            users.add(&user("late", None, 1))
        })
        .unwrap();
    assert_eq!(key, AutoKey(5));
}

fn test_counter_survives_clearing_the_table<E: StorageEngine>(db: &Database<E>) {
    add_n(db, 4);

    db.transact(|tx| tx.table::<AutoKey, UserRow>("users")?.remove_range(&KeyRange::all()))
        .unwrap();
    assert_eq!(add_n(db, 1), vec![5]);

    db.transact(|tx| tx.table::<AutoKey, UserRow>("users")?.clear())
        .unwrap();
    assert_eq!(add_n(db, 1), vec![6]);
}

fn test_explicit_set_moves_the_counter<E: StorageEngine>(db: &Database<E>) {
    add_n(db, 1);
    db.transact(|tx| {
        tx.table::<AutoKey, UserRow>("users")?
            .set(AutoKey(40), &user("manual", None, 40))
    })
    .unwrap();
    assert_eq!(add_n(db, 1), vec![41]);
}

fn test_removed_explicit_key_is_not_reused<E: StorageEngine>(db: &Database<E>) {
    db.transact(|tx| {
        let users = tx.table::<AutoKey, UserRow>("users")?;
        users.set(AutoKey(40), &user("manual", None, 40))?;
        users.remove(AutoKey(40))?;
        Ok(())
    })
    .unwrap();
    assert_eq!(add_n(db, 1), vec![41]);

    // a lower explicit key leaves the counter where it is
    db.transact(|tx| {
        let users = tx.table::<AutoKey, UserRow>("users")?;
        users.set(AutoKey(7), &user("low", None, 7))?;
        users.remove(AutoKey(7))?;
        Ok(())
    })
    .unwrap();
    assert_eq!(add_n(db, 1), vec![42]);
}

fn test_rolled_back_add_leaves_no_trace<E: StorageEngine>(db: &Database<E>) {
    add_n(db, 2);

    let result: IsoDbResult<()> = db.transact(|tx| {
        tx.table::<AutoKey, UserRow>("users")?
            .add(&user("ghost", None, 0))?;
        Err(IsoDbError::Unsupported("abort".into()))
    });
    assert!(result.is_err());

    assert_eq!(add_n(db, 1), vec![3]);
    let count = db
        .transact_readonly(|tx| tx.table::<AutoKey, UserRow>("users")?.count(&KeyRange::all()))
        .unwrap();
    assert_eq!(count, 3);
}

fn test_add_requires_auto_key<E: StorageEngine>(db: &Database<E>) {
    let result = db.transact(|tx| {
        tx.table::<Uint32Key, String>("numbers")?
            .add(&"nope".to_string())
    });
    assert_matches!(
        result,
        Err(IsoDbError::Schema(SchemaError::NotAutoKey { ref table, .. })) if table == "numbers"
    );
}

for_each_engine!(
    test_keys_start_at_one_and_increase,
    test_removed_keys_are_not_reused,
    test_counter_survives_clearing_the_table,
    test_explicit_set_moves_the_counter,
    test_removed_explicit_key_is_not_reused,
    test_rolled_back_add_leaves_no_trace,
    test_add_requires_auto_key,
);

#[cfg(feature = "sled")]
#[test]
fn test_counter_persists_across_reopen_sled() {
    let dir = tempfile::TempDir::new().unwrap();
    let open = || {
        let store = SledStore::new(common::file_config(&dir, "sled")).unwrap();
        open_db(store, common::schema()).unwrap()
    };

    let db = open();
    assert_eq!(add_n(&db, 3), vec![1, 2, 3]);
    db.transact(|tx| tx.table::<AutoKey, UserRow>("users")?.clear())
        .unwrap();
    db.close().unwrap();

    let db = open();
    assert_eq!(add_n(&db, 1), vec![4]);
}

#[cfg(feature = "redb")]
#[test]
fn test_counter_persists_across_reopen_redb() {
    let dir = tempfile::TempDir::new().unwrap();
    let open = || {
        let store = RedbStore::new(common::file_config(&dir, "store.redb")).unwrap();
        open_db(store, common::schema()).unwrap()
    };

    let db = open();
    assert_eq!(add_n(&db, 3), vec![1, 2, 3]);
    db.transact(|tx| tx.table::<AutoKey, UserRow>("users")?.remove(AutoKey(3)))
        .unwrap();
    db.close().unwrap();

    let db = open();
    assert_eq!(add_n(&db, 1), vec![4]);
}
