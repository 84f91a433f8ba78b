//! End-to-end behavior of the generic operations against SQLite files.

mod common;

use std::collections::HashSet;
use std::time::Duration;

use common::{default_db, file_db, users, Address, Event, User};
use quarry_core::{Direction, Entity, EntityBase, OnMultiple, Query, Record, Value};
use quarry_db::{ConnectionError, DataError};

// =============================================================================
// Create
// =============================================================================

#[tokio::test]
async fn test_create_one_assigns_key_and_timestamps() {
    let (db, _dir) = default_db().await;

    let stored = db
        .create_one(User::new("Ada", "Lovelace", "ada@example.com"))
        .await
        .unwrap();

    let pkid = stored.id();
    assert!(uuid::Uuid::parse_str(&pkid).is_ok());
    let created = stored.base.date_created.unwrap();
    assert_eq!(stored.base.date_updated, Some(created));

    let found = db
        .read_one_record(&Query::<User>::by_key(pkid.as_str()), OnMultiple::Fail)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found, stored);
}

#[tokio::test]
async fn test_create_one_keeps_caller_key() {
    let (db, _dir) = default_db().await;

    let mut user = User::new("Grace", "Hopper", "grace@example.com");
    user.base = EntityBase::with_pkid("caller-chosen-id");
    let stored = db.create_one(user).await.unwrap();

    assert_eq!(stored.id(), "caller-chosen-id");
}

#[tokio::test]
async fn test_duplicate_unique_value_is_conflict() {
    let (db, _dir) = default_db().await;

    db.create_one(User::new("A", "One", "same@example.com"))
        .await
        .unwrap();
    let err = db
        .create_one(User::new("B", "Two", "same@example.com"))
        .await
        .unwrap_err();

    assert!(matches!(err, DataError::Conflict { ref table, .. } if table == "users"));
    assert_eq!(db.count_query(&Query::<User>::new()).await.unwrap(), 1);
}

#[tokio::test]
async fn test_missing_foreign_key_target_is_integrity_error() {
    let (db, _dir) = default_db().await;

    let err = db
        .create_one(Address {
            base: EntityBase::new(),
            city: "Nowhere".to_string(),
            user_id: "no-such-user".to_string(),
        })
        .await
        .unwrap_err();

    assert!(matches!(err, DataError::Integrity { .. }));
}

#[tokio::test]
async fn test_value_too_long_is_invalid() {
    let (db, _dir) = default_db().await;

    let err = db
        .create_one(User::new(&"x".repeat(51), "Long", "long@example.com"))
        .await
        .unwrap_err();

    assert!(matches!(err, DataError::Invalid(_)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_creates_get_distinct_keys() {
    let (db, _dir) = default_db().await;

    let handles: Vec<_> = users(100, "concurrent")
        .into_iter()
        .map(|user| {
            let db = db.clone();
            tokio::spawn(async move { db.create_one(user).await })
        })
        .collect();

    let mut keys = HashSet::new();
    for handle in handles {
        let stored = handle.await.unwrap().unwrap();
        assert!(keys.insert(stored.id()));
    }

    assert_eq!(keys.len(), 100);
    assert_eq!(db.count_query(&Query::<User>::new()).await.unwrap(), 100);
}

#[tokio::test]
async fn test_autoincrement_keys_are_assigned_by_store() {
    let (db, _dir) = default_db().await;

    let first = db.create_one(Event::new("boot")).await.unwrap();
    let second = db.create_one(Event::new("ready")).await.unwrap();

    let a = first.primary_key().and_then(Value::as_i64).unwrap();
    let b = second.primary_key().and_then(Value::as_i64).unwrap();
    assert!(b > a);

    assert_eq!(
        db.create_many(&[Event::new("x"), Event::new("y")]).await.unwrap(),
        2
    );
    let removed: Event = db.delete_one(a).await.unwrap();
    assert_eq!(removed.name, "boot");
}

// =============================================================================
// Create Many
// =============================================================================

#[tokio::test]
async fn test_create_many_empty_input() {
    let (db, _dir) = default_db().await;
    assert_eq!(db.create_many::<User>(&[]).await.unwrap(), 0);
}

#[tokio::test]
async fn test_create_many_spans_chunks() {
    let (db, _dir) = file_db(|s| s.batch_chunk_size(7)).await;

    let inserted = db.create_many(&users(50, "bulk")).await.unwrap();

    assert_eq!(inserted, 50);
    assert_eq!(
        db.count_query(&Query::<User>::new().eq("last_name", "bulk"))
            .await
            .unwrap(),
        50
    );
}

#[tokio::test]
async fn test_create_many_is_atomic_and_names_the_conflict() {
    let (db, _dir) = file_db(|s| s.batch_chunk_size(10)).await;

    let existing = db
        .create_one(User::new("Old", "Timer", "taken@example.com"))
        .await
        .unwrap();

    let mut batch = users(25, "batch");
    batch[17].email = Some("taken@example.com".to_string());
    batch[17].base = EntityBase::with_pkid("the-culprit");

    let err = db.create_many(&batch).await.unwrap_err();
    match err {
        DataError::Conflict { index, pkid, .. } => {
            assert_eq!(index, Some(17));
            assert_eq!(pkid.as_deref(), Some("the-culprit"));
        }
        other => panic!("expected Conflict, got {other:?}"),
    }

    // Nothing from the batch was stored, even the chunks before the failure.
    let all = db
        .read_query(&Query::<User>::new(), 0, 100)
        .await
        .unwrap();
    assert_eq!(all, vec![existing]);
}

#[tokio::test]
async fn test_create_many_rejects_invalid_entity_before_writing() {
    let (db, _dir) = default_db().await;

    let mut batch = users(3, "invalid");
    batch[1].last_name = "y".repeat(80);

    let err = db.create_many(&batch).await.unwrap_err();
    assert!(matches!(err, DataError::Invalid(ref msg) if msg.contains("batch index 1")));
    assert_eq!(db.count_query(&Query::<User>::new()).await.unwrap(), 0);
}

// =============================================================================
// Read
// =============================================================================

#[tokio::test]
async fn test_pagination_visits_every_row_once() {
    let (db, _dir) = default_db().await;

    // Every row shares a last_name, so ordering falls back to the key.
    db.create_many(&users(47, "page")).await.unwrap();

    let query = Query::<User>::new().order_by("last_name", Direction::Asc);
    let mut seen = HashSet::new();
    let mut offset = 0;
    loop {
        let page = db.read_query(&query, offset, 10).await.unwrap();
        if page.is_empty() {
            break;
        }
        for user in &page {
            assert!(seen.insert(user.id()), "row returned twice");
        }
        offset += page.len() as u64;
    }

    assert_eq!(seen.len(), 47);
}

#[tokio::test]
async fn test_read_query_filters_and_orders() {
    let (db, _dir) = default_db().await;
    db.create_many(&users(5, "keep")).await.unwrap();
    db.create_many(&users(3, "skip")).await.unwrap();

    let page = db
        .read_query(
            &Query::<User>::new()
                .eq("last_name", "keep")
                .order_by("first_name", Direction::Desc),
            0,
            10,
        )
        .await
        .unwrap();

    let names: Vec<&str> = page.iter().map(|u| u.first_name.as_str()).collect();
    assert_eq!(names, vec!["First4", "First3", "First2", "First1", "First0"]);
}

#[tokio::test]
async fn test_read_query_limits() {
    let (db, _dir) = file_db(|s| s.max_page_size(20)).await;
    let query = Query::<User>::new();

    assert!(matches!(
        db.read_query(&query, 0, 0).await,
        Err(DataError::Invalid(_))
    ));
    assert_eq!(
        db.read_query(&query, 0, 21).await,
        Err(DataError::LimitExceeded {
            requested: 21,
            max: 20
        })
    );
    assert!(db.read_query(&query, 0, 20).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_unknown_filter_column_is_invalid() {
    let (db, _dir) = default_db().await;

    let err = db
        .read_query(&Query::<User>::new().eq("shoe_size", 42), 0, 10)
        .await
        .unwrap_err();
    assert!(matches!(err, DataError::Invalid(_)));
}

#[tokio::test]
async fn test_read_one_record_modes() {
    let (db, _dir) = default_db().await;
    db.create_many(&users(2, "twin")).await.unwrap();

    let none = db
        .read_one_record(&Query::<User>::new().eq("last_name", "nobody"), OnMultiple::Fail)
        .await
        .unwrap();
    assert!(none.is_none());

    let twins = Query::<User>::new()
        .eq("last_name", "twin")
        .order_by("first_name", Direction::Asc);

    let first = db
        .read_one_record(&twins, OnMultiple::TakeFirst)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.first_name, "First0");

    assert_eq!(
        db.read_one_record(&twins, OnMultiple::Fail).await,
        Err(DataError::MultipleResults {
            table: "users".to_string()
        })
    );
}

#[tokio::test]
async fn test_in_list_and_null_filters() {
    let (db, _dir) = default_db().await;
    db.create_many(&users(4, "mix")).await.unwrap();
    let mut no_email = User::new("Quiet", "mix", "unused@example.com");
    no_email.email = None;
    db.create_one(no_email).await.unwrap();

    let picked = db
        .count_query(&Query::<User>::new().in_list("first_name", ["First1", "First3"]))
        .await
        .unwrap();
    assert_eq!(picked, 2);

    let empty = db
        .count_query(&Query::<User>::new().in_list("first_name", Vec::<Value>::new()))
        .await
        .unwrap();
    assert_eq!(empty, 0);

    let without = db
        .count_query(&Query::<User>::new().is_null("email"))
        .await
        .unwrap();
    assert_eq!(without, 1);
}

// =============================================================================
// Update
// =============================================================================

#[tokio::test]
async fn test_update_one_applies_values_and_refreshes_timestamp() {
    let (db, _dir) = default_db().await;
    let stored = db
        .create_one(User::new("Ada", "Byron", "ada@example.com"))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(5)).await;
    let updated: User = db
        .update_one(stored.id(), Record::new().with("last_name", "Lovelace"))
        .await
        .unwrap();

    assert_eq!(updated.last_name, "Lovelace");
    assert_eq!(updated.first_name, "Ada");
    assert_eq!(updated.base.date_created, stored.base.date_created);
    assert!(updated.base.date_updated > stored.base.date_updated);
}

#[tokio::test]
async fn test_update_one_errors() {
    let (db, _dir) = default_db().await;
    let stored = db
        .create_one(User::new("Ada", "Byron", "ada@example.com"))
        .await
        .unwrap();

    let missing = db
        .update_one::<User>("no-such-id", Record::new().with("last_name", "X"))
        .await;
    assert!(matches!(missing, Err(DataError::NotFound { .. })));
    let unchanged = db
        .read_one_record(&Query::<User>::by_key(stored.id()), OnMultiple::Fail)
        .await
        .unwrap();
    assert_eq!(unchanged, Some(stored.clone()));

    let rekey = db
        .update_one::<User>(stored.id(), Record::new().with("pkid", "other"))
        .await;
    assert!(matches!(rekey, Err(DataError::Invalid(_))));

    let unknown = db
        .update_one::<User>(stored.id(), Record::new().with("shoe_size", 42))
        .await;
    assert!(matches!(unknown, Err(DataError::Invalid(_))));

    db.create_one(User::new("Other", "Person", "other@example.com"))
        .await
        .unwrap();
    let clash = db
        .update_one::<User>(stored.id(), Record::new().with("email", "other@example.com"))
        .await;
    assert!(matches!(clash, Err(DataError::Conflict { .. })));
}

// =============================================================================
// Delete
// =============================================================================

#[tokio::test]
async fn test_delete_one_returns_prior_state() {
    let (db, _dir) = default_db().await;
    let stored = db
        .create_one(User::new("Gone", "Soon", "gone@example.com"))
        .await
        .unwrap();

    let deleted: User = db.delete_one(stored.id()).await.unwrap();
    assert_eq!(deleted, stored);

    let again = db.delete_one::<User>(stored.id()).await;
    assert!(matches!(again, Err(DataError::NotFound { .. })));
}

#[tokio::test]
async fn test_delete_many_by_key_and_unique_column() {
    let (db, _dir) = file_db(|s| s.batch_chunk_size(3)).await;
    db.create_many(&users(10, "del")).await.unwrap();

    let page = db
        .read_query(&Query::<User>::new(), 0, 10)
        .await
        .unwrap();
    let mut ids: Vec<Value> = page
        .iter()
        .filter(|u| !matches!(u.email.as_deref(), Some("del7@example.com" | "del8@example.com")))
        .take(5)
        .map(|u| Value::from(u.id()))
        .collect();
    ids.push(ids[0].clone());
    ids.push(Value::from("never-existed"));
    ids.push(Value::Null);

    assert_eq!(db.delete_many::<User>("pkid", ids).await.unwrap(), 5);

    let by_email = vec![Value::from("del7@example.com"), Value::from("del8@example.com")];
    assert_eq!(db.delete_many::<User>("email", by_email).await.unwrap(), 2);

    assert_eq!(db.count_query(&Query::<User>::new()).await.unwrap(), 3);
    assert_eq!(db.delete_many::<User>("pkid", vec![]).await.unwrap(), 0);
}

#[tokio::test]
async fn test_delete_many_rejects_non_unique_column() {
    let (db, _dir) = default_db().await;
    db.create_many(&users(2, "same")).await.unwrap();

    let err = db
        .delete_many::<User>("last_name", vec![Value::from("same")])
        .await
        .unwrap_err();
    assert!(matches!(err, DataError::Invalid(_)));
    assert_eq!(db.count_query(&Query::<User>::new()).await.unwrap(), 2);
}

// =============================================================================
// Pool and Lifecycle
// =============================================================================

#[tokio::test]
async fn test_acquire_waits_for_a_free_connection() {
    let (db, _dir) = file_db(|s| s.pool_size(1).max_overflow(0).pool_timeout_seconds(5)).await;

    let held = db.acquire_session().await.unwrap();
    let waiter = {
        let db = db.clone();
        tokio::spawn(async move { db.acquire_session().await.map(|s| s.id()) })
    };

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!waiter.is_finished());

    drop(held);
    assert!(waiter.await.unwrap().is_ok());
}

#[tokio::test]
async fn test_acquire_times_out_when_pool_is_exhausted() {
    let (db, _dir) = file_db(|s| s.pool_size(1).max_overflow(0).pool_timeout_seconds(1)).await;

    let _held = db.acquire_session().await.unwrap();
    let err = db.acquire_session().await.unwrap_err();

    assert!(matches!(err, ConnectionError::Timeout(_)));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_operations_after_close() {
    let (db, _dir) = default_db().await;
    db.close().await;

    assert_eq!(
        db.create_one(User::new("Late", "Comer", "late@example.com"))
            .await
            .unwrap_err(),
        DataError::Connection(ConnectionError::Closed)
    );
    assert_eq!(
        db.count_query(&Query::<User>::new()).await,
        Err(DataError::Connection(ConnectionError::Closed))
    );
}

#[tokio::test]
async fn test_reopen_sees_committed_data() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("persist.db");

    let config = quarry_core::DbSettings::sqlite_file(&path).validate().unwrap();
    let db = quarry_db::Database::open(config.clone()).await.unwrap();
    db.create_schema(&[User::schema()]).await.unwrap();
    db.create_one(User::new("Kept", "Row", "kept@example.com"))
        .await
        .unwrap();
    db.close().await;

    let db = quarry_db::Database::open(config).await.unwrap();
    db.create_schema(&[User::schema()]).await.unwrap();
    assert_eq!(db.count_query(&Query::<User>::new()).await.unwrap(), 1);
}

#[tokio::test]
async fn test_shared_cache_memory_uri_survives_recycle_period() {
    let config = quarry_core::DbSettings::new("sqlite+aiosqlite:///:memory:?cache=shared")
        .pool_recycle_seconds(1)
        .validate()
        .unwrap();
    assert!(config.is_memory());

    let db = quarry_db::Database::open(config).await.unwrap();
    db.create_schema(&[User::schema()]).await.unwrap();
    db.create_one(User::new("Still", "Here", "still@example.com"))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_secs(2)).await;

    assert_eq!(db.count_query(&Query::<User>::new()).await.unwrap(), 1);
}
