//! Integration tests for user, session and preference queries.
//!
//! Each test runs against its own `TestDb` and tears it down on completion.

use chrono::{Duration, Utc};
use uuid::Uuid;

use plateful_db::pool;
use plateful_db::queries::{preferences, sessions, users};
use plateful_test_utils::{TestDb, seeded_user};

#[tokio::test]
async fn insert_and_fetch_user() {
    let db = TestDb::new().await;
    let pool = db.pool.clone();

    let user = users::insert_user(&pool, "ana", "Ana Ortiz", Some("batch cooks on sundays"))
        .await
        .expect("insert_user should succeed");
    assert_eq!(user.handle, "ana");

    let by_id = users::get_user(&pool, user.id).await.unwrap();
    assert_eq!(by_id, Some(user.clone()));

    let by_handle = users::get_user_by_handle(&pool, "ana").await.unwrap();
    assert_eq!(by_handle.map(|u| u.id), Some(user.id));

    let missing = users::get_user(&pool, Uuid::new_v4()).await.unwrap();
    assert!(missing.is_none());

    db.teardown().await;
}

#[tokio::test]
async fn duplicate_handle_is_rejected() {
    let db = TestDb::new().await;
    let pool = db.pool.clone();

    users::insert_user(&pool, "ana", "Ana", None).await.unwrap();
    let dup = users::insert_user(&pool, "ana", "Other Ana", None).await;
    assert!(dup.is_err(), "handles must be unique");

    db.teardown().await;
}

#[tokio::test]
async fn list_users_orders_by_handle() {
    let db = TestDb::new().await;
    let pool = db.pool.clone();

    users::insert_user(&pool, "zoe", "Zoe", None).await.unwrap();
    users::insert_user(&pool, "ben", "Ben", None).await.unwrap();

    let handles: Vec<String> = users::list_users(&pool)
        .await
        .unwrap()
        .into_iter()
        .map(|u| u.handle)
        .collect();
    assert_eq!(handles, vec!["ben", "zoe"]);

    db.teardown().await;
}

#[tokio::test]
async fn live_session_lookup_respects_expiry_and_revocation() {
    let db = TestDb::new().await;
    let pool = db.pool.clone();

    let user = users::insert_user(&pool, "ana", "Ana", None).await.unwrap();

    let live = sessions::insert_session(&pool, user.id, Utc::now() + Duration::hours(1))
        .await
        .unwrap();
    let expired = sessions::insert_session(&pool, user.id, Utc::now() - Duration::hours(1))
        .await
        .unwrap();

    assert!(sessions::get_live_session(&pool, live.id).await.unwrap().is_some());
    assert!(sessions::get_live_session(&pool, expired.id).await.unwrap().is_none());
    assert!(sessions::get_session(&pool, expired.id).await.unwrap().is_some());

    assert!(sessions::revoke_session(&pool, live.id).await.unwrap());
    assert!(
        !sessions::revoke_session(&pool, live.id).await.unwrap(),
        "second revoke should be a no-op"
    );
    assert!(sessions::get_live_session(&pool, live.id).await.unwrap().is_none());

    db.teardown().await;
}

#[tokio::test]
async fn purge_removes_only_dead_sessions() {
    let db = TestDb::new().await;
    let pool = db.pool.clone();

    let user = users::insert_user(&pool, "ana", "Ana", None).await.unwrap();
    let live = sessions::insert_session(&pool, user.id, Utc::now() + Duration::hours(1))
        .await
        .unwrap();
    sessions::insert_session(&pool, user.id, Utc::now() - Duration::hours(2))
        .await
        .unwrap();

    let removed = sessions::purge_sessions_before(&pool, Utc::now()).await.unwrap();
    assert_eq!(removed, 1);
    assert!(sessions::get_session(&pool, live.id).await.unwrap().is_some());

    db.teardown().await;
}

#[tokio::test]
async fn upsert_preferences_replaces_existing_row() {
    let db = TestDb::new().await;
    let pool = db.pool.clone();

    let user = users::insert_user(&pool, "ana", "Ana", None).await.unwrap();
    assert!(preferences::get_preferences(&pool, user.id).await.unwrap().is_none());

    preferences::upsert_preferences(&pool, user.id, 3, 30, false)
        .await
        .unwrap();
    let updated = preferences::upsert_preferences(&pool, user.id, 2, 15, true)
        .await
        .unwrap();
    assert_eq!(updated.meals_per_day, 2);
    assert_eq!(updated.max_prep_minutes, 15);
    assert!(updated.quick_cook);

    let stored = preferences::get_preferences(&pool, user.id).await.unwrap();
    assert_eq!(stored, Some(updated));

    db.teardown().await;
}

#[tokio::test]
async fn preferences_constraints_reject_out_of_range_values() {
    let db = TestDb::new().await;
    let pool = db.pool.clone();

    let user = users::insert_user(&pool, "ana", "Ana", None).await.unwrap();
    assert!(preferences::upsert_preferences(&pool, user.id, 9, 30, false).await.is_err());
    assert!(preferences::upsert_preferences(&pool, user.id, 3, 20, false).await.is_err());

    db.teardown().await;
}

#[tokio::test]
async fn table_counts_reports_each_known_table() {
    let db = TestDb::new().await;
    let pool = db.pool.clone();

    let user = seeded_user(&pool, "ana").await;
    sessions::insert_session(&pool, user.id, Utc::now() + Duration::hours(1))
        .await
        .unwrap();
    sessions::insert_session(&pool, user.id, Utc::now() + Duration::hours(2))
        .await
        .unwrap();

    let counts = pool::table_counts(&pool).await.unwrap();
    assert_eq!(
        counts,
        vec![("meal_preferences", 0), ("sessions", 2), ("users", 1)]
    );

    db.teardown().await;
}
