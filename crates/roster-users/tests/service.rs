use std::sync::Arc;

use roster_db::{DbRuntimeSettings, Store, SystemClock};
use roster_types::{User, UserFilter};
use roster_users::{InMemoryUserService, SqliteUserService, UserError, UserService};
use tokio::time::Duration;

fn open_store(dir: &tempfile::TempDir) -> Arc<Store> {
    let path = dir.path().join("roster.db");
    Arc::new(
        Store::open(
            path.to_str().expect("utf-8 path"),
            DbRuntimeSettings::default(),
            Duration::from_secs(10),
            Arc::new(SystemClock),
        )
        .expect("store should open"),
    )
}

fn named(name: &str) -> User {
    User {
        name: name.to_string(),
        ..User::default()
    }
}

#[tokio::test]
async fn sqlite_service_round_trips_a_user() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = open_store(&dir);
    let service = SqliteUserService::new(Arc::clone(&store));

    let mut user = named("greg");
    service.create_user(&mut user).await.expect("create");
    assert_eq!(user.id, 1);
    assert!(user.created_at.is_some());

    let found = service.find_user_by_id(1).await.expect("find");
    assert_eq!(found, user);

    store.close().await;
}

#[tokio::test]
async fn sqlite_service_rejects_invalid_user_without_persisting() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = open_store(&dir);
    let service = SqliteUserService::new(Arc::clone(&store));

    let mut user = User::default();
    let err = service
        .create_user(&mut user)
        .await
        .expect_err("empty name should fail");
    assert!(matches!(err, UserError::Validation(_)));

    let (users, total) = service
        .find_users(UserFilter::default())
        .await
        .expect("list");
    assert!(users.is_empty());
    assert_eq!(total, 0);

    store.close().await;
}

#[tokio::test]
async fn sqlite_service_maps_missing_user_to_not_found() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = open_store(&dir);
    let service = SqliteUserService::new(Arc::clone(&store));

    let err = service
        .find_user_by_id(999)
        .await
        .expect_err("no such user");
    assert!(matches!(err, UserError::NotFound(999)));

    store.close().await;
}

#[tokio::test]
async fn concurrent_creates_each_get_a_fresh_id() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = open_store(&dir);
    let service = Arc::new(SqliteUserService::new(Arc::clone(&store)));

    let mut handles = Vec::new();
    for i in 0..8 {
        let service = Arc::clone(&service);
        handles.push(tokio::spawn(async move {
            let mut user = named(&format!("user-{i}"));
            service.create_user(&mut user).await.map(|()| user.id)
        }));
    }

    let mut ids = Vec::new();
    for handle in handles {
        ids.push(handle.await.expect("join").expect("create"));
    }

    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 8, "every create should get a distinct id");
    assert!(ids.iter().all(|&id| id > 0));

    store.close().await;
}

// The in-memory double must expose the same observable behavior the handler
// tests rely on.

#[tokio::test]
async fn in_memory_double_matches_the_contract() {
    let service = InMemoryUserService::new();

    let mut user = User::default();
    let err = service
        .create_user(&mut user)
        .await
        .expect_err("empty name should fail");
    assert!(matches!(err, UserError::Validation(_)));

    let mut greg = named("greg");
    service.create_user(&mut greg).await.expect("create greg");
    let mut jane = named("jane");
    service.create_user(&mut jane).await.expect("create jane");
    assert_eq!((greg.id, jane.id), (1, 2));

    let found = service.find_user_by_id(1).await.expect("find");
    assert_eq!(found, greg);

    let err = service.find_user_by_id(3).await.expect_err("missing");
    assert!(matches!(err, UserError::NotFound(3)));

    let (page, total) = service
        .find_users(UserFilter {
            id: None,
            offset: 0,
            limit: 1,
        })
        .await
        .expect("list");
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].name, "greg");
    assert_eq!(total, 2);
}
