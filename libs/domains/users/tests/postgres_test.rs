//! Integration tests for the PostgreSQL user store
//!
//! These run against a real Postgres via testcontainers to check that:
//! - the unique email constraint surfaces as `DuplicateEmail`
//! - the superuser/staff check constraint holds at the database level
//! - the manager's factory and escalators persist through SQL

use domain_users::*;
use sea_orm::ConnectionTrait;
use test_utils::{TestDataBuilder, TestDatabase, assertions::*};

fn manager(db: &TestDatabase) -> UserManager<PostgresUserRepository> {
    UserManager::new(
        PostgresUserRepository::new(db.connection()),
        Argon2Hasher::with_params(8, 1, 1).unwrap(),
    )
}

#[tokio::test]
async fn test_create_and_fetch_user() {
    let db = TestDatabase::new().await;
    let manager = manager(&db);
    let builder = TestDataBuilder::from_test_name("pg_create_and_fetch");

    let created = manager
        .create_user(
            &builder.email("Jane").replace("example.com", "EXAMPLE.com"),
            Some(&builder.password()),
            UserFields::named(builder.name("user")),
        )
        .await
        .unwrap();

    assert_eq!(created.email, builder.email("Jane"));
    assert!(created.has_usable_password());

    let fetched = manager.get_user(created.id).await.unwrap();
    assert_eq!(fetched.email, created.email);
    assert_eq!(fetched.name, builder.name("user"));

    let by_email = manager.get_by_email(&builder.email("Jane")).await.unwrap();
    assert_eq!(assert_some(by_email, "user by email").id, created.id);
}

#[tokio::test]
async fn test_duplicate_email_is_reported() {
    let db = TestDatabase::new().await;
    let manager = manager(&db);
    let builder = TestDataBuilder::from_test_name("pg_duplicate");

    manager
        .create_user(&builder.email("dup"), None, UserFields::default())
        .await
        .unwrap();

    let result = manager
        .create_user(&builder.email("dup"), None, UserFields::default())
        .await;

    assert!(matches!(result, Err(UserError::DuplicateEmail(_))));
}

#[tokio::test]
async fn test_escalators_persist_flags() {
    let db = TestDatabase::new().await;
    let manager = manager(&db);
    let builder = TestDataBuilder::from_test_name("pg_escalators");

    let staff = manager
        .create_staff_user(&builder.email("staff"), &builder.password())
        .await
        .unwrap();
    let root = manager
        .create_superuser(&builder.email("root"), &builder.password())
        .await
        .unwrap();

    let staff = manager.get_user(staff.id).await.unwrap();
    let root = manager.get_user(root.id).await.unwrap();
    assert!(staff.is_staff && !staff.is_superuser);
    assert!(root.is_staff && root.is_superuser);

    let (staff_only, total) = manager
        .list_users(UserFilter {
            is_superuser: Some(false),
            is_staff: Some(true),
            ..UserFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(total, 1);
    assert_eq!(staff_only[0].id, staff.id);
}

#[tokio::test]
async fn test_check_constraint_rejects_superuser_without_staff() {
    let db = TestDatabase::new().await;
    let builder = TestDataBuilder::from_test_name("pg_check_constraint");

    let result = db
        .connection
        .execute_unprepared(&format!(
            "INSERT INTO users (id, email, is_staff, is_superuser) \
             VALUES ('{}', '{}', false, true)",
            builder.user_id(),
            builder.email("root")
        ))
        .await;

    let err = result.unwrap_err().to_string();
    assert!(err.contains(migration::SUPERUSER_REQUIRES_STAFF));
}

#[tokio::test]
async fn test_authenticate_records_login() {
    let db = TestDatabase::new().await;
    let manager = manager(&db);
    let builder = TestDataBuilder::from_test_name("pg_login");

    let user = manager
        .create_user(
            &builder.email("login"),
            Some(&builder.password()),
            UserFields::default(),
        )
        .await
        .unwrap();
    assert!(user.last_login_at.is_none());

    manager
        .authenticate(&builder.email("login"), &builder.password())
        .await
        .unwrap();

    let stored = manager.get_user(user.id).await.unwrap();
    assert!(stored.last_login_at.is_some());
}

#[tokio::test]
async fn test_list_paginates_newest_first() {
    let db = TestDatabase::new().await;
    let manager = manager(&db);
    let builder = TestDataBuilder::from_test_name("pg_paginate");

    for i in 0..4 {
        manager
            .create_user(&builder.email(&format!("u{}", i)), None, UserFields::default())
            .await
            .unwrap();
    }

    let (page, total) = manager
        .list_users(UserFilter {
            limit: 2,
            offset: 0,
            ..UserFilter::default()
        })
        .await
        .unwrap();

    assert_eq!(total, 4);
    assert_eq!(page.len(), 2);
    assert_eq!(page[0].email, builder.email("u3"));

    db.truncate_users().await;
    let (_, total) = manager.list_users(UserFilter::default()).await.unwrap();
    assert_eq!(total, 0);
}

#[tokio::test]
async fn test_search_matches_wildcards_literally() {
    let db = TestDatabase::new().await;
    let manager = manager(&db);
    let builder = TestDataBuilder::from_test_name("pg_search_literal");

    manager
        .create_user(&builder.email("plain"), None, UserFields::default())
        .await
        .unwrap();
    let underscored = manager
        .create_user(&builder.email("first_last"), None, UserFields::default())
        .await
        .unwrap();

    let (users, total) = manager
        .list_users(UserFilter {
            search: Some("_".into()),
            ..UserFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(total, 1);
    assert_eq!(users[0].id, underscored.id);

    let (_, total) = manager
        .list_users(UserFilter {
            search: Some("%".into()),
            ..UserFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(total, 0);
}
