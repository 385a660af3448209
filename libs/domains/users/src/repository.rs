use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{UserError, UserResult};
use crate::models::{User, UserFilter};

/// Durable store for user records.
///
/// Implementations own the unique-email constraint: `create` and `update`
/// must fail with [`UserError::DuplicateEmail`] when another record already
/// holds the (normalized) email, and must reject records whose capability
/// flags break [`User::check_capabilities`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a new record
    async fn create(&self, user: User) -> UserResult<User>;

    /// Overwrite an existing record
    async fn update(&self, user: User) -> UserResult<User>;

    async fn get_by_id(&self, id: Uuid) -> UserResult<Option<User>>;

    /// Exact match on the stored (normalized) email
    async fn get_by_email(&self, email: &str) -> UserResult<Option<User>>;

    /// Newest first
    async fn list(&self, filter: UserFilter) -> UserResult<Vec<User>>;

    /// Number of records matching `filter`, ignoring pagination
    async fn count(&self, filter: UserFilter) -> UserResult<usize>;
}

/// Process-local store for development and tests
#[derive(Debug, Default, Clone)]
pub struct InMemoryUserRepository {
    users: Arc<RwLock<HashMap<Uuid, User>>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn create(&self, user: User) -> UserResult<User> {
        user.check_capabilities()?;

        let mut users = self.users.write().await;

        if users.values().any(|u| u.email == user.email) {
            return Err(UserError::DuplicateEmail(user.email));
        }

        users.insert(user.id, user.clone());

        tracing::debug!(user_id = %user.id, email = %user.email, "Inserted user");
        Ok(user)
    }

    async fn update(&self, user: User) -> UserResult<User> {
        user.check_capabilities()?;

        let mut users = self.users.write().await;

        if !users.contains_key(&user.id) {
            return Err(UserError::NotFound(user.id));
        }

        if users
            .values()
            .any(|u| u.id != user.id && u.email == user.email)
        {
            return Err(UserError::DuplicateEmail(user.email));
        }

        users.insert(user.id, user.clone());

        tracing::debug!(user_id = %user.id, "Updated user");
        Ok(user)
    }

    async fn get_by_id(&self, id: Uuid) -> UserResult<Option<User>> {
        let users = self.users.read().await;
        Ok(users.get(&id).cloned())
    }

    async fn get_by_email(&self, email: &str) -> UserResult<Option<User>> {
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    async fn list(&self, filter: UserFilter) -> UserResult<Vec<User>> {
        let users = self.users.read().await;

        let mut result: Vec<User> = users
            .values()
            .filter(|u| filter.matches(u))
            .cloned()
            .collect();

        // v7 ids are time-ordered, so they break created_at ties
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        Ok(result
            .into_iter()
            .skip(filter.offset)
            .take(filter.limit)
            .collect())
    }

    async fn count(&self, filter: UserFilter) -> UserResult<usize> {
        let users = self.users.read().await;
        Ok(users.values().filter(|u| filter.matches(u)).count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserFields;

    fn user(email: &str) -> User {
        User::new(email.to_string(), None, UserFields::default())
    }

    #[tokio::test]
    async fn test_create_and_get_user() {
        let repo = InMemoryUserRepository::new();

        let created = repo.create(user("test@example.com")).await.unwrap();

        let fetched = repo.get_by_id(created.id).await.unwrap();
        assert_eq!(fetched, Some(created.clone()));

        let by_email = repo.get_by_email("test@example.com").await.unwrap();
        assert_eq!(by_email.map(|u| u.id), Some(created.id));
    }

    #[tokio::test]
    async fn test_duplicate_email_error() {
        let repo = InMemoryUserRepository::new();

        repo.create(user("test@example.com")).await.unwrap();

        let result = repo.create(user("test@example.com")).await;
        assert!(matches!(result, Err(UserError::DuplicateEmail(_))));
        assert_eq!(repo.count(UserFilter::default()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_local_part_case_is_significant() {
        let repo = InMemoryUserRepository::new();

        repo.create(user("Jane@example.com")).await.unwrap();
        repo.create(user("jane@example.com")).await.unwrap();

        assert!(repo.get_by_email("JANE@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_missing_user() {
        let repo = InMemoryUserRepository::new();
        let ghost = user("ghost@example.com");

        let result = repo.update(ghost.clone()).await;
        assert!(matches!(result, Err(UserError::NotFound(id)) if id == ghost.id));
    }

    #[tokio::test]
    async fn test_update_rejects_email_taken_by_other_user() {
        let repo = InMemoryUserRepository::new();
        repo.create(user("a@example.com")).await.unwrap();
        let mut b = repo.create(user("b@example.com")).await.unwrap();

        b.email = "a@example.com".to_string();
        let result = repo.update(b).await;
        assert!(matches!(result, Err(UserError::DuplicateEmail(_))));
    }

    #[tokio::test]
    async fn test_store_rejects_superuser_without_staff() {
        let repo = InMemoryUserRepository::new();
        let mut root = repo.create(user("root@example.com")).await.unwrap();

        root.is_superuser = true;
        let result = repo.update(root.clone()).await;
        assert!(matches!(result, Err(UserError::Validation(_))));

        let stored = repo.get_by_id(root.id).await.unwrap().unwrap();
        assert!(!stored.is_superuser);
    }

    #[tokio::test]
    async fn test_list_is_newest_first_and_paginated() {
        let repo = InMemoryUserRepository::new();
        for i in 0..5 {
            repo.create(user(&format!("user{}@example.com", i)))
                .await
                .unwrap();
        }

        let page = repo
            .list(UserFilter {
                limit: 2,
                offset: 1,
                ..UserFilter::default()
            })
            .await
            .unwrap();

        let emails: Vec<_> = page.iter().map(|u| u.email.as_str()).collect();
        assert_eq!(emails, ["user3@example.com", "user2@example.com"]);
    }

    #[tokio::test]
    async fn test_concurrent_duplicate_inserts_have_one_winner() {
        let repo = InMemoryUserRepository::new();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let repo = repo.clone();
                tokio::spawn(async move { repo.create(user("race@example.com")).await })
            })
            .collect();

        let mut created = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                created += 1;
            }
        }

        assert_eq!(created, 1);
    }
}
