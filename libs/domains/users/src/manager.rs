use chrono::Utc;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

use crate::credentials::PasswordHasher;
use crate::error::{UserError, UserResult};
use crate::models::{ChangeUserForm, User, UserFields, UserFilter, normalize_email};
use crate::repository::UserRepository;

/// Builds and promotes user accounts.
///
/// The store is injected at construction and is the default target of every
/// write; [`UserManager::using`] points the same manager at another store.
pub struct UserManager<R: UserRepository> {
    store: Arc<R>,
    hasher: Arc<dyn PasswordHasher>,
}

impl<R: UserRepository> Clone for UserManager<R> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            hasher: self.hasher.clone(),
        }
    }
}

impl<R: UserRepository> UserManager<R> {
    pub fn new(store: R, hasher: impl PasswordHasher + 'static) -> Self {
        Self {
            store: Arc::new(store),
            hasher: Arc::new(hasher),
        }
    }

    /// Same hasher, different store.
    pub fn using<S: UserRepository>(&self, store: S) -> UserManager<S> {
        UserManager {
            store: Arc::new(store),
            hasher: self.hasher.clone(),
        }
    }

    pub fn store(&self) -> &R {
        &self.store
    }

    /// An absent or empty password leaves the account without a usable one.
    fn hash_password(&self, password: Option<&str>) -> UserResult<Option<String>> {
        password
            .filter(|raw| !raw.is_empty())
            .map(|raw| self.hasher.hash(raw))
            .transpose()
    }

    /// Create and persist a user.
    ///
    /// Fails with a validation error when `email` is blank; nothing is
    /// persisted in that case. Without a password the account is created with
    /// an unusable credential, as it is when `password` is empty.
    #[instrument(skip(self, password, fields))]
    pub async fn create_user(
        &self,
        email: &str,
        password: Option<&str>,
        fields: UserFields,
    ) -> UserResult<User> {
        if email.trim().is_empty() {
            return Err(UserError::missing_email());
        }

        let password_hash = self.hash_password(password)?;
        let user = User::new(normalize_email(email), password_hash, fields);
        user.check_capabilities()?;

        let created = self.store.create(user).await?;
        tracing::info!(user_id = %created.id, email = %created.email, "Created user");
        Ok(created)
    }

    /// Create a user and grant staff access.
    pub async fn create_staff_user(&self, email: &str, password: &str) -> UserResult<User> {
        let mut user = self
            .create_user(email, Some(password), UserFields::default())
            .await?;
        user.is_staff = true;
        user.touch();

        let user = self.store.update(user).await?;
        tracing::info!(user_id = %user.id, "Granted staff access");
        Ok(user)
    }

    /// Create a user with staff access and every permission.
    pub async fn create_superuser(&self, email: &str, password: &str) -> UserResult<User> {
        let mut user = self
            .create_user(email, Some(password), UserFields::default())
            .await?;
        user.is_staff = true;
        user.is_superuser = true;
        user.touch();

        let user = self.store.update(user).await?;
        tracing::info!(user_id = %user.id, "Granted superuser access");
        Ok(user)
    }

    pub async fn get_user(&self, id: Uuid) -> UserResult<User> {
        self.store
            .get_by_id(id)
            .await?
            .ok_or(UserError::NotFound(id))
    }

    /// Look up by email; the domain part is normalized first.
    pub async fn get_by_email(&self, email: &str) -> UserResult<Option<User>> {
        self.store.get_by_email(&normalize_email(email)).await
    }

    /// One page of users plus the total matching `filter`.
    pub async fn list_users(&self, filter: UserFilter) -> UserResult<(Vec<User>, usize)> {
        let total = self.store.count(filter.clone()).await?;
        let users = self.store.list(filter).await?;
        Ok((users, total))
    }

    /// Set (or with `None`, disable) a user's password.
    #[instrument(skip(self, password))]
    pub async fn set_password(&self, id: Uuid, password: Option<&str>) -> UserResult<User> {
        let mut user = self.get_user(id).await?;
        user.password_hash = self.hash_password(password)?;
        user.touch();

        self.store.update(user).await
    }

    /// Check an email/password pair without touching the record.
    ///
    /// Unknown emails, inactive accounts and unusable or wrong passwords all
    /// fail with the same [`UserError::InvalidCredentials`].
    #[instrument(skip(self, password))]
    pub async fn check_credentials(&self, email: &str, password: &str) -> UserResult<User> {
        let user = self
            .get_by_email(email)
            .await?
            .ok_or(UserError::InvalidCredentials)?;

        if !user.is_active {
            tracing::debug!(user_id = %user.id, "Rejected login for inactive user");
            return Err(UserError::InvalidCredentials);
        }

        let Some(ref encoded) = user.password_hash else {
            tracing::debug!(user_id = %user.id, "Rejected login without usable password");
            return Err(UserError::InvalidCredentials);
        };

        if !self.hasher.verify(password, encoded)? {
            return Err(UserError::InvalidCredentials);
        }

        Ok(user)
    }

    /// [`check_credentials`](Self::check_credentials), then record the login.
    pub async fn authenticate(&self, email: &str, password: &str) -> UserResult<User> {
        let mut user = self.check_credentials(email, password).await?;
        user.last_login_at = Some(Utc::now());

        let user = self.store.update(user).await?;
        tracing::info!(user_id = %user.id, "User logged in");
        Ok(user)
    }

    /// Apply an admin change form.
    pub async fn change_user(&self, id: Uuid, form: ChangeUserForm) -> UserResult<User> {
        let mut user = self.get_user(id).await?;
        user.apply_change(form);
        user.check_capabilities()?;

        let user = self.store.update(user).await?;
        tracing::info!(
            user_id = %user.id,
            is_active = user.is_active,
            is_staff = user.is_staff,
            is_superuser = user.is_superuser,
            "Changed user"
        );
        Ok(user)
    }
}
