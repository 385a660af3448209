use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::error::{UserError, UserResult};

/// Normalize an email address the way the store keys it.
///
/// Surrounding whitespace is dropped and the domain (after the last `@`) is
/// lowercased; domain names are case-insensitive, local parts are not. Input
/// without an `@` is returned trimmed and otherwise untouched.
pub fn normalize_email(raw: &str) -> String {
    let trimmed = raw.trim();
    match trimmed.rsplit_once('@') {
        Some((local, domain)) => format!("{}@{}", local, domain.to_lowercase()),
        None => trimmed.to_string(),
    }
}

/// User account keyed by email
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct User {
    pub id: Uuid,
    /// Normalized email, unique across the store
    pub email: String,
    /// Display name, may be empty
    pub name: String,
    /// PHC-encoded hash; `None` means the password is unusable
    #[serde(skip_serializing, default)]
    pub password_hash: Option<String>,
    pub is_active: bool,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Build an unsaved user. `email` must already be normalized.
    pub fn new(email: String, password_hash: Option<String>, fields: UserFields) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            email,
            name: fields.name.unwrap_or_default(),
            password_hash,
            is_active: fields.is_active.unwrap_or(true),
            is_staff: fields.is_staff.unwrap_or(false),
            is_superuser: fields.is_superuser.unwrap_or(false),
            last_login_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn has_usable_password(&self) -> bool {
        self.password_hash.is_some()
    }

    /// Superusers must also be staff.
    pub fn check_capabilities(&self) -> UserResult<()> {
        if self.is_superuser && !self.is_staff {
            return Err(UserError::Validation(
                "Superusers must also be staff".to_string(),
            ));
        }
        Ok(())
    }

    pub(crate) fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub(crate) fn apply_change(&mut self, form: ChangeUserForm) {
        if let Some(name) = form.name {
            self.name = name;
        }
        if let Some(is_active) = form.is_active {
            self.is_active = is_active;
        }
        if let Some(is_staff) = form.is_staff {
            self.is_staff = is_staff;
        }
        if let Some(is_superuser) = form.is_superuser {
            self.is_superuser = is_superuser;
        }
        self.touch();
    }
}

/// Optional attributes accepted by `create_user` next to email and password
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UserFields {
    pub name: Option<String>,
    pub is_active: Option<bool>,
    pub is_staff: Option<bool>,
    pub is_superuser: Option<bool>,
}

impl UserFields {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }
}

/// Public representation of a user (no credential material)
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub is_active: bool,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub has_usable_password: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            has_usable_password: user.has_usable_password(),
            id: user.id,
            email: user.email,
            name: user.name,
            is_active: user.is_active,
            is_staff: user.is_staff,
            is_superuser: user.is_superuser,
            last_login_at: user.last_login_at,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// Row of the admin change list
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserListItem {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub is_active: bool,
}

impl From<User> for UserListItem {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            name: user.name,
            is_staff: user.is_staff,
            is_superuser: user.is_superuser,
            is_active: user.is_active,
        }
    }
}

/// Admin "add user" form
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct AddUserForm {
    #[serde(default)]
    #[validate(email, length(max = 255))]
    pub email: String,
    /// Omit to create the account with an unusable password
    pub password: Option<String>,
    #[serde(default)]
    #[validate(length(max = 255))]
    pub name: Option<String>,
}

/// Admin "change user" form; absent fields are left as they are
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct ChangeUserForm {
    #[validate(length(max = 255))]
    pub name: Option<String>,
    pub is_active: Option<bool>,
    pub is_staff: Option<bool>,
    pub is_superuser: Option<bool>,
}

/// Largest page the change list serves
pub const MAX_PAGE_SIZE: usize = 1000;

/// Largest offset the change list accepts
pub const MAX_OFFSET: usize = i64::MAX as usize;

/// Change list query
#[derive(Debug, Clone, Deserialize, Validate, ToSchema, utoipa::IntoParams)]
pub struct UserFilter {
    /// Case-insensitive substring of email or name
    pub search: Option<String>,
    pub is_active: Option<bool>,
    pub is_staff: Option<bool>,
    pub is_superuser: Option<bool>,
    #[serde(default = "default_limit")]
    #[validate(range(max = MAX_PAGE_SIZE))]
    pub limit: usize,
    #[serde(default)]
    #[validate(range(max = MAX_OFFSET))]
    pub offset: usize,
}

impl Default for UserFilter {
    fn default() -> Self {
        Self {
            search: None,
            is_active: None,
            is_staff: None,
            is_superuser: None,
            limit: default_limit(),
            offset: 0,
        }
    }
}

fn default_limit() -> usize {
    100
}

impl UserFilter {
    pub fn matches(&self, user: &User) -> bool {
        if let Some(ref search) = self.search {
            let needle = search.to_lowercase();
            if !user.email.to_lowercase().contains(&needle)
                && !user.name.to_lowercase().contains(&needle)
            {
                return false;
            }
        }
        if self.is_active.is_some_and(|v| v != user.is_active) {
            return false;
        }
        if self.is_staff.is_some_and(|v| v != user.is_staff) {
            return false;
        }
        if self.is_superuser.is_some_and(|v| v != user.is_superuser) {
            return false;
        }
        true
    }
}
