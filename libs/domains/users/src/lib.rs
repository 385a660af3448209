//! Users Domain
//!
//! Email-keyed user accounts: the factory that builds them, the escalators
//! that grant staff and superuser access, and an admin HTTP surface.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐
//! │  Handlers   │  ← Admin endpoints (Basic auth, permission checks)
//! └──────┬──────┘
//!        │
//! ┌──────▼──────┐
//! │ UserManager │  ← create_user / create_staff_user / create_superuser
//! └──┬───────┬──┘
//!    │       │
//! ┌──▼───┐ ┌─▼──────────────┐
//! │Hasher│ │ UserRepository │  ← in-memory or PostgreSQL
//! └──────┘ └────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use domain_users::{Argon2Hasher, InMemoryUserRepository, UserFields, UserManager, handlers};
//!
//! # async fn run() -> domain_users::UserResult<()> {
//! let manager = UserManager::new(InMemoryUserRepository::new(), Argon2Hasher::default());
//! manager.create_superuser("admin@example.com", "s3cret").await?;
//! manager
//!     .create_user("user@Example.COM", None, UserFields::named("Jane Doe"))
//!     .await?;
//!
//! let admin = axum::Router::new().nest("/admin", handlers::router(manager));
//! # Ok(())
//! # }
//! ```

pub mod credentials;
pub mod error;
pub mod handlers;
pub mod manager;
pub mod models;
pub mod permissions;
pub mod postgres;
pub mod repository;

pub use credentials::{Argon2Hasher, HasherConfig, PasswordHasher};
pub use error::{MISSING_EMAIL, UserError, UserResult};
pub use manager::UserManager;
pub use models::{
    AddUserForm, ChangeUserForm, User, UserFields, UserFilter, UserListItem, UserResponse,
    normalize_email,
};
pub use permissions::{Permission, has_permission};
pub use postgres::PostgresUserRepository;
pub use repository::{InMemoryUserRepository, UserRepository};
