//! Shared application state.

use domain_users::Argon2Hasher;

/// Cloned into handlers; every field is cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub config: crate::config::Config,
    /// PostgreSQL connection pool
    pub db: database::postgres::DatabaseConnection,
    pub hasher: Argon2Hasher,
}
