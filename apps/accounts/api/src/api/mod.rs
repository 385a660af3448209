use axum::{Json, Router, routing::get};
use domain_users::{PostgresUserRepository, UserManager, handlers};
use utoipa::OpenApi;

use crate::openapi::ApiDoc;
use crate::state::AppState;

pub mod health;

/// User manager over the Postgres store.
pub fn user_manager(state: &AppState) -> UserManager<PostgresUserRepository> {
    UserManager::new(
        PostgresUserRepository::new(state.db.clone()),
        state.hasher.clone(),
    )
}

/// Admin site plus the OpenAPI document. Every sub-router has its state
/// applied already.
pub fn routes(state: &AppState) -> Router {
    Router::new()
        .nest("/admin", handlers::router(user_manager(state)))
        .merge(docs_router())
}

fn docs_router() -> Router {
    Router::new().route(
        "/api-docs/openapi.json",
        get(|| async { Json(ApiDoc::openapi()) }),
    )
}

/// `GET /ready`, checking the database.
pub fn ready_router(state: AppState) -> Router {
    Router::new()
        .route("/ready", get(health::ready_handler))
        .with_state(state)
}
