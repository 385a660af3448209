//! # Axum Helpers
//!
//! Shared HTTP plumbing for the workspace's Axum services.
//!
//! - **[`server`]**: router layers, `/health`, readiness probes, graceful shutdown
//! - **[`errors`]**: `ErrorResponse` bodies with stable error codes
//! - **[`extractors`]**: `ValidatedJson`

pub mod errors;
pub mod extractors;
pub mod server;

pub use errors::{ErrorCode, ErrorResponse};
pub use extractors::ValidatedJson;
pub use server::{
    HealthCheckFuture, HealthResponse, create_app, create_router, health_router,
    run_health_checks, shutdown_signal,
};
