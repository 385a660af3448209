use utoipa::OpenApi;

/// Service-wide API documentation; the admin routes live under `/admin`.
#[derive(OpenApi)]
#[openapi(
    info(title = "accounts-api", description = "User account administration"),
    nest((path = "/admin", api = domain_users::handlers::ApiDoc))
)]
pub struct ApiDoc;
