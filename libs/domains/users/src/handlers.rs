//! Admin surface for user accounts.
//!
//! Every route authenticates the caller with HTTP Basic credentials on each
//! request. Missing or wrong credentials give 401, an account without the
//! needed permission gets 403.

use axum::{
    Json, Router,
    extract::{FromRequestParts, Path, Query, State},
    http::{StatusCode, request::Parts},
    response::IntoResponse,
    routing::get,
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Basic},
};
use axum_helpers::{ErrorResponse, ValidatedJson};
use serde::Serialize;
use std::sync::Arc;
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::error::{UserError, UserResult};
use crate::manager::UserManager;
use crate::models::{
    AddUserForm, ChangeUserForm, User, UserFields, UserFilter, UserListItem, UserResponse,
};
use crate::permissions::{Permission, has_permission};
use crate::repository::UserRepository;

const TAG: &str = "admin";

#[derive(OpenApi)]
#[openapi(
    paths(changelist, add_view, add_user, change_view, change_user),
    components(schemas(
        ChangeList,
        AddForm,
        FormField,
        AddUserForm,
        ChangeUserForm,
        UserListItem,
        UserResponse,
        ErrorResponse
    )),
    modifiers(&BasicAuthScheme),
    tags((name = TAG, description = "User administration"))
)]
pub struct ApiDoc;

struct BasicAuthScheme;

impl utoipa::Modify for BasicAuthScheme {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};

        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "basic",
            SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Basic).build()),
        );
    }
}

type SharedManager<R> = Arc<UserManager<R>>;

/// Admin routes, to be nested under `/admin`.
pub fn router<R: UserRepository + 'static>(manager: UserManager<R>) -> Router {
    Router::new()
        .route("/core/user/", get(changelist::<R>))
        .route("/core/user/add/", get(add_view).post(add_user::<R>))
        .route(
            "/core/user/{id}/change/",
            get(change_view::<R>).post(change_user::<R>),
        )
        .with_state(Arc::new(manager))
}

/// Caller authenticated by Basic credentials and allowed into the admin site.
pub struct AdminUser(pub User);

impl AdminUser {
    pub fn require(&self, action: Permission) -> UserResult<()> {
        if has_permission(&self.0, action) {
            Ok(())
        } else {
            tracing::warn!(user_id = %self.0.id, ?action, "Permission denied");
            Err(UserError::Forbidden)
        }
    }
}

impl<R: UserRepository + 'static> FromRequestParts<SharedManager<R>> for AdminUser {
    type Rejection = UserError;

    async fn from_request_parts(
        parts: &mut Parts,
        manager: &SharedManager<R>,
    ) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(basic)) =
            TypedHeader::<Authorization<Basic>>::from_request_parts(parts, manager)
                .await
                .map_err(|_| UserError::Unauthorized)?;

        let user = manager
            .check_credentials(basic.username(), basic.password())
            .await?;

        let admin = AdminUser(user);
        admin.require(Permission::AccessAdmin)?;
        Ok(admin)
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ChangeList {
    pub results: Vec<UserListItem>,
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FormField {
    pub name: &'static str,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub required: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AddForm {
    pub fields: Vec<FormField>,
}

impl AddForm {
    fn for_user() -> Self {
        Self {
            fields: vec![
                FormField {
                    name: "email",
                    kind: "email",
                    required: true,
                },
                FormField {
                    name: "password",
                    kind: "password",
                    required: false,
                },
                FormField {
                    name: "name",
                    kind: "text",
                    required: false,
                },
            ],
        }
    }
}

/// User change list
#[utoipa::path(
    get,
    path = "/core/user/",
    tag = TAG,
    params(UserFilter),
    security(("basic" = [])),
    responses(
        (status = 200, description = "One page of users", body = ChangeList),
        (status = 401, description = "Missing or invalid credentials", body = ErrorResponse),
        (status = 403, description = "Not allowed to view users", body = ErrorResponse)
    )
)]
async fn changelist<R: UserRepository + 'static>(
    State(manager): State<SharedManager<R>>,
    admin: AdminUser,
    Query(filter): Query<UserFilter>,
) -> UserResult<Json<ChangeList>> {
    admin.require(Permission::ViewUser)?;
    filter.validate()?;

    let limit = filter.limit;
    let offset = filter.offset;
    let (users, total) = manager.list_users(filter).await?;

    Ok(Json(ChangeList {
        results: users.into_iter().map(UserListItem::from).collect(),
        total,
        limit,
        offset,
    }))
}

/// Describe the add-user form
#[utoipa::path(
    get,
    path = "/core/user/add/",
    tag = TAG,
    security(("basic" = [])),
    responses(
        (status = 200, description = "Fields accepted by the add form", body = AddForm),
        (status = 401, description = "Missing or invalid credentials", body = ErrorResponse),
        (status = 403, description = "Not allowed to add users", body = ErrorResponse)
    )
)]
async fn add_view(admin: AdminUser) -> UserResult<Json<AddForm>> {
    admin.require(Permission::AddUser)?;
    Ok(Json(AddForm::for_user()))
}

/// Create a user from the add form
#[utoipa::path(
    post,
    path = "/core/user/add/",
    tag = TAG,
    request_body = AddUserForm,
    security(("basic" = [])),
    responses(
        (status = 201, description = "User created", body = UserResponse),
        (status = 400, description = "Invalid form", body = ErrorResponse),
        (status = 401, description = "Missing or invalid credentials", body = ErrorResponse),
        (status = 403, description = "Not allowed to add users", body = ErrorResponse),
        (status = 409, description = "Email already registered", body = ErrorResponse)
    )
)]
async fn add_user<R: UserRepository + 'static>(
    State(manager): State<SharedManager<R>>,
    admin: AdminUser,
    ValidatedJson(form): ValidatedJson<AddUserForm>,
) -> UserResult<impl IntoResponse> {
    admin.require(Permission::AddUser)?;

    let fields = UserFields {
        name: form.name,
        ..UserFields::default()
    };
    let user = manager
        .create_user(&form.email, form.password.as_deref(), fields)
        .await?;

    tracing::info!(user_id = %user.id, added_by = %admin.0.id, "Admin added user");
    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

/// User detail for the change form
#[utoipa::path(
    get,
    path = "/core/user/{id}/change/",
    tag = TAG,
    params(("id" = Uuid, Path, description = "User id")),
    security(("basic" = [])),
    responses(
        (status = 200, description = "User detail", body = UserResponse),
        (status = 401, description = "Missing or invalid credentials", body = ErrorResponse),
        (status = 403, description = "Not allowed to view users", body = ErrorResponse),
        (status = 404, description = "No such user", body = ErrorResponse)
    )
)]
async fn change_view<R: UserRepository + 'static>(
    State(manager): State<SharedManager<R>>,
    admin: AdminUser,
    Path(id): Path<Uuid>,
) -> UserResult<Json<UserResponse>> {
    admin.require(Permission::ViewUser)?;

    let user = manager.get_user(id).await?;
    Ok(Json(user.into()))
}

/// Apply the change form
#[utoipa::path(
    post,
    path = "/core/user/{id}/change/",
    tag = TAG,
    params(("id" = Uuid, Path, description = "User id")),
    request_body = ChangeUserForm,
    security(("basic" = [])),
    responses(
        (status = 200, description = "Updated user", body = UserResponse),
        (status = 400, description = "Invalid form", body = ErrorResponse),
        (status = 401, description = "Missing or invalid credentials", body = ErrorResponse),
        (status = 403, description = "Not allowed to change users", body = ErrorResponse),
        (status = 404, description = "No such user", body = ErrorResponse)
    )
)]
async fn change_user<R: UserRepository + 'static>(
    State(manager): State<SharedManager<R>>,
    admin: AdminUser,
    Path(id): Path<Uuid>,
    ValidatedJson(form): ValidatedJson<ChangeUserForm>,
) -> UserResult<Json<UserResponse>> {
    admin.require(Permission::ChangeUser)?;

    let user = manager.change_user(id, form).await?;
    Ok(Json(user.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_admin_paths() {
        let doc = ApiDoc::openapi();
        let paths: Vec<_> = doc.paths.paths.keys().cloned().collect();

        assert!(paths.contains(&"/core/user/".to_string()));
        assert!(paths.contains(&"/core/user/add/".to_string()));
        assert!(paths.contains(&"/core/user/{id}/change/".to_string()));
    }

    #[test]
    fn test_add_form_describes_email_as_required() {
        let form = AddForm::for_user();
        let email = form.fields.iter().find(|f| f.name == "email").unwrap();
        assert!(email.required);
        assert!(form.fields.iter().all(|f| f.name == "email" || !f.required));
    }
}
