//! JSON extractor with validation through the validator crate.

use axum::{
    extract::{FromRequest, Json, Request},
    response::{IntoResponse, Response},
};
use serde::de::DeserializeOwned;
use validator::Validate;

use crate::errors::{ErrorCode, ErrorResponse};

/// JSON body that has passed [`Validate::validate`].
///
/// Malformed JSON is rejected with `INVALID_JSON`; a body that parses but
/// fails validation is rejected with `VALIDATION_ERROR` and per-field details.
/// Both are 400 responses.
///
/// ```ignore
/// #[derive(Deserialize, Validate)]
/// struct AddUser {
///     #[validate(email)]
///     email: String,
/// }
///
/// async fn add(ValidatedJson(form): ValidatedJson<AddUser>) -> String {
///     form.email
/// }
/// ```
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(data) = Json::<T>::from_request(req, state).await.map_err(|e| {
            ErrorResponse::new(ErrorCode::InvalidJson, e.body_text()).into_response()
        })?;

        data.validate().map_err(|e| {
            let details = e
                .field_errors()
                .iter()
                .map(|(field, errors)| {
                    let messages: Vec<serde_json::Value> = errors
                        .iter()
                        .map(|err| {
                            serde_json::json!({
                                "code": err.code,
                                "message": err.message,
                            })
                        })
                        .collect();
                    (field.to_string(), serde_json::json!(messages))
                })
                .collect::<serde_json::Map<_, _>>();

            ErrorResponse::from_code(ErrorCode::ValidationError)
                .with_details(serde_json::Value::Object(details))
                .into_response()
        })?;

        Ok(ValidatedJson(data))
    }
}
