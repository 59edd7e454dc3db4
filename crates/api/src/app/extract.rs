//! Request extractors.

use axum::{
    async_trait,
    extract::{FromRequest, Json, Request},
    http::StatusCode,
};
use serde::de::DeserializeOwned;

use crate::app::errors::json_error;

/// JSON body whose rejections use the same `{error, message}` shape as every
/// other failure.
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = axum::response::Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| json_error(StatusCode::BAD_REQUEST, "invalid_body", e.body_text()))?;

        Ok(JsonBody(value))
    }
}
