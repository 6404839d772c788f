use axum::{
    Json, Router,
    extract::{FromRequest, Request, rejection::JsonRejection},
};

use crate::{error::AppError, state::SharedState};

pub mod battle;
pub mod docs;
pub mod health;

/// Compose all route trees, wiring in shared state and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = health::router().merge(battle::router(state.clone()));

    let docs_router = docs::router(state.clone());

    api_router.merge(docs_router).with_state(state)
}

/// JSON body extractor reporting failures in the standard error shape.
///
/// Axum's own `Json` rejection answers deserialization failures with a
/// plain-text 422; every battle endpoint instead owes the caller a 400
/// `invalid_payload` body, missing and wrong-typed fields included.
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| AppError::InvalidPayload(rejection.body_text()))?;
        Ok(Self(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::StatusCode, response::IntoResponse};

    use crate::dto::battle::FinishRunRequest;

    fn json_request(body: &str) -> Request {
        Request::builder()
            .method("POST")
            .header("content-type", "application/json")
            .body(Body::from(body.to_owned()))
            .unwrap()
    }

    async fn error_body(error: AppError) -> (StatusCode, serde_json::Value) {
        let response = error.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn missing_required_fields_surface_as_invalid_payload() {
        let request = json_request(
            r#"{"run_id":"5f0c54a1-98e2-4e1e-8583-6e10ec6f3d26","victory":true}"#,
        );

        let rejection = ApiJson::<FinishRunRequest>::from_request(request, &())
            .await
            .map(|_| ())
            .unwrap_err();

        let (status, json) = error_body(rejection).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "invalid_payload");
    }

    #[tokio::test]
    async fn wrong_typed_fields_surface_as_invalid_payload() {
        let request = json_request(
            r#"{"run_id":"5f0c54a1-98e2-4e1e-8583-6e10ec6f3d26","victory":true,"duration_seconds":"long"}"#,
        );

        let rejection = ApiJson::<FinishRunRequest>::from_request(request, &())
            .await
            .map(|_| ())
            .unwrap_err();

        let (status, json) = error_body(rejection).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "invalid_payload");
    }

    #[tokio::test]
    async fn syntactically_broken_bodies_surface_as_invalid_payload() {
        let request = json_request("{not json");

        let rejection = ApiJson::<FinishRunRequest>::from_request(request, &())
            .await
            .map(|_| ())
            .unwrap_err();

        let (status, json) = error_body(rejection).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "invalid_payload");
    }
}
