use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use crate::Error;

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            Error::Validation(errors) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                serde_json::json!({ "message": errors.summary(), "errors": errors }),
            ),
            Error::NotFound { .. } | Error::UnknownId(_) => (
                StatusCode::NOT_FOUND,
                serde_json::json!({ "message": self.to_string() }),
            ),
            Error::Unauthenticated => (
                StatusCode::UNAUTHORIZED,
                serde_json::json!({ "message": "Unauthenticated." }),
            ),
            _ => {
                tracing::error!("Request failed: {}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    serde_json::json!({ "message": "Server Error" }),
                )
            }
        };
        (status, Json(body)).into_response()
    }
}
