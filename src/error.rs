use axum::{
    Json,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// ApiError
///
/// The application-wide error taxonomy. Every layer reports failures through
/// this enum: repositories surface `NotFound`/`Conflict`, the auth service
/// surfaces `Unauthorized`/`BadRequest`, and ownership checks at the mutation
/// boundary surface `Forbidden`. All variants are terminal for the request —
/// nothing here is retried internally.
#[derive(Debug, Error)]
pub enum ApiError {
    /// A resource id did not resolve.
    #[error("{0}")]
    NotFound(String),
    /// A uniqueness constraint (user email, tag name) was violated on create.
    #[error("{0}")]
    Conflict(String),
    /// Missing, malformed, expired, or otherwise invalid credential.
    #[error("{0}")]
    Unauthorized(String),
    /// Authenticated, but not permitted: not the owner and not a superuser.
    #[error("{0}")]
    Forbidden(String),
    /// Malformed request input, inactive account, or insufficient privileges.
    #[error("{0}")]
    BadRequest(String),
    /// Unexpected storage failure. Details are logged, not sent to clients.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    /// Unexpected internal failure (e.g. password hashing, token signing).
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Database(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Every error renders as `{"detail": "<message>"}` with the status above.
/// `Unauthorized` additionally carries a `WWW-Authenticate: Bearer` challenge
/// so clients know which credential scheme the API expects.
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("internal error: {self}");
            let body = Json(json!({ "detail": "Internal server error" }));
            return (status, body).into_response();
        }

        let body = Json(json!({ "detail": self.to_string() }));
        if matches!(self, ApiError::Unauthorized(_)) {
            return (status, [(header::WWW_AUTHENTICATE, "Bearer")], body).into_response();
        }
        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
