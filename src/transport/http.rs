//! HTTP/JSON shapes and the error status mapping.

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

use crate::domain::{ErrorBody, ErrorCode};

/// Collection path for users.
pub const USERS_PATH: &str = "/v1/users";

/// Route of a single user; the id is one percent-encoded path segment.
pub const USER_ROUTE: &str = "/v1/users/{user_id}";

/// Whether `path` addresses a single user, well-formed or not.
pub fn is_user_path(path: &str) -> bool {
    path.strip_prefix(USERS_PATH)
        .is_some_and(|rest| rest.starts_with('/'))
}

/// Body of `POST /v1/users`. A missing username reads as empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateUserRequest {
    #[serde(default)]
    pub username: String,
}

/// Body of every failed response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

/// HTTP status for an error code.
pub fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::NotFound | ErrorCode::InvalidUserId => StatusCode::NOT_FOUND,
        ErrorCode::RateLimit => StatusCode::TOO_MANY_REQUESTS,
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        ErrorCode::Invalid | ErrorCode::Conflict => StatusCode::BAD_REQUEST,
    }
}
