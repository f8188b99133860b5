use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use std::fmt;

/// Request-level error taxonomy. Every variant maps to one HTTP status and
/// renders the standard `{"success": false, "error": ...}` body.
#[derive(Debug, Clone)]
pub enum ApiError {
    /// Missing Authorization header or bearer token.
    Unauthenticated,
    /// The identity provider rejected or could not parse the token.
    InvalidCredential(String),
    /// Role or membership check failed.
    Forbidden(String),
    /// A referenced entity does not exist.
    NotFound(String),
    /// Duplicate unique-key creation (existing user, existing registration).
    Conflict(String),
    /// Malformed input.
    Validation(String),
    /// Identity-provider or payment-gateway call failed.
    ExternalService(String),
    /// Document-store call failed.
    Database(String),
}

impl ApiError {
    pub fn database(err: mongodb::error::Error) -> Self {
        ApiError::Database(err.to_string())
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Unauthenticated => write!(f, "unauthorized access"),
            ApiError::InvalidCredential(msg) => write!(f, "invalid or expired token: {}", msg),
            ApiError::Forbidden(msg) => write!(f, "forbidden access: {}", msg),
            ApiError::NotFound(msg) => write!(f, "not found: {}", msg),
            ApiError::Conflict(msg) => write!(f, "conflict: {}", msg),
            ApiError::Validation(msg) => write!(f, "invalid request: {}", msg),
            ApiError::ExternalService(msg) => write!(f, "external service error: {}", msg),
            ApiError::Database(msg) => write!(f, "database error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ApiError::InvalidCredential(_) => StatusCode::FORBIDDEN,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::ExternalService(_) => StatusCode::BAD_GATEWAY,
            ApiError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(serde_json::json!({
            "success": false,
            "error": self.to_string(),
        }))
    }
}

impl From<mongodb::error::Error> for ApiError {
    fn from(err: mongodb::error::Error) -> Self {
        ApiError::database(err)
    }
}

/// MongoDB surfaces unique-index violations as write errors with code 11000.
/// The checkout confirm path treats those as the idempotent no-op.
pub fn is_duplicate_key_error(err: &mongodb::error::Error) -> bool {
    use mongodb::error::{ErrorKind, WriteFailure};
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(write_err)) => write_err.code == 11000,
        ErrorKind::Command(command_err) => command_err.code == 11000,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes_follow_taxonomy() {
        assert_eq!(ApiError::Unauthenticated.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            ApiError::InvalidCredential("bad".into()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(ApiError::Forbidden("nope".into()).status_code(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::NotFound("club".into()).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::Conflict("dup".into()).status_code(), StatusCode::CONFLICT);
        assert_eq!(ApiError::Validation("bad".into()).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::ExternalService("stripe".into()).status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            ApiError::Database("down".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_error_body_shape() {
        let err = ApiError::NotFound("Club not found".to_string());
        let resp = err.error_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_unauthenticated_message_matches_gate_contract() {
        assert_eq!(ApiError::Unauthenticated.to_string(), "unauthorized access");
    }
}
