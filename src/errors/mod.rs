use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use mongodb::error::{ErrorKind, WriteFailure};
use thiserror::Error;
use validator::ValidationErrors;

/// Domain error taxonomy. Every handler failure path maps onto one of these,
/// and the `ResponseError` impl turns them into the uniform
/// `{"success": false, ...}` JSON envelope.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("{0}")]
    Unauthenticated(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    InvalidState(String),

    #[error("The email could not be sent")]
    EmailDelivery,

    #[error("Database error")]
    Database,

    #[error("Internal server error")]
    Internal,
}

impl ApiError {
    fn envelope(&self) -> serde_json::Value {
        match self.status_code() {
            // Server-side failures never leak internals.
            StatusCode::INTERNAL_SERVER_ERROR => {
                serde_json::json!({ "success": false, "error": self.to_string() })
            }
            _ => serde_json::json!({ "success": false, "msg": self.to_string() }),
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::InvalidCredentials | ApiError::InvalidState(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::EmailDelivery | ApiError::Database | ApiError::Internal => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(self.envelope())
    }
}

/// Mongo duplicate-key write errors carry code 11000. The unique indexes on
/// `users.email` and `favorites.(user, vehicle)` rely on this to turn a
/// duplicate-insert race into a reported conflict.
pub fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(write_err)) if write_err.code == 11000
    )
}

impl From<mongodb::error::Error> for ApiError {
    fn from(err: mongodb::error::Error) -> Self {
        if is_duplicate_key(&err) {
            return ApiError::Conflict("Duplicate value for a unique field".to_string());
        }
        log::error!("database error: {}", err);
        ApiError::Database
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        let mut messages: Vec<String> = Vec::new();
        for (field, field_errors) in errors.field_errors() {
            for field_error in field_errors {
                match &field_error.message {
                    Some(message) => messages.push(message.to_string()),
                    None => messages.push(format!("Invalid value for field '{}'", field)),
                }
            }
        }
        messages.sort();
        ApiError::Validation(messages.join(", "))
    }
}

impl From<bcrypt::BcryptError> for ApiError {
    fn from(err: bcrypt::BcryptError) -> Self {
        log::error!("bcrypt error: {}", err);
        ApiError::Internal
    }
}

impl From<mongodb::bson::oid::Error> for ApiError {
    fn from(_: mongodb::bson::oid::Error) -> Self {
        ApiError::Validation("Invalid identifier".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::doc;
    use mongodb::error::WriteError;
    use validator::Validate;

    #[derive(Validate)]
    struct SignupForm {
        #[validate(email(message = "A valid email address is required"))]
        email: String,
        #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
        password: String,
    }

    // WriteError is non-exhaustive, so the server wire shape is the only way
    // to build one here.
    fn write_error(code: i32) -> mongodb::error::Error {
        let write_error: WriteError =
            mongodb::bson::from_document(doc! { "code": code, "errmsg": "write failed" })
                .unwrap();
        mongodb::error::Error::from(ErrorKind::Write(WriteFailure::WriteError(write_error)))
    }

    #[test]
    fn duplicate_key_write_error_maps_to_conflict() {
        let err = write_error(11000);
        assert!(is_duplicate_key(&err));

        let api = ApiError::from(err);
        assert!(matches!(api, ApiError::Conflict(_)));
        assert_eq!(api.status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn other_write_errors_map_to_database() {
        let err = write_error(121);
        assert!(!is_duplicate_key(&err));
        assert!(matches!(ApiError::from(err), ApiError::Database));
    }

    #[test]
    fn status_codes_match_taxonomy() {
        assert_eq!(
            ApiError::Validation("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::InvalidCredentials.status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Unauthenticated("x".into()).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::Forbidden("x".into()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::NotFound("x".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::Conflict("x".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::InvalidState("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::EmailDelivery.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn server_errors_use_generic_error_field() {
        let body = ApiError::Database.envelope();
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Database error");
        assert!(body.get("msg").is_none());
    }

    #[test]
    fn client_errors_carry_message() {
        let body = ApiError::Forbidden("You cannot delete your own account".into()).envelope();
        assert_eq!(body["success"], false);
        assert_eq!(body["msg"], "You cannot delete your own account");
    }

    #[test]
    fn validator_errors_collapse_to_field_messages() {
        let form = SignupForm {
            email: "not-an-email".into(),
            password: "123".into(),
        };
        let err: ApiError = form.validate().unwrap_err().into();
        match err {
            ApiError::Validation(msg) => {
                assert!(msg.contains("A valid email address is required"));
                assert!(msg.contains("Password must be at least 6 characters"));
            }
            other => panic!("expected Validation, got {:?}", other),
        }
    }
}
