use axum::{
    Json,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::fmt;
use validator::ValidationErrors;

/// Error response structure sent to clients
///
/// Example JSON response:
/// ```json
/// {
///   "status": "fail",
///   "message": "Post not found",
/// }
/// ```
///
/// Form validation failures additionally carry the per-field errors:
/// ```json
/// {
///   "status": "fail",
///   "message": "title: Title is required.",
///   "errors": { "title": [ { "code": "length", "message": "Title is required.", ... } ] }
/// }
/// ```
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub status: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<serde_json::Value>,
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(s) => write!(f, "{}", s),
            Err(_) => Err(fmt::Error),
        }
    }
}

/// Enumeration of all error messages the application shows to clients
///
/// PartialEq allows comparing error variants (useful in tests)
#[derive(Debug, PartialEq)]
pub enum ErrorMessage {
    // Password validation errors
    EmptyPassword,
    ExceededMaxPasswordLength(usize),
    InvalidHashFormat,
    HashingError,

    // Authentication errors
    InvalidToken,
    UserNotAuthenticated,
    WrongCredentials,

    // Authorization errors
    PermissionDenied,

    // Lookups
    UserNoLongerExist,
    UserNotFound,
    PostNotFound,
    CommentNotFound,
    CategoryNotFound,
    LocationNotFound,

    // Form conflicts
    UsernameExists,
    SlugExists,

    //Else
    ServerError,
}

impl fmt::Display for ErrorMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            ErrorMessage::UserNoLongerExist => {
                "User belonging to this token no longer exists".to_string()
            }
            ErrorMessage::EmptyPassword => "Password cannot be empty".to_string(),
            ErrorMessage::HashingError => "Error while hashing password".to_string(),
            ErrorMessage::InvalidHashFormat => "Invalid password hash format".to_string(),
            ErrorMessage::ExceededMaxPasswordLength(max_length) => {
                format!("Password must not be more than {} characters", max_length)
            }
            ErrorMessage::InvalidToken => "Token is invalid or expired".to_string(),
            ErrorMessage::WrongCredentials => "Username or password is wrong".to_string(),
            ErrorMessage::PermissionDenied => {
                "You are not allowed to perform this action".to_string()
            }
            ErrorMessage::UserNotAuthenticated => {
                "Authentication required. Please log in.".to_string()
            }
            ErrorMessage::UserNotFound => "User not found".to_string(),
            ErrorMessage::PostNotFound => "Post not found".to_string(),
            ErrorMessage::CommentNotFound => "Comment not found".to_string(),
            ErrorMessage::CategoryNotFound => "Category not found".to_string(),
            ErrorMessage::LocationNotFound => "Location not found".to_string(),
            ErrorMessage::UsernameExists => "Username already exists".to_string(),
            ErrorMessage::SlugExists => "Slug already exists".to_string(),
            ErrorMessage::ServerError => "Server Error. Please try again later".to_string(),
        };
        write!(f, "{}", message)
    }
}

/// Internal HTTP error type used throughout the application
///
/// Handlers return `Result<T, HttpError>`; axum turns the error side into a
/// response through `IntoResponse`.
///
/// Besides real failures this type also carries the "refused, go elsewhere"
/// outcome of the ownership gate and of `login_required`: a `303 See Other`
/// with a `Location` header and no error body (see [`HttpError::redirect`]).
#[derive(Debug, Clone)]
pub struct HttpError {
    pub message: String,
    pub status: StatusCode,
    pub location: Option<String>,
    pub errors: Option<serde_json::Value>,
}

impl HttpError {
    pub fn new(message: impl Into<String>, status: StatusCode) -> Self {
        HttpError {
            message: message.into(),
            status,
            location: None,
            errors: None,
        }
    }

    /// 500 Internal Server Error, for database and other unexpected failures
    pub fn server_error(message: impl Into<String>) -> Self {
        HttpError::new(message, StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// 400 Bad Request
    pub fn bad_request(message: impl Into<String>) -> Self {
        HttpError::new(message, StatusCode::BAD_REQUEST)
    }

    /// 401 Unauthorized (unauthenticated)
    pub fn unauthorized(message: impl Into<String>) -> Self {
        HttpError::new(message, StatusCode::UNAUTHORIZED)
    }

    /// 403 Forbidden
    pub fn forbidden(message: impl Into<String>) -> Self {
        HttpError::new(message, StatusCode::FORBIDDEN)
    }

    /// 404 Not Found
    pub fn not_found(message: impl Into<String>) -> Self {
        HttpError::new(message, StatusCode::NOT_FOUND)
    }

    /// 400 Bad Request carrying the field errors of a rejected form
    ///
    /// Nothing has been persisted when this is returned; the client shows the
    /// form again with the messages under `errors`.
    pub fn form_invalid(errors: ValidationErrors) -> Self {
        HttpError {
            message: errors.to_string(),
            status: StatusCode::BAD_REQUEST,
            location: None,
            errors: serde_json::to_value(&errors).ok(),
        }
    }

    /// 400 Bad Request for a single field rejected after validation
    /// (unknown category, taken username, ...)
    pub fn field_invalid(field: &'static str, message: impl Into<String>) -> Self {
        let message = message.into();
        let mut errors = serde_json::Map::new();
        errors.insert(
            field.to_string(),
            serde_json::json!([{ "message": message.clone() }]),
        );
        HttpError {
            errors: Some(serde_json::Value::Object(errors)),
            message,
            status: StatusCode::BAD_REQUEST,
            location: None,
        }
    }

    /// 303 See Other to `location`
    pub fn redirect(location: impl Into<String>) -> Self {
        HttpError {
            message: String::new(),
            status: StatusCode::SEE_OTHER,
            location: Some(location.into()),
            errors: None,
        }
    }

    pub fn is_redirect(&self) -> bool {
        self.status.is_redirection() && self.location.is_some()
    }

    /// Convert HttpError into an Axum HTTP Response
    ///
    /// Redirects become a bare `303` with a `Location` header, everything
    /// else becomes `{"status": "fail", "message": "..."}` with `self.status`.
    pub fn into_http_response(self) -> Response {
        if let (true, Some(location)) = (self.status.is_redirection(), &self.location) {
            return (self.status, [(header::LOCATION, location.clone())]).into_response();
        }

        let json_response = Json(ErrorResponse {
            status: "fail".to_string(),
            message: self.message.clone(),
            errors: self.errors,
        });

        (self.status, json_response).into_response()
    }
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            Some(location) => write!(
                f,
                "HttpError: redirect to {}, status: {}",
                location, self.status
            ),
            None => write!(
                f,
                "HttpError: message: {}, status: {}",
                self.message, self.status
            ),
        }
    }
}

impl std::error::Error for HttpError {}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        self.into_http_response()
    }
}

/// Log a database failure and hide its details behind a generic 500
pub fn db_error(context: &str, e: sqlx::Error) -> HttpError {
    tracing::error!("DB error, {}: {}", context, e);
    HttpError::server_error(ErrorMessage::ServerError.to_string())
}
