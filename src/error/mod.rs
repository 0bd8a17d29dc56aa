use actix_web::{HttpResponse, error::ResponseError, http::StatusCode};
use serde::{Deserialize, Serialize};
use sqlx::error::Error as SqlxError;
use std::error::Error as StdError;
use std::fmt;

/// Request-terminal error taxonomy for the gateway.
///
/// Every variant maps to one HTTP status and a stable `error_type` slug so
/// callers can branch on the body without parsing the message.
#[derive(Debug)]
pub enum ApiError {
    /// Missing, unknown, or deactivated API key.
    Unauthorized(String),
    /// Subscriber tier below the operation's minimum.
    Forbidden(String),
    /// No credits remaining in the current billing period.
    QuotaExceeded(String),
    /// Undecodable upload, missing file, or invalid option value.
    BadRequest(String),
    /// Per-minute request ceiling hit.
    TooManyRequests(String),
    /// Transformation exceeded its time budget.
    Timeout(String),
    /// Capability failed or produced unusable output.
    Internal(String),
    Database(String),
    Configuration(String),
}

#[derive(Serialize, Deserialize)]
struct ErrorBody {
    code: u16,
    message: String,
    error_type: String,
}

#[derive(Serialize, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Unauthorized(e) => write!(f, "Unauthorized: {}", e),
            ApiError::Forbidden(e) => write!(f, "Forbidden: {}", e),
            ApiError::QuotaExceeded(e) => write!(f, "Quota exceeded: {}", e),
            ApiError::BadRequest(e) => write!(f, "Bad request: {}", e),
            ApiError::TooManyRequests(e) => write!(f, "Too many requests: {}", e),
            ApiError::Timeout(e) => write!(f, "Timeout: {}", e),
            ApiError::Internal(e) => write!(f, "Internal error: {}", e),
            ApiError::Database(e) => write!(f, "Database error: {}", e),
            ApiError::Configuration(e) => write!(f, "Configuration error: {}", e),
        }
    }
}

impl StdError for ApiError {}

impl ApiError {
    fn error_type(&self) -> &'static str {
        match self {
            ApiError::Unauthorized(_) => "unauthorized",
            ApiError::Forbidden(_) => "forbidden",
            ApiError::QuotaExceeded(_) => "quota_exceeded",
            ApiError::BadRequest(_) => "bad_request",
            ApiError::TooManyRequests(_) => "rate_limited",
            ApiError::Timeout(_) => "timeout",
            ApiError::Internal(_) | ApiError::Database(_) | ApiError::Configuration(_) => {
                "internal_error"
            }
        }
    }

    /// Wire message. Server-side variants keep their detail in the log only.
    fn public_message(&self) -> String {
        match self {
            ApiError::Internal(_) | ApiError::Database(_) | ApiError::Configuration(_) => {
                "The server encountered an internal error".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl ResponseError for ApiError {
    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            log::error!("{}", self);
        }

        HttpResponse::build(status).json(ErrorEnvelope {
            error: ErrorBody {
                code: status.as_u16(),
                message: self.public_message(),
                error_type: self.error_type().to_string(),
            },
        })
    }

    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::QuotaExceeded(_) => StatusCode::PAYMENT_REQUIRED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::TooManyRequests(_) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<SqlxError> for ApiError {
    fn from(error: SqlxError) -> Self {
        match error {
            SqlxError::RowNotFound => ApiError::Database("record not found".to_string()),
            _ => ApiError::Database(error.to_string()),
        }
    }
}

impl From<actix_multipart::MultipartError> for ApiError {
    fn from(error: actix_multipart::MultipartError) -> Self {
        ApiError::BadRequest(format!("Multipart error: {}", error))
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(error: serde_json::Error) -> Self {
        ApiError::Internal(format!("JSON serialization error: {}", error))
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
