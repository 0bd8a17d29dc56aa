pub mod account;
pub mod health;
pub mod transform;
pub mod webhooks;

use actix_web::HttpRequest;

use crate::error::ApiError;

pub const API_KEY_HEADER: &str = "X-API-Key";

/// Pulls the API key out of the request header. Absence and non-ASCII junk
/// both read as "no credentials".
pub fn api_key_from(req: &HttpRequest) -> Result<&str, ApiError> {
    req.headers()
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .ok_or_else(|| ApiError::Unauthorized("missing X-API-Key header".to_string()))
}
