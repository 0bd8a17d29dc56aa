use actix_web::{HttpResponse, Responder};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    status: String,
    version: String,
}

pub async fn health_check() -> impl Responder {
    let response = HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    };

    HttpResponse::Ok().json(response)
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceBanner {
    status: String,
    version: String,
    message: String,
    signup: String,
    pricing: String,
}

/// Root banner pointing newcomers at signup and pricing.
pub async fn service_banner() -> impl Responder {
    let banner = ServiceBanner {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        message: "VisionCore API is running".to_string(),
        signup: "/v1/auth/signup".to_string(),
        pricing: "/v1/pricing".to_string(),
    };

    HttpResponse::Ok().json(banner)
}
