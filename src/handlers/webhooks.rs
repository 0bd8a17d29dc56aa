use actix_web::{web, HttpRequest, HttpResponse};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;

use crate::config::AppSettings;
use crate::error::ApiError;
use crate::models::PlanTier;
use crate::security::webhook_signature::verify_signature;
use crate::services::AccountService;

pub const SIGNATURE_HEADER: &str = "X-Billing-Signature";

#[derive(Deserialize)]
pub struct SubscriptionEvent {
    pub email: String,
    pub name: Option<String>,
    pub tier: String,
}

#[derive(Deserialize)]
pub struct CancellationEvent {
    pub email: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SubscriptionActivated {
    api_key: String,
    tier: PlanTier,
    credits: i64,
}

/// Checks the body signature before anything is parsed. With no secret
/// configured the webhook surface stays closed; an open fallback would let
/// anyone mint paid accounts.
fn verify_webhook(req: &HttpRequest, body: &[u8], settings: &AppSettings) -> Result<(), ApiError> {
    let secret = settings
        .security
        .billing_webhook_secret
        .as_deref()
        .ok_or_else(|| {
            warn!("billing webhook called but BILLING_WEBHOOK_SECRET is not set");
            ApiError::Unauthorized("billing webhooks are not enabled".to_string())
        })?;

    let presented = req
        .headers()
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("missing webhook signature".to_string()))?;

    if !verify_signature(secret, body, presented) {
        warn!("billing webhook rejected: signature mismatch");
        return Err(ApiError::Unauthorized("invalid webhook signature".to_string()));
    }
    Ok(())
}

fn parse_tier(raw: &str) -> Result<PlanTier, ApiError> {
    PlanTier::from_str(raw).map_err(ApiError::BadRequest)
}

fn parse_event<T: serde::de::DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    serde_json::from_slice(body)
        .map_err(|e| ApiError::BadRequest(format!("malformed webhook body: {}", e)))
}

/// New subscription from the billing partner. Creates or reactivates the
/// account and hands the partner a fresh key to forward to the customer.
pub async fn subscribed(
    req: HttpRequest,
    body: web::Bytes,
    accounts: web::Data<Arc<AccountService>>,
    settings: web::Data<AppSettings>,
) -> Result<HttpResponse, ApiError> {
    verify_webhook(&req, &body, &settings)?;
    let event: SubscriptionEvent = parse_event(&body)?;
    let tier = parse_tier(&event.tier)?;

    let issued = accounts
        .activate_subscription(&event.email, event.name, tier)
        .await?;
    info!("billing webhook: subscription at {} for {}", tier, event.email);

    Ok(HttpResponse::Ok().json(SubscriptionActivated {
        api_key: issued.api_key,
        tier: issued.subscriber.tier,
        credits: issued.subscriber.credits_remaining,
    }))
}

/// Plan change. The key stays; the ledger resets to the new allowance.
pub async fn changed(
    req: HttpRequest,
    body: web::Bytes,
    accounts: web::Data<Arc<AccountService>>,
    settings: web::Data<AppSettings>,
) -> Result<HttpResponse, ApiError> {
    verify_webhook(&req, &body, &settings)?;
    let event: SubscriptionEvent = parse_event(&body)?;
    let tier = parse_tier(&event.tier)?;

    let subscriber = accounts.change_tier(&event.email, tier).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "tier": subscriber.tier,
        "credits": subscriber.credits_remaining,
    })))
}

pub async fn cancelled(
    req: HttpRequest,
    body: web::Bytes,
    accounts: web::Data<Arc<AccountService>>,
    settings: web::Data<AppSettings>,
) -> Result<HttpResponse, ApiError> {
    verify_webhook(&req, &body, &settings)?;
    let event: CancellationEvent = parse_event(&body)?;

    accounts.cancel(&event.email).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "cancelled": true,
    })))
}
