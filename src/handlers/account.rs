use actix_web::{web, HttpRequest, HttpResponse, Responder};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;

use crate::error::ApiError;
use crate::models::PlanTier;
use crate::ops::Operation;
use crate::services::{AccountService, GatewayService};

use super::api_key_from;

#[derive(Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub name: Option<String>,
    pub tier: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupResponse {
    api_key: String,
    tier: PlanTier,
    monthly_credits: i64,
    period_renews_at: DateTime<Utc>,
    message: String,
}

/// Self-serve key issuance. The plaintext key appears in this response and
/// nowhere else.
pub async fn signup(
    body: web::Json<SignupRequest>,
    accounts: web::Data<Arc<AccountService>>,
) -> Result<HttpResponse, ApiError> {
    let body = body.into_inner();
    let tier = match body.tier.as_deref() {
        Some(raw) => PlanTier::from_str(raw).map_err(ApiError::BadRequest)?,
        None => PlanTier::Free,
    };
    let issued = accounts.signup(&body.email, body.name, tier).await?;

    Ok(HttpResponse::Ok().json(SignupResponse {
        api_key: issued.api_key,
        tier: issued.subscriber.tier,
        monthly_credits: issued.subscriber.credits_remaining,
        period_renews_at: issued.subscriber.period_renews_at,
        message: "API key generated. Send it in the X-API-Key header.".to_string(),
    }))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    active: bool,
    email: String,
    tier: PlanTier,
    credits_remaining: i64,
    monthly_allowance: i64,
    period_renews_at: DateTime<Utc>,
    total_calls: i64,
    created_at: DateTime<Utc>,
}

/// Key status and remaining balance. Reads are free; this never touches the
/// ledger.
pub async fn status(
    req: HttpRequest,
    gateway: web::Data<Arc<GatewayService>>,
) -> Result<HttpResponse, ApiError> {
    let api_key = api_key_from(&req)?;
    let subscriber = gateway.authenticate(api_key).await?;

    Ok(HttpResponse::Ok().json(StatusResponse {
        active: subscriber.is_active,
        email: subscriber.email,
        tier: subscriber.tier,
        credits_remaining: subscriber.credits_remaining,
        monthly_allowance: subscriber.tier.monthly_allowance(),
        period_renews_at: subscriber.period_renews_at,
        total_calls: subscriber.total_calls,
        created_at: subscriber.created_at,
    }))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanInfo {
    tier: PlanTier,
    monthly_price_cents: u32,
    monthly_credits: i64,
    requests_per_minute: Option<u32>,
    routes: Vec<&'static str>,
}

#[derive(Serialize)]
pub struct PricingResponse {
    tiers: Vec<PlanInfo>,
}

pub async fn pricing() -> impl Responder {
    let tiers = PlanTier::ALL
        .into_iter()
        .map(|tier| PlanInfo {
            tier,
            monthly_price_cents: tier.monthly_price_cents(),
            monthly_credits: tier.monthly_allowance(),
            requests_per_minute: tier.requests_per_minute(),
            routes: Operation::accessible(tier).map(|op| op.route()).collect(),
        })
        .collect();

    HttpResponse::Ok().json(PricingResponse { tiers })
}
