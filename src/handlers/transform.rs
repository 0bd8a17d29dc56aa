use actix_multipart::Multipart;
use actix_web::{web, HttpRequest, HttpResponse};
use std::sync::Arc;

use crate::capabilities::TransformOutput;
use crate::config::AppSettings;
use crate::error::ApiError;
use crate::ops::params::RawOptions;
use crate::ops::Operation;
use crate::services::GatewayService;
use crate::utils::multipart::collect_image_upload;

use super::api_key_from;

/// Shared runner behind the 15 metered routes. Authentication happens
/// before the upload is drained so a bad key never pays the cost of
/// receiving the body.
async fn run_transform(
    op: Operation,
    req: HttpRequest,
    payload: Multipart,
    query: web::Query<RawOptions>,
    gateway: web::Data<Arc<GatewayService>>,
    settings: web::Data<AppSettings>,
) -> Result<HttpResponse, ApiError> {
    let api_key = api_key_from(&req)?;
    let subscriber = gateway.authenticate(api_key).await?;

    let upload = collect_image_upload(payload, settings.limits.max_upload_bytes).await?;
    let response = gateway
        .execute_for(subscriber, op, upload.file, upload.mask, &query)
        .await?;

    let mut builder = HttpResponse::Ok();
    builder.insert_header(("X-Credits-Remaining", response.credits_remaining.to_string()));
    Ok(match response.output {
        TransformOutput::Binary(bytes) => builder.content_type(response.content_type).body(bytes),
        TransformOutput::Json(value) => builder.json(value),
    })
}

pub async fn compress(
    req: HttpRequest,
    payload: Multipart,
    query: web::Query<RawOptions>,
    gateway: web::Data<Arc<GatewayService>>,
    settings: web::Data<AppSettings>,
) -> Result<HttpResponse, ApiError> {
    run_transform(Operation::Compress, req, payload, query, gateway, settings).await
}

pub async fn palette(
    req: HttpRequest,
    payload: Multipart,
    query: web::Query<RawOptions>,
    gateway: web::Data<Arc<GatewayService>>,
    settings: web::Data<AppSettings>,
) -> Result<HttpResponse, ApiError> {
    run_transform(Operation::Palette, req, payload, query, gateway, settings).await
}

pub async fn signature_rip(
    req: HttpRequest,
    payload: Multipart,
    query: web::Query<RawOptions>,
    gateway: web::Data<Arc<GatewayService>>,
    settings: web::Data<AppSettings>,
) -> Result<HttpResponse, ApiError> {
    run_transform(Operation::SignatureRip, req, payload, query, gateway, settings).await
}

pub async fn auto_tag(
    req: HttpRequest,
    payload: Multipart,
    query: web::Query<RawOptions>,
    gateway: web::Data<Arc<GatewayService>>,
    settings: web::Data<AppSettings>,
) -> Result<HttpResponse, ApiError> {
    run_transform(Operation::AutoTag, req, payload, query, gateway, settings).await
}

pub async fn upscale(
    req: HttpRequest,
    payload: Multipart,
    query: web::Query<RawOptions>,
    gateway: web::Data<Arc<GatewayService>>,
    settings: web::Data<AppSettings>,
) -> Result<HttpResponse, ApiError> {
    run_transform(Operation::Upscale, req, payload, query, gateway, settings).await
}

pub async fn remove_bg(
    req: HttpRequest,
    payload: Multipart,
    query: web::Query<RawOptions>,
    gateway: web::Data<Arc<GatewayService>>,
    settings: web::Data<AppSettings>,
) -> Result<HttpResponse, ApiError> {
    run_transform(Operation::RemoveBg, req, payload, query, gateway, settings).await
}

pub async fn portrait_mode(
    req: HttpRequest,
    payload: Multipart,
    query: web::Query<RawOptions>,
    gateway: web::Data<Arc<GatewayService>>,
    settings: web::Data<AppSettings>,
) -> Result<HttpResponse, ApiError> {
    run_transform(Operation::PortraitMode, req, payload, query, gateway, settings).await
}

pub async fn sticker_maker(
    req: HttpRequest,
    payload: Multipart,
    query: web::Query<RawOptions>,
    gateway: web::Data<Arc<GatewayService>>,
    settings: web::Data<AppSettings>,
) -> Result<HttpResponse, ApiError> {
    run_transform(Operation::StickerMaker, req, payload, query, gateway, settings).await
}

pub async fn colorize(
    req: HttpRequest,
    payload: Multipart,
    query: web::Query<RawOptions>,
    gateway: web::Data<Arc<GatewayService>>,
    settings: web::Data<AppSettings>,
) -> Result<HttpResponse, ApiError> {
    run_transform(Operation::Colorize, req, payload, query, gateway, settings).await
}

pub async fn anime(
    req: HttpRequest,
    payload: Multipart,
    query: web::Query<RawOptions>,
    gateway: web::Data<Arc<GatewayService>>,
    settings: web::Data<AppSettings>,
) -> Result<HttpResponse, ApiError> {
    run_transform(Operation::Anime, req, payload, query, gateway, settings).await
}

pub async fn instant_studio(
    req: HttpRequest,
    payload: Multipart,
    query: web::Query<RawOptions>,
    gateway: web::Data<Arc<GatewayService>>,
    settings: web::Data<AppSettings>,
) -> Result<HttpResponse, ApiError> {
    run_transform(Operation::InstantStudio, req, payload, query, gateway, settings).await
}

pub async fn extend(
    req: HttpRequest,
    payload: Multipart,
    query: web::Query<RawOptions>,
    gateway: web::Data<Arc<GatewayService>>,
    settings: web::Data<AppSettings>,
) -> Result<HttpResponse, ApiError> {
    run_transform(Operation::Extend, req, payload, query, gateway, settings).await
}

pub async fn magic_erase(
    req: HttpRequest,
    payload: Multipart,
    query: web::Query<RawOptions>,
    gateway: web::Data<Arc<GatewayService>>,
    settings: web::Data<AppSettings>,
) -> Result<HttpResponse, ApiError> {
    run_transform(Operation::MagicErase, req, payload, query, gateway, settings).await
}

pub async fn vectorize(
    req: HttpRequest,
    payload: Multipart,
    query: web::Query<RawOptions>,
    gateway: web::Data<Arc<GatewayService>>,
    settings: web::Data<AppSettings>,
) -> Result<HttpResponse, ApiError> {
    run_transform(Operation::Vectorize, req, payload, query, gateway, settings).await
}

pub async fn privacy_blur(
    req: HttpRequest,
    payload: Multipart,
    query: web::Query<RawOptions>,
    gateway: web::Data<Arc<GatewayService>>,
    settings: web::Data<AppSettings>,
) -> Result<HttpResponse, ApiError> {
    run_transform(Operation::PrivacyBlur, req, payload, query, gateway, settings).await
}
