mod common;

use actix_web::test;
use futures_util::future::join_all;
use pretty_assertions::assert_eq;
use serde_json::Value;

use common::{
    credits_of, gateway_app, harness, jpeg_bytes, png_bytes, post_image, seed_subscriber,
};
use visioncore_server::models::PlanTier;

const DEAD_BACKEND: &str = "http://127.0.0.1:1";

#[actix_web::test]
async fn unknown_key_is_unauthorized_and_ledger_unchanged() {
    let h = harness(DEAD_BACKEND);
    let (_key, subscriber) = seed_subscriber(&h, "a@example.com", PlanTier::Free, 50).await;
    let app = test::init_service(gateway_app(&h)).await;

    let req = post_image("/v1/compress", "vck_live_nope", &[("file", &png_bytes())]).to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status().as_u16(), 401);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"]["error_type"], "unauthorized");
    assert_eq!(credits_of(&h, &subscriber.email).await, 50);
}

#[actix_web::test]
async fn missing_key_header_is_unauthorized() {
    let h = harness(DEAD_BACKEND);
    let app = test::init_service(gateway_app(&h)).await;

    let (content_type, body) = common::multipart_payload(&[("file", &png_bytes()[..])]);
    let req = test::TestRequest::post()
        .uri("/v1/compress")
        .insert_header(("content-type", content_type))
        .set_payload(body)
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status().as_u16(), 401);
}

#[actix_web::test]
async fn free_tier_upscale_is_forbidden_with_credits_intact() {
    let h = harness(DEAD_BACKEND);
    let (key, subscriber) = seed_subscriber(&h, "free@example.com", PlanTier::Free, 50).await;
    let app = test::init_service(gateway_app(&h)).await;

    let req = post_image("/v1/upscale", &key, &[("file", &png_bytes())]).to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status().as_u16(), 403);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"]["error_type"], "forbidden");
    assert_eq!(credits_of(&h, &subscriber.email).await, 50);
}

#[actix_web::test]
async fn zero_credits_is_quota_exceeded_and_stays_zero() {
    let h = harness(DEAD_BACKEND);
    let (key, subscriber) = seed_subscriber(&h, "broke@example.com", PlanTier::Pro, 0).await;
    let app = test::init_service(gateway_app(&h)).await;

    let req = post_image("/v1/compress", &key, &[("file", &png_bytes())]).to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status().as_u16(), 402);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"]["error_type"], "quota_exceeded");
    assert_eq!(credits_of(&h, &subscriber.email).await, 0);
}

#[actix_web::test]
async fn compress_round_trip_returns_jpeg_and_spends_one_credit() {
    let h = harness(DEAD_BACKEND);
    let (key, subscriber) = seed_subscriber(&h, "jpeg@example.com", PlanTier::Free, 50).await;
    let app = test::init_service(gateway_app(&h)).await;

    let req = post_image("/v1/compress?quality=70", &key, &[("file", &jpeg_bytes())]).to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status().as_u16(), 200);
    assert_eq!(
        resp.headers().get("content-type").unwrap().to_str().unwrap(),
        "image/jpeg"
    );
    assert_eq!(
        resp.headers()
            .get("X-Credits-Remaining")
            .unwrap()
            .to_str()
            .unwrap(),
        "49"
    );

    let body = test::read_body(resp).await;
    let decoded = image::load_from_memory(&body).expect("response must be a decodable image");
    assert_eq!((decoded.width(), decoded.height()), (24, 24));
    assert_eq!(credits_of(&h, &subscriber.email).await, 49);
}

#[actix_web::test]
async fn palette_returns_json_colors() {
    let h = harness(DEAD_BACKEND);
    let (key, _) = seed_subscriber(&h, "palette@example.com", PlanTier::Free, 5).await;
    let app = test::init_service(gateway_app(&h)).await;

    let req = post_image("/v1/palette?count=2", &key, &[("file", &png_bytes())]).to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status().as_u16(), 200);
    let body: Value = test::read_body_json(resp).await;
    let colors = body["colors"].as_array().expect("colors array");
    // the fixture is a two-tone checkerboard
    assert_eq!(colors.len(), 2);
    for color in colors {
        let hex = color.as_str().unwrap();
        assert!(hex.starts_with('#') && hex.len() == 7, "bad swatch {}", hex);
    }
    let swatches: Vec<&str> = colors.iter().filter_map(|c| c.as_str()).collect();
    assert!(swatches.contains(&"#f0f0f0"), "{:?}", swatches);
    assert!(swatches.contains(&"#141414"), "{:?}", swatches);
}

#[actix_web::test]
async fn enterprise_corrupt_vectorize_is_bad_request_and_keeps_the_credit() {
    let h = harness(DEAD_BACKEND);
    let (key, subscriber) = seed_subscriber(&h, "ent@example.com", PlanTier::Enterprise, 1).await;
    let app = test::init_service(gateway_app(&h)).await;

    let req = post_image("/v1/vectorize", &key, &[("file", b"not an image at all")]).to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status().as_u16(), 400);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"]["error_type"], "bad_request");
    assert_eq!(credits_of(&h, &subscriber.email).await, 1);
}

#[actix_web::test]
async fn magic_erase_without_mask_is_bad_request_before_any_spend() {
    let h = harness(DEAD_BACKEND);
    let (key, subscriber) = seed_subscriber(&h, "mask@example.com", PlanTier::Enterprise, 9).await;
    let app = test::init_service(gateway_app(&h)).await;

    let req = post_image("/v1/magic-erase", &key, &[("file", &png_bytes())]).to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status().as_u16(), 400);
    assert_eq!(credits_of(&h, &subscriber.email).await, 9);
}

#[actix_web::test]
async fn invalid_option_value_is_bad_request() {
    let h = harness(DEAD_BACKEND);
    let (key, subscriber) = seed_subscriber(&h, "opts@example.com", PlanTier::Free, 5).await;
    let app = test::init_service(gateway_app(&h)).await;

    let req = post_image("/v1/compress?quality=150", &key, &[("file", &png_bytes())]).to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status().as_u16(), 400);
    assert_eq!(credits_of(&h, &subscriber.email).await, 5);
}

#[actix_web::test]
async fn n_credits_admit_exactly_n_of_many_calls() {
    let h = harness(DEAD_BACKEND);
    let credits = 10i64;
    let (key, subscriber) =
        seed_subscriber(&h, "race@example.com", PlanTier::Enterprise, credits).await;
    let app = test::init_service(gateway_app(&h)).await;

    let requests = (0..30).map(|_| {
        let req = post_image("/v1/compress", &key, &[("file", &png_bytes())]).to_request();
        test::call_service(&app, req)
    });
    let responses = join_all(requests).await;

    let successes = responses.iter().filter(|r| r.status().is_success()).count();
    let rejected = responses
        .iter()
        .filter(|r| r.status().as_u16() == 402)
        .count();
    assert_eq!(successes as i64, credits);
    assert_eq!(rejected, 30 - credits as usize);
    assert_eq!(credits_of(&h, &subscriber.email).await, 0);
}

#[actix_web::test]
async fn free_tier_rate_limit_returns_429_without_spending() {
    let h = harness(DEAD_BACKEND);
    let (key, subscriber) = seed_subscriber(&h, "chatty@example.com", PlanTier::Free, 50).await;
    let app = test::init_service(gateway_app(&h)).await;

    // Free allows 10 requests per minute
    let mut statuses = Vec::new();
    for _ in 0..12 {
        let req = post_image("/v1/compress", &key, &[("file", &png_bytes())]).to_request();
        let resp = test::call_service(&app, req).await;
        statuses.push(resp.status().as_u16());
    }

    assert!(statuses[..10].iter().all(|s| *s == 200));
    assert!(statuses[10..].iter().all(|s| *s == 429));
    assert_eq!(credits_of(&h, &subscriber.email).await, 40);
}

#[actix_web::test]
async fn remote_operation_proxies_to_the_backend() {
    let mut server = mockito::Server::new_async().await;
    let fake_cutout = png_bytes();
    let mock = server
        .mock("POST", "/v1/models/birefnet-general")
        .with_status(200)
        .with_header("content-type", "image/png")
        .with_body(fake_cutout.clone())
        .create_async()
        .await;

    let h = harness(&server.url());
    let (key, subscriber) = seed_subscriber(&h, "remote@example.com", PlanTier::Starter, 3).await;
    let app = test::init_service(gateway_app(&h)).await;

    let req = post_image("/v1/remove-bg", &key, &[("file", &png_bytes())]).to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status().as_u16(), 200);
    assert_eq!(
        resp.headers().get("content-type").unwrap().to_str().unwrap(),
        "image/png"
    );
    let body = test::read_body(resp).await;
    assert_eq!(body.as_ref(), fake_cutout.as_slice());
    assert_eq!(credits_of(&h, &subscriber.email).await, 2);
    mock.assert_async().await;
}

#[actix_web::test]
async fn backend_failure_is_internal_error_and_refunds() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/v1/models/birefnet-general")
        .with_status(503)
        .with_body("gpu pool exhausted")
        .create_async()
        .await;

    let h = harness(&server.url());
    let (key, subscriber) = seed_subscriber(&h, "flaky@example.com", PlanTier::Starter, 3).await;
    let app = test::init_service(gateway_app(&h)).await;

    let req = post_image("/v1/remove-bg", &key, &[("file", &png_bytes())]).to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status().as_u16(), 500);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"]["error_type"], "internal_error");
    // detail stays in the log
    assert!(!body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("gpu pool exhausted"));
    assert_eq!(credits_of(&h, &subscriber.email).await, 3);
}

#[actix_web::test]
async fn cancelled_subscription_stops_authenticating() {
    let h = harness(DEAD_BACKEND);
    let (key, subscriber) = seed_subscriber(&h, "gone@example.com", PlanTier::Pro, 10).await;
    h.accounts.cancel(&subscriber.email).await.unwrap();
    let app = test::init_service(gateway_app(&h)).await;

    let req = post_image("/v1/compress", &key, &[("file", &png_bytes())]).to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status().as_u16(), 401);
}
