#![allow(dead_code)]

use actix_web::body::BoxBody;
use actix_web::dev::{ServiceFactory, ServiceRequest, ServiceResponse};
use actix_web::{test, web, App};
use std::sync::Arc;

use visioncore_server::capabilities::registry::CapabilityRegistry;
use visioncore_server::clients::InferenceClient;
use visioncore_server::config::settings::{
    AppConfig, InferenceConfig, LimitsConfig, SecurityConfig, ServerConfig, StoreConfig,
};
use visioncore_server::config::{AppSettings, StoreBackend};
use visioncore_server::db::{MemorySubscriberStore, SubscriberStore};
use visioncore_server::handlers;
use visioncore_server::models::{PlanTier, Subscriber};
use visioncore_server::routes;
use visioncore_server::security::api_keys::{generate_api_key, hash_api_key};
use visioncore_server::services::{AccountService, GatewayService};

pub const HMAC_SECRET: &str = "integration-hmac-secret";
pub const WEBHOOK_SECRET: &str = "integration-webhook-secret";

pub struct TestHarness {
    pub settings: AppSettings,
    pub store: Arc<MemorySubscriberStore>,
    pub gateway: Arc<GatewayService>,
    pub accounts: Arc<AccountService>,
}

pub fn test_settings(inference_base: &str) -> AppSettings {
    AppSettings {
        app: AppConfig {
            name: "visioncore-test".to_string(),
            environment: "test".to_string(),
        },
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            cors_origins: vec!["*".to_string()],
        },
        store: StoreConfig {
            backend: StoreBackend::Memory,
            database_url: None,
            seed_demo_keys: false,
        },
        security: SecurityConfig {
            api_key_hmac_secret: HMAC_SECRET.to_string(),
            billing_webhook_secret: Some(WEBHOOK_SECRET.to_string()),
        },
        inference: InferenceConfig {
            base_url: inference_base.trim_end_matches('/').to_string(),
            api_token: None,
        },
        limits: LimitsConfig {
            max_upload_bytes: 25 * 1024 * 1024,
        },
    }
}

/// Full production wiring over the memory store: real local engines, remote
/// proxies pointed at `inference_base` (a mockito server in the tests that
/// exercise them, an unroutable address everywhere else).
pub fn harness(inference_base: &str) -> TestHarness {
    let settings = test_settings(inference_base);
    let store = Arc::new(MemorySubscriberStore::new());
    let client = InferenceClient::new(&settings.inference).expect("inference client");
    let registry = Arc::new(CapabilityRegistry::production(Arc::new(client)));

    let gateway = Arc::new(GatewayService::new(
        store.clone(),
        registry,
        HMAC_SECRET.to_string(),
    ));
    let accounts = Arc::new(AccountService::new(store.clone(), HMAC_SECRET.to_string()));

    TestHarness {
        settings,
        store,
        gateway,
        accounts,
    }
}

/// The same App shape main.rs serves, minus the logger middleware.
pub fn gateway_app(
    harness: &TestHarness,
) -> App<
    impl ServiceFactory<
        ServiceRequest,
        Config = (),
        Response = ServiceResponse<BoxBody>,
        Error = actix_web::Error,
        InitError = (),
    > + use<>,
> {
    App::new()
        .app_data(web::Data::new(harness.settings.clone()))
        .app_data(web::Data::new(harness.gateway.clone()))
        .app_data(web::Data::new(harness.accounts.clone()))
        .route("/", web::get().to(handlers::health::service_banner))
        .service(web::resource("/health").route(web::get().to(handlers::health::health_check)))
        .configure(routes::configure_routes)
        .service(web::scope("/webhook").configure(routes::configure_webhook_routes))
}

/// Registers a subscriber directly in the store with an arbitrary balance,
/// returning the plaintext key the way signup would.
pub async fn seed_subscriber(
    harness: &TestHarness,
    email: &str,
    tier: PlanTier,
    credits: i64,
) -> (String, Subscriber) {
    let api_key = generate_api_key();
    let digest = hash_api_key(&api_key, HMAC_SECRET).expect("digest");
    let mut subscriber = Subscriber::provision(email.to_string(), None, tier);
    subscriber.credits_remaining = credits;
    harness
        .store
        .insert(&subscriber, &digest)
        .await
        .expect("seed subscriber");
    (api_key, subscriber)
}

pub async fn credits_of(harness: &TestHarness, email: &str) -> i64 {
    harness
        .store
        .find_by_email(email)
        .await
        .expect("ledger read")
        .expect("subscriber exists")
        .credits_remaining
}

const BOUNDARY: &str = "visioncoretestboundary";

/// Hand-rolled multipart encoding; each part is (field name, bytes).
pub fn multipart_payload(parts: &[(&str, &[u8])]) -> (String, Vec<u8>) {
    let mut body = Vec::new();
    for (name, bytes) in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"{}.png\"\r\n",
                name, name
            )
            .as_bytes(),
        );
        body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    (format!("multipart/form-data; boundary={}", BOUNDARY), body)
}

pub fn post_image(uri: &str, api_key: &str, parts: &[(&str, &[u8])]) -> test::TestRequest {
    let (content_type, body) = multipart_payload(parts);
    test::TestRequest::post()
        .uri(uri)
        .insert_header(("X-API-Key", api_key))
        .insert_header(("content-type", content_type))
        .set_payload(body)
}

pub fn png_bytes() -> Vec<u8> {
    let img = image::DynamicImage::ImageRgb8(image::RgbImage::from_fn(24, 24, |x, y| {
        if (x / 4 + y / 4) % 2 == 0 {
            image::Rgb([240, 240, 240])
        } else {
            image::Rgb([20, 20, 20])
        }
    }));
    visioncore_server::imaging::encode_png(&img).expect("png fixture")
}

pub fn jpeg_bytes() -> Vec<u8> {
    let img = image::DynamicImage::new_rgb8(24, 24);
    visioncore_server::imaging::encode_jpeg(&img, 90).expect("jpeg fixture")
}
