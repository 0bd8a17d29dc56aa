use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use anyhow::Context;
use dotenv::dotenv;
use std::net::TcpListener;
use std::sync::Arc;

use visioncore_server::capabilities::registry::CapabilityRegistry;
use visioncore_server::clients::InferenceClient;
use visioncore_server::config::{AppSettings, StoreBackend};
use visioncore_server::db::connection::create_pool;
use visioncore_server::db::{MemorySubscriberStore, PgSubscriberStore, SubscriberStore};
use visioncore_server::handlers;
use visioncore_server::models::PlanTier;
use visioncore_server::routes;
use visioncore_server::services::{AccountService, GatewayService};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load environment variables from .env file
    dotenv().ok();

    // Initialize logger
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    // Load application settings
    let app_settings = match AppSettings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            log::error!("Failed to load application settings: {}", e);
            log::error!("Cannot start server without valid settings");
            std::process::exit(1);
        }
    };

    // Subscriber store (postgres in production, memory for local work)
    let store = match build_store(&app_settings).await {
        Ok(store) => store,
        Err(e) => {
            log::error!("Failed to initialize the subscriber store: {:#}", e);
            log::error!("Cannot start server without a working store");
            std::process::exit(1);
        }
    };

    // Inference backend client shared by the remote capabilities
    let inference_client = match InferenceClient::new(&app_settings.inference) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            log::error!("Failed to initialize the inference client: {}", e);
            std::process::exit(1);
        }
    };
    let registry = Arc::new(CapabilityRegistry::production(inference_client));

    let gateway = Arc::new(GatewayService::new(
        Arc::clone(&store),
        registry,
        app_settings.security.api_key_hmac_secret.clone(),
    ));
    let accounts = Arc::new(AccountService::new(
        Arc::clone(&store),
        app_settings.security.api_key_hmac_secret.clone(),
    ));

    gateway.limiter().start_cleanup_task();

    if app_settings.store.backend == StoreBackend::Memory && app_settings.store.seed_demo_keys {
        seed_demo_subscribers(&accounts).await;
    }

    // Get server host and port from settings
    let host = &app_settings.server.host;
    let port = app_settings.server.port;

    log::info!("Starting server at http://{}:{}", host, port);

    let server_addr = format!("{}:{}", host, port);
    let listener = TcpListener::bind(server_addr)?;

    HttpServer::new(move || {
        let app_settings = app_settings.clone();
        let gateway = gateway.clone();
        let accounts = accounts.clone();

        // Configure CORS using actix-cors
        let mut cors = Cors::default();
        if app_settings.server.cors_origins.contains(&"*".to_string()) {
            cors = cors.allow_any_origin();
        } else {
            for origin in &app_settings.server.cors_origins {
                cors = cors.allowed_origin(origin);
            }
        }
        cors = cors.allow_any_method().allow_any_header();

        App::new()
            .wrap(Logger::default())
            .wrap(cors)
            .app_data(web::Data::new(app_settings))
            .app_data(web::Data::new(gateway))
            .app_data(web::Data::new(accounts))
            // Service banner and liveness, outside the metered surface
            .route("/", web::get().to(handlers::health::service_banner))
            .service(
                web::resource("/health").route(web::get().to(handlers::health::health_check)),
            )
            // Account and transformation routes (/v1/*)
            .configure(routes::configure_routes)
            // Billing-partner webhooks (no API key, HMAC-signed)
            .service(web::scope("/webhook").configure(routes::configure_webhook_routes))
    })
    .listen(listener)?
    .run()
    .await
}

async fn build_store(settings: &AppSettings) -> anyhow::Result<Arc<dyn SubscriberStore>> {
    match settings.store.backend {
        StoreBackend::Postgres => {
            let url = settings
                .store
                .database_url
                .as_deref()
                .context("DATABASE_URL is required when STORE_BACKEND is postgres")?;
            let pool = create_pool(url).await.context("database connection failed")?;
            Ok(Arc::new(PgSubscriberStore::new(pool)))
        }
        StoreBackend::Memory => {
            log::info!("Using the in-memory subscriber store; data is not persisted");
            Ok(Arc::new(MemorySubscriberStore::new()))
        }
    }
}

/// Memory-store convenience: one well-known subscriber per tier so local
/// requests can be sent without going through signup first. Keys land in
/// the log on purpose; this never runs against Postgres.
async fn seed_demo_subscribers(accounts: &AccountService) {
    for tier in PlanTier::ALL {
        let email = format!("{}@demo.visioncore.local", tier);
        match accounts.signup(&email, Some(format!("Demo {}", tier)), tier).await {
            Ok(issued) => log::info!("Seeded {} demo key: {}", tier, issued.api_key),
            Err(e) => log::warn!("Could not seed {} demo subscriber: {}", tier, e),
        }
    }
}
