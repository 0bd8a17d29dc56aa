use actix_web::web;
use crate::handlers;

/// Configures the public API surface: account routes plus the 15 metered
/// transformation routes. Mounted at the application root in main.rs.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/v1")
            .route("/pricing", web::get().to(handlers::account::pricing))
            .service(
                web::scope("/auth")
                    .route("/signup", web::post().to(handlers::account::signup))
                    .route("/status", web::get().to(handlers::account::status)),
            )
            .route("/compress", web::post().to(handlers::transform::compress))
            .route("/palette", web::post().to(handlers::transform::palette))
            .route("/signature-rip", web::post().to(handlers::transform::signature_rip))
            .route("/auto-tag", web::post().to(handlers::transform::auto_tag))
            .route("/upscale", web::post().to(handlers::transform::upscale))
            .route("/remove-bg", web::post().to(handlers::transform::remove_bg))
            .route("/portrait-mode", web::post().to(handlers::transform::portrait_mode))
            .route("/sticker-maker", web::post().to(handlers::transform::sticker_maker))
            .route("/colorize", web::post().to(handlers::transform::colorize))
            .route("/anime", web::post().to(handlers::transform::anime))
            .route("/instant-studio", web::post().to(handlers::transform::instant_studio))
            .route("/extend", web::post().to(handlers::transform::extend))
            .route("/magic-erase", web::post().to(handlers::transform::magic_erase))
            .route("/vectorize", web::post().to(handlers::transform::vectorize))
            .route("/privacy-blur", web::post().to(handlers::transform::privacy_blur)),
    );
}

/// Configures billing-partner webhook routes (no API key; HMAC-signed
/// bodies). Mounted under the "/webhook" scope in main.rs.
pub fn configure_webhook_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/billing")
            .route("/subscribed", web::post().to(handlers::webhooks::subscribed))
            .route("/changed", web::post().to(handlers::webhooks::changed))
            .route("/cancelled", web::post().to(handlers::webhooks::cancelled)),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{test, App};

    #[actix_web::test]
    async fn pricing_route_answers_without_state() {
        let app = test::init_service(App::new().configure(configure_routes)).await;
        let req = test::TestRequest::get().uri("/v1/pricing").to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());
    }
}
