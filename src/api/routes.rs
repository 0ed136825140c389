// API route configuration

use crate::api::handlers;
use actix_web::web;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg
        // Health check (no auth required)
        .route("/health", web::get().to(handlers::health_check))
        .route("/", web::get().to(handlers::health_check))
        .service(
            web::scope("/api")
                // Admin only
                .route(
                    "/migrate-instagram",
                    web::post().to(handlers::migrate_batch),
                )
                .route(
                    "/media-store/check",
                    web::get().to(handlers::media_store_check),
                )
                .route("/uploads", web::post().to(handlers::upload_image))
                // Public, throttled per client
                .route("/lazy-migrate", web::post().to(handlers::lazy_migrate))
                .route("/instagram-proxy", web::get().to(handlers::image_proxy)),
        );
}
