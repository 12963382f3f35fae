//! HTTP surface for the ingestion service (SPEC_FULL.md §7): the intake
//! endpoint, health/metrics probes, source-map/source-code upload, and
//! the read-only admin lookups, composed behind rate limiting and CORS
//! the way the teacher's `api::mod::init_routes` composes its own scopes.

pub mod auth;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod state;

use actix_cors::Cors;
use actix_web::web;
pub use middleware::rate_limit::{RateLimitConfig, RateLimitMiddlewareFactory};
pub use state::AppState;

/// Registers every route this service exposes. Call from inside
/// `HttpServer::new(|| App::new().app_data(...).configure(monitor_api::init_routes))`.
pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(handlers::report::report)
        .service(handlers::upload::upload_sourcemap)
        .service(handlers::upload::upload_source)
        .service(handlers::health::liveness)
        .service(handlers::health::readiness)
        .service(handlers::health::detailed)
        .service(handlers::health::metrics)
        .service(handlers::admin::get_config)
        .service(handlers::admin::list_rules);
}

/// Permissive CORS policy for the browser/mini-program SDK (spec.md §2,
/// "runs in arbitrary first-party web origins"). Tightened per-deployment
/// via `allowed_origin` calls at the call site if a fixed origin set is
/// known.
pub fn cors() -> Cors {
    Cors::default()
        .allow_any_origin()
        .allow_any_method()
        .allow_any_header()
        .max_age(3600)
}
