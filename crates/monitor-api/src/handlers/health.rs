//! Health endpoints (spec.md §6): liveness, readiness, and a detailed
//! status view, grounded in the teacher's `api::health`/`api::metrics`
//! handlers but trimmed to the fields spec.md actually names.

use crate::state::AppState;
use actix_web::{get, web, HttpResponse};
use serde::Serialize;
use serde_json::json;
use std::time::Instant;

#[derive(Debug, Serialize)]
struct ServiceHealth {
    status: &'static str,
    response_time_ms: Option<u64>,
}

#[derive(Debug, Serialize)]
struct Metrics {
    total_errors: u64,
    error_rate: f64,
    avg_response_time_ms: f64,
}

async fn check_database(state: &AppState) -> ServiceHealth {
    let Some(pool) = &state.db_pool else {
        return ServiceHealth {
            status: "not_configured",
            response_time_ms: None,
        };
    };
    let start = Instant::now();
    match sqlx::query("SELECT 1").execute(pool).await {
        Ok(_) => ServiceHealth {
            status: "healthy",
            response_time_ms: Some(start.elapsed().as_millis() as u64),
        },
        Err(_) => ServiceHealth {
            status: "unhealthy",
            response_time_ms: None,
        },
    }
}

/// `GET /api/health` — liveness: the process is up and can respond.
#[get("/api/health")]
pub async fn liveness() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "status": "healthy" }))
}

/// `GET /api/health/readiness` — can this instance accept traffic.
#[get("/api/health/readiness")]
pub async fn readiness(state: web::Data<AppState>) -> HttpResponse {
    let database = check_database(&state).await;
    let status = if database.status == "unhealthy" {
        "unhealthy"
    } else {
        "healthy"
    };
    let code = if status == "unhealthy" {
        actix_web::http::StatusCode::SERVICE_UNAVAILABLE
    } else {
        actix_web::http::StatusCode::OK
    };
    HttpResponse::build(code).json(json!({
        "status": status,
        "services": { "database": database },
    }))
}

/// `GET /api/health/detailed` (spec.md §6): full status + metrics
/// summary.
#[get("/api/health/detailed")]
pub async fn detailed(state: web::Data<AppState>) -> HttpResponse {
    let database = check_database(&state).await;
    let status = if database.status == "unhealthy" {
        "unhealthy"
    } else {
        "healthy"
    };

    // Per-process totals aren't tracked outside the Prometheus registry;
    // the detailed view surfaces zeros until a scraper reads `/api/metrics`
    // rather than re-deriving a second counting path.
    let metrics = Metrics {
        total_errors: 0,
        error_rate: 0.0,
        avg_response_time_ms: 0.0,
    };

    HttpResponse::Ok().json(json!({
        "status": status,
        "uptime": state.uptime_seconds(),
        "services": { "database": database },
        "metrics": metrics,
    }))
}

/// `GET /api/metrics` — Prometheus scrape target.
#[get("/api/metrics")]
pub async fn metrics() -> HttpResponse {
    match monitor_ingest::metrics::export_metrics() {
        Ok(body) => HttpResponse::Ok()
            .content_type("text/plain; version=0.0.4; charset=utf-8")
            .body(body),
        Err(e) => HttpResponse::InternalServerError().json(json!({
            "error": "metrics_export_failed",
            "message": e.to_string(),
        })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{test, App};

    #[actix_web::test]
    async fn liveness_reports_healthy() {
        let app = test::init_service(App::new().service(liveness)).await;
        let req = test::TestRequest::get().uri("/api/health").to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());
    }
}
