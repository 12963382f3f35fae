//! Ingestion service binary: loads config, connects to Postgres, wires
//! the repositories into a [`monitor_ingest::Pipeline`], and serves the
//! HTTP surface — grounded in the teacher's
//! `workflow-engine-app::main`/`services/content_processing::main`
//! startup sequences.

use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use monitor_ingest::config::IngestConfig;
use monitor_ingest::repository::filesystem::FilesystemSourceArchiveRepository;
use monitor_ingest::repository::postgres::{
    PostgresAggregationRepository, PostgresAlertHistoryRepository, PostgresAlertRuleRepository,
    PostgresConfigRepository,
};
use monitor_ingest::sink::PostgresRawEventSink;
use monitor_ingest::{Pipeline, PipelineDeps};
use sqlx::postgres::PgPoolOptions;
use std::env;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        ))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    let config = IngestConfig::from_env()?;
    config.validate()?;

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await?;

    let source_root = env::var("MONITOR_SOURCE_ARCHIVE_ROOT")
        .unwrap_or_else(|_| "./data/source-archives".to_string());

    let deps = PipelineDeps {
        sink: Arc::new(PostgresRawEventSink::new(pool.clone())),
        aggregations: Arc::new(PostgresAggregationRepository::new(pool.clone())),
        configs: Arc::new(PostgresConfigRepository::new(pool.clone())),
        alert_rules: Arc::new(PostgresAlertRuleRepository::new(pool.clone())),
        alert_history: Arc::new(PostgresAlertHistoryRepository::new(pool.clone())),
        source_archives: Arc::new(FilesystemSourceArchiveRepository::new(
            source_root,
            Some(pool.clone()),
        )),
    };

    let configs = deps.configs.clone();
    let alert_rules = deps.alert_rules.clone();
    let source_archives = deps.source_archives.clone();
    let sink = deps.sink.clone();
    let config_cache = Arc::new(monitor_ingest::config_cache::ConfigCache::new(
        configs.clone(),
        std::time::Duration::from_secs(config.cache.project_config_ttl_seconds),
    ));

    let pipeline = Arc::new(Pipeline::new(&config, deps)?);
    let require_api_key = env::var("MONITOR_REQUIRE_API_KEY")
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);

    let app_state = web::Data::new(monitor_api::state::AppState {
        pipeline,
        configs,
        config_cache,
        alert_rules,
        source_archives,
        sink,
        db_pool: Some(pool),
        started_at: std::time::Instant::now(),
        require_api_key,
    });

    let rate_limit_config = monitor_api::RateLimitConfig {
        requests_per_minute: env::var("MONITOR_RATE_LIMIT_PER_MINUTE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(600),
        burst_size: env::var("MONITOR_RATE_LIMIT_BURST")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(50),
    };

    let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port = env::var("PORT").unwrap_or_else(|_| "8080".to_string());
    let bind_addr = format!("{host}:{port}");

    tracing::info!(addr = %bind_addr, "starting ingestion service");

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .app_data(app_state.clone())
            .wrap(Logger::default())
            .wrap(cors)
            .wrap(monitor_api::RateLimitMiddlewareFactory::new(rate_limit_config.clone()))
            .configure(monitor_api::init_routes)
    })
    .bind(bind_addr)?
    .run()
    .await?;

    Ok(())
}
