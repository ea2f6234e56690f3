use actix_web::{web, App, HttpServer};
use anyhow::Context;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use document_store::{DocumentStore, InMemoryStore, PgDocumentStore};
use recommendation_service::config::Config;
use recommendation_service::handlers;
use recommendation_service::jobs::{spawn_suggestion_sweeper, SweepConfig};
use recommendation_service::metrics::serve_metrics;
use recommendation_service::AppContext;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,actix_web=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;

    tracing::info!(
        "Starting recommendation-service v{}",
        env!("CARGO_PKG_VERSION")
    );
    tracing::info!("Environment: {}", config.app.env);

    // Initialize document store
    let store: Arc<dyn DocumentStore> = match &config.database.url {
        Some(url) => {
            let pool = sqlx::postgres::PgPoolOptions::new()
                .max_connections(config.database.max_connections)
                .connect(url)
                .await
                .context("Failed to create database pool")?;
            let store = PgDocumentStore::new(pool);
            store
                .migrate()
                .await
                .context("Failed to run document store migrations")?;
            Arc::new(store)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory document store");
            Arc::new(InMemoryStore::new())
        }
    };

    let ctx = Arc::new(AppContext::new(store, config.suggestions));

    // Start background sweep
    let sweeper = spawn_suggestion_sweeper(ctx.clone(), SweepConfig::from(&config.sweep));

    let app_ctx = web::Data::from(ctx);

    // Start HTTP server
    let server_result = HttpServer::new(move || {
        App::new()
            .app_data(app_ctx.clone())
            .route("/health", web::get().to(|| async { "OK" }))
            .route("/metrics", web::get().to(serve_metrics))
            .configure(handlers::configure)
    })
    .bind(format!("0.0.0.0:{}", config.app.port))?
    .run()
    .await;

    tracing::info!("HTTP server stopped, shutting down suggestion sweep");
    sweeper.shutdown().await;

    server_result.context("HTTP server error")
}
