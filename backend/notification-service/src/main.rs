use actix_web::{middleware, web, App, HttpServer};
use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use document_store::{DocumentStore, InMemoryStore, PgDocumentStore};
use notification_service::config::Config;
use notification_service::handlers;
use notification_service::jobs::{spawn_receipt_reconciler, ReceiptReconciler};
use notification_service::metrics::{self, serve_metrics};
use notification_service::AppState;
use push_gateway::{ExpoPushClient, PushGateway};

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
        "Starting notification-service v{}",
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

    // Initialize push gateway
    if config.push.access_token.is_none() {
        tracing::info!("EXPO_ACCESS_TOKEN not set, sending unauthenticated push requests");
    }
    let gateway: Arc<dyn PushGateway> = Arc::new(ExpoPushClient::new(
        config.push.api_url.clone(),
        config.push.access_token.clone(),
    ));

    let state = web::Data::new(AppState::new(store.clone(), gateway.clone(), config.realtime));

    // Start receipt reconciliation
    let reconciler = Arc::new(ReceiptReconciler::new(
        store,
        gateway,
        state.ledger.clone(),
    ));
    let reconciler = spawn_receipt_reconciler(
        reconciler,
        Duration::from_secs(config.push.receipt_interval_secs.max(1)),
    );

    let addr = format!("0.0.0.0:{}", config.app.port);
    tracing::info!("Starting HTTP server on {}", addr);

    // Start HTTP server
    let server_result = HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(middleware::Logger::default())
            .wrap(metrics::MetricsMiddleware)
            .route("/health", web::get().to(|| async { "OK" }))
            .route("/metrics", web::get().to(serve_metrics))
            .configure(handlers::configure)
    })
    .bind(&addr)?
    .run()
    .await;

    tracing::info!("HTTP server stopped, shutting down receipt reconciler");
    reconciler.shutdown().await;

    server_result.context("HTTP server error")
}
