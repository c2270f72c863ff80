use relist_api::{app, state::{AppState, AuthSettings}};
use relist_store::list_repo::{PgCatalogStore, PgListLockStore, PgListWriter, PgSearchEngine};
use relist_store::{RedisRateLimiter, RedisSessionStore};
use relist_wizard::{ConfirmationEngine, WizardOrchestrator, WizardRules};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "relist_api=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = relist_store::app_config::Config::load().expect("Failed to load config");
    tracing::info!("Starting Relist API on port {}", config.server.port);

    let pool = relist_store::database::connect(&config.database.url, config.database.max_connections)
        .await
        .expect("Failed to connect to Postgres");

    let redis_client = relist_store::RedisClient::new(&config.redis.url)
        .await
        .expect("Failed to connect to Redis");

    let catalog = Arc::new(PgCatalogStore::new(pool.clone()));
    let engine = Arc::new(PgSearchEngine::new(pool.clone()));
    let locks = Arc::new(PgListLockStore::new(pool.clone()));
    let writer = Arc::new(PgListWriter::new(pool));
    let sessions = Arc::new(RedisSessionStore::new(redis_client.clone()));
    let limiter = Arc::new(RedisRateLimiter::new(
        redis_client,
        config.wizard.rate_limit_capacity,
        config.wizard.rate_limit_window_seconds,
    ));

    let rules = WizardRules {
        max_candidates: config.wizard.max_candidates,
        min_brand_results: config.wizard.min_brand_results,
        max_stores: config.wizard.max_stores,
    };

    let orchestrator = Arc::new(WizardOrchestrator::new(
        catalog.clone(),
        engine,
        sessions.clone(),
        locks.clone(),
        limiter,
        rules,
    ));
    let confirmation = Arc::new(ConfirmationEngine::new(catalog, writer, sessions, locks));

    let app_state = AppState {
        orchestrator,
        confirmation,
        auth: AuthSettings {
            secret: config.auth.jwt_secret.clone(),
        },
    };

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
