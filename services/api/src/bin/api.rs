//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{
        Argon2Hasher, DbAdapter, MemoryCache, PgAccountRepository, PgTransactionManager,
        PgTransferRepository, RedisCache,
    },
    config::Config,
    error::ApiError,
    web::{build_router, state::AppState},
};
use bank_core::ports::{
    AccountRepository, CacheStore, SecretHasher, TransactionManager, TransferRepository,
};
use bank_core::services::{AccountService, AuthService, TransferService};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Config::from_env()?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await?;
    info!("Running database migrations...");
    DbAdapter::new(db_pool.clone()).run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Initialize Service Adapters ---
    let cache: Arc<dyn CacheStore> = match &config.redis_url {
        Some(url) => {
            info!("Connecting to Redis session cache...");
            Arc::new(RedisCache::connect(url).await?)
        }
        None => {
            info!("REDIS_URL not set, keeping sessions in process memory");
            Arc::new(MemoryCache::new())
        }
    };
    let tx_manager: Arc<dyn TransactionManager> =
        Arc::new(PgTransactionManager::new(db_pool.clone()));
    let accounts: Arc<dyn AccountRepository> = Arc::new(PgAccountRepository::new(db_pool.clone()));
    let transfers: Arc<dyn TransferRepository> = Arc::new(PgTransferRepository::new(db_pool));
    let hasher: Arc<dyn SecretHasher> = Arc::new(Argon2Hasher::new());

    // --- 4. Build the Shared AppState ---
    let app_state = Arc::new(AppState {
        accounts: AccountService::new(accounts.clone(), hasher.clone()),
        auth: AuthService::new(accounts.clone(), cache, hasher)
            .with_session_ttl(config.session_ttl),
        transfers: TransferService::new(tx_manager, accounts, transfers),
    });

    // --- 5. Create the Web Router ---
    let app = build_router(app_state, &config);

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    if config.enable_docs {
        info!(
            "Swagger UI available at http://{}/swagger-ui",
            config.bind_address
        );
    }
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
