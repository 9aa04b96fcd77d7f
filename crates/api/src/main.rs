//! TrailTalk support-chat server

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use trailtalk_api::{routes, store::PgSessionStore, AppState, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let pool =
        trailtalk_shared::db::create_pool(&config.database_url, config.database_max_connections)
            .await?;
    trailtalk_shared::db::run_migrations(&pool).await?;

    let store = Arc::new(PgSessionStore::new(pool));
    let bind_address = config.bind_address.clone();
    let state = AppState::new(config, store);

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    tracing::info!(addr = %bind_address, "support chat server listening");

    axum::serve(listener, routes::create_router(state)).await?;

    Ok(())
}
