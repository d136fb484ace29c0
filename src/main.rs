use std::net::SocketAddr;

use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use leisure_cover::{
    auth,
    config::{Config, StoreBackend},
    db, maintenance, services,
    state::AppState,
    store::{self, Stores},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── Logging ───────────────────────────────────────────────
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // ── Config ────────────────────────────────────────────────
    let config = Config::from_env()?;
    tracing::info!(env = %config.app_env, "Starting leisure cover backend");

    // ── Stores ────────────────────────────────────────────────
    let stores = match config.store {
        StoreBackend::MySql => {
            let pool = db::connect(&config).await?;
            db::run_migrations(&pool).await?;
            store::mysql::stores(pool, &config)
        }
        StoreBackend::Memory => {
            tracing::warn!("STORE=memory; data is lost on restart");
            Stores::in_memory()
        }
    };

    // ── Seed admin account ────────────────────────────────────
    auth::seed::seed_admin(&stores, &config, services::now()).await?;

    let app_state = AppState::new(stores, config);

    // ── Background jobs ───────────────────────────────────────
    maintenance::spawn_maintenance(app_state.clone());

    let addr: SocketAddr = format!(
        "{}:{}",
        app_state.config.backend_host,
        app_state.config.backend_port
    )
    .parse()?;

    // ── Router ────────────────────────────────────────────────
    let app = leisure_cover::app(app_state);
    tracing::info!(%addr, "Listening");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
