use std::time::Duration;

use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions};

use crate::config::Config;

pub type Db = MySqlPool;

/// Opens the MySQL pool. Options are built field by field so credentials
/// never need URL escaping.
pub async fn connect(config: &Config) -> anyhow::Result<Db> {
    let options = MySqlConnectOptions::new()
        .host(&config.db_host)
        .port(config.db_port)
        .username(&config.db_user)
        .password(&config.db_password)
        .database(&config.db_name)
        .charset("utf8mb4");

    let pool = MySqlPoolOptions::new()
        .max_connections(config.db_max_connections.max(1))
        .acquire_timeout(Duration::from_secs(10))
        .connect_with(options)
        .await?;

    tracing::info!(
        host = %config.db_host,
        db = %config.db_name,
        max_connections = config.db_max_connections,
        "MySQL pool ready"
    );
    Ok(pool)
}

/// Applies `migrations/`, embedded at compile time.
pub async fn run_migrations(pool: &Db) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    tracing::info!("Schema up to date");
    Ok(())
}
