use anyhow::Context;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

// ri-utilizziamo le funzioni e strutture definite in lib.rs
use sentinella_server::{build_sqlite_url, connect_pool, routes, AppState, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Configurazione dall'ambiente: fallisce subito se qualcosa non va
    let config = Config::from_env().context("load configuration")?;

    // RUST_LOG ha la precedenza, altrimenti LOG_LEVEL
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // Costruisci l'URL del database SQLite
    let db_url = build_sqlite_url(&config.database_url).context("build sqlite DATABASE_URL")?;
    tracing::info!(%db_url, "using database");
    // Connetti al database
    let pool = connect_pool(&db_url).await.context("connect to sqlite")?;
    // Stato condiviso: provider (con migrazioni) e servizio token
    let state = Arc::new(AppState::new(pool, &config).await?);
    let app = routes::router(state);

    tracing::info!(addr = %config.bind_addr, "listening");
    // Crea il listener TCP, un socket tcp legato all'indirizzo configurato
    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .context("bind tcp listener")?;
    // Avvia il server Axum
    axum::serve(listener, app.into_make_service())
        .await
        .context("server shutdown")?;

    Ok(())
}
