use anyhow::Context;
use axum::http::StatusCode;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

pub mod auth;
pub mod config;
pub mod context;
pub mod controllers;
pub mod error;
pub mod provider;
pub mod routes;
pub mod signup;

pub use config::{Config, DatabaseType};
pub use context::RequestContext;
pub use error::{AuthError, AuthResult};

use auth::TokenService;
use provider::{Provider, SqlProvider};
use signup::SignupService;

pub const MEMORY_URL: &str = "sqlite::memory:";

/// Stato condiviso fra gli handler.
#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub signup: SignupService,
    pub tokens: Arc<TokenService>,
    pub request_timeout: Duration,
}

impl AppState {
    /// Sceglie il provider in base a `DATABASE_TYPE` e collega il servizio token.
    /// Fallisce subito se i segreti non sono validi.
    pub async fn new(pool: SqlitePool, config: &Config) -> anyhow::Result<Self> {
        let tokens = Arc::new(TokenService::from_config(config).context("load token secrets")?);
        let provider: Arc<dyn Provider> = match config.database_type {
            DatabaseType::Sqlite => {
                Arc::new(SqlProvider::new(pool.clone()).await.context("init sql provider")?)
            }
        };
        Ok(Self {
            pool,
            signup: SignupService::new(provider, tokens.clone()),
            tokens,
            request_timeout: config.request_timeout,
        })
    }

    /// Contesto con la deadline configurata, uno per richiesta.
    pub fn request_context(&self) -> RequestContext {
        RequestContext::with_timeout(self.request_timeout)
    }
}

// Dato un percorso di file, restituisce un URL SQLite valido. Crea le directory genitrici se non esistono.
pub fn sqlite_url_for_path(p: &Path) -> anyhow::Result<String> {
    let abs = if p.is_absolute() {
        p.to_path_buf()
    } else {
        std::env::current_dir()?.join(p)
    };
    if let Some(parent) = abs.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create parent dirs for {:?}", parent))?;
    }
    let s = abs.to_string_lossy().replace('\\', "/");
    Ok(format!("sqlite://{}", s))
}

/// Normalizza il DATABASE_URL della configurazione: "sqlite::memory:" resta com'è,
/// altrimenti si toglie l'eventuale prefisso "sqlite://" e si risolve il percorso.
pub fn build_sqlite_url(raw: &str) -> anyhow::Result<String> {
    if raw == MEMORY_URL {
        return Ok(raw.to_string());
    }
    // Rimuovi il prefisso "sqlite://" se presente, per ottenere il percorso del file.
    let path_part = raw
        .strip_prefix("sqlite://")
        .or_else(|| raw.strip_prefix("sqlite:"))
        .unwrap_or(raw);
    sqlite_url_for_path(&PathBuf::from(path_part))
}

// Connessione al database: restituisce un pool. Il file viene creato se manca.
pub async fn connect_pool(db_url: &str) -> anyhow::Result<SqlitePool> {
    let mut options = SqliteConnectOptions::from_str(db_url)
        .with_context(|| format!("parse sqlite url {}", db_url))?
        .create_if_missing(true)
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(5));

    let pool_options = if db_url == MEMORY_URL {
        // ogni connessione in-memory è un database diverso: una sola, mai chiusa
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        // WAL: letture concorrenti mentre una scrittura è in corso
        options = options.journal_mode(SqliteJournalMode::Wal);
        SqlitePoolOptions::new().max_connections(8)
    };

    let pool = pool_options
        .connect_with(options)
        .await
        .with_context(|| format!("connect to sqlite via {}", db_url))?;
    Ok(pool)
}

// Esegue le migrazioni del database. Crea le tabelle se non esistono, quindi si può
// lanciare a ogni avvio.
pub async fn run_migrations(pool: &SqlitePool) -> anyhow::Result<()> {
    let stmts = [
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id             TEXT PRIMARY KEY,
            email          TEXT NOT NULL UNIQUE,
            username       TEXT,
            password       TEXT NOT NULL,
            given_name     TEXT,
            middle_name    TEXT,
            family_name    TEXT,
            gender         TEXT,
            birthdate      TEXT,
            roles          TEXT NOT NULL DEFAULT '["user"]',
            signup_methods TEXT NOT NULL DEFAULT 'basic_auth',
            created_at     TEXT NOT NULL
        );"#,
    ];
    // applica ogni statement di migrazione
    for s in &stmts {
        sqlx::query(s)
            .execute(pool)
            .await
            .with_context(|| format!("apply migration: {}", &s[..s.len().min(40)].replace('\n', " ")))?;
    }
    Ok(())
}

/// Controlla lo stato di salute del database tentando di acquisire una connessione dal pool.
pub async fn health_with_pool(pool: &SqlitePool) -> StatusCode {
    match pool.acquire().await {
        Ok(_) => StatusCode::OK,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}
