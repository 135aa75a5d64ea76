use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{AuthError, AuthResult};

pub const DEFAULT_DATABASE_URL: &str = "sentinella.db";
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Segreto HMAC letto dall'ambiente. Azzerato in memoria al drop, mai stampato.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Secret(Vec<u8>);

impl Secret {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Secret(bytes.into())
    }

    pub fn expose(&self) -> &[u8] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Vuoto o fatto solo di spazi: inutilizzabile come chiave HMAC.
    pub fn is_blank(&self) -> bool {
        self.0.iter().all(u8::is_ascii_whitespace)
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

/// Backend di persistenza supportati. Per ora solo SQLite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseType {
    Sqlite,
}

/// Configurazione del processo, costruita una volta all'avvio e passata per riferimento.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_type: DatabaseType,
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub access_secret: Secret,
    pub refresh_secret: Secret,
    pub request_timeout: Duration,
    pub log_level: String,
}

impl Config {
    /// Legge la configurazione dalle variabili d'ambiente del processo.
    pub fn from_env() -> AuthResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Come [`Config::from_env`] ma con una sorgente arbitraria, comoda nei test.
    /// I valori vuoti valgono come non impostati.
    pub fn from_lookup<F>(lookup: F) -> AuthResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let database_type = match get("DATABASE_TYPE").as_deref() {
            None | Some("sqlite") | Some("sqlite3") => DatabaseType::Sqlite,
            Some(other) => {
                return Err(AuthError::Config(format!("unsupported DATABASE_TYPE: {other}")))
            }
        };

        let database_url = get("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());

        let bind = get("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr: SocketAddr = bind
            .parse()
            .map_err(|e| AuthError::Config(format!("invalid BIND_ADDR {bind:?}: {e}")))?;

        let request_timeout = match get("REQUEST_TIMEOUT_SECS") {
            Some(raw) => {
                let secs: u64 = raw.parse().map_err(|e| {
                    AuthError::Config(format!("invalid REQUEST_TIMEOUT_SECS {raw:?}: {e}"))
                })?;
                if secs == 0 {
                    return Err(AuthError::Config("REQUEST_TIMEOUT_SECS must be > 0".into()));
                }
                Duration::from_secs(secs)
            }
            None => Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        };

        // trim come per le altre variabili; i segreti vuoti li rifiuta TokenService::new
        let access_secret = Secret::new(get("ACCESS_SECRET").unwrap_or_default());
        let refresh_secret = Secret::new(get("REFRESH_SECRET").unwrap_or_default());

        Ok(Config {
            database_type,
            database_url,
            bind_addr,
            access_secret,
            refresh_secret,
            request_timeout,
            log_level: get("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }
}
