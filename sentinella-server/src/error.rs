use axum::{extract::rejection::JsonRejection, http::StatusCode, response::IntoResponse, Json};
use sentinella_core::Error as WireError;

/// Errori del core di autenticazione.
///
/// Il flusso di signup non recupera nulla localmente: questi valori arrivano
/// invariati al livello HTTP, che li traduce in status code.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Input mancante o non valido, colpa del chiamante.
    #[error("validation error: {0}")]
    Validation(String),

    /// Vincolo di unicità violato dallo store (es. email duplicata).
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// Errore del backend di persistenza, potenzialmente transitorio.
    #[error("storage error: {0}")]
    Storage(String),

    /// Firma errata, struttura malformata o token scaduto.
    #[error("invalid token: {0}")]
    InvalidToken(String),

    /// Claim con forma sbagliata (es. `sub` non stringa).
    #[error("claim decode error: {0}")]
    ClaimDecode(String),

    /// Configurazione mancante o incoerente; va trattato come fatale all'avvio.
    #[error("config error: {0}")]
    Config(String),

    /// Chiamata interrotta da cancellazione o deadline del contesto.
    #[error("cancelled: {0}")]
    Cancelled(String),

    /// Guasto interno del server non legato allo store (hashing, task, panic).
    #[error("internal error: {0}")]
    Internal(String),
}

pub type AuthResult<T> = Result<T, AuthError>;

impl AuthError {
    pub fn validation(msg: impl Into<String>) -> Self {
        AuthError::Validation(msg.into())
    }

    pub fn invalid_token(msg: impl Into<String>) -> Self {
        AuthError::InvalidToken(msg.into())
    }

    /// Codice macchina usato nel body JSON delle risposte di errore.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::Validation(_) => "validation_error",
            AuthError::ConstraintViolation(_) => "conflict",
            AuthError::NotFound(_) => "not_found",
            AuthError::Storage(_) => "storage_error",
            AuthError::InvalidToken(_) => "invalid_token",
            AuthError::ClaimDecode(_) => "claim_decode_error",
            AuthError::Config(_) => "config_error",
            AuthError::Cancelled(_) => "cancelled",
            AuthError::Internal(_) => "internal_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::Validation(_) => StatusCode::BAD_REQUEST,
            AuthError::ConstraintViolation(_) => StatusCode::CONFLICT,
            AuthError::NotFound(_) => StatusCode::NOT_FOUND,
            AuthError::InvalidToken(_) | AuthError::ClaimDecode(_) => StatusCode::UNAUTHORIZED,
            AuthError::Cancelled(_) => StatusCode::SERVICE_UNAVAILABLE,
            AuthError::Storage(_) | AuthError::Config(_) | AuthError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// Mappa gli errori sqlx: la violazione di unicità diventa `ConstraintViolation`,
/// tutto il resto `Storage`.
impl From<sqlx::Error> for AuthError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                AuthError::ConstraintViolation(db.message().to_string())
            }
            _ => AuthError::Storage(e.to_string()),
        }
    }
}

/// Body JSON illeggibile, content-type sbagliato o campi del tipo errato:
/// tutti errori del chiamante, quindi `Validation` (400).
impl From<JsonRejection> for AuthError {
    fn from(rejection: JsonRejection) -> Self {
        AuthError::Validation(rejection.body_text())
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        // i dettagli di storage/config/internal restano nei log, non nel body
        let message = match &self {
            AuthError::Storage(_) | AuthError::Config(_) | AuthError::Internal(_) => {
                "internal error".to_string()
            }
            other => other.to_string(),
        };
        (status, Json(WireError::new(self.code(), message))).into_response()
    }
}
