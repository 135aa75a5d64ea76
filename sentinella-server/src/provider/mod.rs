//! Provider di persistenza: contratto stretto (`add_user`, `get_user_by_email`)
//! così che altri backend (documentali, NoSQL) si aggiungano senza toccare il signup.

use async_trait::async_trait;
use sentinella_core::User;

use crate::context::RequestContext;
use crate::error::AuthResult;

pub mod sql;

pub use sql::SqlProvider;

#[async_trait]
pub trait Provider: Send + Sync {
    /// Salva un nuovo utente. Se `user.id` è vuoto ne genera uno (UUIDv4),
    /// altrimenti lo usa così com'è. Email duplicata => `ConstraintViolation`.
    async fn add_user(&self, ctx: &RequestContext, user: User) -> AuthResult<User>;

    /// Ricerca esatta per email. Nessuna riga => `NotFound`.
    async fn get_user_by_email(&self, ctx: &RequestContext, email: &str) -> AuthResult<User>;
}
