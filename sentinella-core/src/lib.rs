//! sentinella-core: tipi condivisi tra client e server (modelli, DTO HTTP, errori).
//! Niente I/O: il crate server si occupa di database, token e rete.

pub mod models;
pub mod protocol;
pub mod error;
pub mod utils;

// Re-export utili per ridurre i percorsi nei crate client/server
pub use error::Error;
pub use models::{normalize_roles, SignupMethod, User, DEFAULT_ROLE};
pub use protocol::http::{
    AuthResponse, HealthResponse, MeResponse, RefreshRequest, SignUpInput,
};
pub use utils::{new_user_id, now_timestamp, now_unix};
