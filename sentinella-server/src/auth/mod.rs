//! Token di accesso/refresh (HS256) e hashing delle password.

pub mod codec;
pub mod password;
pub mod tokens;

pub use password::{hash_password, hash_password_blocking, verify_password};
pub use tokens::{
    Access, AccessClaims, Claims, Refresh, RefreshClaims, TokenDetails, TokenService,
    ACCESS_TOKEN_TTL_SECS, REFRESH_TOKEN_TTL_SECS,
};
