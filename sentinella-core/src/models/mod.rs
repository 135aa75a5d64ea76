pub mod user;

// Re-export per comodità
pub use user::{normalize_roles, SignupMethod, User, DEFAULT_ROLE};
