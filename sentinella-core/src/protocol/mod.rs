pub mod http;

// Re-export comodi
pub use http::{AuthResponse, HealthResponse, MeResponse, RefreshRequest, SignUpInput};
