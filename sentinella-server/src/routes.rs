use axum::{response::{IntoResponse, Response}, routing::{get, post}, Router, Extension};
use std::any::Any;
use std::sync::Arc;
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};

use crate::AppState;
use crate::controllers;
use crate::error::AuthError;

pub fn router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/", get(controllers::root))
        .route("/health", get(controllers::health))
        .route("/api/signup", post(controllers::signup))
        .route("/api/token/refresh", post(controllers::refresh))
        .route("/api/me", get(controllers::me))
        .layer(Extension(state));
    with_middleware(api)
}

/// Log di ogni richiesta (span tracing) e recupero dai panic degli handler:
/// un panic diventa un 500 con l'errore sul wire invece di chiudere la connessione.
pub fn with_middleware(router: Router) -> Router {
    router
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TraceLayer::new_for_http())
}

fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!(panic = %detail, "handler panicked");
    AuthError::Internal(format!("handler panicked: {detail}")).into_response()
}
