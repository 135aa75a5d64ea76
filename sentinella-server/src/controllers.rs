use axum::{
    extract::{Extension, FromRequest},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    Json,
};
use sentinella_core::{AuthResponse, HealthResponse, MeResponse, RefreshRequest, SignUpInput};
use std::sync::Arc;

use crate::error::AuthError;
use crate::signup::MSG_USER_CREATED;
use crate::{health_with_pool, AppState};

/// Estrattore JSON che trasforma i rifiuti di axum (body malformato, content-type
/// sbagliato, campi del tipo errato) in `AuthError::Validation`, così anche questi
/// errori arrivano al client come `Error {code, message}`.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AuthError))]
pub struct AppJson<T>(pub T);

/// Handler per GET /
pub async fn root() -> &'static str {
    "Welcome to sentinella!"
}

/// Handler per GET /health
pub async fn health(Extension(state): Extension<Arc<AppState>>) -> (StatusCode, Json<HealthResponse>) {
    let status = health_with_pool(&state.pool).await;
    let body = if status.is_success() {
        HealthResponse { status: "ok".into(), message: "Server is running".into() }
    } else {
        HealthResponse { status: "unavailable".into(), message: "database unreachable".into() }
    };
    (status, Json(body))
}

/// Handler per POST /api/signup
///
/// 201 se l'utente è stato creato, 200 con il solo messaggio se esisteva già.
pub async fn signup(
    Extension(state): Extension<Arc<AppState>>,
    AppJson(req): AppJson<SignUpInput>,
) -> Result<(StatusCode, Json<AuthResponse>), AuthError> {
    let ctx = state.request_context();
    let resp = state.signup.signup(&ctx, req).await.inspect_err(|e| {
        tracing::debug!(error = %e, "signup failed");
    })?;
    let status = if resp.message == MSG_USER_CREATED { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(resp)))
}

/// Handler per POST /api/token/refresh
pub async fn refresh(
    Extension(state): Extension<Arc<AppState>>,
    AppJson(req): AppJson<RefreshRequest>,
) -> Result<Json<AuthResponse>, AuthError> {
    let resp = state.signup.refresh(&req.refresh_token).inspect_err(|e| {
        tracing::warn!(error = %e, "refresh token rejected");
    })?;
    Ok(Json(resp))
}

/// Handler per GET /api/me: identità dall'access token in `Authorization: Bearer ...`.
pub async fn me(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<MeResponse>, AuthError> {
    let token = bearer_token(&headers)?;
    let claims = state.tokens.validate_access_token(token).inspect_err(|e| {
        tracing::warn!(error = %e, "access token rejected");
    })?;
    Ok(Json(MeResponse {
        user_id: claims.sub.clone(),
        issued_at: claims.iat,
        expires_at: claims.exp,
    }))
}

fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or_else(|| AuthError::invalid_token("missing Authorization header"))?
        .to_str()
        .map_err(|_| AuthError::invalid_token("Authorization header is not ASCII"))?;
    match value.split_once(' ') {
        Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty() => {
            Ok(token.trim())
        }
        _ => Err(AuthError::invalid_token("expected Bearer token")),
    }
}
