//! Flusso di signup: validazione, controllo duplicati, persistenza ed emissione token.

use std::sync::Arc;

use sentinella_core::{normalize_roles, now_timestamp, new_user_id, AuthResponse, SignUpInput, User};

use crate::auth::{hash_password_blocking, TokenDetails, TokenService};
use crate::context::RequestContext;
use crate::error::{AuthError, AuthResult};
use crate::provider::Provider;

pub const MSG_USER_CREATED: &str = "User created successfully";
pub const MSG_USER_EXISTS: &str = "User already exist";
pub const MSG_TOKEN_REFRESHED: &str = "Token refreshed successfully";

#[derive(Clone)]
pub struct SignupService {
    provider: Arc<dyn Provider>,
    tokens: Arc<TokenService>,
}

fn with_tokens(message: &str, t: TokenDetails) -> AuthResponse {
    AuthResponse {
        message: message.to_string(),
        access_token: Some(t.access_token),
        refresh_token: Some(t.refresh_token),
        access_expires_at: Some(t.access_expires_at),
        refresh_expires_at: Some(t.refresh_expires_at),
    }
}

impl SignupService {
    pub fn new(provider: Arc<dyn Provider>, tokens: Arc<TokenService>) -> Self {
        Self { provider, tokens }
    }

    /// Registra un nuovo utente e restituisce la coppia di token.
    ///
    /// Se l'email esiste già la risposta non è un errore: contiene solo il messaggio
    /// [`MSG_USER_EXISTS`]. Il controllo preventivo è solo un'ottimizzazione: con due
    /// signup concorrenti sulla stessa email vince il vincolo UNIQUE dello store e il
    /// perdente riceve `ConstraintViolation` da `add_user`.
    pub async fn signup(&self, ctx: &RequestContext, input: SignUpInput) -> AuthResult<AuthResponse> {
        let email = input.email.trim().to_string();
        if email.is_empty() {
            return Err(AuthError::validation("email required"));
        }

        match self.provider.get_user_by_email(ctx, &email).await {
            Ok(_) => {
                tracing::debug!("signup for existing email");
                return Ok(AuthResponse::message_only(MSG_USER_EXISTS));
            }
            Err(AuthError::NotFound(_)) => {}
            Err(e) => return Err(e),
        }

        if input.password.is_empty() {
            return Err(AuthError::validation("password required"));
        }
        if input.confirm_password.is_empty() {
            return Err(AuthError::validation("confirm password required"));
        }
        if input.password != input.confirm_password {
            return Err(AuthError::validation("password and confirm password do not match"));
        }

        let user = User {
            id: new_user_id(),
            email,
            username: input.username,
            password: hash_password_blocking(input.password).await?,
            given_name: input.given_name,
            middle_name: input.middle_name,
            family_name: input.family_name,
            gender: input.gender,
            birthdate: input.birthdate,
            roles: normalize_roles(input.roles),
            signup_methods: input.signup_method.unwrap_or_default(),
            created_at: now_timestamp(),
        };

        let user = self.provider.add_user(ctx, user).await?;
        let tokens = self.tokens.issue_token_pair(&user.id)?;

        tracing::info!(user_id = %user.id, method = %user.signup_methods, "user created");
        Ok(with_tokens(MSG_USER_CREATED, tokens))
    }

    /// Emette una nuova coppia a partire da un refresh token valido. Nessuno stato lato server.
    pub fn refresh(&self, refresh_token: &str) -> AuthResult<AuthResponse> {
        let claims = self.tokens.validate_refresh_token(refresh_token)?;
        let tokens = self.tokens.issue_token_pair(claims.user_id())?;
        Ok(with_tokens(MSG_TOKEN_REFRESHED, tokens))
    }
}
