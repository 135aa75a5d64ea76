use std::marker::PhantomData;

use serde::{Deserialize, Serialize};
use sentinella_core::now_unix;

use crate::auth::codec;
use crate::config::{Config, Secret};
use crate::error::{AuthError, AuthResult};

/// Durata dell'access token: 15 minuti.
pub const ACCESS_TOKEN_TTL_SECS: i64 = 15 * 60;
/// Durata del refresh token: 7 giorni.
pub const REFRESH_TOKEN_TTL_SECS: i64 = 7 * 24 * 60 * 60;

/// Marker per i claim dell'access token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Access;

/// Marker per i claim del refresh token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Refresh;

/// Claim firmati: soggetto (id utente), emissione e scadenza in secondi Unix.
/// Il parametro `K` distingue a compile time access e refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct Claims<K> {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
    #[serde(skip)]
    kind: PhantomData<K>,
}

pub type AccessClaims = Claims<Access>;
pub type RefreshClaims = Claims<Refresh>;

impl<K> Claims<K> {
    pub fn new(sub: impl Into<String>, iat: i64, exp: i64) -> Self {
        Self { sub: sub.into(), iat, exp, kind: PhantomData }
    }

    pub fn user_id(&self) -> &str {
        &self.sub
    }

    pub fn is_expired_at(&self, now: i64) -> bool {
        self.exp <= now
    }
}

/// Coppia di token emessa al signup (o al refresh).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenDetails {
    pub access_token: String,
    pub refresh_token: String,
    pub access_expires_at: i64,
    pub refresh_expires_at: i64,
}

/// Emissione e validazione dei token. Stateless: contiene solo i due segreti,
/// immutabili dopo la costruzione, quindi si condivide con un semplice `Arc`.
#[derive(Debug)]
pub struct TokenService {
    access_secret: Secret,
    refresh_secret: Secret,
}

impl TokenService {
    /// Fallisce con `Config` se un segreto è vuoto (o solo spazi) o se i due coincidono:
    /// con segreti uguali un refresh token passerebbe come access token.
    pub fn new(access_secret: Secret, refresh_secret: Secret) -> AuthResult<Self> {
        if access_secret.is_blank() {
            return Err(AuthError::Config("ACCESS_SECRET is empty or unset".into()));
        }
        if refresh_secret.is_blank() {
            return Err(AuthError::Config("REFRESH_SECRET is empty or unset".into()));
        }
        if access_secret == refresh_secret {
            return Err(AuthError::Config("ACCESS_SECRET and REFRESH_SECRET must differ".into()));
        }
        Ok(Self { access_secret, refresh_secret })
    }

    pub fn from_config(config: &Config) -> AuthResult<Self> {
        Self::new(config.access_secret.clone(), config.refresh_secret.clone())
    }

    pub fn issue_token_pair(&self, subject: &str) -> AuthResult<TokenDetails> {
        self.issue_token_pair_at(subject, now_unix())
    }

    /// Come [`TokenService::issue_token_pair`] con l'istante di emissione esplicito.
    pub fn issue_token_pair_at(&self, subject: &str, now: i64) -> AuthResult<TokenDetails> {
        if subject.is_empty() {
            return Err(AuthError::validation("token subject required"));
        }
        let access_expires_at = now + ACCESS_TOKEN_TTL_SECS;
        let refresh_expires_at = now + REFRESH_TOKEN_TTL_SECS;

        let access_token =
            codec::encode(&AccessClaims::new(subject, now, access_expires_at), self.access_secret.expose())?;
        let refresh_token = codec::encode(
            &RefreshClaims::new(subject, now, refresh_expires_at),
            self.refresh_secret.expose(),
        )?;

        Ok(TokenDetails { access_token, refresh_token, access_expires_at, refresh_expires_at })
    }

    pub fn validate_access_token(&self, token: &str) -> AuthResult<AccessClaims> {
        self.validate_access_token_at(token, now_unix())
    }

    pub fn validate_access_token_at(&self, token: &str, now: i64) -> AuthResult<AccessClaims> {
        validate(token, &self.access_secret, now)
    }

    pub fn validate_refresh_token(&self, token: &str) -> AuthResult<RefreshClaims> {
        self.validate_refresh_token_at(token, now_unix())
    }

    pub fn validate_refresh_token_at(&self, token: &str, now: i64) -> AuthResult<RefreshClaims> {
        validate(token, &self.refresh_secret, now)
    }
}

fn validate<K>(token: &str, secret: &Secret, now: i64) -> AuthResult<Claims<K>> {
    let claims: Claims<K> = codec::decode(token, secret.expose())?;
    if claims.is_expired_at(now) {
        return Err(AuthError::invalid_token("token expired"));
    }
    if claims.sub.is_empty() {
        return Err(AuthError::ClaimDecode("empty subject".into()));
    }
    Ok(claims)
}
