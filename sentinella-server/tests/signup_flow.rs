use anyhow::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

use sentinella_core::{SignUpInput, SignupMethod, User};
use sentinella_server::auth::{verify_password, TokenService};
use sentinella_server::config::Secret;
use sentinella_server::provider::{Provider, SqlProvider};
use sentinella_server::signup::{SignupService, MSG_TOKEN_REFRESHED, MSG_USER_CREATED, MSG_USER_EXISTS};
use sentinella_server::{connect_pool, sqlite_url_for_path, AuthError, AuthResult, RequestContext};

struct Harness {
    _td: TempDir,
    provider: Arc<SqlProvider>,
    tokens: Arc<TokenService>,
    service: SignupService,
}

async fn harness() -> Result<Harness> {
    let td = TempDir::new()?;
    let url = sqlite_url_for_path(&td.path().join("sentinella.db"))?;
    let provider = Arc::new(SqlProvider::new(connect_pool(&url).await?).await?);
    let tokens = Arc::new(TokenService::new(Secret::new("test-access"), Secret::new("test-refresh"))?);
    let service = SignupService::new(provider.clone(), tokens.clone());
    Ok(Harness { _td: td, provider, tokens, service })
}

fn input(email: &str, password: &str, confirm: &str) -> SignUpInput {
    SignUpInput {
        email: email.to_string(),
        password: password.to_string(),
        confirm_password: confirm.to_string(),
        ..Default::default()
    }
}

async fn user_count(h: &Harness) -> Result<i64> {
    Ok(sqlx::query_scalar("SELECT COUNT(*) FROM users").fetch_one(h.provider.pool()).await?)
}

#[tokio::test]
async fn valid_signup_returns_tokens_for_new_user() -> Result<()> {
    let h = harness().await?;
    let ctx = RequestContext::background();

    let resp = h.service.signup(&ctx, input("a@x.com", "p", "p")).await?;
    assert_eq!(resp.message, MSG_USER_CREATED);
    let access = resp.access_token.expect("access token");
    let refresh = resp.refresh_token.expect("refresh token");
    assert!(!access.is_empty() && !refresh.is_empty());
    assert_eq!(resp.refresh_expires_at.unwrap() - resp.access_expires_at.unwrap(), 7 * 24 * 3600 - 900);

    // il subject del token è l'id dell'utente appena creato
    let stored = h.provider.get_user_by_email(&ctx, "a@x.com").await?;
    let claims = h.tokens.validate_access_token(&access)?;
    assert_eq!(claims.user_id(), stored.id);
    assert_eq!(h.tokens.validate_refresh_token(&refresh)?.user_id(), stored.id);
    Ok(())
}

#[tokio::test]
async fn signup_applies_defaults_and_hashes_password() -> Result<()> {
    let h = harness().await?;
    let ctx = RequestContext::background();

    h.service.signup(&ctx, input("defaults@x.com", "s3cret", "s3cret")).await?;
    let stored = h.provider.get_user_by_email(&ctx, "defaults@x.com").await?;

    assert_eq!(stored.roles, vec!["user"]);
    assert_eq!(stored.signup_methods, SignupMethod::BasicAuth);
    assert_ne!(stored.password, "s3cret", "password must not be stored in plaintext");
    assert!(verify_password("s3cret", &stored.password));
    Ok(())
}

#[tokio::test]
async fn signup_keeps_profile_roles_and_method() -> Result<()> {
    let h = harness().await?;
    let ctx = RequestContext::background();

    let mut req = input("  profile@x.com ", "p", "p");
    req.username = Some("prof".into());
    req.given_name = Some("Ada".into());
    req.family_name = Some("Lovelace".into());
    req.gender = Some("female".into());
    req.birthdate = Some("1815-12-10".into());
    req.roles = Some(vec!["editor".into(), "user".into(), "editor".into()]);
    req.signup_method = Some(SignupMethod::MagicLinkLogin);
    h.service.signup(&ctx, req).await?;

    // l'email viene salvata senza spazi ai bordi
    let stored = h.provider.get_user_by_email(&ctx, "profile@x.com").await?;
    assert_eq!(stored.username.as_deref(), Some("prof"));
    assert_eq!(stored.given_name.as_deref(), Some("Ada"));
    assert_eq!(stored.family_name.as_deref(), Some("Lovelace"));
    assert_eq!(stored.birthdate.as_deref(), Some("1815-12-10"));
    assert_eq!(stored.roles, vec!["editor", "user"]);
    assert_eq!(stored.signup_methods, SignupMethod::MagicLinkLogin);
    Ok(())
}

#[tokio::test]
async fn missing_email_is_validation_error_and_persists_nothing() -> Result<()> {
    let h = harness().await?;
    let ctx = RequestContext::background();

    for email in ["", "   "] {
        let err = h.service.signup(&ctx, input(email, "p", "p")).await.unwrap_err();
        assert!(matches!(err, AuthError::Validation(_)), "got {err:?}");
    }
    assert_eq!(user_count(&h).await?, 0);
    Ok(())
}

#[tokio::test]
async fn password_mismatch_is_validation_error_and_persists_nothing() -> Result<()> {
    let h = harness().await?;
    let ctx = RequestContext::background();

    let cases = [("p", "q"), ("", ""), ("p", ""), ("", "p")];
    for (password, confirm) in cases {
        let err = h.service.signup(&ctx, input("mismatch@x.com", password, confirm)).await.unwrap_err();
        assert!(matches!(err, AuthError::Validation(_)), "{password:?}/{confirm:?} gave {err:?}");
    }
    assert_eq!(user_count(&h).await?, 0);
    Ok(())
}

#[tokio::test]
async fn second_signup_with_same_email_reports_existing_user() -> Result<()> {
    let h = harness().await?;
    let ctx = RequestContext::background();

    let first = h.service.signup(&ctx, input("a@x.com", "p", "p")).await?;
    assert_eq!(first.message, MSG_USER_CREATED);

    let second = h.service.signup(&ctx, input("a@x.com", "p", "p")).await?;
    assert_eq!(second.message, MSG_USER_EXISTS);
    assert!(second.access_token.is_none());
    assert!(second.refresh_token.is_none());

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE email = 'a@x.com'")
        .fetch_one(h.provider.pool())
        .await?;
    assert_eq!(count, 1);
    Ok(())
}

// Il controllo duplicati precede la validazione della password, come nel flusso originale
#[tokio::test]
async fn existing_user_wins_over_password_validation() -> Result<()> {
    let h = harness().await?;
    let ctx = RequestContext::background();

    h.service.signup(&ctx, input("a@x.com", "p", "p")).await?;
    let resp = h.service.signup(&ctx, input("a@x.com", "", "other")).await?;
    assert_eq!(resp.message, MSG_USER_EXISTS);
    Ok(())
}

#[tokio::test]
async fn refresh_issues_new_pair_for_same_subject() -> Result<()> {
    let h = harness().await?;
    let ctx = RequestContext::background();

    let created = h.service.signup(&ctx, input("r@x.com", "p", "p")).await?;
    let refreshed = h.service.refresh(created.refresh_token.as_deref().unwrap())?;
    assert_eq!(refreshed.message, MSG_TOKEN_REFRESHED);

    let original = h.tokens.validate_access_token(created.access_token.as_deref().unwrap())?;
    let renewed = h.tokens.validate_access_token(refreshed.access_token.as_deref().unwrap())?;
    assert_eq!(original.user_id(), renewed.user_id());

    // un access token non vale come refresh token
    let err = h.service.refresh(created.access_token.as_deref().unwrap()).unwrap_err();
    assert!(matches!(err, AuthError::InvalidToken(_)));
    Ok(())
}

/*
    Provider finto che simula la corsa fra due signup concorrenti: il controllo preventivo
    non trova nulla ma l'insert viene rifiutato dal vincolo di unicità.
*/
struct RacingProvider {
    inserts: AtomicUsize,
}

#[async_trait]
impl Provider for RacingProvider {
    async fn add_user(&self, _ctx: &RequestContext, _user: User) -> AuthResult<User> {
        self.inserts.fetch_add(1, Ordering::SeqCst);
        Err(AuthError::ConstraintViolation("UNIQUE constraint failed: users.email".into()))
    }

    async fn get_user_by_email(&self, _ctx: &RequestContext, email: &str) -> AuthResult<User> {
        Err(AuthError::NotFound(email.to_string()))
    }
}

#[tokio::test]
async fn insert_time_constraint_violation_propagates_unchanged() -> Result<()> {
    let provider = Arc::new(RacingProvider { inserts: AtomicUsize::new(0) });
    let tokens = Arc::new(TokenService::new(Secret::new("a"), Secret::new("b"))?);
    let service = SignupService::new(provider.clone(), tokens);

    let err = service
        .signup(&RequestContext::background(), input("race@x.com", "p", "p"))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::ConstraintViolation(_)), "got {err:?}");
    assert_eq!(provider.inserts.load(Ordering::SeqCst), 1);
    Ok(())
}

// Errori di storage nel controllo preventivo arrivano al chiamante senza insert
struct BrokenProvider;

#[async_trait]
impl Provider for BrokenProvider {
    async fn add_user(&self, _ctx: &RequestContext, _user: User) -> AuthResult<User> {
        panic!("add_user must not be reached");
    }

    async fn get_user_by_email(&self, _ctx: &RequestContext, _email: &str) -> AuthResult<User> {
        Err(AuthError::Storage("disk I/O error".into()))
    }
}

#[tokio::test]
async fn lookup_storage_error_propagates() -> Result<()> {
    let tokens = Arc::new(TokenService::new(Secret::new("a"), Secret::new("b"))?);
    let service = SignupService::new(Arc::new(BrokenProvider), tokens);

    let err = service
        .signup(&RequestContext::background(), input("x@x.com", "p", "p"))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Storage(_)));
    Ok(())
}

// Signup concorrenti con email distinte producono id distinti
#[tokio::test]
async fn concurrent_signups_produce_distinct_subjects() -> Result<()> {
    let h = Arc::new(harness().await?);
    let mut handles = Vec::new();
    for i in 0..8 {
        let h = h.clone();
        handles.push(tokio::spawn(async move {
            let ctx = RequestContext::background();
            h.service.signup(&ctx, input(&format!("c{i}@x.com"), "p", "p")).await
        }));
    }

    let mut subjects = std::collections::HashSet::new();
    for handle in handles {
        let resp = handle.await??;
        let claims = h.tokens.validate_access_token(resp.access_token.as_deref().unwrap())?;
        subjects.insert(claims.sub);
    }
    assert_eq!(subjects.len(), 8);
    assert_eq!(user_count(&h).await?, 8);
    Ok(())
}

// Writer in memoria per catturare l'output del subscriber di tracing
#[derive(Clone, Default)]
struct LogBuffer(Arc<std::sync::Mutex<Vec<u8>>>);

impl std::io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }
    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for LogBuffer {
    type Writer = LogBuffer;
    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

#[tokio::test]
async fn duplicate_signup_logs_do_not_contain_the_email() -> Result<()> {
    let h = harness().await?;
    let ctx = RequestContext::background();
    h.service.signup(&ctx, input("private@x.com", "p", "p")).await?;

    let logs = LogBuffer::default();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_ansi(false)
        .with_writer(logs.clone())
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let resp = h.service.signup(&ctx, input("private@x.com", "p", "p")).await?;
    assert_eq!(resp.message, MSG_USER_EXISTS);

    let out = String::from_utf8(logs.0.lock().unwrap().clone())?;
    assert!(out.contains("signup for existing email"), "log line missing: {out}");
    assert!(!out.contains("private@x.com"), "email leaked into logs: {out}");
    Ok(())
}
