use async_trait::async_trait;
use sentinella_core::{new_user_id, SignupMethod, User};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};

use crate::context::RequestContext;
use crate::error::{AuthError, AuthResult};
use crate::provider::Provider;
use crate::run_migrations;

/// Provider SQL su SQLite (sqlx). Il pool è condiviso fra le richieste:
/// nessun lock applicativo, l'unicità dell'email la garantisce il vincolo UNIQUE.
#[derive(Debug, Clone)]
pub struct SqlProvider {
    pool: SqlitePool,
}

impl SqlProvider {
    /// Crea il provider ed esegue le migrazioni (idempotenti) prima del primo uso.
    pub async fn new(pool: SqlitePool) -> anyhow::Result<Self> {
        run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

// converte una riga della tabella users nel modello condiviso
fn user_from_row(row: &SqliteRow) -> AuthResult<User> {
    let roles_json: String = row.try_get("roles")?;
    let roles: Vec<String> = serde_json::from_str(&roles_json)
        .map_err(|e| AuthError::Storage(format!("corrupted roles column: {e}")))?;
    let method: String = row.try_get("signup_methods")?;
    let signup_methods = method.parse::<SignupMethod>().map_err(AuthError::Storage)?;

    Ok(User {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        username: row.try_get("username")?,
        password: row.try_get("password")?,
        given_name: row.try_get("given_name")?,
        middle_name: row.try_get("middle_name")?,
        family_name: row.try_get("family_name")?,
        gender: row.try_get("gender")?,
        birthdate: row.try_get("birthdate")?,
        roles,
        signup_methods,
        created_at: row.try_get("created_at")?,
    })
}

#[async_trait]
impl Provider for SqlProvider {
    async fn add_user(&self, ctx: &RequestContext, mut user: User) -> AuthResult<User> {
        if user.id.is_empty() {
            user.id = new_user_id();
        }
        let roles = serde_json::to_string(&user.roles)
            .map_err(|e| AuthError::Storage(format!("encode roles: {e}")))?;

        let insert = sqlx::query(
            "INSERT INTO users (id, email, username, password, given_name, middle_name, family_name, \
             gender, birthdate, roles, signup_methods, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&user.id)
        .bind(&user.email)
        .bind(&user.username)
        .bind(&user.password)
        .bind(&user.given_name)
        .bind(&user.middle_name)
        .bind(&user.family_name)
        .bind(&user.gender)
        .bind(&user.birthdate)
        .bind(&roles)
        .bind(user.signup_methods.as_str())
        .bind(&user.created_at)
        .execute(&self.pool);

        // la violazione di UNIQUE diventa ConstraintViolation tramite From<sqlx::Error>
        ctx.run(async { insert.await.map_err(AuthError::from) }).await.map_err(|e| {
            if matches!(e, AuthError::ConstraintViolation(_)) {
                tracing::warn!(user_id = %user.id, "insert rejected by unique constraint");
            }
            e
        })?;

        tracing::debug!(user_id = %user.id, "user row inserted");
        Ok(user)
    }

    async fn get_user_by_email(&self, ctx: &RequestContext, email: &str) -> AuthResult<User> {
        let lookup = sqlx::query(
            "SELECT id, email, username, password, given_name, middle_name, family_name, \
             gender, birthdate, roles, signup_methods, created_at FROM users WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(&self.pool);

        let row = ctx.run(async { lookup.await.map_err(AuthError::from) }).await?;
        match row {
            Some(row) => user_from_row(&row),
            None => Err(AuthError::NotFound(format!("no user with email {email}"))),
        }
    }
}
