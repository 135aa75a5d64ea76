use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Ruolo assegnato quando la richiesta di signup non ne specifica nessuno.
pub const DEFAULT_ROLE: &str = "user";

/// Metodo con cui l'utente si è registrato.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignupMethod {
    #[default]
    BasicAuth,
    MagicLinkLogin,
    Google,
    Github,
}

impl SignupMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignupMethod::BasicAuth => "basic_auth",
            SignupMethod::MagicLinkLogin => "magic_link_login",
            SignupMethod::Google => "google",
            SignupMethod::Github => "github",
        }
    }
}

impl fmt::Display for SignupMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignupMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "basic_auth" => Ok(SignupMethod::BasicAuth),
            "magic_link_login" => Ok(SignupMethod::MagicLinkLogin),
            "google" => Ok(SignupMethod::Google),
            "github" => Ok(SignupMethod::Github),
            other => Err(format!("unknown signup method: {other}")),
        }
    }
}

/// Utente completo, così come lo conserva il provider di persistenza.
///
/// `password` contiene l'hash Argon2 (formato PHC) e non viene mai serializzato sul wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing, default)]
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub middle_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub family_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birthdate: Option<String>,
    pub roles: Vec<String>,
    pub signup_methods: SignupMethod,
    pub created_at: String, // RFC3339 UTC
}

/// Normalizza una lista di ruoli in un insieme ordinato: toglie vuoti e duplicati
/// mantenendo l'ordine della prima occorrenza. Se non resta nulla usa [`DEFAULT_ROLE`].
pub fn normalize_roles(roles: Option<Vec<String>>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for role in roles.unwrap_or_default() {
        let role = role.trim();
        if role.is_empty() || out.iter().any(|r| r == role) {
            continue;
        }
        out.push(role.to_string());
    }
    if out.is_empty() {
        out.push(DEFAULT_ROLE.to_string());
    }
    out
}
