//! Codifica/decodifica dei claim in un JWS compatto firmato HS256.
//!
//! Formato: `base64url(header).base64url(payload).base64url(hmac_sha256)`,
//! senza padding. Il codec non conosce la semantica dei claim (scadenza ecc.):
//! quella sta in [`super::tokens`].

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use hmac::{Hmac, Mac};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use sha2::Sha256;

use crate::error::{AuthError, AuthResult};

type HmacSha256 = Hmac<Sha256>;

pub const ALGORITHM: &str = "HS256";

#[derive(Debug, Serialize, Deserialize)]
struct Header {
    alg: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    typ: Option<String>,
}

fn sign(secret: &[u8], signing_input: &str) -> AuthResult<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| AuthError::Config(format!("invalid hmac key: {e}")))?;
    mac.update(signing_input.as_bytes());
    Ok(mac)
}

/// Serializza `claims` e li firma con `secret`.
pub fn encode<C: Serialize>(claims: &C, secret: &[u8]) -> AuthResult<String> {
    let header = Header { alg: ALGORITHM.to_string(), typ: Some("JWT".to_string()) };
    let header_json = serde_json::to_vec(&header)
        .map_err(|e| AuthError::ClaimDecode(format!("encode header: {e}")))?;
    let claims_json = serde_json::to_vec(claims)
        .map_err(|e| AuthError::ClaimDecode(format!("encode claims: {e}")))?;

    let signing_input = format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(header_json),
        URL_SAFE_NO_PAD.encode(claims_json)
    );
    let signature = sign(secret, &signing_input)?.finalize().into_bytes();
    Ok(format!("{signing_input}.{}", URL_SAFE_NO_PAD.encode(signature)))
}

/// Verifica la firma di `token` e decodifica il payload in `C`.
///
/// Struttura o firma non valide danno `InvalidToken`; un payload JSON valido ma con
/// campi della forma sbagliata dà `ClaimDecode`.
pub fn decode<C: DeserializeOwned>(token: &str, secret: &[u8]) -> AuthResult<C> {
    let mut parts = token.split('.');
    let (header_b64, claims_b64, signature_b64) =
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(h), Some(c), Some(s), None) if !h.is_empty() && !c.is_empty() && !s.is_empty() => {
                (h, c, s)
            }
            _ => return Err(AuthError::invalid_token("malformed token")),
        };

    let header_json = URL_SAFE_NO_PAD
        .decode(header_b64)
        .map_err(|_| AuthError::invalid_token("malformed header encoding"))?;
    let header: Header = serde_json::from_slice(&header_json)
        .map_err(|_| AuthError::invalid_token("malformed header"))?;
    // niente "none" né algoritmi diversi da quello con cui firmiamo
    if header.alg != ALGORITHM {
        return Err(AuthError::invalid_token(format!("unexpected algorithm {}", header.alg)));
    }

    let signature = URL_SAFE_NO_PAD
        .decode(signature_b64)
        .map_err(|_| AuthError::invalid_token("malformed signature encoding"))?;
    // verify_slice confronta in tempo costante
    sign(secret, &format!("{header_b64}.{claims_b64}"))?
        .verify_slice(&signature)
        .map_err(|_| AuthError::invalid_token("signature mismatch"))?;

    let claims_json = URL_SAFE_NO_PAD
        .decode(claims_b64)
        .map_err(|_| AuthError::invalid_token("malformed payload encoding"))?;
    let value: serde_json::Value = serde_json::from_slice(&claims_json)
        .map_err(|_| AuthError::invalid_token("malformed payload"))?;
    if !value.is_object() {
        return Err(AuthError::invalid_token("payload is not a claim set"));
    }
    serde_json::from_value(value).map_err(|e| AuthError::ClaimDecode(e.to_string()))
}
