use time::{format_description::well_known::Rfc3339, OffsetDateTime};

/// Restituisce l'istante corrente in UTC formattato come RFC3339 (es. "2025-11-02T12:34:56Z").
pub fn now_timestamp() -> String {
    let now = OffsetDateTime::now_utc();
    // Rfc3339 fallisce solo per anni fuori da 0..=9999
    now.format(&Rfc3339).unwrap_or_else(|_| now.unix_timestamp().to_string())
}

/// Secondi Unix correnti, usati per iat/exp dei token.
pub fn now_unix() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}
