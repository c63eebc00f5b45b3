//! Bearer credential encoding.
//!
//! A credential is `base64(token_id ":" secret)` using the standard padded
//! alphabet. It may arrive with or without the `Bearer ` header prefix.

use crate::{Error, Result, TokenId};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use std::fmt;

const BEARER_PREFIX: &str = "Bearer ";

/// A decoded `(token_id, secret)` pair.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub token_id: TokenId,
    pub secret: String,
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("token_id", &self.token_id)
            .field("secret", &"<redacted>")
            .finish()
    }
}

pub fn encode_bearer(token_id: TokenId, secret: &str) -> String {
    BASE64.encode(format!("{token_id}:{secret}"))
}

pub fn decode_bearer(value: &str) -> Result<Credential> {
    let encoded = value.strip_prefix(BEARER_PREFIX).unwrap_or(value).trim();
    if encoded.is_empty() {
        return Err(Error::InvalidCredential("empty credential"));
    }

    let bytes = BASE64
        .decode(encoded)
        .map_err(|_| Error::InvalidCredential("not base64"))?;
    let decoded = String::from_utf8(bytes).map_err(|_| Error::InvalidCredential("not utf-8"))?;

    let (id, secret) = decoded
        .split_once(':')
        .ok_or(Error::InvalidCredential("missing separator"))?;
    let token_id = id
        .parse()
        .map_err(|_| Error::InvalidCredential("malformed token id"))?;
    if secret.is_empty() {
        return Err(Error::InvalidCredential("empty secret"));
    }

    Ok(Credential {
        token_id,
        secret: secret.to_string(),
    })
}
