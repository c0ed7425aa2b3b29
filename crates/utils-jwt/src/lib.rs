use chrono::{Duration, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode,
    errors::ErrorKind,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Token expired")]
    Expired,
    #[error("Invalid token")]
    Invalid(#[source] jsonwebtoken::errors::Error),
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            _ => TokenError::Invalid(err),
        }
    }
}

/// Claims carried by a bearer credential. The subject is the caller id the
/// identity provider resolved; it may be absent for tokens minted without a
/// user context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    /// The caller id, if the token carries a non-empty subject.
    pub fn subject(&self) -> Option<&str> {
        self.sub.as_deref().map(str::trim).filter(|sub| !sub.is_empty())
    }
}

/// Verifies an HS256 bearer token and returns its claims.
pub fn verify(token: &str, secret: &str) -> Result<Claims, TokenError> {
    let validation = Validation::new(Algorithm::HS256);
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )?;
    Ok(data.claims)
}

/// Signs a token for the given subject. Used by tests and operational
/// tooling; the production issuer is the external identity provider.
pub fn sign(subject: Option<&str>, secret: &str, ttl: Duration) -> Result<String, TokenError> {
    let now = Utc::now();
    let claims = Claims {
        sub: subject.map(str::to_string),
        exp: (now + ttl).timestamp(),
        iat: now.timestamp(),
    };
    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;
    Ok(token)
}
