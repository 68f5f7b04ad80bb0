use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config;

/// Who the bearer token says is calling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub username: String,
    pub is_admin: bool,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    pub username: String,
    #[serde(default)]
    pub is_admin: bool,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn new(identity: &Identity) -> Self {
        let now = Utc::now();
        let expiry_hours = config::config().security.jwt_expiry_hours;
        let exp = (now + Duration::hours(expiry_hours as i64)).timestamp();

        Self {
            username: identity.username.clone(),
            is_admin: identity.is_admin,
            exp,
            iat: now.timestamp(),
        }
    }
}

impl From<Claims> for Identity {
    fn from(claims: Claims) -> Self {
        Self {
            username: claims.username,
            is_admin: claims.is_admin,
        }
    }
}

#[derive(Debug, Error)]
pub enum JwtError {
    #[error("JWT secret not configured")]
    InvalidSecret,

    #[error("JWT generation error: {0}")]
    TokenGeneration(String),

    #[error("Invalid JWT token: {0}")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),
}

fn secret() -> Result<&'static [u8], JwtError> {
    let secret = &config::config().security.jwt_secret;
    if secret.is_empty() {
        return Err(JwtError::InvalidSecret);
    }
    Ok(secret.as_bytes())
}

/// Sign an HS256 token for `identity`.
pub fn generate_jwt(identity: &Identity) -> Result<String, JwtError> {
    let encoding_key = EncodingKey::from_secret(secret()?);
    encode(&Header::default(), &Claims::new(identity), &encoding_key)
        .map_err(|e| JwtError::TokenGeneration(e.to_string()))
}

/// Verify signature and expiry and return the embedded identity.
pub fn verify_jwt(token: &str) -> Result<Identity, JwtError> {
    let decoding_key = DecodingKey::from_secret(secret()?);
    let token_data = decode::<Claims>(token, &decoding_key, &Validation::default())?;
    Ok(token_data.claims.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_round_trips_identity() {
        let identity = Identity {
            username: "u1".to_string(),
            is_admin: true,
        };
        let token = generate_jwt(&identity).unwrap();
        assert_eq!(verify_jwt(&token).unwrap(), identity);
    }

    #[test]
    fn tampered_token_is_rejected() {
        let identity = Identity {
            username: "u1".to_string(),
            is_admin: false,
        };
        let mut token = generate_jwt(&identity).unwrap();
        token.push('x');
        assert!(matches!(verify_jwt(&token), Err(JwtError::InvalidToken(_))));
    }

    #[test]
    fn token_signed_with_another_secret_is_rejected() {
        let claims = Claims::new(&Identity {
            username: "u1".to_string(),
            is_admin: true,
        });
        let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(b"wrong")).unwrap();
        assert!(verify_jwt(&token).is_err());
    }
}
