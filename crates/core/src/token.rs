//! Session tokens.
//!
//! Tokens are HS256 JWTs carrying the user id and email. They are stateless:
//! nothing is stored server-side, and a token stays valid until `exp`.

use jsonwebtoken::{
    DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use time::OffsetDateTime;

use crate::config::AuthConfig;
use crate::ownership::Principal;
use crate::{Error, Result};

/// JWT payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: i64,
    pub email: String,
    /// Issued at (Unix timestamp).
    pub iat: u64,
    /// Expiration time (Unix timestamp).
    pub exp: u64,
}

impl Claims {
    pub fn principal(&self) -> Principal {
        Principal(self.user_id)
    }
}

/// Issues and verifies session tokens with a shared HMAC secret.
#[derive(Clone)]
pub struct TokenIssuer {
    secret: String,
    expiration_secs: u64,
}

impl TokenIssuer {
    pub fn new(secret: impl Into<String>, expiration_secs: u64) -> Self {
        Self {
            secret: secret.into(),
            expiration_secs,
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(config.jwt_secret.clone(), config.expiration_secs())
    }

    /// Lifetime of newly issued tokens in seconds.
    pub fn expiration_secs(&self) -> u64 {
        self.expiration_secs
    }

    /// Issue a token for `user_id`.
    pub fn issue(&self, user_id: i64, email: &str) -> Result<String> {
        let now = u64::try_from(OffsetDateTime::now_utc().unix_timestamp())
            .map_err(|_| Error::InvalidToken("system clock is before the epoch".to_string()))?;
        let claims = Claims {
            user_id,
            email: email.to_string(),
            iat: now,
            exp: now.saturating_add(self.expiration_secs),
        };
        self.sign(&claims)
    }

    fn sign(&self, claims: &Claims) -> Result<String> {
        encode(
            &Header::default(),
            claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| Error::InvalidToken(format!("failed to sign token: {e}")))
    }

    /// Verify signature and expiry, returning the claims.
    pub fn verify(&self, token: &str) -> Result<Claims> {
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => Error::TokenExpired,
            _ => Error::InvalidToken(e.to_string()),
        })
    }
}

impl fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("secret", &"[REDACTED]")
            .field("expiration_secs", &self.expiration_secs)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-that-is-long-enough-for-hs256";

    #[test]
    fn test_issue_and_verify() {
        let issuer = TokenIssuer::new(SECRET, 3600);
        let token = issuer.issue(42, "ada@example.com").unwrap();
        let claims = issuer.verify(&token).unwrap();
        assert_eq!(claims.user_id, 42);
        assert_eq!(claims.email, "ada@example.com");
        assert_eq!(claims.exp - claims.iat, 3600);
        assert_eq!(claims.principal(), Principal(42));
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let token = TokenIssuer::new(SECRET, 3600)
            .issue(1, "a@example.com")
            .unwrap();
        let other = TokenIssuer::new("another-secret-of-sufficient-length!!", 3600);
        assert!(matches!(other.verify(&token), Err(Error::InvalidToken(_))));
    }

    #[test]
    fn test_expired_token() {
        let issuer = TokenIssuer::new(SECRET, 3600);
        let now = OffsetDateTime::now_utc().unix_timestamp() as u64;
        let token = issuer
            .sign(&Claims {
                user_id: 1,
                email: "a@example.com".to_string(),
                iat: now - 7200,
                exp: now - 3600,
            })
            .unwrap();
        assert!(matches!(issuer.verify(&token), Err(Error::TokenExpired)));
    }

    #[test]
    fn test_garbage_token() {
        let issuer = TokenIssuer::new(SECRET, 3600);
        assert!(matches!(
            issuer.verify("not.a.jwt"),
            Err(Error::InvalidToken(_))
        ));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let issuer = TokenIssuer::new(SECRET, 60);
        let debug = format!("{issuer:?}");
        assert!(!debug.contains(SECRET));
        assert!(debug.contains("REDACTED"));
    }
}
