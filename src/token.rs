//! Session credential issuance.
//!
//! The login flow treats tokens as opaque; [`JwtIssuer`] signs HS256 pairs
//! with distinct `kind` claims so a refresh token can never pass as access.

use anyhow::{anyhow, Context, Result};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::login::models::Account;

const DEFAULT_ACCESS_TTL_MINUTES: i64 = 60;
const DEFAULT_REFRESH_TTL_DAYS: i64 = 7;

const KIND_ACCESS: &str = "access";
const KIND_REFRESH: &str = "refresh";

#[derive(Clone, Debug)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

pub trait TokenIssuer: Send + Sync {
    fn issue(&self, account: &Account) -> Result<TokenPair>;
    /// Exchange a refresh token for a fresh access token.
    fn refresh(&self, refresh_token: &str) -> Result<String>;
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    email: String,
    kind: String,
    iat: i64,
    exp: i64,
}

pub struct JwtIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl JwtIssuer {
    #[must_use]
    pub fn new(secret: &SecretString) -> Self {
        let bytes = secret.expose_secret().as_bytes();
        Self {
            encoding: EncodingKey::from_secret(bytes),
            decoding: DecodingKey::from_secret(bytes),
            access_ttl: Duration::minutes(DEFAULT_ACCESS_TTL_MINUTES),
            refresh_ttl: Duration::days(DEFAULT_REFRESH_TTL_DAYS),
        }
    }

    #[must_use]
    pub fn with_access_ttl(mut self, ttl: Duration) -> Self {
        self.access_ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_refresh_ttl(mut self, ttl: Duration) -> Self {
        self.refresh_ttl = ttl;
        self
    }

    fn sign(&self, account_id: &str, email: &str, kind: &str, ttl: Duration) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: account_id.to_string(),
            email: email.to_string(),
            kind: kind.to_string(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };
        encode(&Header::default(), &claims, &self.encoding).context("failed to sign token")
    }

    fn decode_claims(&self, token: &str) -> Result<Claims> {
        let validation = Validation::new(Algorithm::HS256);
        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .context("invalid token")
    }
}

impl TokenIssuer for JwtIssuer {
    fn issue(&self, account: &Account) -> Result<TokenPair> {
        let id = account.id.to_string();
        Ok(TokenPair {
            access: self.sign(&id, &account.email, KIND_ACCESS, self.access_ttl)?,
            refresh: self.sign(&id, &account.email, KIND_REFRESH, self.refresh_ttl)?,
        })
    }

    fn refresh(&self, refresh_token: &str) -> Result<String> {
        let claims = self.decode_claims(refresh_token)?;
        if claims.kind != KIND_REFRESH {
            return Err(anyhow!("token is not a refresh token"));
        }
        self.sign(&claims.sub, &claims.email, KIND_ACCESS, self.access_ttl)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn account() -> Account {
        Account {
            id: Uuid::new_v4(),
            email: "peter@test.com".to_string(),
            username: "peter".to_string(),
            full_name: "Peter Kakuru".to_string(),
            password_hash: String::new(),
            email_verified: true,
            is_active: true,
            failed_login_attempts: 0,
            account_locked_until: None,
        }
    }

    fn issuer() -> JwtIssuer {
        JwtIssuer::new(&SecretString::from("test-secret".to_string()))
    }

    #[test]
    fn issues_distinct_pair() {
        let pair = issuer().issue(&account()).expect("issue succeeds");
        assert_ne!(pair.access, pair.refresh);
        assert!(!pair.access.is_empty());
    }

    #[test]
    fn refresh_exchanges_for_access() {
        let issuer = issuer();
        let pair = issuer.issue(&account()).expect("issue succeeds");
        let access = issuer.refresh(&pair.refresh).expect("refresh succeeds");
        assert!(!access.is_empty());
    }

    #[test]
    fn access_token_cannot_refresh() {
        let issuer = issuer();
        let pair = issuer.issue(&account()).expect("issue succeeds");
        assert!(issuer.refresh(&pair.access).is_err());
    }

    #[test]
    fn garbage_token_rejected() {
        assert!(issuer().refresh("not.a.token").is_err());
    }

    #[test]
    fn wrong_secret_rejected() {
        let pair = issuer().issue(&account()).expect("issue succeeds");
        let other = JwtIssuer::new(&SecretString::from("other-secret".to_string()));
        assert!(other.refresh(&pair.refresh).is_err());
    }
}
