use anyhow::{anyhow, ensure, Context};
use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use shared::{domain::CredentialToken, identity::Identity};

use crate::{CredentialIssuer, MAX_CREDENTIAL_TTL_SECONDS};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialClaims {
    pub iss: String,
    pub sub: String,
    pub user_id: String,
    pub iat: i64,
    pub exp: i64,
}

/// Signs HS256 join credentials with the backend's shared API secret.
#[derive(Clone)]
pub struct JwtCredentialIssuer {
    api_key: String,
    api_secret: String,
}

impl JwtCredentialIssuer {
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
        }
    }

    /// Non-positive TTLs are raised to one second; TTLs above
    /// [`MAX_CREDENTIAL_TTL_SECONDS`] are refused.
    pub fn mint(&self, identity: &Identity, ttl_seconds: i64) -> anyhow::Result<CredentialToken> {
        let ttl_seconds = ttl_seconds.max(1);
        ensure!(
            ttl_seconds <= MAX_CREDENTIAL_TTL_SECONDS,
            "credential ttl of {ttl_seconds}s exceeds {MAX_CREDENTIAL_TTL_SECONDS}s"
        );
        let now = Utc::now();
        let exp = TimeDelta::try_seconds(ttl_seconds)
            .and_then(|ttl| now.checked_add_signed(ttl))
            .ok_or_else(|| anyhow!("credential ttl of {ttl_seconds}s is out of range"))?;
        let claims = CredentialClaims {
            iss: self.api_key.clone(),
            sub: format!("user:{identity}"),
            user_id: identity.to_string(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.api_secret.as_bytes()),
        )
        .map(CredentialToken::new)
        .context("failed to encode credential")
    }

    /// Checks signature, issuer and expiry of a token signed with this issuer's secret.
    pub fn verify(&self, token: &str) -> Result<CredentialClaims, jsonwebtoken::errors::Error> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[self.api_key.as_str()]);
        decode::<CredentialClaims>(
            token,
            &DecodingKey::from_secret(self.api_secret.as_bytes()),
            &validation,
        )
        .map(|data| data.claims)
    }
}

#[async_trait]
impl CredentialIssuer for JwtCredentialIssuer {
    async fn issue_credential(
        &self,
        identity: &Identity,
        ttl_seconds: i64,
    ) -> anyhow::Result<CredentialToken> {
        self.mint(identity, ttl_seconds)
            .with_context(|| format!("failed to sign credential for {identity}"))
    }
}

#[cfg(test)]
#[path = "tests/jwt_tests.rs"]
mod tests;
