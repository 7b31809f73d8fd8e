//! Authentication and authorization.
//!
//! Authentication: you are who you say you are. Authorization: you may do
//! what you are asking to do.
//!
//! [`Auth::authenticate`] turns an `Authorization` header into verified
//! [`Claims`]:
//!
//! 1. The header must be exactly `Bearer <token>`.
//! 2. The token is decoded without verification to read the `kid`.
//! 3. The public key for that `kid` comes from the [`KeyCache`].
//! 4. The [`PolicyEvaluator`] verifies the token against the key and issuer.
//! 5. If a [`UserEnabled`] check is configured, the subject must be enabled.

mod cache;
mod claims;
mod error;
mod keystore;
mod policy;

use std::sync::Arc;

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, EncodingKey, Header};

use crate::error::BoxError;

pub use cache::KeyCache;
pub use claims::{Claims, Role};
pub use error::{AuthError, KeyLookupError, PolicyError};
pub use keystore::{KeyLookup, KeyStore};
pub use policy::{AuthenticationInput, AuthorizationInput, BuiltinPolicy, PolicyEvaluator, Rule};

/// Answers whether the subject of verified claims may still use the service.
///
/// `Ok(false)` is a disabled or unknown subject; `Err` is a failure to find out.
#[async_trait]
pub trait UserEnabled: Send + Sync + 'static {
    async fn is_enabled(&self, claims: &Claims) -> Result<bool, BoxError>;
}

/// Whether [`Auth::authenticate`] checks that the subject is enabled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UserCheck {
    Enforced,
    /// No [`UserEnabled`] collaborator was configured.
    Skipped,
}

/// Validates bearer tokens and evaluates authorization rules.
pub struct Auth {
    cache: KeyCache,
    issuer: String,
    policy: Arc<dyn PolicyEvaluator>,
    users: Option<Arc<dyn UserEnabled>>,
}

impl Auth {
    /// An authenticator using [`BuiltinPolicy`] and no user check.
    pub fn new(cache: KeyCache, issuer: impl Into<String>) -> Self {
        Self { cache, issuer: issuer.into(), policy: Arc::new(BuiltinPolicy), users: None }
    }

    pub fn with_policy(mut self, policy: Arc<dyn PolicyEvaluator>) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_user_check(mut self, users: Arc<dyn UserEnabled>) -> Self {
        self.users = Some(users);
        self
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn cache(&self) -> &KeyCache {
        &self.cache
    }

    pub fn user_check(&self) -> UserCheck {
        if self.users.is_some() { UserCheck::Enforced } else { UserCheck::Skipped }
    }

    /// Validates an `Authorization` header value and returns its claims.
    pub async fn authenticate(&self, authorization: &str) -> Result<Claims, AuthError> {
        let token = bearer_token(authorization)?;

        let (header, claims) = claims::decode_unverified(token)?;
        let kid = header.kid.ok_or(AuthError::MissingKid)?;

        let pem = self.cache.resolve(&kid).await?;

        let input = AuthenticationInput { key: &pem, token, issuer: &self.issuer };
        self.policy.authenticate(input).await.map_err(AuthError::Policy)?;

        if let Some(users) = &self.users {
            match users.is_enabled(&claims).await {
                Ok(true) => {}
                Ok(false) => return Err(AuthError::UserDisabled { subject: claims.sub }),
                Err(e) => return Err(AuthError::UserLookup(e)),
            }
        }

        Ok(claims)
    }

    /// Checks `claims` against `rule`. `subject` is the user the action
    /// targets, when there is one.
    pub async fn authorize(&self, claims: &Claims, subject: Option<&str>, rule: Rule) -> Result<(), AuthError> {
        self.policy
            .authorize(AuthorizationInput { claims, subject, rule })
            .await
            .map_err(AuthError::Forbidden)
    }

    /// Signs `claims` with the private key `kid`, RS256.
    pub async fn generate_token(&self, kid: &str, claims: &Claims) -> Result<String, AuthError> {
        let pem = self.cache.lookup().private_key(kid).await?;
        let key = EncodingKey::from_rsa_pem(pem.as_bytes()).map_err(AuthError::Signing)?;

        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(kid.to_owned());

        jsonwebtoken::encode(&header, claims, &key).map_err(AuthError::Signing)
    }
}

fn bearer_token(authorization: &str) -> Result<&str, AuthError> {
    let mut parts = authorization.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("Bearer"), Some(token), None) if !token.is_empty() => Ok(token),
        _ => Err(AuthError::MalformedHeader),
    }
}
