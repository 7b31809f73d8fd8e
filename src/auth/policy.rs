//! The policy-evaluation seam.
//!
//! Both authentication and authorization end in a pass/fail question put to
//! a [`PolicyEvaluator`]. The evaluator never changes claims; it only
//! answers. [`BuiltinPolicy`] is the default, answering with a signature
//! check and a role table.

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};

use super::{Claims, PolicyError, Role};

/// What a caller must be to perform an action.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rule {
    /// Any authenticated caller.
    Any,
    AdminOnly,
    UserOnly,
    /// An admin, or the caller the action is about.
    AdminOrSubject,
}

impl Rule {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Any => "rule_any",
            Self::AdminOnly => "rule_admin_only",
            Self::UserOnly => "rule_user_only",
            Self::AdminOrSubject => "rule_admin_or_subject",
        }
    }
}

/// Input to the authentication question.
#[derive(Clone, Copy, Debug)]
pub struct AuthenticationInput<'a> {
    /// Public PEM of the key the token claims to be signed with.
    pub key: &'a str,
    /// The raw token, without the `Bearer ` prefix.
    pub token: &'a str,
    /// The issuer this service accepts.
    pub issuer: &'a str,
}

/// Input to the authorization question.
#[derive(Clone, Copy, Debug)]
pub struct AuthorizationInput<'a> {
    pub claims: &'a Claims,
    /// The user the action targets, if any.
    pub subject: Option<&'a str>,
    pub rule: Rule,
}

#[async_trait]
pub trait PolicyEvaluator: Send + Sync + 'static {
    async fn authenticate(&self, input: AuthenticationInput<'_>) -> Result<(), PolicyError>;
    async fn authorize(&self, input: AuthorizationInput<'_>) -> Result<(), PolicyError>;
}

/// RS256 signature, expiry and issuer checks; role-based rules.
#[derive(Clone, Copy, Debug, Default)]
pub struct BuiltinPolicy;

#[async_trait]
impl PolicyEvaluator for BuiltinPolicy {
    async fn authenticate(&self, input: AuthenticationInput<'_>) -> Result<(), PolicyError> {
        let key = DecodingKey::from_rsa_pem(input.key.as_bytes())?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[input.issuer]);
        validation.validate_aud = false;

        jsonwebtoken::decode::<Claims>(input.token, &key, &validation)?;
        Ok(())
    }

    async fn authorize(&self, input: AuthorizationInput<'_>) -> Result<(), PolicyError> {
        let claims = input.claims;
        let allowed = match input.rule {
            Rule::Any => true,
            Rule::AdminOnly => claims.has_role(Role::Admin),
            Rule::UserOnly => claims.has_role(Role::User),
            Rule::AdminOrSubject => {
                claims.has_role(Role::Admin) || input.subject == Some(claims.sub.as_str())
            }
        };

        if allowed {
            Ok(())
        } else {
            Err(PolicyError::Denied(format!("{} rejected subject {}", input.rule.as_str(), claims.sub)))
        }
    }
}
