use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use jsonwebtoken::Header;
use serde::{Deserialize, Serialize};

use super::AuthError;

/// Authorization roles carried in a token.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Admin,
    User,
}

/// The identity payload of a bearer token.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iss: String,
    /// Expiry, seconds since the epoch.
    pub exp: u64,
    /// Issued at, seconds since the epoch. `0` when the token omits it.
    #[serde(default)]
    pub iat: u64,
    #[serde(default)]
    pub roles: Vec<Role>,
}

impl Claims {
    /// Claims issued now and valid for `lifetime`.
    pub fn new(
        subject: impl Into<String>,
        issuer: impl Into<String>,
        lifetime: Duration,
        roles: Vec<Role>,
    ) -> Self {
        let now = jsonwebtoken::get_current_timestamp();
        Self {
            sub: subject.into(),
            iss: issuer.into(),
            exp: now + lifetime.as_secs(),
            iat: now,
            roles,
        }
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }
}

/// Splits a token into its header and claims without checking the signature.
///
/// Only the structure is validated here; the result must not be trusted
/// until a policy hook has verified the token.
pub(crate) fn decode_unverified(token: &str) -> Result<(Header, Claims), AuthError> {
    let header = jsonwebtoken::decode_header(token)
        .map_err(|e| AuthError::InvalidToken(format!("header: {e}")))?;

    let mut parts = token.split('.');
    let payload = match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(_), Some(payload), Some(_), None) => payload,
        _ => return Err(AuthError::InvalidToken("token must have 3 parts".into())),
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|e| AuthError::InvalidToken(format!("payload: {e}")))?;
    let claims = serde_json::from_slice(&bytes)
        .map_err(|e| AuthError::InvalidToken(format!("claims: {e}")))?;

    Ok((header, claims))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(part: &str) -> String {
        URL_SAFE_NO_PAD.encode(part)
    }

    #[test]
    fn roles_are_uppercase_on_the_wire() {
        let claims = Claims {
            sub: "u1".into(),
            iss: "strata".into(),
            exp: 2,
            iat: 1,
            roles: vec![Role::Admin, Role::User],
        };
        let json = serde_json::to_string(&claims).unwrap();
        assert!(json.contains(r#""roles":["ADMIN","USER"]"#), "{json}");
    }

    #[test]
    fn new_claims_expire_after_lifetime() {
        let claims = Claims::new("u1", "strata", Duration::from_secs(3600), vec![Role::User]);
        assert_eq!(claims.exp - claims.iat, 3600);
        assert!(claims.has_role(Role::User));
        assert!(!claims.has_role(Role::Admin));
    }

    #[test]
    fn decodes_without_a_signature_check() {
        let token = format!(
            "{}.{}.not-a-signature",
            encode(r#"{"alg":"RS256","typ":"JWT","kid":"k1"}"#),
            encode(r#"{"sub":"u1","iss":"strata","exp":10,"iat":5,"roles":["USER"]}"#),
        );

        let (header, claims) = decode_unverified(&token).unwrap();
        assert_eq!(header.kid.as_deref(), Some("k1"));
        assert_eq!(claims.sub, "u1");
        assert_eq!(claims.roles, [Role::User]);
    }

    #[test]
    fn issued_at_is_optional() {
        let token = format!(
            "{}.{}.sig",
            encode(r#"{"alg":"RS256","kid":"k1"}"#),
            encode(r#"{"sub":"u1","iss":"strata","exp":10}"#),
        );

        let (_, claims) = decode_unverified(&token).unwrap();
        assert_eq!(claims.iat, 0);
        assert!(claims.roles.is_empty());
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(decode_unverified("abc"), Err(AuthError::InvalidToken(_))));

        let bad_payload = format!("{}.%%%.sig", encode(r#"{"alg":"RS256"}"#));
        assert!(matches!(decode_unverified(&bad_payload), Err(AuthError::InvalidToken(_))));
    }
}
