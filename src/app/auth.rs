use anyhow::{anyhow, Result};
use pasetors::claims::{Claims, ClaimsValidationRules};
use pasetors::keys::SymmetricKey;
use pasetors::token::UntrustedToken;
use pasetors::{local, version4::V4, Local};
use time::{Duration, OffsetDateTime};

use crate::domain::id::ObjectId;

const ISSUER: &str = "trellis";

#[derive(Debug, Clone)]
pub struct AccessToken {
    pub token: String,
    pub expires_at: OffsetDateTime,
}

/// Verifies (and, for provisioning and tests, issues) the v4.local access
/// tokens minted by the identity provider. The `sub` claim carries the
/// caller's ObjectId.
#[derive(Clone)]
pub struct TokenService {
    access_key: [u8; 32],
    access_ttl_minutes: u64,
}

impl TokenService {
    pub fn new(access_key: [u8; 32], access_ttl_minutes: u64) -> Self {
        Self {
            access_key,
            access_ttl_minutes,
        }
    }

    pub fn issue_access_token(&self, user_id: ObjectId) -> Result<AccessToken> {
        let duration = std::time::Duration::from_secs(self.access_ttl_minutes * 60);
        let mut claims = Claims::new_expires_in(&duration)?;
        claims.issuer(ISSUER)?;
        claims.audience(ISSUER)?;
        claims.subject(&user_id.to_string())?;
        claims.add_additional("typ", "access")?;

        let key = SymmetricKey::<V4>::from(&self.access_key)?;
        let token = local::encrypt(&key, &claims, None, None)?;
        let expires_at =
            OffsetDateTime::now_utc() + Duration::minutes(self.access_ttl_minutes as i64);

        Ok(AccessToken { token, expires_at })
    }

    /// `Ok(None)` for any token that does not decrypt, has expired, or is not an access token.
    pub fn authenticate_access_token(&self, token: &str) -> Result<Option<ObjectId>> {
        let claims = match self.decrypt_claims(token)? {
            Some(claims) => claims,
            None => return Ok(None),
        };
        if !has_token_type(&claims, "access") {
            return Ok(None);
        }
        let subject = claims
            .get_claim("sub")
            .and_then(|value| value.as_str())
            .ok_or_else(|| anyhow!("missing sub claim"))?;
        Ok(ObjectId::parse(subject).ok())
    }

    fn decrypt_claims(&self, token: &str) -> Result<Option<Claims>> {
        let key = SymmetricKey::<V4>::from(&self.access_key)?;
        let mut rules = ClaimsValidationRules::new();
        rules.validate_issuer_with(ISSUER);
        rules.validate_audience_with(ISSUER);

        let untrusted = match UntrustedToken::<Local, V4>::try_from(token) {
            Ok(token) => token,
            Err(_) => return Ok(None),
        };
        let trusted = match local::decrypt(&key, &untrusted, &rules, None, None) {
            Ok(token) => token,
            Err(_) => return Ok(None),
        };
        Ok(trusted.payload_claims().cloned())
    }
}

fn has_token_type(claims: &Claims, expected: &str) -> bool {
    claims
        .get_claim("typ")
        .and_then(|value| value.as_str())
        .map(|value| value == expected)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: [u8; 32] = *b"0123456789abcdef0123456789abcdef";

    #[test]
    fn issued_token_authenticates_its_subject() {
        let service = TokenService::new(KEY, 15);
        let user = ObjectId::generate();
        let token = service.issue_access_token(user).unwrap();

        assert_eq!(
            service.authenticate_access_token(&token.token).unwrap(),
            Some(user)
        );
    }

    #[test]
    fn foreign_or_garbage_tokens_yield_no_identity() {
        let service = TokenService::new(KEY, 15);
        let other = TokenService::new(*b"fedcba9876543210fedcba9876543210", 15);
        let token = other.issue_access_token(ObjectId::generate()).unwrap();

        assert_eq!(service.authenticate_access_token(&token.token).unwrap(), None);
        assert_eq!(service.authenticate_access_token("not-a-token").unwrap(), None);
    }
}
