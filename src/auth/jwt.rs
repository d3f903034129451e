use anyhow::{Context, Result};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};

use crate::config::AuthConfig;

use super::AuthClaims;

/// HS256 session token validator
#[derive(Clone)]
pub struct JwtValidator {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtValidator {
    pub fn from_config(config: &AuthConfig) -> Result<Self> {
        let secret = config
            .jwt_secret
            .as_deref()
            .filter(|s| !s.is_empty())
            .context("JWT secret is required for jwt auth mode")?;

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = config.leeway_secs;
        validation.validate_aud = false;
        if let Some(issuer) = config.issuer.as_deref() {
            validation.set_issuer(&[issuer]);
        }

        Ok(Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        })
    }

    pub fn validate(&self, token: &str) -> Result<AuthClaims> {
        let data = decode::<AuthClaims>(token, &self.decoding_key, &self.validation)
            .context("token failed signature or structural validation")?;
        Ok(data.claims)
    }
}

/// Sign a session token for `sub`, valid for `ttl_secs`
pub fn issue_token(
    secret: &str,
    sub: &str,
    email: Option<&str>,
    issuer: Option<&str>,
    ttl_secs: i64,
) -> Result<String> {
    let now = Utc::now().timestamp();
    let claims = AuthClaims {
        sub: sub.to_string(),
        email: email.map(str::to_string),
        iss: issuer.map(str::to_string),
        iat: Some(now),
        exp: now + ttl_secs,
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .context("failed to encode JWT")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AuthMode;

    fn config(issuer: Option<&str>) -> AuthConfig {
        AuthConfig {
            mode: AuthMode::Jwt,
            jwt_secret: Some("test-secret".to_string()),
            issuer: issuer.map(str::to_string),
            leeway_secs: 0,
        }
    }

    #[test]
    fn test_valid_token() {
        let validator = JwtValidator::from_config(&config(None)).unwrap();
        let token = issue_token("test-secret", "admin-1", Some("a@example.com"), None, 60).unwrap();

        let claims = validator.validate(&token).unwrap();
        assert_eq!(claims.sub, "admin-1");
        assert_eq!(claims.email.as_deref(), Some("a@example.com"));
    }

    #[test]
    fn test_rejects_wrong_secret_and_expired() {
        let validator = JwtValidator::from_config(&config(None)).unwrap();

        let token = issue_token("other-secret", "admin-1", None, None, 60).unwrap();
        assert!(validator.validate(&token).is_err());

        let token = issue_token("test-secret", "admin-1", None, None, -120).unwrap();
        assert!(validator.validate(&token).is_err());
    }

    #[test]
    fn test_issuer_checked_when_configured() {
        let validator = JwtValidator::from_config(&config(Some("stationery"))).unwrap();

        let token = issue_token("test-secret", "a", None, Some("stationery"), 60).unwrap();
        assert!(validator.validate(&token).is_ok());

        let token = issue_token("test-secret", "a", None, Some("elsewhere"), 60).unwrap();
        assert!(validator.validate(&token).is_err());
    }
}
