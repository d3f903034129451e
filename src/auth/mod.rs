pub mod jwt;

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::{AuthConfig, AuthMode};

pub use jwt::{issue_token, JwtValidator};

/// Cookie carrying the session token issued to the admin UI
pub const SESSION_COOKIE: &str = "__session";

/// Verified identity of the caller, handed to handlers explicitly
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthClaims {
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    pub exp: i64,
}

impl AuthClaims {
    /// Identity used when authentication is disabled
    pub fn anonymous() -> Self {
        Self {
            sub: "anonymous".to_string(),
            email: None,
            iss: None,
            iat: None,
            exp: i64::MAX,
        }
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing session token")]
    MissingToken,
    #[error("invalid session token: {0}")]
    InvalidToken(String),
}

pub struct AuthService {
    validator: Option<JwtValidator>,
}

impl AuthService {
    pub fn new(config: &AuthConfig) -> anyhow::Result<Self> {
        let validator = match config.mode {
            AuthMode::None => None,
            AuthMode::Jwt => Some(JwtValidator::from_config(config)?),
        };
        Ok(Self { validator })
    }

    pub fn is_enabled(&self) -> bool {
        self.validator.is_some()
    }

    pub fn authenticate(&self, headers: &HeaderMap) -> Result<AuthClaims, AuthError> {
        let Some(validator) = self.validator.as_ref() else {
            return Ok(AuthClaims::anonymous());
        };

        let token = extract_token(headers).ok_or(AuthError::MissingToken)?;
        validator
            .validate(&token)
            .map_err(|e| AuthError::InvalidToken(format!("{e:#}")))
    }
}

/// Bearer token first, then the session cookie
fn extract_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty());
    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|h| h.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

pub async fn auth_middleware(
    State(auth): State<Arc<AuthService>>,
    mut request: Request,
    next: Next,
) -> Response {
    match auth.authenticate(request.headers()) {
        Ok(claims) => {
            debug!(sub = %claims.sub, "Authenticated request");
            request.extensions_mut().insert(claims);
            next.run(request).await
        }
        Err(e) => {
            info!("Rejected request to {}: {}", request.uri().path(), e);
            (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "success": false, "message": "Unauthorized" })),
            )
                .into_response()
        }
    }
}
