//! Bearer-token authentication.
//!
//! Access tokens are HS256 JWTs whose subject is the user id. The `admin`
//! role grants administrator rights. Older clients send the raw token in a
//! `token` header, which is accepted when `Authorization` is absent.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts, HeaderMap},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::{errors::ServiceError, services::Actor};

pub const ADMIN_ROLE: &str = "admin";
const LEGACY_TOKEN_HEADER: &str = "token";

/// JWT claims carried by access tokens
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // Subject (user ID)
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
    pub iat: i64, // Issued at time
    pub exp: i64, // Expiration time
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("No authentication token provided")]
    MissingToken,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token has expired")]
    TokenExpired,

    #[error("Token creation failed: {0}")]
    TokenCreation(String),

    #[error("Administrator role required")]
    InsufficientPermissions,
}

impl From<AuthError> for ServiceError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InsufficientPermissions => ServiceError::Forbidden(err.to_string()),
            AuthError::TokenCreation(msg) => ServiceError::InternalError(msg),
            other => ServiceError::Unauthorized(other.to_string()),
        }
    }
}

/// Issues and validates access tokens.
#[derive(Clone)]
pub struct AuthService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    token_ttl: Duration,
}

impl AuthService {
    pub fn new(jwt_secret: &str, token_ttl_secs: u64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(jwt_secret.as_bytes()),
            decoding: DecodingKey::from_secret(jwt_secret.as_bytes()),
            token_ttl: Duration::seconds(token_ttl_secs as i64),
        }
    }

    /// Generate a JWT token for a user
    pub fn issue_token(
        &self,
        user_id: &str,
        roles: Vec<String>,
        email: Option<String>,
    ) -> Result<String, AuthError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            name: None,
            email,
            roles,
            iat: now.timestamp(),
            exp: (now + self.token_ttl).timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AuthError::TokenCreation(e.to_string()))
    }

    /// Validate a JWT token and extract the claims
    pub fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(token, &self.decoding, &Validation::new(Algorithm::HS256))
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::InvalidToken,
            })
    }
}

/// Pulls the raw token out of `Authorization: Bearer` or the legacy header.
pub fn extract_token(headers: &HeaderMap) -> Option<&str> {
    if let Some(value) = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
    {
        return value.strip_prefix("Bearer ").map(str::trim);
    }
    headers
        .get(LEGACY_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.strip_prefix("Bearer ").unwrap_or(v).trim())
        .filter(|v| !v.is_empty())
}

/// Authenticated user data extracted from the JWT token
#[derive(Debug, Clone, PartialEq)]
pub struct AuthUser {
    pub user_id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub roles: Vec<String>,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.roles.iter().any(|r| r == ADMIN_ROLE)
    }

    pub fn actor(&self) -> Actor {
        if self.is_admin() {
            Actor::Admin(self.user_id.clone())
        } else {
            Actor::Customer(self.user_id.clone())
        }
    }
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.sub,
            name: claims.name,
            email: claims.email,
            roles: claims.roles,
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    Arc<AuthService>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth = Arc::<AuthService>::from_ref(state);
        let token = extract_token(&parts.headers).ok_or(AuthError::MissingToken)?;
        let claims = auth.validate_token(token).map_err(|e| {
            debug!(error = %e, "rejected access token");
            e
        })?;
        Ok(claims.into())
    }
}

/// An [`AuthUser`] holding the `admin` role.
#[derive(Debug, Clone)]
pub struct AdminUser(pub AuthUser);

#[async_trait]
impl<S> FromRequestParts<S> for AdminUser
where
    Arc<AuthService>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if !user.is_admin() {
            return Err(AuthError::InsufficientPermissions.into());
        }
        Ok(AdminUser(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn service() -> AuthService {
        AuthService::new("test_secret_that_is_long_enough_for_hs256", 3600)
    }

    #[test]
    fn issued_tokens_round_trip() {
        let auth = service();
        let token = auth
            .issue_token("u42", vec![ADMIN_ROLE.into()], Some("u42@campus.edu".into()))
            .unwrap();
        let user: AuthUser = auth.validate_token(&token).unwrap().into();
        assert_eq!(user.user_id, "u42");
        assert!(user.is_admin());
        assert_eq!(user.actor(), Actor::Admin("u42".into()));
    }

    #[test]
    fn wrong_secret_and_expiry_are_rejected() {
        let token = service().issue_token("u1", vec![], None).unwrap();
        let other = AuthService::new("another_secret_that_is_long_enough_too", 3600);
        assert_eq!(other.validate_token(&token), Err(AuthError::InvalidToken));

        let expired = AuthService::new("test_secret_that_is_long_enough_for_hs256", 0);
        let now = Utc::now().timestamp();
        let stale = encode(
            &Header::new(Algorithm::HS256),
            &Claims {
                sub: "u1".into(),
                name: None,
                email: None,
                roles: vec![],
                iat: now - 7200,
                exp: now - 3600,
            },
            &expired.encoding,
        )
        .unwrap();
        assert_eq!(expired.validate_token(&stale), Err(AuthError::TokenExpired));
    }

    #[test]
    fn token_header_is_a_fallback() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_token(&headers), None);

        headers.insert(LEGACY_TOKEN_HEADER, HeaderValue::from_static("legacy"));
        assert_eq!(extract_token(&headers), Some("legacy"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer modern"));
        assert_eq!(extract_token(&headers), Some("modern"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(extract_token(&headers), None);
    }

    #[test]
    fn customers_map_to_customer_actor() {
        let user = AuthUser {
            user_id: "u7".into(),
            name: None,
            email: None,
            roles: vec!["student".into()],
        };
        assert_eq!(user.actor(), Actor::Customer("u7".into()));
        let err: ServiceError = AuthError::InsufficientPermissions.into();
        assert_eq!(err.status_code(), axum::http::StatusCode::FORBIDDEN);
    }
}
