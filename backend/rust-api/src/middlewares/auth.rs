use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::ServiceError;
use crate::models::user::Role;
use crate::services::AppState;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct JwtClaims {
    pub sub: String, // user_id
    pub username: String,
    pub role: Role,
    pub exp: usize,
    pub iat: usize,
}

impl JwtClaims {
    pub fn can_author(&self) -> bool {
        self.role.can_author()
    }

    pub fn is_staff(&self) -> bool {
        self.role.sees_unpublished()
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// The caller acts on their own record, or is allowed to act on anyone's
    pub fn is_self_or_author(&self, user_id: &str) -> bool {
        self.sub == user_id || self.can_author()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid token")]
    InvalidToken,
    #[error("Token expired")]
    ExpiredToken,
    #[error("Missing authorization token")]
    MissingToken,
    #[error("Invalid token signature")]
    InvalidSignature,
}

#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtService {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    pub fn generate_token(&self, claims: &JwtClaims) -> Result<String, AuthError> {
        encode(&Header::default(), claims, &self.encoding_key).map_err(|_| AuthError::InvalidToken)
    }

    pub fn validate_token(&self, token: &str) -> Result<JwtClaims, AuthError> {
        decode::<JwtClaims>(token, &self.decoding_key, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::ExpiredToken,
                ErrorKind::InvalidSignature => AuthError::InvalidSignature,
                _ => AuthError::InvalidToken,
            })
    }
}

pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

/// Rejects requests without a valid access token; puts `JwtClaims` into extensions
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, ServiceError> {
    let token = bearer_token(&headers)
        .ok_or_else(|| ServiceError::unauthorized(AuthError::MissingToken.to_string()))?;

    let claims = state.jwt.validate_token(token).map_err(|e| {
        tracing::warn!("JWT validation failed: {}", e);
        ServiceError::unauthorized(e.to_string())
    })?;

    tracing::debug!(user_id = %claims.sub, role = claims.role.as_str(), "Authenticated request");

    request.extensions_mut().insert(claims);

    Ok(next.run(request).await)
}

/// Only FACULTY and ADMIN get through
pub async fn author_guard_middleware(
    request: Request,
    next: Next,
) -> Result<Response, ServiceError> {
    match request.extensions().get::<JwtClaims>() {
        Some(claims) if claims.can_author() => Ok(next.run(request).await),
        Some(claims) => {
            tracing::warn!(user_id = %claims.sub, "Access denied: author role required");
            Err(ServiceError::forbidden("Faculty or admin role required"))
        }
        None => Err(ServiceError::unauthorized(AuthError::MissingToken.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(role: Role, ttl: i64) -> JwtClaims {
        let now = chrono::Utc::now().timestamp();
        JwtClaims {
            sub: "user123".to_string(),
            username: "alice".to_string(),
            role,
            exp: (now + ttl) as usize,
            iat: now as usize,
        }
    }

    #[test]
    fn test_jwt_generation_and_validation() {
        let service = JwtService::new("test-secret");
        let original = claims(Role::Faculty, 3600);

        let token = service.generate_token(&original).unwrap();
        let validated = service.validate_token(&token).unwrap();

        assert_eq!(validated.sub, original.sub);
        assert_eq!(validated.role, Role::Faculty);
        assert!(validated.can_author());
    }

    #[test]
    fn test_expired_token_rejected() {
        let service = JwtService::new("test-secret");
        let token = service.generate_token(&claims(Role::Student, -3600)).unwrap();

        assert!(matches!(
            service.validate_token(&token),
            Err(AuthError::ExpiredToken)
        ));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = JwtService::new("one")
            .generate_token(&claims(Role::Student, 3600))
            .unwrap();

        assert!(matches!(
            JwtService::new("two").validate_token(&token),
            Err(AuthError::InvalidSignature)
        ));
    }

    #[test]
    fn test_self_or_author() {
        let student = claims(Role::Student, 60);
        assert!(student.is_self_or_author("user123"));
        assert!(!student.is_self_or_author("someone-else"));
        assert!(claims(Role::Admin, 60).is_self_or_author("someone-else"));
        assert!(!claims(Role::Ta, 60).is_self_or_author("someone-else"));
    }
}
