use anyhow::Context;
use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::{Duration, Utc};
use mongodb::bson::doc;
use mongodb::Database;
use redis::aio::ConnectionManager;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::{ServiceError, ServiceResult};
use crate::middlewares::auth::{JwtClaims, JwtService};
use crate::models::new_id;
use crate::models::refresh_token::RefreshToken;
use crate::models::user::{AuthResponse, Role, SigninRequest, SignupRequest, User, UserProfile};
use crate::services::user_service::UserService;
use crate::services::AppState;

const MAX_FAILED_SIGNINS: u32 = 5;
const SIGNIN_LOCKOUT_SECONDS: u64 = 900;
const SHORT_REFRESH_TTL_SECONDS: i64 = 86_400;

pub struct AuthService {
    mongo: Database,
    redis: ConnectionManager,
    jwt_service: JwtService,
    access_token_ttl_seconds: i64,
    refresh_token_ttl_seconds: i64,
}

impl AuthService {
    pub fn new(state: &AppState) -> Self {
        Self {
            mongo: state.mongo.clone(),
            redis: state.redis.clone(),
            jwt_service: state.jwt.clone(),
            access_token_ttl_seconds: state.config.access_token_ttl_seconds,
            refresh_token_ttl_seconds: state.config.refresh_token_ttl_seconds,
        }
    }

    /// "Remember me" keeps the session for the configured maximum, otherwise one day
    pub fn refresh_ttl_seconds(&self, remember_me: bool) -> i64 {
        if remember_me {
            self.refresh_token_ttl_seconds
        } else {
            SHORT_REFRESH_TTL_SECONDS
        }
    }

    pub fn hash_password(password: &str) -> ServiceResult<String> {
        Ok(hash(password, DEFAULT_COST).context("Failed to hash password")?)
    }

    pub fn verify_password(password: &str, hash: &str) -> ServiceResult<bool> {
        Ok(verify(password, hash).context("Failed to verify password")?)
    }

    /// Public signup: always a STUDENT, signed in straight away
    pub async fn signup(
        &self,
        req: SignupRequest,
        user_agent: Option<String>,
    ) -> ServiceResult<AuthResponse> {
        let users = UserService::new(self.mongo.clone());
        let user = users.create_user(req, Role::Student).await?;

        tracing::info!(user_id = %user.id, username = %user.username, "User signed up");

        self.issue_tokens(user, true, user_agent).await
    }

    pub async fn signin(
        &self,
        req: SigninRequest,
        user_agent: Option<String>,
    ) -> ServiceResult<AuthResponse> {
        if self.check_failed_attempts(&req.username).await? {
            tracing::warn!(username = %req.username, "Signin blocked: too many failed attempts");
            return Err(ServiceError::forbidden(
                "Account temporarily locked after repeated failed sign-ins",
            ));
        }

        let users = self.mongo.collection::<User>("users");
        let user = users
            .find_one(doc! { "username": &req.username })
            .await
            .context("Failed to query user")?;

        let user = match user {
            Some(user) if Self::verify_password(&req.password, &user.password_hash)? => user,
            _ => {
                let count = self.increment_failed_attempts(&req.username).await?;
                tracing::warn!(
                    username = %req.username,
                    failed_attempts = count,
                    "Failed signin attempt"
                );
                return Err(ServiceError::unauthorized("Invalid username or password"));
            }
        };

        self.clear_failed_attempts(&req.username).await?;

        let now = Utc::now();
        users
            .update_one(
                doc! { "_id": &user.id },
                doc! { "$set": {
                    "lastLoginAt": mongodb::bson::DateTime::from_millis(now.timestamp_millis()),
                    "lastActivity": now.to_rfc3339(),
                } },
            )
            .await
            .context("Failed to update last login timestamp")?;

        tracing::info!(user_id = %user.id, username = %user.username, "Successful signin");

        let mut user = user;
        user.last_login_at = Some(now);
        self.issue_tokens(user, req.remember_me, user_agent).await
    }

    async fn issue_tokens(
        &self,
        user: User,
        remember_me: bool,
        user_agent: Option<String>,
    ) -> ServiceResult<AuthResponse> {
        let access_token = self.generate_access_token(&user)?;
        let refresh_token = self
            .create_refresh_token(&user.id, remember_me, user_agent)
            .await?;

        Ok(AuthResponse {
            access_token,
            refresh_token,
            user: UserProfile::from(user),
        })
    }

    pub fn generate_access_token(&self, user: &User) -> ServiceResult<String> {
        let now = Utc::now();
        let exp = now + Duration::seconds(self.access_token_ttl_seconds);

        let claims = JwtClaims {
            sub: user.id.clone(),
            username: user.username.clone(),
            role: user.role,
            exp: exp.timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        self.jwt_service
            .generate_token(&claims)
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("Failed to generate token: {}", e)))
    }

    async fn create_refresh_token(
        &self,
        user_id: &str,
        remember_me: bool,
        user_agent: Option<String>,
    ) -> ServiceResult<String> {
        let token = Uuid::new_v4().to_string();
        let now = Utc::now();
        let ttl = self.refresh_ttl_seconds(remember_me);

        let record = RefreshToken {
            id: new_id(),
            user_id: user_id.to_string(),
            token_hash: hash_token(&token),
            created_at: now,
            expires_at: now + Duration::seconds(ttl),
            user_agent,
            revoked: false,
        };

        self.mongo
            .collection::<RefreshToken>("refresh_tokens")
            .insert_one(&record)
            .await
            .context("Failed to insert refresh token")?;

        Ok(token)
    }

    /// New access token for a live, unrevoked refresh token
    pub async fn refresh(&self, refresh_token: &str) -> ServiceResult<String> {
        let token_doc = self
            .mongo
            .collection::<RefreshToken>("refresh_tokens")
            .find_one(doc! { "tokenHash": hash_token(refresh_token), "revoked": false })
            .await
            .context("Failed to query refresh token")?
            .ok_or_else(|| ServiceError::unauthorized("Invalid or expired refresh token"))?;

        if token_doc.expires_at < Utc::now() {
            return Err(ServiceError::unauthorized("Refresh token has expired"));
        }

        let user = self
            .mongo
            .collection::<User>("users")
            .find_one(doc! { "_id": &token_doc.user_id })
            .await
            .context("Failed to query user")?
            .ok_or_else(|| ServiceError::unauthorized("User no longer exists"))?;

        self.generate_access_token(&user)
    }

    /// Revokes the refresh token; unknown tokens are not an error
    pub async fn signout(&self, refresh_token: &str) -> ServiceResult<()> {
        let result = self
            .mongo
            .collection::<RefreshToken>("refresh_tokens")
            .update_one(
                doc! { "tokenHash": hash_token(refresh_token) },
                doc! { "$set": { "revoked": true } },
            )
            .await
            .context("Failed to revoke refresh token")?;

        tracing::info!(revoked = result.modified_count, "User signed out");
        Ok(())
    }

    /// True once the username reached the failed-signin limit within the lockout window
    pub async fn check_failed_attempts(&self, username: &str) -> ServiceResult<bool> {
        let mut conn = self.redis.clone();
        let count: Option<u32> = redis::cmd("GET")
            .arg(failed_signin_key(username))
            .query_async(&mut conn)
            .await?;

        Ok(count.unwrap_or(0) >= MAX_FAILED_SIGNINS)
    }

    pub async fn increment_failed_attempts(&self, username: &str) -> ServiceResult<u32> {
        let key = failed_signin_key(username);
        let mut conn = self.redis.clone();

        let count: u32 = redis::cmd("INCR").arg(&key).query_async(&mut conn).await?;
        if count == 1 {
            redis::cmd("EXPIRE")
                .arg(&key)
                .arg(SIGNIN_LOCKOUT_SECONDS)
                .query_async::<()>(&mut conn)
                .await?;
        }

        Ok(count)
    }

    pub async fn clear_failed_attempts(&self, username: &str) -> ServiceResult<()> {
        let mut conn = self.redis.clone();
        redis::cmd("DEL")
            .arg(failed_signin_key(username))
            .query_async::<()>(&mut conn)
            .await?;
        Ok(())
    }
}

fn failed_signin_key(username: &str) -> String {
    format!("failed_signin:{}", username.to_lowercase())
}

/// SHA-256 of the raw refresh token, hex encoded
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_hash_is_stable_hex() {
        let a = hash_token("abc");
        assert_eq!(a, hash_token("abc"));
        assert_ne!(a, hash_token("abd"));
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn failed_signin_key_ignores_case() {
        assert_eq!(failed_signin_key("Alice"), failed_signin_key("alice"));
    }

    #[test]
    fn password_hash_verifies() {
        let hashed = AuthService::hash_password("secret1").unwrap();
        assert!(AuthService::verify_password("secret1", &hashed).unwrap());
        assert!(!AuthService::verify_password("secret2", &hashed).unwrap());
    }
}
