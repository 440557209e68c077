use axum::{
    extract::{ConnectInfo, Request, State},
    http::{Extensions, HeaderMap},
    middleware::Next,
    response::Response,
};
use lazy_static::lazy_static;
use redis::aio::ConnectionManager;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::error::ServiceError;
use crate::services::AppState;

/// A fixed-window budget for one key scope
#[derive(Debug, Clone, Copy)]
struct RateRule {
    scope: &'static str,
    limit: u32,
    window_seconds: u64,
    /// Environment variable that overrides `limit`
    limit_env: &'static str,
}

impl RateRule {
    fn effective_limit(&self) -> u32 {
        std::env::var(self.limit_env)
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(self.limit)
    }
}

const PER_USER: RateRule = RateRule {
    scope: "user",
    limit: 100,
    window_seconds: 60,
    limit_env: "RATE_LIMIT_PER_USER",
};

const PER_IP: RateRule = RateRule {
    scope: "ip",
    limit: 200,
    window_seconds: 60,
    limit_env: "RATE_LIMIT_PER_IP",
};

const SIGNIN: RateRule = RateRule {
    scope: "signin",
    limit: 10,
    window_seconds: 300,
    limit_env: "RATE_LIMIT_SIGNIN_ATTEMPTS",
};

const SIGNUP: RateRule = RateRule {
    scope: "signup",
    limit: 5,
    window_seconds: 3600,
    limit_env: "RATE_LIMIT_SIGNUP_ATTEMPTS",
};

lazy_static! {
    static ref RATE_LIMIT_SCRIPT: redis::Script = redis::Script::new(
        r#"
        local key = KEYS[1]
        local limit = tonumber(ARGV[1])
        local window = tonumber(ARGV[2])

        local current = redis.call('GET', key)

        if current == false then
            redis.call('SET', key, 1, 'EX', window)
            return 1
        end

        current = tonumber(current)

        if current >= limit then
            return 0
        end

        redis.call('INCR', key)
        return 1
    "#
    );
}

fn rate_limit_disabled() -> bool {
    std::env::var("RATE_LIMIT_DISABLED").unwrap_or_default() == "1"
}

fn extract_client_ip_from(headers: &HeaderMap, extensions: &Extensions) -> String {
    // X-Forwarded-For, Forwarded, X-Real-IP, then the socket address
    if let Some(s) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        if let Some(first) = s.split(',').next() {
            return first.trim().to_string();
        }
    }

    if let Some(s) = headers.get("forwarded").and_then(|v| v.to_str().ok()) {
        for part in s.split(';') {
            if let Some(val) = part.trim().strip_prefix("for=") {
                return val.trim().trim_matches('"').to_string();
            }
        }
    }

    if let Some(s) = headers.get("x-real-ip").and_then(|v| v.to_str().ok()) {
        return s.trim().to_string();
    }

    if let Some(ci) = extensions.get::<ConnectInfo<SocketAddr>>() {
        return ci.0.ip().to_string();
    }

    "unknown".to_string()
}

async fn enforce(
    redis: &ConnectionManager,
    rule: RateRule,
    subject: &str,
) -> Result<(), ServiceError> {
    let key = format!("ratelimit:{}:{}", rule.scope, subject);
    let mut conn = redis.clone();

    let allowed: u32 = RATE_LIMIT_SCRIPT
        .key(&key)
        .arg(rule.effective_limit())
        .arg(rule.window_seconds)
        .invoke_async(&mut conn)
        .await
        .map_err(|e| {
            tracing::error!("Rate limit check failed: {}", e);
            ServiceError::from(e)
        })?;

    if allowed == 1 {
        Ok(())
    } else {
        tracing::warn!(scope = rule.scope, subject = %subject, "Rate limit exceeded");
        Err(ServiceError::RateLimited(
            "Too many requests, slow down".to_string(),
        ))
    }
}

/// Global budget per authenticated user and per client IP
pub async fn rate_limit_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, ServiceError> {
    if rate_limit_disabled() {
        return Ok(next.run(request).await);
    }

    let client_ip = extract_client_ip_from(request.headers(), request.extensions());
    let user_id = request
        .extensions()
        .get::<super::auth::JwtClaims>()
        .map(|claims| claims.sub.clone());

    if let Some(uid) = &user_id {
        enforce(&state.redis, PER_USER, uid).await?;
    }
    enforce(&state.redis, PER_IP, &client_ip).await?;

    Ok(next.run(request).await)
}

pub async fn signin_rate_limit_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, ServiceError> {
    if !rate_limit_disabled() {
        let client_ip = extract_client_ip_from(request.headers(), request.extensions());
        enforce(&state.redis, SIGNIN, &client_ip).await?;
    }
    Ok(next.run(request).await)
}

pub async fn signup_rate_limit_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, ServiceError> {
    if !rate_limit_disabled() {
        let client_ip = extract_client_ip_from(request.headers(), request.extensions());
        enforce(&state.redis, SIGNUP, &client_ip).await?;
    }
    Ok(next.run(request).await)
}
