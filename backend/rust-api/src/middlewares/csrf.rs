use axum::{extract::Request, http::Method, middleware::Next, response::Response};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::{engine::general_purpose, Engine as _};
use rand::Rng;

use crate::error::ServiceError;

pub const CSRF_COOKIE_NAME: &str = "csrf_token";
pub const CSRF_HEADER_NAME: &str = "x-csrf-token";

/// Double-submit cookie check for state-changing requests.
///
/// POST/PUT/PATCH/DELETE must carry an `x-csrf-token` header equal to the
/// `csrf_token` cookie. Safe methods pass through untouched.
pub async fn csrf_middleware(
    jar: CookieJar,
    request: Request,
    next: Next,
) -> Result<Response, ServiceError> {
    if matches!(
        *request.method(),
        Method::GET | Method::HEAD | Method::OPTIONS
    ) {
        return Ok(next.run(request).await);
    }

    let cookie_token = jar.get(CSRF_COOKIE_NAME).map(|c| c.value().to_string());
    let header_token = request
        .headers()
        .get(CSRF_HEADER_NAME)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());

    match (cookie_token, header_token) {
        (Some(cookie), Some(header)) if !cookie.is_empty() && cookie == header => {
            tracing::debug!("CSRF validation passed");
            Ok(next.run(request).await)
        }
        (None, _) => {
            tracing::warn!("CSRF validation failed: missing cookie token");
            Err(ServiceError::forbidden("Missing CSRF cookie"))
        }
        (_, None) => {
            tracing::warn!("CSRF validation failed: missing header token");
            Err(ServiceError::forbidden("Missing CSRF token header"))
        }
        _ => {
            tracing::warn!("CSRF validation failed: token mismatch");
            Err(ServiceError::forbidden("CSRF token mismatch"))
        }
    }
}

pub fn generate_csrf_token() -> String {
    let random_bytes: [u8; 32] = rand::rng().random();
    general_purpose::URL_SAFE_NO_PAD.encode(random_bytes)
}

/// Readable by scripts so the client can echo it back in the header
pub fn csrf_cookie(token: String, secure: bool, same_site: SameSite) -> Cookie<'static> {
    Cookie::build((CSRF_COOKIE_NAME, token))
        .path("/")
        .http_only(false)
        .secure(secure)
        .same_site(same_site)
        .build()
}
