use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use serde_json::json;
use std::sync::Arc;

use crate::{
    error::{ServiceError, ServiceResult},
    extractors::ValidJson,
    middlewares::{
        auth::JwtClaims,
        csrf::{csrf_cookie, generate_csrf_token},
    },
    models::{
        refresh_token::RefreshTokenResponse,
        user::{SigninRequest, SignupRequest, UpdateProfileRequest, UserProfile},
    },
    services::{auth_service::AuthService, user_service::UserService, AppState},
};

pub const REFRESH_COOKIE_NAME: &str = "refresh_token";
const REFRESH_COOKIE_PATH: &str = "/api/users";

fn user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

fn refresh_cookie(state: &AppState, value: String, max_age_seconds: i64) -> Cookie<'static> {
    Cookie::build((REFRESH_COOKIE_NAME, value))
        .path(REFRESH_COOKIE_PATH)
        .http_only(true)
        .secure(state.config.cookie.secure)
        .same_site(state.config.cookie.parse_same_site())
        .max_age(time::Duration::seconds(max_age_seconds))
        .build()
}

/// POST /api/users/signup - Create a STUDENT account and sign it in
pub async fn signup(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    jar: CookieJar,
    ValidJson(req): ValidJson<SignupRequest>,
) -> ServiceResult<impl IntoResponse> {
    tracing::info!(username = %req.username, "Signup request");

    let service = AuthService::new(&state);
    let response = service.signup(req, user_agent(&headers)).await?;

    let jar = jar.add(refresh_cookie(
        &state,
        response.refresh_token.clone(),
        service.refresh_ttl_seconds(true),
    ));
    Ok((StatusCode::CREATED, jar, Json(response)))
}

/// POST /api/users/signin
pub async fn signin(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    jar: CookieJar,
    ValidJson(req): ValidJson<SigninRequest>,
) -> ServiceResult<impl IntoResponse> {
    tracing::info!(username = %req.username, "Signin attempt");

    let remember_me = req.remember_me;
    let service = AuthService::new(&state);
    let response = service.signin(req, user_agent(&headers)).await?;

    let jar = jar.add(refresh_cookie(
        &state,
        response.refresh_token.clone(),
        service.refresh_ttl_seconds(remember_me),
    ));
    Ok((StatusCode::OK, jar, Json(response)))
}

/// POST /api/users/refresh - New access token from the refresh cookie
pub async fn refresh(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> ServiceResult<Json<RefreshTokenResponse>> {
    let refresh_token = jar
        .get(REFRESH_COOKIE_NAME)
        .map(|cookie| cookie.value().to_string())
        .ok_or_else(|| ServiceError::unauthorized("Missing refresh token cookie"))?;

    let access_token = AuthService::new(&state).refresh(&refresh_token).await?;
    tracing::debug!("Access token refreshed");
    Ok(Json(RefreshTokenResponse { access_token }))
}

/// POST /api/users/signout - Revoke the refresh token and clear the cookie
pub async fn signout(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    jar: CookieJar,
) -> ServiceResult<impl IntoResponse> {
    if let Some(cookie) = jar.get(REFRESH_COOKIE_NAME) {
        AuthService::new(&state).signout(cookie.value()).await?;
    }
    tracing::info!(user_id = %claims.sub, "Signed out");

    let jar = jar.add(refresh_cookie(&state, String::new(), 0));
    Ok((StatusCode::NO_CONTENT, jar))
}

/// GET /api/users/csrf-token - Issue a double-submit token (cookie + body)
pub async fn csrf_token(State(state): State<Arc<AppState>>, jar: CookieJar) -> impl IntoResponse {
    let token = generate_csrf_token();
    let jar = jar.add(csrf_cookie(
        token.clone(),
        state.config.cookie.secure,
        state.config.cookie.parse_same_site(),
    ));
    (jar, Json(json!({ "csrf_token": token })))
}

/// GET /api/users/profile
pub async fn get_profile(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> ServiceResult<Json<UserProfile>> {
    let user = UserService::new(state.mongo.clone())
        .get_user(&claims.sub)
        .await?;
    Ok(Json(UserProfile::from(user)))
}

/// PUT /api/users/profile
pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    ValidJson(req): ValidJson<UpdateProfileRequest>,
) -> ServiceResult<Json<UserProfile>> {
    let user = UserService::new(state.mongo.clone())
        .update_profile(&claims.sub, req)
        .await?;
    tracing::info!(user_id = %claims.sub, "Profile updated");
    Ok(Json(UserProfile::from(user)))
}
