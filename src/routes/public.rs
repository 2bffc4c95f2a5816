use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use axum_extra::extract::{cookie::PrivateCookieJar, WithRejection};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{
    auth::{self, AuthenticatedUser, PasswordReset, Registration},
    error::AppError,
    routes::JsonBody,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/forgot-password", post(forgot_password))
        .route("/reset-password", post(reset_password))
}

#[derive(Serialize)]
struct SessionResponse {
    token: String,
    user: AuthenticatedUser,
}

async fn signup(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    WithRejection(Json(body), _): JsonBody<Registration>,
) -> Result<(StatusCode, PrivateCookieJar, Json<SessionResponse>), AppError> {
    let user = auth::register_user(&state, body).await?;
    let token = auth::create_session(&state, user.id).await?;
    Ok((
        StatusCode::CREATED,
        auth::apply_session_cookie(jar, &token),
        Json(SessionResponse { token, user }),
    ))
}

#[derive(Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

async fn login(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    WithRejection(Json(body), _): JsonBody<LoginRequest>,
) -> Result<(PrivateCookieJar, Json<SessionResponse>), AppError> {
    let user = auth::authenticate_user(&state, &body.email, &body.password).await?;
    let token = auth::create_session(&state, user.id).await?;
    Ok((
        auth::apply_session_cookie(jar, &token),
        Json(SessionResponse { token, user }),
    ))
}

async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: PrivateCookieJar,
) -> Result<(PrivateCookieJar, Json<Value>), AppError> {
    let cookie = jar
        .get(auth::SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string());
    for session_id in auth::bearer_token(&headers).into_iter().chain(cookie) {
        auth::destroy_session(&state, &session_id).await?;
    }
    Ok((auth::clear_session_cookie(jar), Json(json!({ "success": true }))))
}

#[derive(Deserialize)]
struct ForgotPasswordRequest {
    email: String,
}

async fn forgot_password(
    State(state): State<AppState>,
    WithRejection(Json(body), _): JsonBody<ForgotPasswordRequest>,
) -> Result<Json<Value>, AppError> {
    auth::request_password_reset(&state, &body.email).await?;
    Ok(Json(json!({ "message": "Reset link sent" })))
}

async fn reset_password(
    State(state): State<AppState>,
    WithRejection(Json(body), _): JsonBody<PasswordReset>,
) -> Result<Json<Value>, AppError> {
    auth::reset_password(&state, body).await?;
    Ok(Json(json!({ "message": "Password reset successful" })))
}
