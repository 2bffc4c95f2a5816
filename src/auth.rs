use anyhow::anyhow;
use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use axum_extra::extract::cookie::{Cookie, PrivateCookieJar, SameSite};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::AppError,
    models::{session::Session, user::User},
    state::AppState,
};

pub const SESSION_COOKIE: &str = "trip_session";

const RESET_TOKEN_TTL_MINUTES: i64 = 60;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct Registration {
    #[validate(email(message = "please enter a valid email address"))]
    pub email: String,
    #[validate(length(min = 2, message = "name must be at least 2 characters"))]
    pub name: String,
    #[validate(length(min = 6, message = "password must be at least 6 characters"))]
    pub password: String,
}

impl Registration {
    fn normalized(self) -> Self {
        Self {
            email: self.email.trim().to_lowercase(),
            name: self.name.trim().to_string(),
            password: self.password,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PasswordReset {
    pub token: String,
    #[validate(length(min = 6, message = "password must be at least 6 characters"))]
    pub new_password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthenticatedUser {
    pub id: i64,
    pub email: String,
    pub name: String,
}

impl From<&User> for AuthenticatedUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CurrentUser(pub Option<AuthenticatedUser>);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthenticatedUser>() {
            return Ok(Self(Some(user.clone())));
        }

        let token = bearer_token(&parts.headers).or_else(|| {
            PrivateCookieJar::from_headers(&parts.headers, state.cookie_key.clone())
                .get(SESSION_COOKIE)
                .map(|cookie| cookie.value().to_string())
        });
        let Some(token) = token else {
            return Ok(Self(None));
        };

        let user = resolve_session(state, &token).await?;
        if let Some(user) = &user {
            parts.extensions.insert(user.clone());
        }
        Ok(Self(user))
    }
}

impl CurrentUser {
    pub fn require_user(&self) -> Result<&AuthenticatedUser, AppError> {
        self.0.as_ref().ok_or(AppError::Unauthorized)
    }
}

pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let header = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = header.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then(|| token.to_string())
}

pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt_bytes: [u8; 16] = rand::random();
    let salt = SaltString::encode_b64(&salt_bytes)
        .map_err(|err| AppError::Other(anyhow!("salt encoding failed: {err}")))?;
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|err| AppError::Other(anyhow!("password hashing failed: {err}")))?;
    Ok(hash.to_string())
}

pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    PasswordHash::new(stored_hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

fn random_token() -> String {
    let bytes: [u8; 32] = rand::random();
    hex::encode(bytes)
}

pub async fn register_user(
    state: &AppState,
    registration: Registration,
) -> Result<AuthenticatedUser, AppError> {
    let registration = registration.normalized();
    registration.validate()?;

    let password_hash = hash_password(&registration.password)?;
    let inserted = sqlx::query_as::<_, User>(
        "INSERT INTO users (email, name, password_hash, created_at) VALUES (?, ?, ?, ?) RETURNING *",
    )
    .bind(&registration.email)
    .bind(&registration.name)
    .bind(&password_hash)
    .bind(Utc::now())
    .fetch_one(&state.db)
    .await;

    match inserted {
        Ok(user) => {
            info!(user_id = user.id, "registered user");
            Ok(AuthenticatedUser::from(&user))
        }
        Err(sqlx::Error::Database(err)) if err.is_unique_violation() => {
            Err(AppError::BadRequest("email already registered".into()))
        }
        Err(err) => Err(err.into()),
    }
}

pub async fn authenticate_user(
    state: &AppState,
    email: &str,
    password: &str,
) -> Result<AuthenticatedUser, AppError> {
    let email = email.trim().to_lowercase();
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ?")
        .bind(&email)
        .fetch_optional(&state.db)
        .await?
        .ok_or(AppError::Unauthorized)?;

    if !verify_password(password, &user.password_hash) {
        debug!(user_id = user.id, "password mismatch");
        return Err(AppError::Unauthorized);
    }

    sqlx::query("UPDATE users SET last_login_at = ? WHERE id = ?")
        .bind(Utc::now())
        .bind(user.id)
        .execute(&state.db)
        .await?;

    Ok(AuthenticatedUser::from(&user))
}

pub async fn create_session(state: &AppState, user_id: i64) -> Result<String, AppError> {
    let now = Utc::now();
    let expires_at = now + Duration::hours(state.config.session_ttl_hours);
    let session_id = Uuid::new_v4().to_string();
    sqlx::query(
        "INSERT INTO sessions (id, user_id, created_at, last_seen_at, expires_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&session_id)
    .bind(user_id)
    .bind(now)
    .bind(now)
    .bind(expires_at)
    .execute(&state.db)
    .await?;
    Ok(session_id)
}

pub async fn resolve_session(
    state: &AppState,
    token: &str,
) -> Result<Option<AuthenticatedUser>, AppError> {
    let Some(session) = sqlx::query_as::<_, Session>("SELECT * FROM sessions WHERE id = ?")
        .bind(token)
        .fetch_optional(&state.db)
        .await?
    else {
        return Ok(None);
    };

    let now = Utc::now();
    if session.is_expired_at(now) {
        destroy_session(state, &session.id).await?;
        return Ok(None);
    }

    sqlx::query("UPDATE sessions SET last_seen_at = ? WHERE id = ?")
        .bind(now)
        .bind(&session.id)
        .execute(&state.db)
        .await?;

    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(session.user_id)
        .fetch_optional(&state.db)
        .await?;
    Ok(user.as_ref().map(AuthenticatedUser::from))
}

pub async fn destroy_session(state: &AppState, session_id: &str) -> Result<(), AppError> {
    sqlx::query("DELETE FROM sessions WHERE id = ?")
        .bind(session_id)
        .execute(&state.db)
        .await?;
    Ok(())
}

pub fn apply_session_cookie(jar: PrivateCookieJar, session_id: &str) -> PrivateCookieJar {
    let cookie = Cookie::build((SESSION_COOKIE, session_id.to_string()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build();
    jar.add(cookie)
}

pub fn clear_session_cookie(jar: PrivateCookieJar) -> PrivateCookieJar {
    jar.remove(Cookie::build(SESSION_COOKIE).path("/").build())
}

/// Issues a one-hour reset token and returns the reset link.
pub async fn request_password_reset(state: &AppState, email: &str) -> Result<String, AppError> {
    let email = email.trim().to_lowercase();
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ?")
        .bind(&email)
        .fetch_optional(&state.db)
        .await?
        .ok_or(AppError::NotFound)?;

    let token = random_token();
    let expires_at = Utc::now() + Duration::minutes(RESET_TOKEN_TTL_MINUTES);
    sqlx::query("UPDATE users SET reset_token = ?, reset_token_expires_at = ? WHERE id = ?")
        .bind(&token)
        .bind(expires_at)
        .bind(user.id)
        .execute(&state.db)
        .await?;

    let link = format!(
        "{}/reset-password.html?token={token}",
        state.config.public_base_url
    );
    info!(user_id = user.id, %link, "password reset requested");
    Ok(link)
}

pub async fn reset_password(
    state: &AppState,
    reset: PasswordReset,
) -> Result<(), AppError> {
    reset.validate()?;

    let now = Utc::now();
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE reset_token = ?")
        .bind(&reset.token)
        .fetch_optional(&state.db)
        .await?
        .filter(|user| {
            user.reset_token_expires_at
                .map(|expires_at| expires_at > now)
                .unwrap_or(false)
        })
        .ok_or_else(|| AppError::BadRequest("invalid or expired token".into()))?;

    let password_hash = hash_password(&reset.new_password)?;
    let mut tx = state.db.begin().await?;
    sqlx::query(
        "UPDATE users SET password_hash = ?, reset_token = NULL, reset_token_expires_at = NULL WHERE id = ?",
    )
    .bind(&password_hash)
    .bind(user.id)
    .execute(&mut *tx)
    .await?;
    sqlx::query("DELETE FROM sessions WHERE user_id = ?")
        .bind(user.id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    info!(user_id = user.id, "password reset");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registration(email: &str, name: &str, password: &str) -> Registration {
        Registration {
            email: email.into(),
            name: name.into(),
            password: password.into(),
        }
        .normalized()
    }

    #[test]
    fn registration_is_normalized_before_validation() {
        let input = registration("  Ana@Example.COM ", "  Ana ", "secret123");
        assert_eq!(input.email, "ana@example.com");
        assert_eq!(input.name, "Ana");
        assert!(input.validate().is_ok());
    }

    #[test]
    fn registration_rejects_bad_fields() {
        let errors = registration("not-an-email", "Ana", "secret123")
            .validate()
            .unwrap_err();
        assert!(errors.field_errors().contains_key("email"));

        let errors = registration("ana@example.com", " A ", "abc")
            .validate()
            .unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("name"));
        assert!(fields.contains_key("password"));

        let err = AppError::from(errors);
        assert_eq!(err.kind(), "bad_request");
    }

    #[test]
    fn reset_requires_a_long_enough_password() {
        let reset = PasswordReset {
            token: "abc".into(),
            new_password: "short".into(),
        };
        assert!(reset.validate().is_err());
    }

    #[test]
    fn password_hash_verifies() {
        let hash = hash_password("hunter22").expect("hash");
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("hunter22", &hash));
        assert!(!verify_password("hunter23", &hash));
        assert!(!verify_password("hunter22", "not-a-hash"));
    }

    #[test]
    fn tokens_are_long_and_distinct() {
        let a = random_token();
        let b = random_token();
        assert_eq!(a.len(), 64);
        assert_ne!(a, b);
    }
}
