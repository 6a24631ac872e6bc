//! Account registration, login and session lifecycle.

mod password;

pub use password::{hash_password, verify_password};

use chrono::{DateTime, Duration, Utc};

use crate::db::Database;
use crate::error::{AppError, AppResult};
use crate::models::*;
use crate::validation;

/// Name of the cookie carrying the session token.
pub const SESSION_COOKIE: &str = "growth_session";

/// A session resolved for a request, plus whether its expiry was pushed out.
#[derive(Debug, Clone)]
pub struct ResolvedSession {
    pub user: CurrentUser,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub refreshed: bool,
}

/// Create the account, then the profile, default settings and welcome
/// notification.
///
/// Only the account row is required. The follow-up rows are best effort:
/// failures are logged and the registration still succeeds.
/// `password_cost` is the bcrypt cost factor for the new hash.
pub fn register(db: &Database, input: RegisterInput, password_cost: u32) -> AppResult<User> {
    let input = validation::register(input).map_err(AppError::Validation)?;
    let password_hash = hash_password(&input.password, password_cost)
        .map_err(|e| AppError::Internal(e.into()))?;
    let user = db.create_user(&input.email, &password_hash)?;
    tracing::info!(user_id = %user.id, "Registered new user");

    if let Err(e) = db.create_profile(user.id, &user.email, &input.full_name) {
        tracing::warn!(user_id = %user.id, "Failed to create profile: {:#}", e);
    }
    if let Err(e) = db.create_default_settings(user.id) {
        tracing::warn!(user_id = %user.id, "Failed to create settings: {:#}", e);
    }
    let welcome = CreateNotificationInput {
        title: "Welcome!".to_string(),
        message: format!(
            "Hi {}, your growth journey starts today. Set your first goal to get going.",
            input.full_name
        ),
        kind: NotificationKind::Welcome,
    };
    if let Err(e) = db.create_notification(user.id, welcome) {
        tracing::warn!(user_id = %user.id, "Failed to create welcome notification: {:#}", e);
    }

    Ok(user)
}

/// Check credentials and open a session.
pub fn login(db: &Database, input: LoginInput, ttl: Duration) -> AppResult<(User, AuthSession)> {
    let input = validation::login(input).map_err(AppError::Validation)?;

    let user = db
        .get_user_by_email(&input.email)?
        .filter(|user| verify_password(&input.password, &user.password_hash))
        .ok_or_else(|| {
            tracing::warn!("Failed login attempt");
            AppError::Validation("Invalid email or password".to_string())
        })?;

    let session = open_session(db, &user, ttl)?;
    Ok((user, session))
}

pub fn open_session(db: &Database, user: &User, ttl: Duration) -> AppResult<AuthSession> {
    Ok(db.create_auth_session(user.id, Utc::now() + ttl)?)
}

pub fn logout(db: &Database, token: &str) -> AppResult<()> {
    db.delete_auth_session(token)?;
    Ok(())
}

/// Resolve a session token, dropping it if expired and sliding its expiry
/// forward once less than half of `ttl` remains.
pub fn resolve_session(db: &Database, token: &str, ttl: Duration) -> AppResult<Option<ResolvedSession>> {
    let Some((session, email)) = db.get_auth_session(token)? else {
        return Ok(None);
    };

    let now = Utc::now();
    if session.expires_at <= now {
        tracing::debug!(user_id = %session.user_id, "Session expired");
        db.delete_auth_session(token)?;
        return Ok(None);
    }

    let mut expires_at = session.expires_at;
    let refreshed = needs_refresh(expires_at, now, ttl);
    if refreshed {
        expires_at = now + ttl;
        db.extend_auth_session(token, expires_at)?;
        tracing::debug!(user_id = %session.user_id, "Session refreshed");
    }

    Ok(Some(ResolvedSession {
        user: CurrentUser {
            id: session.user_id,
            email,
        },
        token: session.token,
        expires_at,
        refreshed,
    }))
}

fn needs_refresh(expires_at: DateTime<Utc>, now: DateTime<Utc>, ttl: Duration) -> bool {
    expires_at - now < ttl / 2
}

/// `Set-Cookie` value for a session.
pub fn session_cookie(token: &str, expires_at: DateTime<Utc>, secure: bool) -> String {
    let max_age = (expires_at - Utc::now()).num_seconds().max(0);
    let mut cookie = format!(
        "{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age}"
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// `Set-Cookie` value that removes the session cookie.
pub fn clear_session_cookie() -> String {
    format!("{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}

/// Extract a cookie value from a `Cookie` header.
pub fn cookie_value<'a>(header: &'a str, name: &str) -> Option<&'a str> {
    header.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key == name && !value.is_empty()).then_some(value)
    })
}
