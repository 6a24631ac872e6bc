use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};

use crate::api::AppState;
use crate::auth::{self, SESSION_COOKIE};
use crate::error::{AppError, AppResult};
use crate::models::*;

fn signed_in(state: &AppState, user: &User, session: &AuthSession) -> ([(header::HeaderName, String); 1], Json<CurrentUser>) {
    let cookie = auth::session_cookie(
        &session.token,
        session.expires_at,
        state.config.secure_cookies,
    );
    (
        [(header::SET_COOKIE, cookie)],
        Json(CurrentUser {
            id: user.id,
            email: user.email.clone(),
        }),
    )
}

/// Run password hashing work on the blocking pool.
async fn hashing<T, F>(f: F) -> AppResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> AppResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AppError::Internal(e.into()))?
}

/// Create an account and sign it in.
pub async fn register(
    State(state): State<AppState>,
    Json(input): Json<RegisterInput>,
) -> AppResult<impl IntoResponse> {
    let db = state.db.clone();
    let cost = state.config.password_cost;
    let user = hashing(move || auth::register(&db, input, cost)).await?;
    let session = auth::open_session(&state.db, &user, state.config.session_ttl)?;
    Ok((StatusCode::CREATED, signed_in(&state, &user, &session)))
}

pub async fn login(
    State(state): State<AppState>,
    Json(input): Json<LoginInput>,
) -> AppResult<impl IntoResponse> {
    let db = state.db.clone();
    let ttl = state.config.session_ttl;
    let (user, session) = hashing(move || auth::login(&db, input, ttl)).await?;
    tracing::info!(user_id = %user.id, "User signed in");
    Ok(signed_in(&state, &user, &session))
}

pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> AppResult<impl IntoResponse> {
    let token = headers
        .get(header::COOKIE)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| auth::cookie_value(h, SESSION_COOKIE));

    if let Some(token) = token {
        auth::logout(&state.db, token)?;
    }

    Ok((
        StatusCode::NO_CONTENT,
        [(header::SET_COOKIE, auth::clear_session_cookie())],
    ))
}
