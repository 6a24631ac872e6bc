//! Request gates: the session gateway in front of every route and the
//! shared-secret guard on the cron endpoints.

use axum::{
    body::Body,
    extract::{FromRequestParts, State},
    http::{header, request::Parts, HeaderValue, Request, Uri},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};

use subtle::ConstantTimeEq;

use super::AppState;
use crate::auth::{self, ResolvedSession, SESSION_COOKIE};
use crate::error::AppError;
use crate::models::CurrentUser;

/// Page prefixes that need a signed-in user.
const PROTECTED_PAGES: &[&str] = &[
    "/dashboard",
    "/goals",
    "/habits",
    "/practices",
    "/progress",
    "/settings",
    "/notifications",
    "/search",
];

/// Pages that only make sense for signed-out users.
const AUTH_PAGES: &[&str] = &["/login", "/register"];

/// JSON endpoints that need a signed-in user.
const PROTECTED_API: &str = "/api/v1";

/// What the gateway does with a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Allow,
    /// Signed-out user on a protected page.
    RedirectToLogin,
    /// Signed-in user on the login or register page.
    RedirectToDashboard,
    /// Signed-out request to a protected JSON endpoint.
    Unauthorized,
}

fn matches_prefix(path: &str, prefix: &str) -> bool {
    path == prefix
        || path
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'))
}

pub fn route_access(path: &str, authenticated: bool) -> Access {
    if authenticated {
        if AUTH_PAGES.iter().any(|page| matches_prefix(path, page)) {
            return Access::RedirectToDashboard;
        }
        return Access::Allow;
    }

    if matches_prefix(path, PROTECTED_API) {
        Access::Unauthorized
    } else if PROTECTED_PAGES.iter().any(|page| matches_prefix(path, page)) {
        Access::RedirectToLogin
    } else {
        Access::Allow
    }
}

/// Login URL that sends the user back to `uri`, query string included.
fn login_redirect(uri: &Uri) -> String {
    let target = uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or_else(|| uri.path());
    format!("/login?redirect={}", urlencoding::encode(target))
}

/// Resolve (and refresh) the session cookie, then apply [`route_access`].
///
/// On pass-through the signed-in user is attached to the request, and a
/// refreshed session cookie, or a cleared one for a dead token, is added to
/// the response.
pub async fn session_gateway(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let token = request
        .headers()
        .get(header::COOKIE)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| auth::cookie_value(h, SESSION_COOKIE))
        .map(str::to_owned);

    let session: Option<ResolvedSession> = match &token {
        Some(token) => match auth::resolve_session(&state.db, token, state.config.session_ttl) {
            Ok(session) => session,
            Err(e) => {
                tracing::error!("Session lookup failed: {}", e);
                None
            }
        },
        None => None,
    };

    let path = request.uri().path().to_owned();
    match route_access(&path, session.is_some()) {
        Access::RedirectToLogin => {
            tracing::debug!("Redirecting signed-out request for {} to login", path);
            return Redirect::to(&login_redirect(request.uri())).into_response();
        }
        Access::RedirectToDashboard => return Redirect::to("/dashboard").into_response(),
        Access::Unauthorized => return AppError::Unauthorized.into_response(),
        Access::Allow => {}
    }

    if let Some(session) = &session {
        request.extensions_mut().insert(session.user.clone());
    }

    let mut response = next.run(request).await;

    let set_cookie = match (&token, &session) {
        (_, Some(session)) if session.refreshed => Some(auth::session_cookie(
            &session.token,
            session.expires_at,
            state.config.secure_cookies,
        )),
        (Some(_), None) => Some(auth::clear_session_cookie()),
        _ => None,
    };
    if let Some(cookie) = set_cookie.and_then(|c| HeaderValue::from_str(&c).ok()) {
        // Handlers that set their own session cookie (login/logout) win.
        if !response.headers().contains_key(header::SET_COOKIE) {
            response.headers_mut().append(header::SET_COOKIE, cookie);
        }
    }

    response
}

/// Require `Authorization: Bearer <CRON_SECRET_KEY>`.
pub async fn cron_auth(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let Some(expected) = &state.config.cron_secret else {
        tracing::warn!("Cron call rejected: CRON_SECRET_KEY is not configured");
        return Err(AppError::Unauthorized);
    };

    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    match auth_header.and_then(|h| h.strip_prefix("Bearer ")) {
        Some(token) if bool::from(token.as_bytes().ct_eq(expected.as_bytes())) => {
            Ok(next.run(request).await)
        }
        Some(_) => {
            tracing::warn!("Invalid cron secret provided");
            Err(AppError::Unauthorized)
        }
        None => {
            tracing::warn!("Missing or malformed Authorization header on cron call");
            Err(AppError::Unauthorized)
        }
    }
}

/// The signed-in user, as attached by [`session_gateway`].
impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or(AppError::Unauthorized)
    }
}
