//! Page routes. Each returns the data its page renders; the auth gateway
//! has already redirected signed-out visitors away from protected pages.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{blocking, habits_with_status, progress_report, today, SearchQuery};
use crate::analytics;
use crate::api::AppState;
use crate::error::{AppError, AppResult};
use crate::models::*;
use crate::search::{self, SearchResults};

const RECENT_PRACTICES: u32 = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicPage {
    pub page: String,
    /// Where to go after signing in, echoed from `?redirect=`.
    pub redirect: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardPage {
    pub profile: Option<Profile>,
    pub active_goals: Vec<Goal>,
    pub habits: Vec<HabitWithStatus>,
    pub recent_practices: Vec<PracticeSession>,
    pub unread_notifications: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoalsPage {
    pub goals: Vec<Goal>,
    pub stats: GoalStats,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoalDetailPage {
    pub goal: Goal,
    /// Days until the target date; negative once it has passed.
    pub days_remaining: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HabitsPage {
    pub habits: Vec<HabitWithStatus>,
    pub completed_today: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PracticesPage {
    pub sessions: Vec<PracticeSession>,
    pub stats: PracticeStats,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingsPage {
    pub profile: Option<Profile>,
    pub settings: Option<UserSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsPage {
    pub notifications: Vec<Notification>,
    pub unread: u32,
}

#[derive(Debug, Deserialize)]
pub struct RedirectQuery {
    pub redirect: Option<String>,
}

fn public_page(page: &str, redirect: Option<String>) -> Json<PublicPage> {
    // Only same-site paths are echoed back.
    let redirect = redirect.filter(|r| r.starts_with('/') && !r.starts_with("//"));
    Json(PublicPage {
        page: page.to_string(),
        redirect,
    })
}

pub async fn home() -> Json<PublicPage> {
    public_page("home", None)
}

pub async fn login(Query(query): Query<RedirectQuery>) -> Json<PublicPage> {
    public_page("login", query.redirect)
}

pub async fn register(Query(query): Query<RedirectQuery>) -> Json<PublicPage> {
    public_page("register", query.redirect)
}

pub async fn dashboard(State(state): State<AppState>, user: CurrentUser) -> AppResult<Json<DashboardPage>> {
    let user_id = user.id;
    let (profile, active_goals) = tokio::join!(
        blocking(&state.db, move |db| db.get_profile(user_id)),
        blocking(&state.db, move |db| db.get_goals(user_id, Some(GoalStatus::Active))),
    );

    Ok(Json(DashboardPage {
        profile: profile?,
        active_goals: active_goals?,
        habits: habits_with_status(&state.db, user_id, today())?,
        recent_practices: state.db.get_practice_sessions(user_id, Some(RECENT_PRACTICES))?,
        unread_notifications: state.db.count_unread_notifications(user_id)?,
    }))
}

pub async fn goals(State(state): State<AppState>, user: CurrentUser) -> AppResult<Json<GoalsPage>> {
    let goals = state.db.get_goals(user.id, None)?;
    let stats = analytics::goal_stats(&goals);
    Ok(Json(GoalsPage { goals, stats }))
}

pub async fn goal_detail(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<GoalDetailPage>> {
    let goal = state
        .db
        .get_goal(user.id, id)?
        .ok_or(AppError::NotFound("Goal"))?;
    let days_remaining = goal
        .target_date
        .map(|target| (target - today()).num_days());
    Ok(Json(GoalDetailPage {
        goal,
        days_remaining,
    }))
}

pub async fn habits(State(state): State<AppState>, user: CurrentUser) -> AppResult<Json<HabitsPage>> {
    let habits = habits_with_status(&state.db, user.id, today())?;
    let completed_today = habits.iter().filter(|h| h.completed_today).count() as u32;
    Ok(Json(HabitsPage {
        habits,
        completed_today,
    }))
}

pub async fn practices(State(state): State<AppState>, user: CurrentUser) -> AppResult<Json<PracticesPage>> {
    let since = chrono::Utc::now() - Duration::days(i64::from(analytics::DEFAULT_WINDOW_DAYS));
    let recent = state.db.get_practice_sessions_since(user.id, since)?;
    Ok(Json(PracticesPage {
        stats: analytics::practice_stats(&recent),
        sessions: state.db.get_practice_sessions(user.id, Some(50))?,
    }))
}

pub async fn progress(State(state): State<AppState>, user: CurrentUser) -> AppResult<Json<ProgressReport>> {
    Ok(Json(progress_report(
        &state.db,
        user.id,
        today(),
        analytics::DEFAULT_WINDOW_DAYS,
    )?))
}

pub async fn settings(State(state): State<AppState>, user: CurrentUser) -> AppResult<Json<SettingsPage>> {
    Ok(Json(SettingsPage {
        profile: state.db.get_profile(user.id)?,
        settings: state.db.get_settings(user.id)?,
    }))
}

pub async fn notifications(State(state): State<AppState>, user: CurrentUser) -> AppResult<Json<NotificationsPage>> {
    Ok(Json(NotificationsPage {
        notifications: state.db.get_notifications(user.id, Some(50))?,
        unread: state.db.count_unread_notifications(user.id)?,
    }))
}

pub async fn search(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<SearchQuery>,
) -> AppResult<Json<SearchResults>> {
    Ok(Json(search::search(&state.db, user.id, &query.q)?))
}
