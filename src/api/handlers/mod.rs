pub mod auth;
pub mod cron;
pub mod pages;
pub mod realtime;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use uuid::Uuid;

use super::AppState;
use crate::analytics;
use crate::db::Database;
use crate::error::{AppError, AppResult};
use crate::models::*;
use crate::realtime::{ChangeKind, Table};
use crate::search::{self, SearchResults};
use crate::validation;

// ============================================================
// Shared helpers
// ============================================================

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Run a store call on the blocking pool.
pub(crate) async fn blocking<T, F>(db: &Database, f: F) -> AppResult<T>
where
    T: Send + 'static,
    F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
{
    let db = db.clone();
    tokio::task::spawn_blocking(move || f(&db))
        .await
        .map_err(|e| AppError::Internal(e.into()))?
        .map_err(AppError::from)
}

/// Active habits with today's completion and streaks.
pub(crate) fn habits_with_status(db: &Database, user_id: Uuid, today: NaiveDate) -> anyhow::Result<Vec<HabitWithStatus>> {
    let habits = db.get_habits(user_id, false)?;
    let logs = db.get_user_habit_logs(user_id, None)?;

    Ok(habits
        .into_iter()
        .map(|habit| {
            let dates = analytics::log_dates(habit.id, &logs);
            HabitWithStatus {
                completed_today: dates.contains(&today),
                current_streak: analytics::current_streak(&dates, today),
                longest_streak: analytics::longest_streak(&dates),
                habit,
            }
        })
        .collect())
}

pub(crate) fn progress_report(db: &Database, user_id: Uuid, today: NaiveDate, window_days: u32) -> anyhow::Result<ProgressReport> {
    let goals = db.get_goals(user_id, None)?;
    let habits = db.get_habits(user_id, false)?;
    let logs = db.get_user_habit_logs(user_id, None)?;
    let sessions = db.get_practice_sessions(user_id, None)?;
    Ok(analytics::progress_report(
        &goals, &habits, &logs, &sessions, today, window_days,
    ))
}

// ============================================================
// Health
// ============================================================

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

// ============================================================
// Profile & settings
// ============================================================

pub async fn get_profile(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Json<Profile>> {
    state
        .db
        .get_profile(user.id)?
        .map(Json)
        .ok_or(AppError::NotFound("Profile"))
}

pub async fn update_profile(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(input): Json<UpdateProfileInput>,
) -> AppResult<Json<Profile>> {
    let input = validation::update_profile(input).map_err(AppError::Validation)?;
    let profile = state
        .db
        .update_profile(user.id, input)?
        .ok_or(AppError::NotFound("Profile"))?;

    state
        .feed
        .notify(Table::Profiles, ChangeKind::Update, user.id, user.id, Some(&profile));
    Ok(Json(profile))
}

pub async fn get_settings(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Json<UserSettings>> {
    state
        .db
        .get_settings(user.id)?
        .map(Json)
        .ok_or(AppError::NotFound("Settings"))
}

pub async fn update_settings(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(input): Json<UpdateSettingsInput>,
) -> AppResult<Json<UserSettings>> {
    let input = validation::update_settings(input).map_err(AppError::Validation)?;
    let settings = state
        .db
        .update_settings(user.id, input)?
        .ok_or(AppError::NotFound("Settings"))?;

    state
        .feed
        .notify(Table::UserSettings, ChangeKind::Update, user.id, user.id, Some(&settings));
    Ok(Json(settings))
}

// ============================================================
// Goals
// ============================================================

#[derive(Debug, Deserialize)]
pub struct ListGoalsQuery {
    pub status: Option<GoalStatus>,
}

pub async fn list_goals(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<ListGoalsQuery>,
) -> AppResult<Json<Vec<Goal>>> {
    Ok(Json(state.db.get_goals(user.id, query.status)?))
}

pub async fn get_goal(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Goal>> {
    state
        .db
        .get_goal(user.id, id)?
        .map(Json)
        .ok_or(AppError::NotFound("Goal"))
}

pub async fn create_goal(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(input): Json<CreateGoalInput>,
) -> AppResult<(StatusCode, Json<Goal>)> {
    let input = validation::create_goal(input).map_err(AppError::Validation)?;
    let goal = state.db.create_goal(user.id, input)?;
    tracing::info!(user_id = %user.id, goal_id = %goal.id, "Goal created");

    state
        .feed
        .notify(Table::Goals, ChangeKind::Insert, user.id, goal.id, Some(&goal));
    Ok((StatusCode::CREATED, Json(goal)))
}

pub async fn update_goal(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateGoalInput>,
) -> AppResult<Json<Goal>> {
    let input = validation::update_goal(input).map_err(AppError::Validation)?;
    let goal = apply_goal_update(&state, &user, id, input)?;
    Ok(Json(goal))
}

pub async fn update_goal_progress(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateProgressInput>,
) -> AppResult<Json<Goal>> {
    let input = validation::update_progress(input).map_err(AppError::Validation)?;
    let update = UpdateGoalInput {
        progress: Some(input.progress),
        ..UpdateGoalInput::default()
    };
    let goal = apply_goal_update(&state, &user, id, update)?;
    Ok(Json(goal))
}

fn apply_goal_update(state: &AppState, user: &CurrentUser, id: Uuid, input: UpdateGoalInput) -> AppResult<Goal> {
    let before = state
        .db
        .get_goal(user.id, id)?
        .ok_or(AppError::NotFound("Goal"))?;
    let goal = state
        .db
        .update_goal(user.id, id, input)?
        .ok_or(AppError::NotFound("Goal"))?;

    state
        .feed
        .notify(Table::Goals, ChangeKind::Update, user.id, goal.id, Some(&goal));

    if before.status != GoalStatus::Completed && goal.status == GoalStatus::Completed {
        celebrate_goal(state, user, &goal);
    }
    Ok(goal)
}

/// Record an achievement notification when a goal is completed. Best effort.
fn celebrate_goal(state: &AppState, user: &CurrentUser, goal: &Goal) {
    let input = CreateNotificationInput {
        title: "Goal completed!".to_string(),
        message: format!("You completed \"{}\". Well done!", goal.title),
        kind: NotificationKind::Achievement,
    };
    match state.db.create_notification(user.id, input) {
        Ok(notification) => state.feed.notify(
            Table::Notifications,
            ChangeKind::Insert,
            user.id,
            notification.id,
            Some(&notification),
        ),
        Err(e) => tracing::warn!(user_id = %user.id, "Failed to record achievement: {:#}", e),
    }
}

pub async fn delete_goal(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    if !state.db.delete_goal(user.id, id)? {
        return Err(AppError::NotFound("Goal"));
    }
    state
        .feed
        .notify::<()>(Table::Goals, ChangeKind::Delete, user.id, id, None);
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================
// Habits
// ============================================================

pub async fn list_habits(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Json<Vec<HabitWithStatus>>> {
    Ok(Json(habits_with_status(&state.db, user.id, today())?))
}

pub async fn create_habit(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(input): Json<CreateHabitInput>,
) -> AppResult<(StatusCode, Json<Habit>)> {
    let input = validation::create_habit(input).map_err(AppError::Validation)?;
    let habit = state.db.create_habit(user.id, input)?;
    tracing::info!(user_id = %user.id, habit_id = %habit.id, "Habit created");

    state
        .feed
        .notify(Table::Habits, ChangeKind::Insert, user.id, habit.id, Some(&habit));
    Ok((StatusCode::CREATED, Json(habit)))
}

pub async fn update_habit(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateHabitInput>,
) -> AppResult<Json<Habit>> {
    let input = validation::update_habit(input).map_err(AppError::Validation)?;
    let habit = state
        .db
        .update_habit(user.id, id, input)?
        .ok_or(AppError::NotFound("Habit"))?;

    state
        .feed
        .notify(Table::Habits, ChangeKind::Update, user.id, habit.id, Some(&habit));
    Ok(Json(habit))
}

pub async fn delete_habit(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    if !state.db.delete_habit(user.id, id)? {
        return Err(AppError::NotFound("Habit"));
    }
    state
        .feed
        .notify::<()>(Table::Habits, ChangeKind::Delete, user.id, id, None);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn toggle_habit(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> AppResult<Json<ToggleHabitResult>> {
    // The body is optional: an empty POST toggles today.
    let input: ToggleHabitInput = if body.iter().all(u8::is_ascii_whitespace) {
        ToggleHabitInput::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| AppError::Validation(format!("Invalid request body: {}", e)))?
    };
    let date = input.date.unwrap_or_else(today);
    if date > today() {
        return Err(AppError::Validation("Cannot log a habit for a future date".to_string()));
    }

    let result = state
        .db
        .toggle_habit_log(user.id, id, date, input.note)?
        .ok_or(AppError::NotFound("Habit"))?;

    match &result.log {
        Some(log) => state
            .feed
            .notify(Table::HabitLogs, ChangeKind::Insert, user.id, log.id, Some(log)),
        None => state.feed.notify(
            Table::HabitLogs,
            ChangeKind::Delete,
            user.id,
            format!("{}:{}", id, date),
            Some(&result),
        ),
    }
    Ok(Json(result))
}

pub async fn list_habit_logs(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Vec<HabitLog>>> {
    state
        .db
        .get_habit(user.id, id)?
        .ok_or(AppError::NotFound("Habit"))?;
    Ok(Json(state.db.get_habit_logs(id)?))
}

// ============================================================
// Practices
// ============================================================

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<u32>,
}

pub async fn list_practices(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<LimitQuery>,
) -> AppResult<Json<Vec<PracticeSession>>> {
    Ok(Json(state.db.get_practice_sessions(user.id, query.limit)?))
}

pub async fn create_practice(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(input): Json<CreatePracticeInput>,
) -> AppResult<(StatusCode, Json<PracticeSession>)> {
    let input = validation::create_practice(input).map_err(AppError::Validation)?;
    let session = state.db.create_practice_session(user.id, input)?;
    tracing::info!(
        user_id = %user.id,
        practice = session.practice_type.as_str(),
        minutes = session.duration_minutes,
        "Practice session logged"
    );

    state.feed.notify(
        Table::PracticeSessions,
        ChangeKind::Insert,
        user.id,
        session.id,
        Some(&session),
    );
    Ok((StatusCode::CREATED, Json(session)))
}

pub async fn delete_practice(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    if !state.db.delete_practice_session(user.id, id)? {
        return Err(AppError::NotFound("Practice session"));
    }
    state
        .feed
        .notify::<()>(Table::PracticeSessions, ChangeKind::Delete, user.id, id, None);
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================
// Notifications
// ============================================================

pub async fn list_notifications(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<LimitQuery>,
) -> AppResult<Json<Vec<Notification>>> {
    Ok(Json(state.db.get_notifications(user.id, query.limit)?))
}

pub async fn mark_notification_read(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Notification>> {
    let notification = state
        .db
        .mark_notification_read(user.id, id)?
        .ok_or(AppError::NotFound("Notification"))?;

    state.feed.notify(
        Table::Notifications,
        ChangeKind::Update,
        user.id,
        notification.id,
        Some(&notification),
    );
    Ok(Json(notification))
}

pub async fn mark_all_notifications_read(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Json<serde_json::Value>> {
    let updated = state.db.mark_all_notifications_read(user.id)?;
    if updated > 0 {
        state.feed.notify::<()>(
            Table::Notifications,
            ChangeKind::Update,
            user.id,
            "*",
            None,
        );
    }
    Ok(Json(serde_json::json!({ "updated": updated })))
}

// ============================================================
// Search & progress
// ============================================================

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

pub async fn search(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<SearchQuery>,
) -> AppResult<Json<SearchResults>> {
    Ok(Json(search::search(&state.db, user.id, &query.q)?))
}

#[derive(Debug, Deserialize)]
pub struct ProgressQuery {
    pub days: Option<u32>,
}

pub async fn get_progress(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<ProgressQuery>,
) -> AppResult<Json<ProgressReport>> {
    let window = query
        .days
        .unwrap_or(analytics::DEFAULT_WINDOW_DAYS)
        .clamp(1, 365);
    Ok(Json(progress_report(&state.db, user.id, today(), window)?))
}
