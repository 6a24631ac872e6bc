//! Cron-triggered jobs. Both routes sit behind the shared-secret guard.

use axum::{extract::State, Json};

use crate::api::AppState;
use crate::error::AppResult;
use crate::jobs::{self, JobReport};

pub async fn daily_reminders(State(state): State<AppState>) -> AppResult<Json<JobReport>> {
    let report = jobs::send_daily_reminders(
        &state.db,
        state.mailer.as_ref(),
        &state.config.app_url,
        super::today(),
    )
    .await?;
    Ok(Json(report))
}

pub async fn weekly_summary(State(state): State<AppState>) -> AppResult<Json<JobReport>> {
    let report = jobs::send_weekly_summaries(
        &state.db,
        state.mailer.as_ref(),
        &state.config.app_url,
        super::today(),
    )
    .await?;
    Ok(Json(report))
}
