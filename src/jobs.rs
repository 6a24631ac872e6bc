//! Scheduled email fan-out.
//!
//! Each job walks the opted-in users one at a time. A failure for one
//! recipient is logged and counted, and the loop moves on. Only a failure to
//! load the recipient list aborts the job.

use chrono::{Duration, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::analytics;
use crate::db::{Database, EmailKind};
use crate::mailer::{Email, Mailer};
use crate::models::*;

/// Outcome of one job run, returned as the cron endpoint body.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct JobReport {
    pub success: bool,
    pub sent: u32,
    pub errors: u32,
    /// Eligible users with nothing to send.
    pub skipped: u32,
}

/// Remind users about habits they have not logged on `today`.
pub async fn send_daily_reminders(
    db: &Database,
    mailer: &dyn Mailer,
    app_url: &str,
    today: NaiveDate,
) -> anyhow::Result<JobReport> {
    let recipients = db.get_email_recipients(EmailKind::DailyReminder)?;
    tracing::info!("Daily reminders: {} eligible users", recipients.len());

    let mut report = JobReport {
        success: true,
        ..JobReport::default()
    };

    for profile in recipients {
        let pending = match db.get_pending_habits(profile.user_id, today) {
            Ok(pending) => pending,
            Err(e) => {
                tracing::error!(user_id = %profile.user_id, "Failed to load habits: {:#}", e);
                report.errors += 1;
                continue;
            }
        };
        if pending.is_empty() {
            report.skipped += 1;
            continue;
        }

        let email = daily_reminder_email(&profile, &pending, app_url);
        deliver(db, mailer, &profile, email, NotificationKind::Reminder, &mut report).await;
    }

    tracing::info!(
        "Daily reminders done: {} sent, {} errors, {} skipped",
        report.sent,
        report.errors,
        report.skipped
    );
    Ok(report)
}

/// Summarize the seven days ending `today` for each opted-in user.
pub async fn send_weekly_summaries(
    db: &Database,
    mailer: &dyn Mailer,
    app_url: &str,
    today: NaiveDate,
) -> anyhow::Result<JobReport> {
    let recipients = db.get_email_recipients(EmailKind::WeeklySummary)?;
    tracing::info!("Weekly summaries: {} eligible users", recipients.len());

    let mut report = JobReport {
        success: true,
        ..JobReport::default()
    };

    for profile in recipients {
        let summary = match WeeklySummary::load(db, profile.user_id, today) {
            Ok(summary) => summary,
            Err(e) => {
                tracing::error!(user_id = %profile.user_id, "Failed to build summary: {:#}", e);
                report.errors += 1;
                continue;
            }
        };

        let email = weekly_summary_email(&profile, &summary, app_url);
        deliver(db, mailer, &profile, email, NotificationKind::Summary, &mut report).await;
    }

    tracing::info!(
        "Weekly summaries done: {} sent, {} errors",
        report.sent,
        report.errors
    );
    Ok(report)
}

async fn deliver(
    db: &Database,
    mailer: &dyn Mailer,
    profile: &Profile,
    email: Email,
    kind: NotificationKind,
    report: &mut JobReport,
) {
    if let Err(e) = mailer.send(&email).await {
        tracing::error!(user_id = %profile.user_id, "Failed to send email: {}", e);
        report.errors += 1;
        return;
    }
    report.sent += 1;

    let notification = CreateNotificationInput {
        title: email.subject,
        message: email.text,
        kind,
    };
    if let Err(e) = db.create_notification(profile.user_id, notification) {
        tracing::warn!(user_id = %profile.user_id, "Email sent but notification not recorded: {:#}", e);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WeeklySummary {
    pub habits_logged: u32,
    pub practice_sessions: u32,
    pub practice_minutes: u32,
    pub active_goals: u32,
    pub average_goal_progress: f64,
    pub best_streak: u32,
}

impl WeeklySummary {
    pub fn load(db: &Database, user_id: uuid::Uuid, today: NaiveDate) -> anyhow::Result<Self> {
        let week_start = today - Duration::days(6);
        let since = Utc.from_utc_datetime(&week_start.and_time(chrono::NaiveTime::default()));

        let goals = db.get_goals(user_id, None)?;
        let habits = db.get_habits(user_id, false)?;
        let logs = db.get_user_habit_logs(user_id, None)?;
        let sessions = db.get_practice_sessions_since(user_id, since)?;

        let goal_stats = analytics::goal_stats(&goals);
        let practice_stats = analytics::practice_stats(&sessions);
        let best_streak = habits
            .iter()
            .map(|h| analytics::current_streak(&analytics::log_dates(h.id, &logs), today))
            .max()
            .unwrap_or(0);

        Ok(Self {
            habits_logged: logs.iter().filter(|l| l.log_date >= week_start).count() as u32,
            practice_sessions: practice_stats.total_sessions,
            practice_minutes: practice_stats.total_minutes,
            active_goals: goal_stats.active,
            average_goal_progress: goal_stats.average_active_progress,
            best_streak,
        })
    }
}

fn first_name(profile: &Profile) -> &str {
    profile
        .full_name
        .split_whitespace()
        .next()
        .unwrap_or("there")
}

pub fn daily_reminder_email(profile: &Profile, pending: &[Habit], app_url: &str) -> Email {
    let names: Vec<&str> = pending.iter().map(|h| h.name.as_str()).collect();
    let text = format!(
        "Hi {}, you still have {} habit{} to check off today: {}. {}/habits",
        first_name(profile),
        pending.len(),
        if pending.len() == 1 { "" } else { "s" },
        names.join(", "),
        app_url
    );
    let items: String = names
        .iter()
        .map(|name| format!("<li>{}</li>", escape_html(name)))
        .collect();
    let html = format!(
        "<p>Hi {},</p><p>You still have habits to check off today:</p><ul>{}</ul>\
         <p><a href=\"{}/habits\">Open your habits</a></p>",
        escape_html(first_name(profile)),
        items,
        app_url
    );

    Email {
        to: profile.email.clone(),
        subject: "Your daily habit reminder".to_string(),
        html,
        text,
    }
}

pub fn weekly_summary_email(profile: &Profile, summary: &WeeklySummary, app_url: &str) -> Email {
    let text = format!(
        "Hi {}, this week you logged {} habits, completed {} practice sessions ({} minutes), \
         and have {} active goals at {:.0}% average progress. Best current streak: {} days. {}/progress",
        first_name(profile),
        summary.habits_logged,
        summary.practice_sessions,
        summary.practice_minutes,
        summary.active_goals,
        summary.average_goal_progress,
        summary.best_streak,
        app_url
    );
    let html = format!(
        "<p>Hi {},</p><ul><li>Habits logged: {}</li><li>Practice sessions: {} ({} minutes)</li>\
         <li>Active goals: {} ({:.0}% average progress)</li><li>Best current streak: {} days</li></ul>\
         <p><a href=\"{}/progress\">See your progress</a></p>",
        escape_html(first_name(profile)),
        summary.habits_logged,
        summary.practice_sessions,
        summary.practice_minutes,
        summary.active_goals,
        summary.average_goal_progress,
        summary.best_streak,
        app_url
    );

    Email {
        to: profile.email.clone(),
        subject: "Your weekly growth summary".to_string(),
        html,
        text,
    }
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
