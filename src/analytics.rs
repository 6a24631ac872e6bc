//! Progress analytics computed from tracking rows.
//!
//! Everything here is pure: callers load rows from the store and pass `today`
//! explicitly so results are deterministic.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{Duration, NaiveDate};

use crate::models::*;

/// Default look-back window for completion rates.
pub const DEFAULT_WINDOW_DAYS: u32 = 30;

/// Consecutive logged days ending today, or ending yesterday when today has
/// not been logged yet (the streak is still alive until the day is over).
pub fn current_streak(dates: &BTreeSet<NaiveDate>, today: NaiveDate) -> u32 {
    let mut day = if dates.contains(&today) {
        today
    } else {
        today - Duration::days(1)
    };

    let mut streak = 0;
    while dates.contains(&day) {
        streak += 1;
        day -= Duration::days(1);
    }
    streak
}

pub fn longest_streak(dates: &BTreeSet<NaiveDate>) -> u32 {
    let mut longest = 0;
    let mut run = 0;
    let mut previous: Option<NaiveDate> = None;

    for &date in dates {
        run = match previous {
            Some(p) if date - p == Duration::days(1) => run + 1,
            _ => 1,
        };
        longest = longest.max(run);
        previous = Some(date);
    }
    longest
}

/// Fraction of the last `window_days` days (including today) that were logged.
pub fn completion_rate(dates: &BTreeSet<NaiveDate>, today: NaiveDate, window_days: u32) -> f64 {
    if window_days == 0 {
        return 0.0;
    }
    let start = today - Duration::days(i64::from(window_days) - 1);
    let logged = dates.range(start..=today).count();
    logged as f64 / f64::from(window_days)
}

pub fn habit_stats(habit: &Habit, logs: &[HabitLog], today: NaiveDate, window_days: u32) -> HabitStats {
    let dates = log_dates(habit.id, logs);
    HabitStats {
        habit_id: habit.id,
        name: habit.name.clone(),
        current_streak: current_streak(&dates, today),
        longest_streak: longest_streak(&dates),
        completion_rate: completion_rate(&dates, today, window_days),
        window_days,
    }
}

pub fn goal_stats(goals: &[Goal]) -> GoalStats {
    let mut stats = GoalStats {
        total: goals.len() as u32,
        ..GoalStats::default()
    };
    let mut active_progress = 0u32;

    for goal in goals {
        match goal.status {
            GoalStatus::Active => {
                stats.active += 1;
                active_progress += u32::from(goal.progress);
            }
            GoalStatus::Completed => stats.completed += 1,
            GoalStatus::Paused => stats.paused += 1,
            GoalStatus::Archived => stats.archived += 1,
        }
    }

    if stats.active > 0 {
        stats.average_active_progress = f64::from(active_progress) / f64::from(stats.active);
    }
    stats
}

pub fn practice_stats(sessions: &[PracticeSession]) -> PracticeStats {
    let mut stats = PracticeStats::default();
    let mut mood_deltas = Vec::new();

    for session in sessions {
        stats.total_sessions += 1;
        stats.total_minutes += session.duration_minutes;
        *stats.minutes_by_type.entry(session.practice_type).or_insert(0) +=
            session.duration_minutes;

        if let (Some(before), Some(after)) = (session.mood_before, session.mood_after) {
            mood_deltas.push(f64::from(after) - f64::from(before));
        }
    }

    if !mood_deltas.is_empty() {
        stats.average_mood_change = Some(mood_deltas.iter().sum::<f64>() / mood_deltas.len() as f64);
    }
    stats
}

/// One entry per day for the seven days ending `today`, oldest first.
pub fn weekly_activity(logs: &[HabitLog], sessions: &[PracticeSession], today: NaiveDate) -> Vec<DailyActivity> {
    let start = today - Duration::days(6);
    let mut days: BTreeMap<NaiveDate, DailyActivity> = (0..7)
        .map(|offset| {
            let date = start + Duration::days(offset);
            (
                date,
                DailyActivity {
                    date,
                    habits_completed: 0,
                    practice_minutes: 0,
                },
            )
        })
        .collect();

    for log in logs {
        if let Some(day) = days.get_mut(&log.log_date) {
            day.habits_completed += 1;
        }
    }
    for session in sessions {
        if let Some(day) = days.get_mut(&session.completed_at.date_naive()) {
            day.practice_minutes += session.duration_minutes;
        }
    }

    days.into_values().collect()
}

pub fn progress_report(
    goals: &[Goal],
    habits: &[Habit],
    logs: &[HabitLog],
    sessions: &[PracticeSession],
    today: NaiveDate,
    window_days: u32,
) -> ProgressReport {
    ProgressReport {
        goals: goal_stats(goals),
        habits: habits
            .iter()
            .map(|habit| habit_stats(habit, logs, today, window_days))
            .collect(),
        practices: practice_stats(sessions),
        weekly_activity: weekly_activity(logs, sessions, today),
    }
}

pub fn log_dates(habit_id: uuid::Uuid, logs: &[HabitLog]) -> BTreeSet<NaiveDate> {
    logs.iter()
        .filter(|log| log.habit_id == habit_id)
        .map(|log| log.log_date)
        .collect()
}
