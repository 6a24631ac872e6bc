use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::practice::PracticeType;

/// Everything the progress page shows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressReport {
    pub goals: GoalStats,
    pub habits: Vec<HabitStats>,
    pub practices: PracticeStats,
    pub weekly_activity: Vec<DailyActivity>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GoalStats {
    pub total: u32,
    pub active: u32,
    pub completed: u32,
    pub paused: u32,
    pub archived: u32,
    /// Mean progress across active goals, 0.0 when there are none.
    pub average_active_progress: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HabitStats {
    pub habit_id: Uuid,
    pub name: String,
    pub current_streak: u32,
    pub longest_streak: u32,
    /// Fraction of days logged within the window, 0.0-1.0.
    pub completion_rate: f64,
    pub window_days: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PracticeStats {
    pub total_sessions: u32,
    pub total_minutes: u32,
    pub minutes_by_type: BTreeMap<PracticeType, u32>,
    /// Mean of `mood_after - mood_before` over sessions recording both.
    pub average_mood_change: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DailyActivity {
    pub date: NaiveDate,
    pub habits_completed: u32,
    pub practice_minutes: u32,
}
