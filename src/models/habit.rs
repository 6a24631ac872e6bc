use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::goal::Category;

/// A recurring behaviour the user wants to build.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Habit {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub frequency: Frequency,
    /// How many days per week count as on-track. Always 7 for daily habits.
    pub target_per_week: u8,
    pub category: Category,
    pub archived: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    #[default]
    Daily,
    Weekly,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "daily" => Some(Self::Daily),
            "weekly" => Some(Self::Weekly),
            _ => None,
        }
    }
}

/// One check-off of a habit on a calendar day. At most one per habit per day.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HabitLog {
    pub id: Uuid,
    pub habit_id: Uuid,
    pub user_id: Uuid,
    pub log_date: NaiveDate,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateHabitInput {
    pub name: String,
    pub description: Option<String>,
    /// Defaults to `Daily`.
    pub frequency: Option<Frequency>,
    /// Ignored for daily habits.
    pub target_per_week: Option<i64>,
    pub category: Option<Category>,
}

/// Input for updating a habit. All fields are optional for partial updates.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateHabitInput {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "super::double_option", skip_serializing_if = "Option::is_none")]
    pub description: Option<Option<String>>,
    pub frequency: Option<Frequency>,
    pub target_per_week: Option<i64>,
    pub category: Option<Category>,
    pub archived: Option<bool>,
}

/// Toggle a habit for a day. `date` defaults to today (UTC).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToggleHabitInput {
    pub date: Option<NaiveDate>,
    pub note: Option<String>,
}

/// Result of a toggle: whether the day is now logged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToggleHabitResult {
    pub habit_id: Uuid,
    pub date: NaiveDate,
    pub completed: bool,
    pub log: Option<HabitLog>,
}

/// A habit with today's state and streaks, used by list pages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HabitWithStatus {
    #[serde(flatten)]
    pub habit: Habit,
    pub completed_today: bool,
    pub current_streak: u32,
    pub longest_streak: u32,
}
