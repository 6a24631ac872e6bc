use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Something the user is working towards.
///
/// Progress and status are coupled: reaching 100% completes an active goal,
/// and completing a goal pins its progress to 100.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Goal {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub category: Category,
    pub status: GoalStatus,
    /// Percentage complete, 0-100.
    pub progress: u8,
    pub target_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Life area a goal or habit belongs to.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    #[default]
    Personal,
    Health,
    Career,
    Learning,
    Relationships,
    Finance,
    Other,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Personal => "personal",
            Self::Health => "health",
            Self::Career => "career",
            Self::Learning => "learning",
            Self::Relationships => "relationships",
            Self::Finance => "finance",
            Self::Other => "other",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "personal" => Some(Self::Personal),
            "health" => Some(Self::Health),
            "career" => Some(Self::Career),
            "learning" => Some(Self::Learning),
            "relationships" => Some(Self::Relationships),
            "finance" => Some(Self::Finance),
            "other" => Some(Self::Other),
            _ => None,
        }
    }
}

/// - `Active`: Being worked on
/// - `Completed`: Reached 100%
/// - `Paused`: Temporarily set aside
/// - `Archived`: Hidden from the dashboard, kept for history
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GoalStatus {
    Active,
    Completed,
    Paused,
    Archived,
}

impl GoalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Paused => "paused",
            Self::Archived => "archived",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "completed" => Some(Self::Completed),
            "paused" => Some(Self::Paused),
            "archived" => Some(Self::Archived),
            _ => None,
        }
    }
}

/// Input for creating a goal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateGoalInput {
    pub title: String,
    pub description: Option<String>,
    /// Defaults to `Personal` if not specified.
    pub category: Option<Category>,
    pub target_date: Option<NaiveDate>,
}

/// Input for updating a goal. All fields are optional for partial updates.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateGoalInput {
    pub title: Option<String>,
    /// `null` or blank clears the description.
    #[serde(default, deserialize_with = "super::double_option", skip_serializing_if = "Option::is_none")]
    pub description: Option<Option<String>>,
    pub category: Option<Category>,
    pub status: Option<GoalStatus>,
    pub progress: Option<i64>,
    pub target_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateProgressInput {
    pub progress: i64,
}

impl Goal {
    /// Reconcile status and progress after an edit.
    ///
    /// Only an edit that sets progress can complete an active goal, so a
    /// completed goal can be reopened without its progress flipping it back.
    pub(crate) fn normalize(&mut self, progress_changed: bool) {
        if self.status == GoalStatus::Completed {
            self.progress = 100;
        } else if progress_changed && self.progress >= 100 && self.status == GoalStatus::Active {
            self.status = GoalStatus::Completed;
        }
    }
}
