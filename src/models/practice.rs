use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A completed guided practice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PracticeSession {
    pub id: Uuid,
    pub user_id: Uuid,
    pub practice_type: PracticeType,
    pub duration_minutes: u32,
    /// Self-reported mood on a 1-10 scale.
    pub mood_before: Option<u8>,
    pub mood_after: Option<u8>,
    pub notes: Option<String>,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum PracticeType {
    Meditation,
    Breathing,
    Journaling,
    Gratitude,
    Visualization,
    Reflection,
}

impl PracticeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Meditation => "meditation",
            Self::Breathing => "breathing",
            Self::Journaling => "journaling",
            Self::Gratitude => "gratitude",
            Self::Visualization => "visualization",
            Self::Reflection => "reflection",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "meditation" => Some(Self::Meditation),
            "breathing" => Some(Self::Breathing),
            "journaling" => Some(Self::Journaling),
            "gratitude" => Some(Self::Gratitude),
            "visualization" => Some(Self::Visualization),
            "reflection" => Some(Self::Reflection),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePracticeInput {
    pub practice_type: PracticeType,
    pub duration_minutes: i64,
    pub mood_before: Option<i64>,
    pub mood_after: Option<i64>,
    pub notes: Option<String>,
    /// Defaults to now.
    pub completed_at: Option<DateTime<Utc>>,
}
