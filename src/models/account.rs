use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A registered account. The password hash never leaves the store layer.
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// A login session backing the session cookie.
///
/// Sessions slide: once less than half of the lifetime remains, a request
/// extends `expires_at` to a full lifetime again.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub token: String,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Public details for a user, created alongside the account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: Uuid,
    pub email: String,
    pub full_name: String,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for updating a profile. All fields are optional for partial updates.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateProfileInput {
    pub full_name: Option<String>,
    /// `null` or blank clears the bio.
    #[serde(default, deserialize_with = "super::double_option", skip_serializing_if = "Option::is_none")]
    pub bio: Option<Option<String>>,
    #[serde(default, deserialize_with = "super::double_option", skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<Option<String>>,
}

/// Colour scheme preference.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Theme {
    Light,
    Dark,
    #[default]
    System,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
            Self::System => "system",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "light" => Some(Self::Light),
            "dark" => Some(Self::Dark),
            "system" => Some(Self::System),
            _ => None,
        }
    }
}

/// Per-user preferences. The notification flags decide who the cron jobs email.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSettings {
    pub user_id: Uuid,
    /// Master switch for all email.
    pub email_notifications: bool,
    pub daily_reminder: bool,
    pub weekly_summary: bool,
    /// Preferred reminder time as `HH:MM`.
    pub reminder_time: String,
    pub timezone: String,
    pub theme: Theme,
    pub updated_at: DateTime<Utc>,
}

/// Input for updating settings. All fields are optional for partial updates.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateSettingsInput {
    pub email_notifications: Option<bool>,
    pub daily_reminder: Option<bool>,
    pub weekly_summary: Option<bool>,
    pub reminder_time: Option<String>,
    pub timezone: Option<String>,
    pub theme: Option<Theme>,
}

/// Registration form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterInput {
    pub email: String,
    pub password: String,
    pub full_name: String,
}

/// Login form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

/// The authenticated user attached to a request by the auth gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: Uuid,
    pub email: String,
}
