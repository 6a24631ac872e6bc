use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, Row};
use uuid::Uuid;

use super::{parse_datetime, parse_uuid, Database, StoreError};
use crate::models::*;

impl Database {
    // ============================================================
    // Users
    // ============================================================

    pub fn create_user(&self, email: &str, password_hash: &str) -> Result<User> {
        let conn = self.conn.lock().expect("database lock poisoned");

        let taken: i32 = conn.query_row(
            "SELECT COUNT(*) FROM users WHERE email = ?",
            [email],
            |row| row.get(0),
        )?;
        if taken > 0 {
            return Err(StoreError::Conflict("An account with this email already exists".into()).into());
        }

        let id = Uuid::new_v4();
        let now = Utc::now();
        conn.execute(
            "INSERT INTO users (id, email, password_hash, created_at) VALUES (?, ?, ?, ?)",
            (id.to_string(), email, password_hash, now.to_rfc3339()),
        )?;

        Ok(User {
            id,
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            created_at: now,
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let user = conn
            .query_row(
                "SELECT id, email, password_hash, created_at FROM users WHERE email = ?",
                [email],
                |row| {
                    Ok(User {
                        id: parse_uuid(row.get::<_, String>(0)?),
                        email: row.get(1)?,
                        password_hash: row.get(2)?,
                        created_at: parse_datetime(row.get::<_, String>(3)?),
                    })
                },
            )
            .optional()?;
        Ok(user)
    }

    // ============================================================
    // Auth sessions
    // ============================================================

    pub fn create_auth_session(&self, user_id: Uuid, expires_at: DateTime<Utc>) -> Result<AuthSession> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let token = Uuid::new_v4().simple().to_string();
        let now = Utc::now();

        conn.execute(
            "INSERT INTO auth_sessions (token, user_id, created_at, expires_at) VALUES (?, ?, ?, ?)",
            (&token, user_id.to_string(), now.to_rfc3339(), expires_at.to_rfc3339()),
        )?;

        Ok(AuthSession {
            token,
            user_id,
            created_at: now,
            expires_at,
        })
    }

    /// Look up a session together with its user's email.
    pub fn get_auth_session(&self, token: &str) -> Result<Option<(AuthSession, String)>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let found = conn
            .query_row(
                "SELECT s.token, s.user_id, s.created_at, s.expires_at, u.email
                 FROM auth_sessions s JOIN users u ON u.id = s.user_id
                 WHERE s.token = ?",
                [token],
                |row| {
                    Ok((
                        AuthSession {
                            token: row.get(0)?,
                            user_id: parse_uuid(row.get::<_, String>(1)?),
                            created_at: parse_datetime(row.get::<_, String>(2)?),
                            expires_at: parse_datetime(row.get::<_, String>(3)?),
                        },
                        row.get::<_, String>(4)?,
                    ))
                },
            )
            .optional()?;
        Ok(found)
    }

    pub fn extend_auth_session(&self, token: &str, expires_at: DateTime<Utc>) -> Result<bool> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let rows = conn.execute(
            "UPDATE auth_sessions SET expires_at = ? WHERE token = ?",
            (expires_at.to_rfc3339(), token),
        )?;
        Ok(rows > 0)
    }

    pub fn delete_auth_session(&self, token: &str) -> Result<bool> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let rows = conn.execute("DELETE FROM auth_sessions WHERE token = ?", [token])?;
        Ok(rows > 0)
    }

    pub fn delete_expired_auth_sessions(&self) -> Result<usize> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let rows = conn.execute(
            "DELETE FROM auth_sessions WHERE expires_at <= ?",
            [Utc::now().to_rfc3339()],
        )?;
        Ok(rows)
    }

    // ============================================================
    // Profiles
    // ============================================================

    pub fn create_profile(&self, user_id: Uuid, email: &str, full_name: &str) -> Result<Profile> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let now = Utc::now();

        conn.execute(
            "INSERT INTO profiles (user_id, email, full_name, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?)",
            (
                user_id.to_string(),
                email,
                full_name,
                now.to_rfc3339(),
                now.to_rfc3339(),
            ),
        )?;

        Ok(Profile {
            user_id,
            email: email.to_string(),
            full_name: full_name.to_string(),
            bio: None,
            avatar_url: None,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn get_profile(&self, user_id: Uuid) -> Result<Option<Profile>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let profile = conn
            .query_row(
                "SELECT user_id, email, full_name, bio, avatar_url, created_at, updated_at
                 FROM profiles WHERE user_id = ?",
                [user_id.to_string()],
                |row| {
                    Ok(Profile {
                        user_id: parse_uuid(row.get::<_, String>(0)?),
                        email: row.get(1)?,
                        full_name: row.get(2)?,
                        bio: row.get(3)?,
                        avatar_url: row.get(4)?,
                        created_at: parse_datetime(row.get::<_, String>(5)?),
                        updated_at: parse_datetime(row.get::<_, String>(6)?),
                    })
                },
            )
            .optional()?;
        Ok(profile)
    }

    pub fn update_profile(&self, user_id: Uuid, input: UpdateProfileInput) -> Result<Option<Profile>> {
        let Some(existing) = self.get_profile(user_id)? else {
            return Ok(None);
        };

        let conn = self.conn.lock().expect("database lock poisoned");
        let now = Utc::now();
        let full_name = input.full_name.unwrap_or(existing.full_name);
        let bio = input.bio.unwrap_or(existing.bio);
        let avatar_url = input.avatar_url.unwrap_or(existing.avatar_url);

        conn.execute(
            "UPDATE profiles SET full_name = ?, bio = ?, avatar_url = ?, updated_at = ? WHERE user_id = ?",
            (
                &full_name,
                &bio,
                &avatar_url,
                now.to_rfc3339(),
                user_id.to_string(),
            ),
        )?;

        Ok(Some(Profile {
            full_name,
            bio,
            avatar_url,
            updated_at: now,
            ..existing
        }))
    }

    // ============================================================
    // Settings
    // ============================================================

    pub fn create_default_settings(&self, user_id: Uuid) -> Result<UserSettings> {
        {
            let conn = self.conn.lock().expect("database lock poisoned");
            conn.execute(
                "INSERT INTO user_settings (user_id, updated_at) VALUES (?, ?)",
                (user_id.to_string(), Utc::now().to_rfc3339()),
            )?;
        }
        self.get_settings(user_id)?
            .ok_or_else(|| StoreError::NotFound("Settings").into())
    }

    pub fn get_settings(&self, user_id: Uuid) -> Result<Option<UserSettings>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let settings = conn
            .query_row(
                &format!("{SETTINGS_SELECT} WHERE user_id = ?"),
                [user_id.to_string()],
                settings_from_row,
            )
            .optional()?;
        Ok(settings)
    }

    pub fn update_settings(&self, user_id: Uuid, input: UpdateSettingsInput) -> Result<Option<UserSettings>> {
        let Some(existing) = self.get_settings(user_id)? else {
            return Ok(None);
        };

        let conn = self.conn.lock().expect("database lock poisoned");
        let updated = UserSettings {
            user_id,
            email_notifications: input.email_notifications.unwrap_or(existing.email_notifications),
            daily_reminder: input.daily_reminder.unwrap_or(existing.daily_reminder),
            weekly_summary: input.weekly_summary.unwrap_or(existing.weekly_summary),
            reminder_time: input.reminder_time.unwrap_or(existing.reminder_time),
            timezone: input.timezone.unwrap_or(existing.timezone),
            theme: input.theme.unwrap_or(existing.theme),
            updated_at: Utc::now(),
        };

        conn.execute(
            "UPDATE user_settings
             SET email_notifications = ?, daily_reminder = ?, weekly_summary = ?,
                 reminder_time = ?, timezone = ?, theme = ?, updated_at = ?
             WHERE user_id = ?",
            (
                updated.email_notifications,
                updated.daily_reminder,
                updated.weekly_summary,
                &updated.reminder_time,
                &updated.timezone,
                updated.theme.as_str(),
                updated.updated_at.to_rfc3339(),
                user_id.to_string(),
            ),
        )?;

        Ok(Some(updated))
    }

    /// Profiles of users who opted into a given email.
    pub fn get_email_recipients(&self, kind: EmailKind) -> Result<Vec<Profile>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let flag = match kind {
            EmailKind::DailyReminder => "daily_reminder",
            EmailKind::WeeklySummary => "weekly_summary",
        };
        let mut stmt = conn.prepare(&format!(
            "SELECT p.user_id, p.email, p.full_name, p.bio, p.avatar_url, p.created_at, p.updated_at
             FROM profiles p JOIN user_settings s ON s.user_id = p.user_id
             WHERE s.email_notifications = 1 AND s.{flag} = 1
             ORDER BY p.created_at"
        ))?;

        let profiles = stmt
            .query_map([], |row| {
                Ok(Profile {
                    user_id: parse_uuid(row.get::<_, String>(0)?),
                    email: row.get(1)?,
                    full_name: row.get(2)?,
                    bio: row.get(3)?,
                    avatar_url: row.get(4)?,
                    created_at: parse_datetime(row.get::<_, String>(5)?),
                    updated_at: parse_datetime(row.get::<_, String>(6)?),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(profiles)
    }

    // ============================================================
    // Notifications
    // ============================================================

    pub fn create_notification(&self, user_id: Uuid, input: CreateNotificationInput) -> Result<Notification> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let id = Uuid::new_v4();
        let now = Utc::now();

        conn.execute(
            "INSERT INTO notifications (id, user_id, title, message, kind, read, created_at)
             VALUES (?, ?, ?, ?, ?, 0, ?)",
            (
                id.to_string(),
                user_id.to_string(),
                &input.title,
                &input.message,
                input.kind.as_str(),
                now.to_rfc3339(),
            ),
        )?;

        Ok(Notification {
            id,
            user_id,
            title: input.title,
            message: input.message,
            kind: input.kind,
            read: false,
            created_at: now,
        })
    }

    pub fn get_notifications(&self, user_id: Uuid, limit: Option<u32>) -> Result<Vec<Notification>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT id, user_id, title, message, kind, read, created_at
             FROM notifications WHERE user_id = ?
             ORDER BY created_at DESC, rowid DESC LIMIT ?",
        )?;

        let limit = limit.map(i64::from).unwrap_or(-1);
        let notifications = stmt
            .query_map((user_id.to_string(), limit), notification_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(notifications)
    }

    pub fn count_unread_notifications(&self, user_id: Uuid) -> Result<u32> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let count: u32 = conn.query_row(
            "SELECT COUNT(*) FROM notifications WHERE user_id = ? AND read = 0",
            [user_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    pub fn mark_notification_read(&self, user_id: Uuid, id: Uuid) -> Result<Option<Notification>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let rows = conn.execute(
            "UPDATE notifications SET read = 1 WHERE id = ? AND user_id = ?",
            (id.to_string(), user_id.to_string()),
        )?;
        if rows == 0 {
            return Ok(None);
        }

        let notification = conn.query_row(
            "SELECT id, user_id, title, message, kind, read, created_at
             FROM notifications WHERE id = ?",
            [id.to_string()],
            notification_from_row,
        )?;
        Ok(Some(notification))
    }

    pub fn mark_all_notifications_read(&self, user_id: Uuid) -> Result<usize> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let rows = conn.execute(
            "UPDATE notifications SET read = 1 WHERE user_id = ? AND read = 0",
            [user_id.to_string()],
        )?;
        Ok(rows)
    }
}

/// Which opt-in flag a cron email depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailKind {
    DailyReminder,
    WeeklySummary,
}

const SETTINGS_SELECT: &str = "SELECT user_id, email_notifications, daily_reminder, weekly_summary,
        reminder_time, timezone, theme, updated_at FROM user_settings";

fn settings_from_row(row: &Row) -> rusqlite::Result<UserSettings> {
    Ok(UserSettings {
        user_id: parse_uuid(row.get::<_, String>(0)?),
        email_notifications: row.get(1)?,
        daily_reminder: row.get(2)?,
        weekly_summary: row.get(3)?,
        reminder_time: row.get(4)?,
        timezone: row.get(5)?,
        theme: Theme::from_str(&row.get::<_, String>(6)?).unwrap_or_default(),
        updated_at: parse_datetime(row.get::<_, String>(7)?),
    })
}

fn notification_from_row(row: &Row) -> rusqlite::Result<Notification> {
    Ok(Notification {
        id: parse_uuid(row.get::<_, String>(0)?),
        user_id: parse_uuid(row.get::<_, String>(1)?),
        title: row.get(2)?,
        message: row.get(3)?,
        kind: NotificationKind::from_str(&row.get::<_, String>(4)?)
            .unwrap_or(NotificationKind::System),
        read: row.get(5)?,
        created_at: parse_datetime(row.get::<_, String>(6)?),
    })
}
