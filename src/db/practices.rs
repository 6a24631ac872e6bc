use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::Row;
use uuid::Uuid;

use super::{parse_datetime, parse_uuid, Database};
use crate::models::*;

const PRACTICE_COLUMNS: &str = "id, user_id, practice_type, duration_minutes, mood_before,
        mood_after, notes, completed_at";

impl Database {
    /// Duration and moods must already be validated.
    pub fn create_practice_session(&self, user_id: Uuid, input: CreatePracticeInput) -> Result<PracticeSession> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let session = PracticeSession {
            id: Uuid::new_v4(),
            user_id,
            practice_type: input.practice_type,
            duration_minutes: input.duration_minutes.max(1) as u32,
            mood_before: input.mood_before.map(|m| m.clamp(1, 10) as u8),
            mood_after: input.mood_after.map(|m| m.clamp(1, 10) as u8),
            notes: input.notes,
            completed_at: input.completed_at.unwrap_or_else(Utc::now),
        };

        conn.execute(
            &format!("INSERT INTO practice_sessions ({PRACTICE_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?)"),
            (
                session.id.to_string(),
                user_id.to_string(),
                session.practice_type.as_str(),
                session.duration_minutes,
                session.mood_before,
                session.mood_after,
                &session.notes,
                session.completed_at.to_rfc3339(),
            ),
        )?;

        Ok(session)
    }

    /// Most recent sessions first.
    pub fn get_practice_sessions(&self, user_id: Uuid, limit: Option<u32>) -> Result<Vec<PracticeSession>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(&format!(
            "SELECT {PRACTICE_COLUMNS} FROM practice_sessions
             WHERE user_id = ? ORDER BY completed_at DESC LIMIT ?"
        ))?;

        let limit = limit.map(i64::from).unwrap_or(-1);
        let sessions = stmt
            .query_map((user_id.to_string(), limit), practice_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(sessions)
    }

    pub fn get_practice_sessions_since(&self, user_id: Uuid, since: DateTime<Utc>) -> Result<Vec<PracticeSession>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(&format!(
            "SELECT {PRACTICE_COLUMNS} FROM practice_sessions
             WHERE user_id = ? AND completed_at >= ? ORDER BY completed_at"
        ))?;

        let sessions = stmt
            .query_map((user_id.to_string(), since.to_rfc3339()), practice_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(sessions)
    }

    pub fn delete_practice_session(&self, user_id: Uuid, id: Uuid) -> Result<bool> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let rows = conn.execute(
            "DELETE FROM practice_sessions WHERE id = ? AND user_id = ?",
            (id.to_string(), user_id.to_string()),
        )?;
        Ok(rows > 0)
    }
}

fn practice_from_row(row: &Row) -> rusqlite::Result<PracticeSession> {
    Ok(PracticeSession {
        id: parse_uuid(row.get::<_, String>(0)?),
        user_id: parse_uuid(row.get::<_, String>(1)?),
        practice_type: PracticeType::from_str(&row.get::<_, String>(2)?)
            .unwrap_or(PracticeType::Reflection),
        duration_minutes: row.get(3)?,
        mood_before: row.get(4)?,
        mood_after: row.get(5)?,
        notes: row.get(6)?,
        completed_at: parse_datetime(row.get::<_, String>(7)?),
    })
}
