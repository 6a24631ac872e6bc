use anyhow::Result;
use chrono::{NaiveDate, Utc};
use rusqlite::{OptionalExtension, Row};
use uuid::Uuid;

use super::{contains_folded, format_date, parse_date, parse_datetime, parse_uuid, Database};
use crate::models::*;

const HABIT_COLUMNS: &str = "id, user_id, name, description, frequency, target_per_week,
        category, archived, created_at, updated_at";

const LOG_COLUMNS: &str = "id, habit_id, user_id, log_date, note, created_at";

impl Database {
    // ============================================================
    // Habits
    // ============================================================

    pub fn get_habits(&self, user_id: Uuid, include_archived: bool) -> Result<Vec<Habit>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(&format!(
            "SELECT {HABIT_COLUMNS} FROM habits
             WHERE user_id = ?1 AND (?2 OR archived = 0)
             ORDER BY created_at"
        ))?;

        let habits = stmt
            .query_map((user_id.to_string(), include_archived), habit_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(habits)
    }

    pub fn get_habit(&self, user_id: Uuid, id: Uuid) -> Result<Option<Habit>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let habit = conn
            .query_row(
                &format!("SELECT {HABIT_COLUMNS} FROM habits WHERE id = ? AND user_id = ?"),
                (id.to_string(), user_id.to_string()),
                habit_from_row,
            )
            .optional()?;
        Ok(habit)
    }

    /// `target_per_week` must already be validated to 1-7.
    pub fn create_habit(&self, user_id: Uuid, input: CreateHabitInput) -> Result<Habit> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let now = Utc::now();
        let frequency = input.frequency.unwrap_or_default();
        let habit = Habit {
            id: Uuid::new_v4(),
            user_id,
            name: input.name,
            description: input.description,
            frequency,
            target_per_week: weekly_target(frequency, input.target_per_week),
            category: input.category.unwrap_or_default(),
            archived: false,
            created_at: now,
            updated_at: now,
        };

        conn.execute(
            &format!("INSERT INTO habits ({HABIT_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"),
            (
                habit.id.to_string(),
                user_id.to_string(),
                &habit.name,
                &habit.description,
                habit.frequency.as_str(),
                habit.target_per_week,
                habit.category.as_str(),
                habit.archived,
                now.to_rfc3339(),
                now.to_rfc3339(),
            ),
        )?;

        Ok(habit)
    }

    pub fn update_habit(&self, user_id: Uuid, id: Uuid, input: UpdateHabitInput) -> Result<Option<Habit>> {
        let Some(mut habit) = self.get_habit(user_id, id)? else {
            return Ok(None);
        };

        if let Some(name) = input.name {
            habit.name = name;
        }
        if let Some(description) = input.description {
            habit.description = description;
        }
        if let Some(frequency) = input.frequency {
            habit.frequency = frequency;
        }
        if let Some(category) = input.category {
            habit.category = category;
        }
        if let Some(archived) = input.archived {
            habit.archived = archived;
        }
        habit.target_per_week = weekly_target(
            habit.frequency,
            input.target_per_week.or(Some(i64::from(habit.target_per_week))),
        );
        habit.updated_at = Utc::now();

        let conn = self.conn.lock().expect("database lock poisoned");
        conn.execute(
            "UPDATE habits SET name = ?, description = ?, frequency = ?, target_per_week = ?,
                 category = ?, archived = ?, updated_at = ?
             WHERE id = ? AND user_id = ?",
            (
                &habit.name,
                &habit.description,
                habit.frequency.as_str(),
                habit.target_per_week,
                habit.category.as_str(),
                habit.archived,
                habit.updated_at.to_rfc3339(),
                id.to_string(),
                user_id.to_string(),
            ),
        )?;

        Ok(Some(habit))
    }

    pub fn delete_habit(&self, user_id: Uuid, id: Uuid) -> Result<bool> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let rows = conn.execute(
            "DELETE FROM habits WHERE id = ? AND user_id = ?",
            (id.to_string(), user_id.to_string()),
        )?;
        Ok(rows > 0)
    }

    /// Case-insensitive substring match over name and description,
    /// most recently updated first.
    pub fn search_habits(&self, user_id: Uuid, term: &str, limit: u32) -> Result<Vec<Habit>> {
        let needle = term.to_lowercase();
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(&format!(
            "SELECT {HABIT_COLUMNS} FROM habits WHERE user_id = ? ORDER BY updated_at DESC"
        ))?;

        let mut habits = Vec::new();
        for habit in stmt.query_map([user_id.to_string()], habit_from_row)? {
            let habit = habit?;
            let matched = contains_folded(&habit.name, &needle)
                || habit
                    .description
                    .as_deref()
                    .is_some_and(|d| contains_folded(d, &needle));
            if matched {
                habits.push(habit);
                if habits.len() >= limit as usize {
                    break;
                }
            }
        }

        Ok(habits)
    }

    // ============================================================
    // Habit logs
    // ============================================================

    /// Log the habit for `date` if it is not logged yet, otherwise remove the log.
    ///
    /// Returns `None` when the habit does not belong to the user.
    pub fn toggle_habit_log(
        &self,
        user_id: Uuid,
        habit_id: Uuid,
        date: NaiveDate,
        note: Option<String>,
    ) -> Result<Option<ToggleHabitResult>> {
        if self.get_habit(user_id, habit_id)?.is_none() {
            return Ok(None);
        }

        let conn = self.conn.lock().expect("database lock poisoned");
        let removed = conn.execute(
            "DELETE FROM habit_logs WHERE habit_id = ? AND log_date = ?",
            (habit_id.to_string(), format_date(date)),
        )?;

        if removed > 0 {
            return Ok(Some(ToggleHabitResult {
                habit_id,
                date,
                completed: false,
                log: None,
            }));
        }

        let log = HabitLog {
            id: Uuid::new_v4(),
            habit_id,
            user_id,
            log_date: date,
            note,
            created_at: Utc::now(),
        };
        conn.execute(
            &format!("INSERT INTO habit_logs ({LOG_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?)"),
            (
                log.id.to_string(),
                habit_id.to_string(),
                user_id.to_string(),
                format_date(date),
                &log.note,
                log.created_at.to_rfc3339(),
            ),
        )?;

        Ok(Some(ToggleHabitResult {
            habit_id,
            date,
            completed: true,
            log: Some(log),
        }))
    }

    pub fn get_habit_logs(&self, habit_id: Uuid) -> Result<Vec<HabitLog>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(&format!(
            "SELECT {LOG_COLUMNS} FROM habit_logs WHERE habit_id = ? ORDER BY log_date"
        ))?;

        let logs = stmt
            .query_map([habit_id.to_string()], log_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(logs)
    }

    /// A user's logs, oldest first. `since` limits them to that day onwards;
    /// `None` returns every log.
    pub fn get_user_habit_logs(&self, user_id: Uuid, since: Option<NaiveDate>) -> Result<Vec<HabitLog>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(&format!(
            "SELECT {LOG_COLUMNS} FROM habit_logs
             WHERE user_id = ?1 AND (?2 IS NULL OR log_date >= ?2)
             ORDER BY log_date"
        ))?;

        let logs = stmt
            .query_map((user_id.to_string(), since.map(format_date)), log_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(logs)
    }

    /// Unarchived habits with no log on `date`.
    pub fn get_pending_habits(&self, user_id: Uuid, date: NaiveDate) -> Result<Vec<Habit>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(&format!(
            "SELECT {HABIT_COLUMNS} FROM habits h
             WHERE h.user_id = ?1 AND h.archived = 0
               AND NOT EXISTS (
                   SELECT 1 FROM habit_logs l WHERE l.habit_id = h.id AND l.log_date = ?2
               )
             ORDER BY h.created_at"
        ))?;

        let habits = stmt
            .query_map((user_id.to_string(), format_date(date)), habit_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(habits)
    }
}

fn weekly_target(frequency: Frequency, requested: Option<i64>) -> u8 {
    match frequency {
        Frequency::Daily => 7,
        Frequency::Weekly => requested.unwrap_or(1).clamp(1, 7) as u8,
    }
}

fn habit_from_row(row: &Row) -> rusqlite::Result<Habit> {
    Ok(Habit {
        id: parse_uuid(row.get::<_, String>(0)?),
        user_id: parse_uuid(row.get::<_, String>(1)?),
        name: row.get(2)?,
        description: row.get(3)?,
        frequency: Frequency::from_str(&row.get::<_, String>(4)?).unwrap_or_default(),
        target_per_week: row.get(5)?,
        category: Category::from_str(&row.get::<_, String>(6)?).unwrap_or_default(),
        archived: row.get(7)?,
        created_at: parse_datetime(row.get::<_, String>(8)?),
        updated_at: parse_datetime(row.get::<_, String>(9)?),
    })
}

fn log_from_row(row: &Row) -> rusqlite::Result<HabitLog> {
    Ok(HabitLog {
        id: parse_uuid(row.get::<_, String>(0)?),
        habit_id: parse_uuid(row.get::<_, String>(1)?),
        user_id: parse_uuid(row.get::<_, String>(2)?),
        log_date: parse_date(row.get::<_, String>(3)?),
        note: row.get(4)?,
        created_at: parse_datetime(row.get::<_, String>(5)?),
    })
}
