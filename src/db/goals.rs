use anyhow::Result;
use chrono::Utc;
use rusqlite::{OptionalExtension, Row};
use uuid::Uuid;

use super::{contains_folded, format_date, parse_date, parse_datetime, parse_uuid, Database};
use crate::models::*;

const GOAL_COLUMNS: &str = "id, user_id, title, description, category, status, progress,
        target_date, created_at, updated_at";

impl Database {
    pub fn get_goals(&self, user_id: Uuid, status: Option<GoalStatus>) -> Result<Vec<Goal>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(&format!(
            "SELECT {GOAL_COLUMNS} FROM goals
             WHERE user_id = ?1 AND (?2 IS NULL OR status = ?2)
             ORDER BY created_at DESC"
        ))?;

        let goals = stmt
            .query_map(
                (user_id.to_string(), status.map(|s| s.as_str())),
                goal_from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(goals)
    }

    pub fn get_goal(&self, user_id: Uuid, id: Uuid) -> Result<Option<Goal>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let goal = conn
            .query_row(
                &format!("SELECT {GOAL_COLUMNS} FROM goals WHERE id = ? AND user_id = ?"),
                (id.to_string(), user_id.to_string()),
                goal_from_row,
            )
            .optional()?;
        Ok(goal)
    }

    pub fn create_goal(&self, user_id: Uuid, input: CreateGoalInput) -> Result<Goal> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let now = Utc::now();
        let goal = Goal {
            id: Uuid::new_v4(),
            user_id,
            title: input.title,
            description: input.description,
            category: input.category.unwrap_or_default(),
            status: GoalStatus::Active,
            progress: 0,
            target_date: input.target_date,
            created_at: now,
            updated_at: now,
        };

        conn.execute(
            &format!("INSERT INTO goals ({GOAL_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"),
            (
                goal.id.to_string(),
                user_id.to_string(),
                &goal.title,
                &goal.description,
                goal.category.as_str(),
                goal.status.as_str(),
                goal.progress,
                goal.target_date.map(format_date),
                now.to_rfc3339(),
                now.to_rfc3339(),
            ),
        )?;

        Ok(goal)
    }

    /// Apply a partial update. `progress` must already be validated to 0-100.
    pub fn update_goal(&self, user_id: Uuid, id: Uuid, input: UpdateGoalInput) -> Result<Option<Goal>> {
        let Some(mut goal) = self.get_goal(user_id, id)? else {
            return Ok(None);
        };

        if let Some(title) = input.title {
            goal.title = title;
        }
        if let Some(description) = input.description {
            goal.description = description;
        }
        if let Some(category) = input.category {
            goal.category = category;
        }
        if let Some(status) = input.status {
            goal.status = status;
        }
        let progress_changed = input.progress.is_some();
        if let Some(progress) = input.progress {
            goal.progress = progress.clamp(0, 100) as u8;
        }
        if input.target_date.is_some() {
            goal.target_date = input.target_date;
        }
        goal.normalize(progress_changed);
        goal.updated_at = Utc::now();

        let conn = self.conn.lock().expect("database lock poisoned");
        conn.execute(
            "UPDATE goals SET title = ?, description = ?, category = ?, status = ?, progress = ?,
                 target_date = ?, updated_at = ?
             WHERE id = ? AND user_id = ?",
            (
                &goal.title,
                &goal.description,
                goal.category.as_str(),
                goal.status.as_str(),
                goal.progress,
                goal.target_date.map(format_date),
                goal.updated_at.to_rfc3339(),
                id.to_string(),
                user_id.to_string(),
            ),
        )?;

        Ok(Some(goal))
    }

    pub fn delete_goal(&self, user_id: Uuid, id: Uuid) -> Result<bool> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let rows = conn.execute(
            "DELETE FROM goals WHERE id = ? AND user_id = ?",
            (id.to_string(), user_id.to_string()),
        )?;
        Ok(rows > 0)
    }

    /// Case-insensitive substring match over title and description,
    /// most recently updated first.
    pub fn search_goals(&self, user_id: Uuid, term: &str, limit: u32) -> Result<Vec<Goal>> {
        let needle = term.to_lowercase();
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(&format!(
            "SELECT {GOAL_COLUMNS} FROM goals WHERE user_id = ? ORDER BY updated_at DESC"
        ))?;

        let mut goals = Vec::new();
        for goal in stmt.query_map([user_id.to_string()], goal_from_row)? {
            let goal = goal?;
            let matched = contains_folded(&goal.title, &needle)
                || goal
                    .description
                    .as_deref()
                    .is_some_and(|d| contains_folded(d, &needle));
            if matched {
                goals.push(goal);
                if goals.len() >= limit as usize {
                    break;
                }
            }
        }

        Ok(goals)
    }
}

fn goal_from_row(row: &Row) -> rusqlite::Result<Goal> {
    Ok(Goal {
        id: parse_uuid(row.get::<_, String>(0)?),
        user_id: parse_uuid(row.get::<_, String>(1)?),
        title: row.get(2)?,
        description: row.get(3)?,
        category: Category::from_str(&row.get::<_, String>(4)?).unwrap_or_default(),
        status: GoalStatus::from_str(&row.get::<_, String>(5)?).unwrap_or(GoalStatus::Active),
        progress: row.get(6)?,
        target_date: row.get::<_, Option<String>>(7)?.map(parse_date),
        created_at: parse_datetime(row.get::<_, String>(8)?),
        updated_at: parse_datetime(row.get::<_, String>(9)?),
    })
}
