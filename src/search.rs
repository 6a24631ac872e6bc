//! Search across a user's goals and habits.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::Database;
use crate::models::{Goal, Habit};

/// Queries shorter than this (after trimming) return nothing.
pub const MIN_QUERY_LEN: usize = 2;

/// Cap per result kind.
pub const MAX_RESULTS: u32 = 10;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchResults {
    pub query: String,
    pub goals: Vec<Goal>,
    pub habits: Vec<Habit>,
}

pub fn search(db: &Database, user_id: Uuid, query: &str) -> anyhow::Result<SearchResults> {
    let query = query.trim();
    if query.chars().count() < MIN_QUERY_LEN {
        return Ok(SearchResults {
            query: query.to_string(),
            ..SearchResults::default()
        });
    }

    Ok(SearchResults {
        query: query.to_string(),
        goals: db.search_goals(user_id, query, MAX_RESULTS)?,
        habits: db.search_habits(user_id, query, MAX_RESULTS)?,
    })
}
