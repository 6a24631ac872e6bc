//! In-process change feed.
//!
//! Actions publish a [`ChangeEvent`] after every successful mutation; clients
//! subscribe (over SSE) to the events for their own rows, optionally narrowed
//! to a set of tables. Delivery order is broadcast order. Slow subscribers
//! that fall behind skip the events they missed.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Profiles,
    UserSettings,
    Notifications,
    Goals,
    Habits,
    HabitLogs,
    PracticeSessions,
}

impl Table {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Profiles => "profiles",
            Self::UserSettings => "user_settings",
            Self::Notifications => "notifications",
            Self::Goals => "goals",
            Self::Habits => "habits",
            Self::HabitLogs => "habit_logs",
            Self::PracticeSessions => "practice_sessions",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "profiles" => Some(Self::Profiles),
            "user_settings" => Some(Self::UserSettings),
            "notifications" => Some(Self::Notifications),
            "goals" => Some(Self::Goals),
            "habits" => Some(Self::Habits),
            "habit_logs" => Some(Self::HabitLogs),
            "practice_sessions" => Some(Self::PracticeSessions),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// A row-level change. `record` is the new row, or `null` for deletes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub table: Table,
    pub kind: ChangeKind,
    pub user_id: Uuid,
    pub row_id: String,
    pub record: serde_json::Value,
}

#[derive(Clone, Debug)]
pub struct ChangeFeed {
    sender: broadcast::Sender<ChangeEvent>,
}

impl ChangeFeed {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event. Having no subscribers is not an error.
    pub fn publish(&self, event: ChangeEvent) {
        let delivered = self.sender.send(event).unwrap_or(0);
        tracing::trace!("Change event delivered to {} subscribers", delivered);
    }

    /// Serialize `record` and publish it. Serialization failures are logged and dropped.
    pub fn notify<T: Serialize>(
        &self,
        table: Table,
        kind: ChangeKind,
        user_id: Uuid,
        row_id: impl ToString,
        record: Option<&T>,
    ) {
        let record = match record.map(serde_json::to_value).transpose() {
            Ok(value) => value.unwrap_or(serde_json::Value::Null),
            Err(e) => {
                tracing::warn!("Failed to serialize {} change: {}", table.as_str(), e);
                return;
            }
        };
        self.publish(ChangeEvent {
            table,
            kind,
            user_id,
            row_id: row_id.to_string(),
            record,
        });
    }

    pub fn subscribe(&self, user_id: Uuid, tables: Option<HashSet<Table>>) -> Subscription {
        Subscription {
            receiver: self.sender.subscribe(),
            user_id,
            tables,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// A filtered view of the feed for one user.
pub struct Subscription {
    receiver: broadcast::Receiver<ChangeEvent>,
    user_id: Uuid,
    tables: Option<HashSet<Table>>,
}

impl Subscription {
    pub fn matches(&self, event: &ChangeEvent) -> bool {
        event.user_id == self.user_id
            && self
                .tables
                .as_ref()
                .map_or(true, |tables| tables.contains(&event.table))
    }

    /// Wait for the next matching event. Returns `None` once the feed is closed.
    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if self.matches(&event) => return Some(event),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(user_id = %self.user_id, "Realtime subscriber lagged, skipped {} events", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

/// Parse a comma-separated table list. Unknown names are ignored; an empty
/// result means "all tables".
pub fn parse_tables(list: Option<&str>) -> Option<HashSet<Table>> {
    let tables: HashSet<Table> = list?
        .split(',')
        .filter_map(|name| Table::from_str(name.trim()))
        .collect();
    (!tables.is_empty()).then_some(tables)
}
