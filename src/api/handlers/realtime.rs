use std::convert::Infallible;

use axum::{
    extract::{Query, State},
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::{self, Stream};
use serde::Deserialize;

use crate::api::AppState;
use crate::models::CurrentUser;
use crate::realtime::parse_tables;

#[derive(Debug, Deserialize)]
pub struct SubscribeQuery {
    /// Comma-separated table names. Omit for all tables.
    pub tables: Option<String>,
}

/// Stream the caller's row changes as server-sent events, one event per
/// change, named after the table.
pub async fn subscribe(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<SubscribeQuery>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let subscription = state
        .feed
        .subscribe(user.id, parse_tables(query.tables.as_deref()));
    tracing::debug!(user_id = %user.id, "Realtime subscriber connected");

    let events = stream::unfold(subscription, |mut subscription| async move {
        let change = subscription.recv().await?;
        let event = Event::default()
            .event(change.table.as_str())
            .json_data(&change)
            .unwrap_or_else(|e| {
                tracing::warn!("Failed to encode change event: {}", e);
                Event::default().comment("encoding error")
            });
        Some((Ok(event), subscription))
    });

    Sse::new(events).keep_alive(KeepAlive::default())
}
