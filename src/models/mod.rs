//! Domain models for the growth tracker.
//!
//! # Core Concepts
//!
//! ## Account
//!
//! - [`User`]: Credentials row created at registration.
//! - [`Profile`]: Public-facing details for a user (one per user).
//! - [`UserSettings`]: Notification and display preferences (one per user).
//! - [`Notification`]: In-app messages, including the copy of every email sent.
//!
//! ## Tracking
//!
//! - [`Goal`]: Something the user is working towards, with 0-100 progress.
//! - [`Habit`]: A recurring behaviour, checked off per day through [`HabitLog`]s.
//! - [`PracticeSession`]: A completed guided practice (meditation, journaling, ...).
//!
//! ## Derived
//!
//! - [`ProgressReport`]: Analytics computed from the tracking rows.

mod account;
mod analytics;
mod goal;
mod habit;
mod notification;
mod practice;

pub use account::*;
pub use analytics::*;
pub use goal::*;
pub use habit::*;
pub use notification::*;
pub use practice::*;

use serde::{Deserialize, Deserializer};

/// Deserialize a field that distinguishes "absent" from `null`.
///
/// Use with `#[serde(default, deserialize_with = "double_option")]`: a missing
/// field stays `None` (keep the stored value), `null` becomes `Some(None)`
/// (clear it).
pub fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
