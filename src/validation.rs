//! Form validation for server actions.
//!
//! Each validator returns the first problem as a message that can be shown
//! to the user as-is, and normalizes the input (trimming, empty-to-`None`).

use crate::models::*;

pub const MAX_TITLE_LEN: usize = 120;
pub const MAX_DESCRIPTION_LEN: usize = 2000;
pub const MIN_PASSWORD_LEN: usize = 8;
/// bcrypt only reads the first 72 bytes of a password.
pub const MAX_PASSWORD_BYTES: usize = 72;
pub const MAX_PRACTICE_MINUTES: i64 = 480;

pub type ValidationResult<T> = Result<T, String>;

fn required(value: &str, field: &str, max: usize) -> ValidationResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(format!("{field} is required"));
    }
    if trimmed.chars().count() > max {
        return Err(format!("{field} must be at most {max} characters"));
    }
    Ok(trimmed.to_string())
}

fn optional_text(value: Option<String>, field: &str, max: usize) -> ValidationResult<Option<String>> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if v.is_empty() => Ok(None),
        Some(v) if v.chars().count() > max => {
            Err(format!("{field} must be at most {max} characters"))
        }
        other => Ok(other),
    }
}

/// Like [`optional_text`] for fields that can be cleared: blank clears.
fn clearable_text(
    value: Option<Option<String>>,
    field: &str,
    max: usize,
) -> ValidationResult<Option<Option<String>>> {
    match value {
        None => Ok(None),
        Some(inner) => optional_text(inner, field, max).map(Some),
    }
}

fn mood(value: Option<i64>, field: &str) -> ValidationResult<Option<i64>> {
    match value {
        Some(m) if !(1..=10).contains(&m) => Err(format!("{field} must be between 1 and 10")),
        other => Ok(other),
    }
}

fn progress(value: i64) -> ValidationResult<i64> {
    if (0..=100).contains(&value) {
        Ok(value)
    } else {
        Err("Progress must be between 0 and 100".to_string())
    }
}

fn weekly_target(value: Option<i64>) -> ValidationResult<Option<i64>> {
    match value {
        Some(t) if !(1..=7).contains(&t) => {
            Err("Target per week must be between 1 and 7".to_string())
        }
        other => Ok(other),
    }
}

pub fn email(value: &str) -> ValidationResult<String> {
    let email = value.trim().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.contains(char::is_whitespace)
                && !domain.contains('@')
        }
        None => false,
    };
    if valid {
        Ok(email)
    } else {
        Err("Please enter a valid email address".to_string())
    }
}

pub fn register(input: RegisterInput) -> ValidationResult<RegisterInput> {
    let email = email(&input.email)?;
    if input.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        ));
    }
    if input.password.len() > MAX_PASSWORD_BYTES {
        return Err(format!(
            "Password must be at most {MAX_PASSWORD_BYTES} bytes"
        ));
    }
    let full_name = required(&input.full_name, "Full name", MAX_TITLE_LEN)?;
    Ok(RegisterInput {
        email,
        password: input.password,
        full_name,
    })
}

pub fn login(input: LoginInput) -> ValidationResult<LoginInput> {
    let email = email(&input.email)?;
    if input.password.is_empty() {
        return Err("Password is required".to_string());
    }
    Ok(LoginInput {
        email,
        password: input.password,
    })
}

pub fn create_goal(input: CreateGoalInput) -> ValidationResult<CreateGoalInput> {
    Ok(CreateGoalInput {
        title: required(&input.title, "Title", MAX_TITLE_LEN)?,
        description: optional_text(input.description, "Description", MAX_DESCRIPTION_LEN)?,
        ..input
    })
}

pub fn update_goal(input: UpdateGoalInput) -> ValidationResult<UpdateGoalInput> {
    let title = match input.title {
        Some(ref t) => Some(required(t, "Title", MAX_TITLE_LEN)?),
        None => None,
    };
    let progress = input.progress.map(progress).transpose()?;
    Ok(UpdateGoalInput {
        title,
        description: clearable_text(input.description, "Description", MAX_DESCRIPTION_LEN)?,
        progress,
        ..input
    })
}

pub fn update_progress(input: UpdateProgressInput) -> ValidationResult<UpdateProgressInput> {
    Ok(UpdateProgressInput {
        progress: progress(input.progress)?,
    })
}

pub fn create_habit(input: CreateHabitInput) -> ValidationResult<CreateHabitInput> {
    Ok(CreateHabitInput {
        name: required(&input.name, "Name", MAX_TITLE_LEN)?,
        description: optional_text(input.description, "Description", MAX_DESCRIPTION_LEN)?,
        target_per_week: weekly_target(input.target_per_week)?,
        ..input
    })
}

pub fn update_habit(input: UpdateHabitInput) -> ValidationResult<UpdateHabitInput> {
    let name = match input.name {
        Some(ref n) => Some(required(n, "Name", MAX_TITLE_LEN)?),
        None => None,
    };
    Ok(UpdateHabitInput {
        name,
        description: clearable_text(input.description, "Description", MAX_DESCRIPTION_LEN)?,
        target_per_week: weekly_target(input.target_per_week)?,
        ..input
    })
}

pub fn create_practice(input: CreatePracticeInput) -> ValidationResult<CreatePracticeInput> {
    if !(1..=MAX_PRACTICE_MINUTES).contains(&input.duration_minutes) {
        return Err(format!(
            "Duration must be between 1 and {MAX_PRACTICE_MINUTES} minutes"
        ));
    }
    Ok(CreatePracticeInput {
        mood_before: mood(input.mood_before, "Mood before")?,
        mood_after: mood(input.mood_after, "Mood after")?,
        notes: optional_text(input.notes, "Notes", MAX_DESCRIPTION_LEN)?,
        ..input
    })
}

pub fn update_profile(input: UpdateProfileInput) -> ValidationResult<UpdateProfileInput> {
    let full_name = match input.full_name {
        Some(ref n) => Some(required(n, "Full name", MAX_TITLE_LEN)?),
        None => None,
    };
    let avatar_url = clearable_text(input.avatar_url, "Avatar URL", MAX_DESCRIPTION_LEN)?;
    if let Some(Some(url)) = &avatar_url {
        if !(url.starts_with("https://") || url.starts_with("http://")) {
            return Err("Avatar URL must start with http:// or https://".to_string());
        }
    }
    Ok(UpdateProfileInput {
        full_name,
        bio: clearable_text(input.bio, "Bio", MAX_DESCRIPTION_LEN)?,
        avatar_url,
    })
}

pub fn update_settings(input: UpdateSettingsInput) -> ValidationResult<UpdateSettingsInput> {
    if let Some(time) = &input.reminder_time {
        if chrono::NaiveTime::parse_from_str(time, "%H:%M").is_err() || time.len() != 5 {
            return Err("Reminder time must be in HH:MM format".to_string());
        }
    }
    let timezone = match input.timezone {
        Some(ref tz) => Some(required(tz, "Timezone", 64)?),
        None => None,
    };
    Ok(UpdateSettingsInput { timezone, ..input })
}
