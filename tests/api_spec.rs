use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use axum::http::StatusCode;
use axum_test::{TestResponse, TestServer};
use chrono::{Duration, Utc};
use growth_tracker::api::{create_router_with_state, AppState, DashboardPage, HabitsPage, PublicPage};
use growth_tracker::config::Config;
use growth_tracker::db::Database;
use growth_tracker::jobs::JobReport;
use growth_tracker::mailer::{Email, MailError, Mailer};
use growth_tracker::models::*;
use growth_tracker::realtime::{ChangeFeed, ChangeKind, Table};
use growth_tracker::search::SearchResults;
use serde_json::{json, Value};

const CRON_SECRET: &str = "test-cron-secret";

/// Records every email instead of sending it. Recipients listed in
/// `fail_for` get an error back.
#[derive(Default)]
struct RecordingMailer {
    sent: Mutex<Vec<Email>>,
    fail_for: Vec<String>,
}

impl RecordingMailer {
    fn failing_for(address: &str) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail_for: vec![address.to_string()],
        }
    }

    fn sent(&self) -> Vec<Email> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: &Email) -> Result<(), MailError> {
        if self.fail_for.contains(&email.to) {
            return Err(MailError::InvalidRecipient(email.to.clone()));
        }
        self.sent.lock().unwrap().push(email.clone());
        Ok(())
    }
}

struct TestApp {
    server: TestServer,
    db: Database,
    feed: ChangeFeed,
    mailer: Arc<RecordingMailer>,
}

fn setup_with(config: Config, mailer: RecordingMailer) -> TestApp {
    let db = Database::open_memory().expect("Failed to create database");
    db.migrate().expect("Failed to migrate");
    let mailer = Arc::new(mailer);
    let state = AppState::new(db.clone(), config).with_mailer(mailer.clone());
    let feed = state.feed.clone();
    let server = TestServer::new(create_router_with_state(state)).expect("Failed to create test server");
    TestApp {
        server,
        db,
        feed,
        mailer,
    }
}

fn setup() -> TestApp {
    setup_with(
        Config::for_testing().with_cron_secret(CRON_SECRET),
        RecordingMailer::default(),
    )
}

fn set_cookie(response: &TestResponse) -> Option<String> {
    response
        .headers()
        .get("set-cookie")
        .map(|v| v.to_str().unwrap().to_string())
}

fn location(response: &TestResponse) -> String {
    response
        .headers()
        .get("location")
        .expect("missing Location header")
        .to_str()
        .unwrap()
        .to_string()
}

/// Register a user and return the `Cookie` header value for their session.
async fn register(app: &TestApp, email: &str) -> String {
    let response = app
        .server
        .post("/auth/register")
        .json(&RegisterInput {
            email: email.to_string(),
            password: "correct horse".to_string(),
            full_name: "Test User".to_string(),
        })
        .await;
    response.assert_status(StatusCode::CREATED);

    let cookie = set_cookie(&response).expect("register should set a cookie");
    cookie.split(';').next().unwrap().to_string()
}

async fn create_goal(app: &TestApp, cookie: &str, title: &str) -> Goal {
    app.server
        .post("/api/v1/goals")
        .add_header("Cookie", cookie)
        .json(&json!({ "title": title }))
        .await
        .json::<Goal>()
}

async fn create_habit(app: &TestApp, cookie: &str, name: &str) -> Habit {
    app.server
        .post("/api/v1/habits")
        .add_header("Cookie", cookie)
        .json(&json!({ "name": name }))
        .await
        .json::<Habit>()
}

// ============================================================
// Auth gateway
// ============================================================

mod gateway {
    use super::*;

    #[tokio::test]
    async fn redirects_signed_out_visitors_to_login() {
        let app = setup();

        let response = app.server.get("/dashboard").await;

        response.assert_status(StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/login?redirect=%2Fdashboard");
    }

    #[tokio::test]
    async fn login_redirect_keeps_the_query_string() {
        let app = setup();

        let response = app.server.get("/search?q=run").await;

        response.assert_status(StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/login?redirect=%2Fsearch%3Fq%3Drun");
    }

    #[tokio::test]
    async fn nested_protected_pages_redirect_too() {
        let app = setup();

        let response = app.server.get(&format!("/goals/{}", uuid::Uuid::new_v4())).await;

        response.assert_status(StatusCode::SEE_OTHER);
        assert!(location(&response).starts_with("/login?redirect=%2Fgoals%2F"));
    }

    #[tokio::test]
    async fn rejects_signed_out_api_calls_with_401() {
        let app = setup();

        let response = app.server.get("/api/v1/goals").await;

        response.assert_status(StatusCode::UNAUTHORIZED);
        assert_eq!(response.json::<Value>()["error"], "Unauthorized");
    }

    #[tokio::test]
    async fn sends_signed_in_users_from_login_to_dashboard() {
        let app = setup();
        let cookie = register(&app, "ada@example.com").await;

        let response = app.server.get("/login").add_header("Cookie", &cookie).await;

        response.assert_status(StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/dashboard");
    }

    #[tokio::test]
    async fn public_pages_are_open() {
        let app = setup();

        let response = app.server.get("/login?redirect=%2Fhabits").await;

        response.assert_status_ok();
        let page: PublicPage = response.json();
        assert_eq!(page.page, "login");
        assert_eq!(page.redirect.as_deref(), Some("/habits"));
        app.server.get("/api/health").await.assert_status_ok();
    }

    #[tokio::test]
    async fn login_page_drops_off_site_redirects() {
        let app = setup();

        let page: PublicPage = app
            .server
            .get("/login?redirect=%2F%2Fevil.example")
            .await
            .json();

        assert!(page.redirect.is_none());
    }

    #[tokio::test]
    async fn refreshes_sessions_past_half_their_lifetime() {
        let app = setup_with(
            Config::for_testing().with_session_ttl(Duration::hours(1)),
            RecordingMailer::default(),
        );
        let user = app.db.create_user("ada@example.com", "salt$hash").unwrap();
        let session = app
            .db
            .create_auth_session(user.id, Utc::now() + Duration::minutes(10))
            .unwrap();

        let response = app
            .server
            .get("/api/v1/goals")
            .add_header("Cookie", &format!("growth_session={}", session.token))
            .await;

        response.assert_status_ok();
        let cookie = set_cookie(&response).expect("refreshed cookie");
        assert!(cookie.starts_with(&format!("growth_session={};", session.token)));
        let (stored, _) = app.db.get_auth_session(&session.token).unwrap().unwrap();
        assert!(stored.expires_at > Utc::now() + Duration::minutes(50));
    }

    #[tokio::test]
    async fn fresh_sessions_are_not_reissued() {
        let app = setup();
        let cookie = register(&app, "ada@example.com").await;

        let response = app.server.get("/api/v1/goals").add_header("Cookie", &cookie).await;

        response.assert_status_ok();
        assert!(set_cookie(&response).is_none());
    }

    #[tokio::test]
    async fn clears_unknown_session_cookies() {
        let app = setup();

        let response = app
            .server
            .get("/api/health")
            .add_header("Cookie", "growth_session=not-a-real-token")
            .await;

        response.assert_status_ok();
        assert!(set_cookie(&response).unwrap().contains("Max-Age=0"));
    }
}

// ============================================================
// Registration & login
// ============================================================

mod auth {
    use super::*;

    #[tokio::test]
    async fn registration_creates_profile_settings_and_welcome() {
        let app = setup();
        let cookie = register(&app, "Ada@Example.com").await;

        let profile: Profile = app
            .server
            .get("/api/v1/profile")
            .add_header("Cookie", &cookie)
            .await
            .json();
        assert_eq!(profile.email, "ada@example.com");
        assert_eq!(profile.full_name, "Test User");

        let settings: UserSettings = app
            .server
            .get("/api/v1/settings")
            .add_header("Cookie", &cookie)
            .await
            .json();
        assert!(settings.email_notifications);

        let notifications: Vec<Notification> = app
            .server
            .get("/api/v1/notifications")
            .add_header("Cookie", &cookie)
            .await
            .json();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].kind, NotificationKind::Welcome);
    }

    #[tokio::test]
    async fn duplicate_email_is_a_conflict() {
        let app = setup();
        register(&app, "ada@example.com").await;

        let response = app
            .server
            .post("/auth/register")
            .json(&json!({
                "email": "ADA@example.com",
                "password": "another password",
                "full_name": "Someone"
            }))
            .await;

        response.assert_status(StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn validation_errors_are_shown_to_the_user() {
        let app = setup();

        let response = app
            .server
            .post("/auth/register")
            .json(&json!({ "email": "not-an-email", "password": "long enough", "full_name": "Ada" }))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.json::<Value>()["error"], "Please enter a valid email address");
    }

    #[tokio::test]
    async fn login_sets_a_session_cookie() {
        let app = setup();
        register(&app, "ada@example.com").await;

        let response = app
            .server
            .post("/auth/login")
            .json(&LoginInput {
                email: "ada@example.com".to_string(),
                password: "correct horse".to_string(),
            })
            .await;

        response.assert_status_ok();
        let cookie = set_cookie(&response).unwrap();
        assert!(cookie.starts_with("growth_session="));
        assert!(cookie.contains("HttpOnly"));
    }

    #[tokio::test]
    async fn login_with_wrong_password_fails() {
        let app = setup();
        register(&app, "ada@example.com").await;

        let response = app
            .server
            .post("/auth/login")
            .json(&json!({ "email": "ada@example.com", "password": "wrong horse" }))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.json::<Value>()["error"], "Invalid email or password");
    }

    #[tokio::test]
    async fn logout_ends_the_session() {
        let app = setup();
        let cookie = register(&app, "ada@example.com").await;

        let response = app.server.post("/auth/logout").add_header("Cookie", &cookie).await;
        response.assert_status(StatusCode::NO_CONTENT);
        assert!(set_cookie(&response).unwrap().contains("Max-Age=0"));

        app.server
            .get("/api/v1/goals")
            .add_header("Cookie", &cookie)
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }
}

// ============================================================
// Server actions
// ============================================================

mod actions {
    use super::*;

    #[tokio::test]
    async fn creates_and_lists_goals() {
        let app = setup();
        let cookie = register(&app, "ada@example.com").await;

        let response = app
            .server
            .post("/api/v1/goals")
            .add_header("Cookie", &cookie)
            .json(&json!({ "title": "  Run a 10k  ", "category": "health" }))
            .await;
        response.assert_status(StatusCode::CREATED);
        let goal: Goal = response.json();
        assert_eq!(goal.title, "Run a 10k");
        assert_eq!(goal.category, Category::Health);

        let goals: Vec<Goal> = app
            .server
            .get("/api/v1/goals")
            .add_header("Cookie", &cookie)
            .await
            .json();
        assert_eq!(goals.len(), 1);
    }

    #[tokio::test]
    async fn rejects_goal_without_title() {
        let app = setup();
        let cookie = register(&app, "ada@example.com").await;

        let response = app
            .server
            .post("/api/v1/goals")
            .add_header("Cookie", &cookie)
            .json(&json!({ "title": "   " }))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.json::<Value>()["error"], "Title is required");
    }

    #[tokio::test]
    async fn completing_a_goal_records_an_achievement() {
        let app = setup();
        let cookie = register(&app, "ada@example.com").await;
        let goal = create_goal(&app, &cookie, "Finish the course").await;

        let response = app
            .server
            .put(&format!("/api/v1/goals/{}/progress", goal.id))
            .add_header("Cookie", &cookie)
            .json(&UpdateProgressInput { progress: 100 })
            .await;
        response.assert_status_ok();
        assert_eq!(response.json::<Goal>().status, GoalStatus::Completed);

        let notifications: Vec<Notification> = app
            .server
            .get("/api/v1/notifications")
            .add_header("Cookie", &cookie)
            .await
            .json();
        assert!(notifications
            .iter()
            .any(|n| n.kind == NotificationKind::Achievement));
    }

    #[tokio::test]
    async fn rejects_out_of_range_progress() {
        let app = setup();
        let cookie = register(&app, "ada@example.com").await;
        let goal = create_goal(&app, &cookie, "Goal").await;

        app.server
            .put(&format!("/api/v1/goals/{}/progress", goal.id))
            .add_header("Cookie", &cookie)
            .json(&json!({ "progress": 150 }))
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn users_cannot_touch_each_others_goals() {
        let app = setup();
        let owner = register(&app, "owner@example.com").await;
        let other = register(&app, "other@example.com").await;
        let goal = create_goal(&app, &owner, "Private").await;

        app.server
            .get(&format!("/api/v1/goals/{}", goal.id))
            .add_header("Cookie", &other)
            .await
            .assert_status(StatusCode::NOT_FOUND);
        app.server
            .delete(&format!("/api/v1/goals/{}", goal.id))
            .add_header("Cookie", &other)
            .await
            .assert_status(StatusCode::NOT_FOUND);
        app.server
            .delete(&format!("/api/v1/goals/{}", goal.id))
            .add_header("Cookie", &owner)
            .await
            .assert_status(StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn toggles_a_habit_for_today() {
        let app = setup();
        let cookie = register(&app, "ada@example.com").await;
        let habit = create_habit(&app, &cookie, "Meditate").await;

        let on: ToggleHabitResult = app
            .server
            .post(&format!("/api/v1/habits/{}/toggle", habit.id))
            .add_header("Cookie", &cookie)
            .await
            .json();
        assert!(on.completed);
        assert_eq!(on.date, Utc::now().date_naive());

        let page: HabitsPage = app
            .server
            .get("/habits")
            .add_header("Cookie", &cookie)
            .await
            .json();
        assert_eq!(page.completed_today, 1);
        assert_eq!(page.habits[0].current_streak, 1);

        let off: ToggleHabitResult = app
            .server
            .post(&format!("/api/v1/habits/{}/toggle", habit.id))
            .add_header("Cookie", &cookie)
            .await
            .json();
        assert!(!off.completed);
    }

    #[tokio::test]
    async fn refuses_to_log_future_days() {
        let app = setup();
        let cookie = register(&app, "ada@example.com").await;
        let habit = create_habit(&app, &cookie, "Read").await;
        let tomorrow = Utc::now().date_naive() + Duration::days(1);

        app.server
            .post(&format!("/api/v1/habits/{}/toggle", habit.id))
            .add_header("Cookie", &cookie)
            .json(&json!({ "date": tomorrow }))
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn logs_a_practice_session() {
        let app = setup();
        let cookie = register(&app, "ada@example.com").await;

        let response = app
            .server
            .post("/api/v1/practices")
            .add_header("Cookie", &cookie)
            .json(&json!({
                "practice_type": "meditation",
                "duration_minutes": 20,
                "mood_before": 4,
                "mood_after": 8
            }))
            .await;
        response.assert_status(StatusCode::CREATED);

        let report: ProgressReport = app
            .server
            .get("/api/v1/progress")
            .add_header("Cookie", &cookie)
            .await
            .json();
        assert_eq!(report.practices.total_minutes, 20);
        assert_eq!(report.practices.average_mood_change, Some(4.0));
    }

    #[tokio::test]
    async fn rejects_invalid_moods() {
        let app = setup();
        let cookie = register(&app, "ada@example.com").await;

        app.server
            .post("/api/v1/practices")
            .add_header("Cookie", &cookie)
            .json(&json!({ "practice_type": "journaling", "duration_minutes": 10, "mood_after": 0 }))
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn updates_settings() {
        let app = setup();
        let cookie = register(&app, "ada@example.com").await;

        let settings: UserSettings = app
            .server
            .put("/api/v1/settings")
            .add_header("Cookie", &cookie)
            .json(&json!({ "daily_reminder": false, "reminder_time": "07:45" }))
            .await
            .json();

        assert!(!settings.daily_reminder);
        assert_eq!(settings.reminder_time, "07:45");
    }

    #[tokio::test]
    async fn blank_profile_fields_are_cleared() {
        let app = setup();
        let cookie = register(&app, "ada@example.com").await;
        app.server
            .put("/api/v1/profile")
            .add_header("Cookie", &cookie)
            .json(&json!({ "bio": "Runner", "avatar_url": "https://example.com/a.png" }))
            .await
            .assert_status_ok();

        let profile: Profile = app
            .server
            .put("/api/v1/profile")
            .add_header("Cookie", &cookie)
            .json(&json!({ "bio": "", "avatar_url": null }))
            .await
            .json();

        assert_eq!(profile.bio, None);
        assert_eq!(profile.avatar_url, None);
        assert_eq!(profile.full_name, "Test User");
    }

    #[tokio::test]
    async fn longest_streak_counts_logs_older_than_a_year() {
        let app = setup();
        let cookie = register(&app, "ada@example.com").await;
        let habit = create_habit(&app, &cookie, "Stretch").await;
        let today = Utc::now().date_naive();
        for days_ago in [400, 401, 402] {
            app.server
                .post(&format!("/api/v1/habits/{}/toggle", habit.id))
                .add_header("Cookie", &cookie)
                .json(&json!({ "date": today - Duration::days(days_ago) }))
                .await
                .assert_status_ok();
        }

        let page: HabitsPage = app
            .server
            .get("/habits")
            .add_header("Cookie", &cookie)
            .await
            .json();

        assert_eq!(page.habits[0].longest_streak, 3);
        assert_eq!(page.habits[0].current_streak, 0);
    }

    #[tokio::test]
    async fn marks_all_notifications_read() {
        let app = setup();
        let cookie = register(&app, "ada@example.com").await;

        let body: Value = app
            .server
            .post("/api/v1/notifications/read-all")
            .add_header("Cookie", &cookie)
            .await
            .json();
        assert_eq!(body["updated"], 1);

        let dashboard: DashboardPage = app
            .server
            .get("/dashboard")
            .add_header("Cookie", &cookie)
            .await
            .json();
        assert_eq!(dashboard.unread_notifications, 0);
    }

    #[tokio::test]
    async fn mutations_are_published_on_the_change_feed() {
        let app = setup();
        let cookie = register(&app, "ada@example.com").await;
        let user = app.db.get_user_by_email("ada@example.com").unwrap().unwrap();
        let mut subscription = app.feed.subscribe(user.id, None);

        let goal = create_goal(&app, &cookie, "Watch me").await;

        let event = tokio::time::timeout(StdDuration::from_secs(1), subscription.recv())
            .await
            .expect("no change event")
            .expect("feed closed");
        assert_eq!(event.table, Table::Goals);
        assert_eq!(event.kind, ChangeKind::Insert);
        assert_eq!(event.row_id, goal.id.to_string());
    }
}

// ============================================================
// Pages & search
// ============================================================

mod pages {
    use super::*;

    #[tokio::test]
    async fn dashboard_shows_profile_and_active_goals() {
        let app = setup();
        let cookie = register(&app, "ada@example.com").await;
        create_goal(&app, &cookie, "Active goal").await;
        create_habit(&app, &cookie, "Stretch").await;

        let response = app.server.get("/dashboard").add_header("Cookie", &cookie).await;

        response.assert_status_ok();
        let page: DashboardPage = response.json();
        assert_eq!(page.profile.unwrap().email, "ada@example.com");
        assert_eq!(page.active_goals.len(), 1);
        assert_eq!(page.habits.len(), 1);
        assert_eq!(page.unread_notifications, 1);
    }

    #[tokio::test]
    async fn search_matches_goals_and_habits() {
        let app = setup();
        let cookie = register(&app, "ada@example.com").await;
        create_goal(&app, &cookie, "Read 20 books").await;
        create_habit(&app, &cookie, "Read before bed").await;
        create_habit(&app, &cookie, "Stretch").await;

        let results: SearchResults = app
            .server
            .get("/api/v1/search?q=read")
            .add_header("Cookie", &cookie)
            .await
            .json();

        assert_eq!(results.goals.len(), 1);
        assert_eq!(results.habits.len(), 1);
    }

    #[tokio::test]
    async fn short_queries_return_nothing() {
        let app = setup();
        let cookie = register(&app, "ada@example.com").await;
        create_goal(&app, &cookie, "Run").await;

        let results: SearchResults = app
            .server
            .get("/search?q=%20r%20")
            .add_header("Cookie", &cookie)
            .await
            .json();

        assert_eq!(results.query, "r");
        assert!(results.goals.is_empty());
        assert!(results.habits.is_empty());
    }

    #[tokio::test]
    async fn search_only_sees_own_rows() {
        let app = setup();
        let owner = register(&app, "owner@example.com").await;
        let other = register(&app, "other@example.com").await;
        create_goal(&app, &owner, "Secret plan").await;

        let results: SearchResults = app
            .server
            .get("/api/v1/search?q=secret")
            .add_header("Cookie", &other)
            .await
            .json();

        assert!(results.goals.is_empty());
    }
}

// ============================================================
// Cron endpoints
// ============================================================

mod cron {
    use super::*;

    fn bearer(secret: &str) -> String {
        format!("Bearer {}", secret)
    }

    #[tokio::test]
    async fn rejects_missing_token() {
        let app = setup();

        let response = app.server.post("/api/cron/daily-reminders").await;

        response.assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn rejects_wrong_token() {
        let app = setup();

        app.server
            .post("/api/cron/weekly-summary")
            .add_header("Authorization", &bearer("wrong"))
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn rejects_malformed_header() {
        let app = setup();

        app.server
            .post("/api/cron/daily-reminders")
            .add_header("Authorization", CRON_SECRET)
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn rejects_everything_without_a_configured_secret() {
        let app = setup_with(Config::for_testing(), RecordingMailer::default());

        app.server
            .post("/api/cron/daily-reminders")
            .add_header("Authorization", "Bearer ")
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn daily_reminders_email_users_with_pending_habits() {
        let app = setup();
        let busy = register(&app, "busy@example.com").await;
        create_habit(&app, &busy, "Meditate").await;
        register(&app, "idle@example.com").await;
        let opted_out = register(&app, "quiet@example.com").await;
        create_habit(&app, &opted_out, "Read").await;
        app.server
            .put("/api/v1/settings")
            .add_header("Cookie", &opted_out)
            .json(&json!({ "email_notifications": false }))
            .await
            .assert_status_ok();

        let response = app
            .server
            .post("/api/cron/daily-reminders")
            .add_header("Authorization", &bearer(CRON_SECRET))
            .await;

        response.assert_status_ok();
        let report: JobReport = response.json();
        assert_eq!(
            report,
            JobReport {
                success: true,
                sent: 1,
                errors: 0,
                skipped: 1
            }
        );
        let sent = app.mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "busy@example.com");
        assert!(sent[0].text.contains("Meditate"));
    }

    #[tokio::test]
    async fn reminder_is_recorded_as_a_notification() {
        let app = setup();
        let cookie = register(&app, "busy@example.com").await;
        create_habit(&app, &cookie, "Meditate").await;

        app.server
            .post("/api/cron/daily-reminders")
            .add_header("Authorization", &bearer(CRON_SECRET))
            .await
            .assert_status_ok();

        let notifications: Vec<Notification> = app
            .server
            .get("/api/v1/notifications")
            .add_header("Cookie", &cookie)
            .await
            .json();
        assert!(notifications
            .iter()
            .any(|n| n.kind == NotificationKind::Reminder));
    }

    #[tokio::test]
    async fn failed_sends_are_counted_and_the_loop_continues() {
        let app = setup_with(
            Config::for_testing().with_cron_secret(CRON_SECRET),
            RecordingMailer::failing_for("broken@example.com"),
        );
        register(&app, "broken@example.com").await;
        register(&app, "fine@example.com").await;

        let response = app
            .server
            .post("/api/cron/weekly-summary")
            .add_header("Authorization", &bearer(CRON_SECRET))
            .await;

        response.assert_status_ok();
        let report: JobReport = response.json();
        assert!(report.success);
        assert_eq!(report.sent, 1);
        assert_eq!(report.errors, 1);
        assert_eq!(app.mailer.sent()[0].to, "fine@example.com");
    }

    #[tokio::test]
    async fn store_failures_return_a_masked_500() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("growth.db");
        let db = Database::open(path.clone()).expect("Failed to open database");
        db.migrate().expect("Failed to migrate");
        let state = AppState::new(db, Config::for_testing().with_cron_secret(CRON_SECRET))
            .with_mailer(Arc::new(RecordingMailer::default()));
        let server = TestServer::new(create_router_with_state(state)).unwrap();

        rusqlite::Connection::open(&path)
            .unwrap()
            .execute("DROP TABLE user_settings", [])
            .unwrap();

        let response = server
            .post("/api/cron/daily-reminders")
            .add_header("Authorization", &bearer(CRON_SECRET))
            .await;

        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            response.json::<Value>(),
            json!({ "error": "Internal server error" })
        );
    }

    #[tokio::test]
    async fn weekly_summary_reports_the_week() {
        let app = setup();
        let cookie = register(&app, "ada@example.com").await;
        let habit = create_habit(&app, &cookie, "Journal").await;
        app.server
            .post(&format!("/api/v1/habits/{}/toggle", habit.id))
            .add_header("Cookie", &cookie)
            .await
            .assert_status_ok();

        app.server
            .post("/api/cron/weekly-summary")
            .add_header("Authorization", &bearer(CRON_SECRET))
            .await
            .assert_status_ok();

        let sent = app.mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject, "Your weekly growth summary");
        assert!(sent[0].text.contains("you logged 1 habits"));
        assert!(sent[0].text.contains("Best current streak: 1 days"));
    }
}
