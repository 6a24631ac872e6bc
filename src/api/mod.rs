mod handlers;
mod middleware;

pub use handlers::pages::{
    DashboardPage, GoalDetailPage, GoalsPage, HabitsPage, NotificationsPage, PracticesPage,
    PublicPage, SettingsPage,
};
pub use middleware::{route_access, Access};

use std::sync::Arc;

use axum::{
    middleware::from_fn_with_state,
    routing::{get, post, put},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::Config;
use crate::db::Database;
use crate::mailer::{self, Mailer};
use crate::realtime::ChangeFeed;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Config,
    pub feed: ChangeFeed,
    pub mailer: Arc<dyn Mailer>,
}

impl AppState {
    pub fn new(db: Database, config: Config) -> Self {
        let mailer = mailer::from_config(&config.email);
        Self {
            db,
            config,
            feed: ChangeFeed::default(),
            mailer,
        }
    }

    pub fn with_mailer(mut self, mailer: Arc<dyn Mailer>) -> Self {
        self.mailer = mailer;
        self
    }
}

pub fn create_router_with_state(state: AppState) -> Router {
    let actions = Router::new()
        // Profile and settings
        .route("/profile", get(handlers::get_profile).put(handlers::update_profile))
        .route("/settings", get(handlers::get_settings).put(handlers::update_settings))
        // Goals
        .route("/goals", get(handlers::list_goals).post(handlers::create_goal))
        .route(
            "/goals/{id}",
            get(handlers::get_goal)
                .put(handlers::update_goal)
                .delete(handlers::delete_goal),
        )
        .route("/goals/{id}/progress", put(handlers::update_goal_progress))
        // Habits
        .route("/habits", get(handlers::list_habits).post(handlers::create_habit))
        .route(
            "/habits/{id}",
            put(handlers::update_habit).delete(handlers::delete_habit),
        )
        .route("/habits/{id}/toggle", post(handlers::toggle_habit))
        .route("/habits/{id}/logs", get(handlers::list_habit_logs))
        // Practices
        .route(
            "/practices",
            get(handlers::list_practices).post(handlers::create_practice),
        )
        .route(
            "/practices/{id}",
            axum::routing::delete(handlers::delete_practice),
        )
        // Notifications
        .route("/notifications", get(handlers::list_notifications))
        .route("/notifications/read-all", post(handlers::mark_all_notifications_read))
        .route("/notifications/{id}/read", post(handlers::mark_notification_read))
        // Search, analytics, realtime
        .route("/search", get(handlers::search))
        .route("/progress", get(handlers::get_progress))
        .route("/realtime", get(handlers::realtime::subscribe));

    let pages = Router::new()
        .route("/", get(handlers::pages::home))
        .route("/login", get(handlers::pages::login))
        .route("/register", get(handlers::pages::register))
        .route("/dashboard", get(handlers::pages::dashboard))
        .route("/goals", get(handlers::pages::goals))
        .route("/goals/{id}", get(handlers::pages::goal_detail))
        .route("/habits", get(handlers::pages::habits))
        .route("/practices", get(handlers::pages::practices))
        .route("/progress", get(handlers::pages::progress))
        .route("/settings", get(handlers::pages::settings))
        .route("/notifications", get(handlers::pages::notifications))
        .route("/search", get(handlers::pages::search));

    let auth = Router::new()
        .route("/register", post(handlers::auth::register))
        .route("/login", post(handlers::auth::login))
        .route("/logout", post(handlers::auth::logout));

    let cron = Router::new()
        .route("/daily-reminders", post(handlers::cron::daily_reminders))
        .route("/weekly-summary", post(handlers::cron::weekly_summary))
        .route_layer(from_fn_with_state(state.clone(), middleware::cron_auth));

    Router::new()
        .merge(pages)
        .nest("/auth", auth)
        .nest("/api/v1", actions)
        .nest("/api/cron", cron)
        .route("/api/health", get(handlers::health))
        .layer(from_fn_with_state(state.clone(), middleware::session_gateway))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
