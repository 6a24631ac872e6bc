pub mod analytics;
pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod jobs;
pub mod mailer;
pub mod models;
pub mod realtime;
pub mod search;
pub mod validation;
