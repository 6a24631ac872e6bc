//! Outbound email.
//!
//! The cron jobs talk to a [`Mailer`]. In production that is [`HttpMailer`],
//! which posts JSON to an HTTP email provider; without provider credentials
//! [`LogMailer`] just logs what would have been sent.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use thiserror::Error;

use crate::config::EmailConfig;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Email provider rejected the API key")]
    Unauthorized,

    #[error("Email provider error ({status}): {body}")]
    Provider { status: StatusCode, body: String },

    #[error("Invalid recipient: {0}")]
    InvalidRecipient(String),
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub html: String,
    pub text: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &Email) -> Result<(), MailError>;
}

/// Sends mail through a JSON HTTP API (`POST {api_url}` with a bearer key).
#[derive(Debug, Clone)]
pub struct HttpMailer {
    api_url: String,
    api_key: String,
    from: String,
    client: Client,
}

#[derive(Serialize)]
struct SendRequest<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
    text: &'a str,
}

impl HttpMailer {
    pub fn new(api_url: impl Into<String>, api_key: impl Into<String>, from: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            api_key: api_key.into(),
            from: from.into(),
            client: Client::new(),
        }
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, email: &Email) -> Result<(), MailError> {
        if !email.to.contains('@') {
            return Err(MailError::InvalidRecipient(email.to.clone()));
        }

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&SendRequest {
                from: &self.from,
                to: [&email.to],
                subject: &email.subject,
                html: &email.html,
                text: &email.text,
            })
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(MailError::Unauthorized),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(MailError::Provider { status, body })
            }
        }
    }
}

/// Logs emails instead of sending them.
#[derive(Debug, Clone, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: &Email) -> Result<(), MailError> {
        tracing::info!(to = %email.to, subject = %email.subject, "Email provider not configured, skipping send");
        Ok(())
    }
}

/// Pick the mailer for a config: HTTP when both URL and key are set.
pub fn from_config(config: &EmailConfig) -> Arc<dyn Mailer> {
    match (&config.api_url, &config.api_key) {
        (Some(url), Some(key)) => Arc::new(HttpMailer::new(url, key, &config.from)),
        _ => {
            tracing::warn!("EMAIL_API_URL/EMAIL_API_KEY not set, emails will only be logged");
            Arc::new(LogMailer)
        }
    }
}
