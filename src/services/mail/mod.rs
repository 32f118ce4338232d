//! Outbound transactional email.
//!
//! Sending is a best-effort side effect: every failure comes back as a
//! [`SideEffectError`] for the caller to log, never as a request error.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::audit::SideEffectError;
use crate::config::MailConfig;

pub mod templates;

pub use templates::{certificate_status_email, requirements_for, CertificateNotice};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub html: String,
    pub text: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), SideEffectError>;
}

/// Provider client: `POST {api_url}` with a bearer key and a JSON message.
pub struct HttpMailer {
    client: Client,
    api_url: String,
    api_key: String,
    from: String,
}

impl HttpMailer {
    pub fn new(config: &MailConfig, api_key: &str) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(Duration::from_secs(15)).build()?;
        Ok(Self {
            client,
            api_url: config.api_url.clone(),
            api_key: api_key.to_string(),
            from: format!("{} <{}>", config.from_name, config.from_address),
        })
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), SideEffectError> {
        let resp = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&json!({
                "from": self.from,
                "to": [email.to],
                "subject": email.subject,
                "html": email.html,
                "text": email.text,
            }))
            .send()
            .await
            .map_err(|e| SideEffectError::Delivery(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(SideEffectError::Delivery(format!("{} {}", status, body)));
        }

        tracing::info!("Sent email '{}' to {}", email.subject, email.to);
        Ok(())
    }
}

/// Used when no provider key is configured: logs the message and reports it as skipped.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), SideEffectError> {
        tracing::info!("Email disabled, not sending '{}' to {}", email.subject, email.to);
        Err(SideEffectError::Skipped("no mail provider configured".to_string()))
    }
}

/// Captures messages instead of sending them.
#[derive(Default)]
pub struct MemoryMailer {
    sent: Mutex<Vec<OutgoingEmail>>,
    fail: bool,
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self { sent: Mutex::new(vec![]), fail: true }
    }

    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Mailer for MemoryMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), SideEffectError> {
        if self.fail {
            return Err(SideEffectError::Delivery("provider rejected message".to_string()));
        }
        self.sent
            .lock()
            .map_err(|_| SideEffectError::Delivery("mailer poisoned".to_string()))?
            .push(email.clone());
        Ok(())
    }
}

/// Provider-backed mailer when a key is configured, otherwise [`LogMailer`].
pub fn build_mailer(config: &MailConfig) -> Arc<dyn Mailer> {
    match config.api_key.as_deref() {
        Some(key) => match HttpMailer::new(config, key) {
            Ok(mailer) => Arc::new(mailer),
            Err(e) => {
                tracing::warn!("Mail client unavailable, falling back to log only: {}", e);
                Arc::new(LogMailer)
            }
        },
        None => {
            tracing::info!("MAIL_API_KEY not set; outbound email is log only");
            Arc::new(LogMailer)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn email() -> OutgoingEmail {
        OutgoingEmail {
            to: "juan@example.com".to_string(),
            subject: "Hello".to_string(),
            html: "<p>Hi</p>".to_string(),
            text: "Hi".to_string(),
        }
    }

    #[tokio::test]
    async fn log_mailer_reports_skip() {
        let outcome = LogMailer.send(&email()).await;
        assert!(matches!(outcome, Err(SideEffectError::Skipped(_))));
    }

    #[tokio::test]
    async fn memory_mailer_captures() {
        let mailer = MemoryMailer::new();
        mailer.send(&email()).await.unwrap();
        assert_eq!(mailer.sent(), vec![email()]);
        assert!(MemoryMailer::failing().send(&email()).await.is_err());
    }

    #[test]
    fn no_key_builds_log_mailer() {
        let config = crate::config::AppConfig::development().mail;
        // Nothing observable beyond construction succeeding without a key.
        let _mailer = build_mailer(&config);
    }
}
