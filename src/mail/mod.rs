//! Mail dispatch.
//!
//! The orchestrator sends the one-time code through the `Mailer` seam.
//! `HttpMailer` talks to an HTTP mail API (Mailgun-style message endpoint,
//! basic auth, form body). Dispatch failures propagate to the caller; this
//! service does not retry.

use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info};

#[derive(Debug, Clone)]
pub struct MailConfig {
    /// Message endpoint of the mail API
    pub api_url: String,
    /// Basic-auth username
    pub api_user: String,
    /// Basic-auth secret
    pub api_key: String,
    /// Sender address for all outgoing mail
    pub from: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

#[derive(Debug, Serialize)]
struct MessageRequest<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: &'a str,
}

#[derive(Error, Debug)]
pub enum MailError {
    #[error("mail request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("mail API rejected message with status {status}: {body}")]
    Rejected {
        status: reqwest::StatusCode,
        body: String,
    },
}

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError>;
}

#[derive(Debug)]
pub struct HttpMailer {
    config: MailConfig,
    client: Client,
}

impl HttpMailer {
    pub fn new(config: MailConfig) -> Result<Self, MailError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { config, client })
    }
}

#[async_trait::async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError> {
        let request = MessageRequest {
            from: &self.config.from,
            to,
            subject,
            text: body,
        };

        let response = self
            .client
            .post(&self.config.api_url)
            .basic_auth(&self.config.api_user, Some(&self.config.api_key))
            .form(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("Failed to send mail to {}: {} {}", to, status, body);
            return Err(MailError::Rejected { status, body });
        }

        info!("Dispatched mail to {}: {}", to, subject);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mailer_for(server: &mockito::ServerGuard) -> HttpMailer {
        HttpMailer::new(MailConfig {
            api_url: format!("{}/messages", server.url()),
            api_user: "api".to_string(),
            api_key: "test_key".to_string(),
            from: "no-reply@example.com".to_string(),
            timeout_secs: 5,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn send_posts_message_to_api() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/messages")
            .with_status(200)
            .with_body(r#"{"id":"<1@example.com>","message":"Queued"}"#)
            .create_async()
            .await;

        let mailer = mailer_for(&server);
        mailer
            .send("ann@x.com", "Signup Verification", "Your one time password is 4821.")
            .await
            .unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn rejected_status_surfaces_as_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/messages")
            .with_status(401)
            .with_body("unauthorized")
            .create_async()
            .await;

        let mailer = mailer_for(&server);
        let err = mailer
            .send("ann@x.com", "Signup Verification", "body")
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            MailError::Rejected { status, .. } if status == reqwest::StatusCode::UNAUTHORIZED
        ));
    }
}
