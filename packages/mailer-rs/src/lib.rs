// Minimal client for a JSON-over-HTTP transactional email API.

pub mod models;

use reqwest::Client;

pub use crate::models::{Attachment, EmailMessage};
use crate::models::{SendRequest, Sender};

#[derive(Debug, Clone)]
pub struct MailerOptions {
    pub api_url: String,
    pub api_key: String,
    pub sender_name: String,
    pub sender_address: String,
}

#[derive(Debug, thiserror::Error)]
pub enum MailerError {
    #[error("email has no recipients")]
    MissingRecipients,
    #[error("request to mail API failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("mail API returned {status}: {body}")]
    Rejected { status: u16, body: String },
}

#[derive(Debug, Clone)]
pub struct MailerService {
    options: MailerOptions,
    client: Client,
}

impl MailerService {
    pub fn new(options: MailerOptions) -> Self {
        Self {
            options,
            client: Client::new(),
        }
    }

    pub fn options(&self) -> &MailerOptions {
        &self.options
    }

    pub async fn send(&self, message: &EmailMessage) -> Result<(), MailerError> {
        let body = self.request_body(message)?;

        let response = self
            .client
            .post(&self.options.api_url)
            .bearer_auth(&self.options.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MailerError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }

    fn request_body<'a>(&'a self, message: &'a EmailMessage) -> Result<SendRequest<'a>, MailerError> {
        if message.to.is_empty() && message.cc.is_empty() && message.bcc.is_empty() {
            return Err(MailerError::MissingRecipients);
        }

        Ok(SendRequest {
            from: Sender {
                name: &self.options.sender_name,
                email: &self.options.sender_address,
            },
            to: &message.to,
            cc: &message.cc,
            bcc: &message.bcc,
            subject: &message.subject,
            html: &message.html,
            attachments: &message.attachments,
        })
    }
}
