//! HTTP email delivery client.
//!
//! Implements the core `EmailSender` port against a JSON send endpoint.
//! Transport failures map to the `Transport` error kind; the asynchronous
//! callers record them per channel instead of propagating.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use slotbook_core::notify::ports::EmailSender;
use slotbook_domain::{EmailConfig, Result, SlotbookError};
use tracing::debug;

use crate::errors::InfraError;

/// Email sender backed by an HTTP JSON API.
pub struct HttpEmailSender {
    client: Client,
    config: EmailConfig,
}

#[derive(Serialize)]
struct SendRequest<'a> {
    to: &'a str,
    #[serde(rename = "toName")]
    to_name: &'a str,
    subject: &'a str,
    html: &'a str,
    #[serde(rename = "fromName")]
    from_name: &'a str,
    #[serde(rename = "fromEmail")]
    from_email: &'a str,
}

#[derive(Deserialize)]
struct SendResponse {
    id: String,
}

impl HttpEmailSender {
    /// Build a sender for the configured endpoint.
    pub fn new(config: EmailConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(to_domain)?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl EmailSender for HttpEmailSender {
    async fn send(
        &self,
        to_email: &str,
        to_name: &str,
        subject: &str,
        html: &str,
    ) -> Result<String> {
        let payload = SendRequest {
            to: to_email,
            to_name,
            subject,
            html,
            from_name: &self.config.sender_name,
            from_email: &self.config.sender_email,
        };

        let mut request = self.client.post(&self.config.endpoint).json(&payload);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(to_domain)?;
        let response = response.error_for_status().map_err(to_domain)?;
        let parsed: SendResponse = response.json().await.map_err(to_domain)?;

        debug!(to = to_email, message_id = %parsed.id, "email accepted by transport");
        Ok(parsed.id)
    }
}

fn to_domain(err: reqwest::Error) -> SlotbookError {
    InfraError::from(err).into()
}
