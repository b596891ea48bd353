//! Email delivery worker and sender abstractions.
//!
//! Services never talk to the email provider directly. They publish an
//! [`EmailTask`] as JSON on `send_email_queue` and return; a background task
//! drains the queue and hands each task to an [`EmailSender`]. A task that
//! cannot be decoded or delivered is logged and dropped so one bad message
//! does not stall the queue.
//!
//! The default sender is [`LogEmailSender`], which only logs. Configuring an
//! email API URL switches to [`HttpEmailSender`].

use crate::queue::{MessageQueue, SEND_EMAIL_QUEUE};
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{Instrument, error, info, info_span};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EmailTask {
    pub to: Vec<String>,
    pub subject: String,
    pub template: String,
    pub params: Value,
}

#[async_trait]
pub trait EmailSender: Send + Sync {
    /// Deliver a message or return an error to have it logged as failed.
    async fn send(&self, task: &EmailTask) -> Result<()>;
}

/// Local dev sender that logs the payload instead of sending real email.
#[derive(Clone, Debug)]
pub struct LogEmailSender;

#[async_trait]
impl EmailSender for LogEmailSender {
    async fn send(&self, task: &EmailTask) -> Result<()> {
        info!(
            to = ?task.to,
            subject = %task.subject,
            template = %task.template,
            params = %task.params,
            "email send stub"
        );
        Ok(())
    }
}

/// Sends transactional email through an HTTP API authenticated with a bearer key.
#[derive(Debug)]
pub struct HttpEmailSender {
    client: reqwest::Client,
    api_url: String,
    api_key: SecretString,
    sender: String,
}

impl HttpEmailSender {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(api_url: String, api_key: SecretString, sender: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(crate::APP_USER_AGENT)
            .build()
            .context("Failed to build email HTTP client")?;
        Ok(Self {
            client,
            api_url,
            api_key,
            sender,
        })
    }

    fn payload(&self, task: &EmailTask) -> Value {
        let to: Vec<Value> = task.to.iter().map(|email| json!({ "email": email })).collect();
        json!({
            "from": { "email": self.sender, "name": "Bookwise" },
            "to": to,
            "subject": task.subject,
            "template": task.template,
            "params": task.params,
            "category": "Transactional",
        })
    }
}

#[async_trait]
impl EmailSender for HttpEmailSender {
    async fn send(&self, task: &EmailTask) -> Result<()> {
        let span = info_span!("email.send", email.template = %task.template);
        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(self.api_key.expose_secret())
            .json(&self.payload(task))
            .send()
            .instrument(span)
            .await
            .context("Failed to reach email API")?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(anyhow!("email API returned {status}: {body}"))
        }
    }
}

/// Decode one queued message and deliver it.
///
/// # Errors
/// Returns an error if the message is not a valid task or delivery fails.
pub async fn deliver(sender: &dyn EmailSender, message: &[u8]) -> Result<()> {
    let task: EmailTask = serde_json::from_slice(message).context("Invalid email task")?;
    sender
        .send(&task)
        .await
        .with_context(|| format!("Failed to send {} email", task.template))
}

/// Spawn the background task that drains `send_email_queue`.
///
/// # Errors
/// Returns an error if the queue already has a consumer.
pub async fn spawn_email_worker(
    queue: Arc<dyn MessageQueue>,
    sender: Arc<dyn EmailSender>,
) -> Result<tokio::task::JoinHandle<()>> {
    let mut receiver = queue
        .consume(SEND_EMAIL_QUEUE)
        .await
        .context("Failed to consume email queue")?;

    Ok(tokio::spawn(async move {
        while let Some(message) = receiver.recv().await {
            if let Err(err) = deliver(sender.as_ref(), &message).await {
                error!("email delivery failed: {err:#}");
            }
        }
        info!("email queue closed, worker stopping");
    }))
}
