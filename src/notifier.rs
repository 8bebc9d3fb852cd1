use axum::async_trait;
use eyre::{bail, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct PushNotification {
    pub to: String,
    pub title: String,
    pub body: String,
}

/// Delivers push notifications to devices.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn push(&self, notification: &PushNotification) -> Result<()>;
}

pub struct ExpoNotifier {
    client: reqwest::Client,
    url: String,
}

impl ExpoNotifier {
    pub fn new(url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
        }
    }
}

#[derive(Deserialize, Debug)]
struct ExpoResponse {
    data: ExpoTicket,
}

#[derive(Deserialize, Debug)]
struct ExpoTicket {
    status: String,
    message: Option<String>,
}

#[async_trait]
impl Notifier for ExpoNotifier {
    async fn push(&self, notification: &PushNotification) -> Result<()> {
        let response = self
            .client
            .post(&self.url)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(notification)
            .send()
            .await?
            .error_for_status()?;
        let ticket = response.json::<ExpoResponse>().await?.data;
        if ticket.status != "ok" {
            bail!(
                "push to {} rejected: {}",
                notification.to,
                ticket.message.unwrap_or(ticket.status)
            );
        }
        debug!("pushed notification to {}", notification.to);
        Ok(())
    }
}
