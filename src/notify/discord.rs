// src/notify/discord.rs - Discord webhook sinks
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Mutex;

use super::{NotificationSink, SinkError, ViewSink};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

fn webhook_client() -> Result<reqwest::Client, SinkError> {
    reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(|e| SinkError::Delivery(e.to_string()))
}

/// Posts lifecycle notifications to a webhook, one message per event.
pub struct WebhookNotifier {
    url: String,
    client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(url: &str) -> Result<Self, SinkError> {
        Ok(Self {
            url: url.to_string(),
            client: webhook_client()?,
        })
    }
}

#[async_trait]
impl NotificationSink for WebhookNotifier {
    async fn send(&self, text: &str) -> Result<(), SinkError> {
        let response = self
            .client
            .post(&self.url)
            .json(&json!({ "content": text }))
            .send()
            .await
            .map_err(|e| SinkError::Delivery(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(SinkError::Http(status.as_u16()));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct WebhookMessage {
    id: String,
}

/// Maintains a single status message: posted once, then edited in place
/// every cycle. The message identity lives here, not in the monitor.
pub struct WebhookStatusView {
    url: String,
    client: reqwest::Client,
    message_id: Mutex<Option<String>>,
}

impl WebhookStatusView {
    pub fn new(url: &str) -> Result<Self, SinkError> {
        Ok(Self {
            url: url.to_string(),
            client: webhook_client()?,
            message_id: Mutex::new(None),
        })
    }

    fn render_content(rows: &[String], title: &str, refresh_secs: u64) -> serde_json::Value {
        let body = rows.join("\n\n");
        json!({
            "embeds": [{
                "title": title,
                "description": body,
                "color": 0x4A90D9,
                "footer": { "text": format!("Updates every {} seconds", refresh_secs) },
                "timestamp": chrono::Utc::now().to_rfc3339(),
            }]
        })
    }

    async fn create(&self, payload: &serde_json::Value) -> Result<String, SinkError> {
        let response = self
            .client
            .post(format!("{}?wait=true", self.url))
            .json(payload)
            .send()
            .await
            .map_err(|e| SinkError::Delivery(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(SinkError::Http(status.as_u16()));
        }
        let message: WebhookMessage = response
            .json()
            .await
            .map_err(|e| SinkError::Delivery(e.to_string()))?;
        Ok(message.id)
    }

    async fn edit(&self, id: &str, payload: &serde_json::Value) -> Result<(), SinkError> {
        let response = self
            .client
            .patch(format!("{}/messages/{}", self.url, id))
            .json(payload)
            .send()
            .await
            .map_err(|e| SinkError::Delivery(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(SinkError::Http(status.as_u16()));
        }
        Ok(())
    }
}

#[async_trait]
impl ViewSink for WebhookStatusView {
    async fn publish(
        &self,
        rows: &[String],
        title: &str,
        refresh_secs: u64,
    ) -> Result<(), SinkError> {
        let payload = Self::render_content(rows, title, refresh_secs);
        let mut id_guard = self.message_id.lock().await;

        if let Some(id) = id_guard.as_deref() {
            match self.edit(id, &payload).await {
                Ok(()) => return Ok(()),
                // Message deleted out from under us; post a fresh one.
                Err(SinkError::Http(404)) => {
                    tracing::warn!("status message disappeared, re-posting");
                    *id_guard = None;
                }
                Err(e) => return Err(e),
            }
        }

        let id = self.create(&payload).await?;
        *id_guard = Some(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_content_shape() {
        let rows = vec!["row one".to_string(), "row two".to_string()];
        let payload = WebhookStatusView::render_content(&rows, "Printers", 30);
        let embed = &payload["embeds"][0];
        assert_eq!(embed["title"], "Printers");
        assert_eq!(embed["description"], "row one\n\nrow two");
        assert_eq!(embed["footer"]["text"], "Updates every 30 seconds");
        assert!(embed["timestamp"].as_str().is_some());
    }

    #[test]
    fn test_webhook_message_id_parsing() {
        let message: WebhookMessage =
            serde_json::from_str(r#"{"id": "1234", "channel_id": "9"}"#).unwrap();
        assert_eq!(message.id, "1234");
    }
}
