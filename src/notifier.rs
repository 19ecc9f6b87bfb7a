use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

use crate::config::Mention;
use crate::models::{EndpointKey, Status};

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("failed to post to webhook: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("webhook returned {0}")]
    Status(reqwest::StatusCode),
}

/// One alert or recovery notice, ready for delivery.
#[derive(Debug, Clone)]
pub struct Notification {
    pub endpoint: EndpointKey,
    pub status: Status,
    /// Protocol label for UP, "unreachable" for DOWN.
    pub reason: String,
    pub tier: u32,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, note: &Notification) -> Result<(), DeliveryError>;
}

/// Posts Adaptive Cards to a Microsoft Teams incoming webhook. With no
/// webhook configured, every notification is a logged no-op.
pub struct TeamsNotifier {
    webhook_url: Option<String>,
    mentions: Vec<Mention>,
    client: reqwest::Client,
}

impl TeamsNotifier {
    pub fn new(webhook_url: Option<String>, mentions: Vec<Mention>) -> Self {
        let webhook_url = webhook_url.filter(|url| !url.is_empty());
        Self {
            webhook_url,
            mentions,
            client: reqwest::Client::new(),
        }
    }

    fn card_payload(&self, note: &Notification) -> serde_json::Value {
        // Emoji and reminder prefix escalate with the alert tier.
        let (emoji, reminder_tag) = match (note.status, note.tier) {
            (Status::Up, _) => ("✅", ""),
            (Status::Down, 1) => ("🔥", ""),
            (Status::Down, 2) => ("🔔", "**🔔 Reminder:** "),
            (Status::Down, _) => ("🚨", "**🚨 Final Reminder:** "),
        };

        let mention_text: String = self
            .mentions
            .iter()
            .map(|user| format!("<at>{}</at> ", user.name))
            .collect();
        let entities: Vec<serde_json::Value> = self
            .mentions
            .iter()
            .map(|user| {
                json!({
                    "type": "mention",
                    "text": format!("<at>{}</at>", user.name),
                    "mentioned": { "id": &user.email, "name": &user.name },
                })
            })
            .collect();

        json!({
            "attachments": [{
                "contentType": "application/vnd.microsoft.card.adaptive",
                "content": {
                    "type": "AdaptiveCard",
                    "version": "1.4",
                    "$schema": "http://adaptivecards.io/schemas/adaptive-card.json",
                    "body": [
                        {
                            "type": "ColumnSet",
                            "columns": [
                                {
                                    "type": "Column",
                                    "width": "auto",
                                    "items": [{
                                        "type": "TextBlock",
                                        "text": emoji,
                                        "size": "ExtraLarge",
                                        "weight": "Bolder",
                                        "horizontalAlignment": "Center",
                                        "spacing": "None",
                                    }],
                                },
                                {
                                    "type": "Column",
                                    "width": "stretch",
                                    "items": [
                                        {
                                            "type": "TextBlock",
                                            "text": format!(
                                                "{reminder_tag}{} is now **{}**",
                                                note.endpoint.service,
                                                note.status.label()
                                            ),
                                            "weight": "Bolder",
                                            "size": "Medium",
                                            "wrap": true,
                                            "spacing": "None",
                                        },
                                        {
                                            "type": "FactSet",
                                            "facts": [
                                                { "title": "Host:", "value": &note.endpoint.host },
                                                { "title": "Port:", "value": note.endpoint.port.to_string() },
                                                { "title": "Protocol:", "value": &note.reason },
                                            ],
                                            "spacing": "Small",
                                        },
                                    ],
                                },
                            ],
                            "spacing": "Medium",
                        },
                        {
                            "type": "TextBlock",
                            "text": mention_text,
                            "wrap": true,
                            "spacing": "Medium",
                        },
                    ],
                    "msteams": { "entities": entities },
                },
            }],
        })
    }
}

#[async_trait]
impl Notifier for TeamsNotifier {
    async fn notify(&self, note: &Notification) -> Result<(), DeliveryError> {
        let Some(url) = &self.webhook_url else {
            warn!("Teams webhook URL not configured, skipping notification");
            return Ok(());
        };

        let response = self
            .client
            .post(url)
            .json(&self.card_payload(note))
            .timeout(Duration::from_secs(10))
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() >= 300 {
            return Err(DeliveryError::Status(status));
        }
        Ok(())
    }
}
