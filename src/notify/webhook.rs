use anyhow::{anyhow, Result};
use base64::Engine;
use std::time::Duration;

use crate::dispatch::Notifier;
use crate::frame::{Frame, Timestamp};
use crate::notify::Message;

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

/// POSTs the message as JSON, attachments base64-encoded.
pub struct WebhookNotifier {
    url: String,
    agent: ureq::Agent,
}

impl WebhookNotifier {
    pub fn new(url: &str) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(WEBHOOK_TIMEOUT).build();
        Self {
            url: url.to_string(),
            agent,
        }
    }
}

impl Notifier for WebhookNotifier {
    fn name(&self) -> &'static str {
        "webhook"
    }

    fn notify(&mut self, frames: &[Frame], detected_at: Timestamp) -> Result<()> {
        let message = Message::compose(frames, detected_at)?;
        let attachments: Vec<serde_json::Value> = message
            .attachments
            .iter()
            .map(|jpeg| {
                serde_json::json!({
                    "content_type": "image/jpeg",
                    "data": base64::engine::general_purpose::STANDARD.encode(jpeg),
                })
            })
            .collect();
        let payload = serde_json::json!({
            "subject": message.subject,
            "body": message.body,
            "detected_at": message.detected_at,
            "attachments": attachments,
        });
        self.agent
            .post(&self.url)
            .send_json(payload)
            .map_err(|e| anyhow!("webhook POST to {} failed: {}", self.url, e))?;
        Ok(())
    }
}
