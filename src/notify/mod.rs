//! Notification collaborators.
//!
//! Every notifier sends the same message: a fixed subject, a body naming the
//! detection time, and the sampled frames as JPEG attachments.

mod outbox;
#[cfg(feature = "notify-webhook")]
mod webhook;

use anyhow::{anyhow, Result};
use serde::Serialize;

use crate::config::NotifySettings;
use crate::dispatch::Notifier;
use crate::frame::{format_detection_time, Frame, Timestamp};
use crate::storage::encode_jpeg;

pub use outbox::OutboxNotifier;
#[cfg(feature = "notify-webhook")]
pub use webhook::WebhookNotifier;

pub const SUBJECT: &str = "New detection";

#[derive(Clone, Debug, Serialize)]
pub struct Message {
    pub subject: String,
    pub body: String,
    pub detected_at: String,
    #[serde(skip)]
    pub attachments: Vec<Vec<u8>>,
}

impl Message {
    pub fn compose(frames: &[Frame], detected_at: Timestamp) -> Result<Self> {
        let detected_at = format_detection_time(detected_at);
        let attachments = frames.iter().map(encode_jpeg).collect::<Result<Vec<_>>>()?;
        Ok(Self {
            subject: SUBJECT.to_string(),
            body: format!("Hey, have a look at a new detection at {}", detected_at),
            detected_at,
            attachments,
        })
    }
}

/// Writes the message to the log only. Default when nothing else is configured.
#[derive(Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn name(&self) -> &'static str {
        "log"
    }

    fn notify(&mut self, frames: &[Frame], detected_at: Timestamp) -> Result<()> {
        let message = Message::compose(frames, detected_at)?;
        log::warn!(
            "{}: {} ({} image attachment(s))",
            message.subject,
            message.body,
            message.attachments.len()
        );
        Ok(())
    }
}

/// Build the notifier named in the notify settings.
pub fn build_notifier(settings: &NotifySettings) -> Result<Box<dyn Notifier>> {
    match settings.kind.as_str() {
        "log" => Ok(Box::new(LogNotifier)),
        "outbox" => Ok(Box::new(OutboxNotifier::new(&settings.outbox_dir)?)),
        #[cfg(feature = "notify-webhook")]
        "webhook" => {
            let url = settings
                .webhook_url
                .as_deref()
                .ok_or_else(|| anyhow!("webhook notifier requires notify.webhook_url"))?;
            Ok(Box::new(WebhookNotifier::new(url)))
        }
        #[cfg(not(feature = "notify-webhook"))]
        "webhook" => Err(anyhow!("webhook notifier requires the notify-webhook feature")),
        other => Err(anyhow!("unknown notifier '{}'", other)),
    }
}
