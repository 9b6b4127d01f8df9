use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::dispatch::Notifier;
use crate::frame::{Frame, Timestamp};
use crate::notify::Message;
use crate::storage::{create_unique_dir, write_atomic};

/// Drops each notification into its own directory under the outbox root:
/// `message.json` plus `attachment_N.jpg`. A mail relay or sync job picks them up.
pub struct OutboxNotifier {
    root: PathBuf,
}

impl OutboxNotifier {
    pub fn new(root: &Path) -> Result<Self> {
        std::fs::create_dir_all(root)
            .with_context(|| format!("failed to create outbox {}", root.display()))?;
        Ok(Self {
            root: root.to_path_buf(),
        })
    }
}

impl Notifier for OutboxNotifier {
    fn name(&self) -> &'static str {
        "outbox"
    }

    fn notify(&mut self, frames: &[Frame], detected_at: Timestamp) -> Result<()> {
        let message = Message::compose(frames, detected_at)?;
        let dir = create_unique_dir(&self.root, &format!("detection_{}", message.detected_at))?;
        for (i, jpeg) in message.attachments.iter().enumerate() {
            write_atomic(&dir.join(format!("attachment_{}.jpg", i + 1)), jpeg)?;
        }
        // Written last so a message.json always has its attachments beside it.
        write_atomic(&dir.join("message.json"), &serde_json::to_vec_pretty(&message)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::SystemTime;

    #[test]
    fn writes_message_and_attachments() {
        let root = tempfile::tempdir().unwrap();
        let mut notifier = OutboxNotifier::new(root.path()).unwrap();
        let now = SystemTime::now();
        let frames = vec![Frame::solid(4, 4, [1, 2, 3], now).unwrap(); 3];
        notifier.notify(&frames, now).unwrap();

        let dirs: Vec<_> = std::fs::read_dir(root.path()).unwrap().collect();
        assert_eq!(dirs.len(), 1);
        let dir = dirs[0].as_ref().unwrap().path();
        assert!(dir.join("attachment_3.jpg").exists());
        let json: serde_json::Value =
            serde_json::from_slice(&std::fs::read(dir.join("message.json")).unwrap()).unwrap();
        assert_eq!(json["subject"], "New detection");
    }
}
