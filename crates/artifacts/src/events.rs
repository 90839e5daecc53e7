//! Event bus - fire-and-forget mirror of every artifact write
//!
//! Delivers to:
//! - in-process subscribers (broadcast channel)
//! - out-of-process observers tailing `events/<topic>.jsonl`
//!
//! Delivery is at-most-once. A failed publish is logged and never surfaces
//! to the stage that wrote the artifact; observers that miss an event fall
//! back to polling `latest.json`.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::envelope::{Artifact, ArtifactKind, ArtifactPayload, ArtifactStatus};

/// Compact summary of one artifact write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageEvent {
    pub topic: String,
    pub kind: ArtifactKind,
    pub artifact_id: String,
    pub status: ArtifactStatus,
    pub timestamp: DateTime<Utc>,
    pub count: usize,
    pub summary: serde_json::Value,
}

impl StageEvent {
    pub fn from_artifact<P: ArtifactPayload>(artifact: &Artifact<P>) -> Self {
        Self {
            topic: P::KIND.topic(),
            kind: P::KIND,
            artifact_id: artifact.id.clone(),
            status: artifact.status,
            timestamp: artifact.timestamp,
            count: artifact.meta.count,
            summary: artifact.payload.summary(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<StageEvent>,
    spool_dir: Option<PathBuf>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(256);
        Self {
            sender,
            spool_dir: None,
        }
    }

    /// Also append every event to `<dir>/<topic>.jsonl`.
    pub fn with_spool(mut self, dir: impl Into<PathBuf>) -> Self {
        self.spool_dir = Some(dir.into());
        self
    }

    pub async fn publish(&self, event: StageEvent) {
        if let Some(dir) = &self.spool_dir {
            let path = dir.join(format!("{}.jsonl", event.topic));
            match serde_json::to_string(&event) {
                Ok(line) => {
                    if let Err(e) = utils::fs::append_line(&path, &line).await {
                        tracing::debug!(
                            "Failed to spool event {} to {}: {}",
                            event.artifact_id,
                            path.display(),
                            e
                        );
                    }
                }
                Err(e) => tracing::debug!("Failed to encode event {}: {}", event.artifact_id, e),
            }
        }
        // No subscribers is fine
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StageEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::trend::TrendSnapshot;

    #[tokio::test]
    async fn subscribers_receive_and_spool_records() {
        let dir = tempfile::tempdir().unwrap();
        let bus = EventBus::new().with_spool(dir.path());
        let mut rx = bus.subscribe();

        let artifact = Artifact::new(TrendSnapshot::default(), ArtifactStatus::Healthy);
        bus.publish(StageEvent::from_artifact(&artifact)).await;

        let received = rx.recv().await.unwrap();
        assert_eq!(received.artifact_id, artifact.id);
        assert_eq!(received.topic, "skybeam.trends");

        let spooled = std::fs::read_to_string(dir.path().join("skybeam.trends.jsonl")).unwrap();
        assert_eq!(spooled.lines().count(), 1);
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_silent() {
        let bus = EventBus::new();
        let artifact = Artifact::new(TrendSnapshot::default(), ArtifactStatus::Healthy);
        bus.publish(StageEvent::from_artifact(&artifact)).await;
    }
}
