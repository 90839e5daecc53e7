//! What every stage receives and returns.

use std::path::{Path, PathBuf};

use artifacts::{Artifact, ArtifactPayload, ArtifactStatus, ArtifactStore, StoreError};
use serde::Serialize;
use thiserror::Error;
use utils::lock::{LockError, StageLock};

/// Infrastructure failures. Domain failures (missing upstream, gate
/// rejection, tool failure, lock contention) never surface here; they are
/// recorded in the artifact instead.
#[derive(Debug, Error)]
pub enum StageError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Lock(#[from] LockError),
    #[error("bookkeeping file {path}: {source}")]
    Bookkeeping {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone)]
pub struct StageContext {
    pub store: ArtifactStore,
}

impl StageContext {
    pub fn new(store: ArtifactStore) -> Self {
        Self { store }
    }

    pub fn root(&self) -> &Path {
        self.store.root()
    }

    /// `Ok(None)` when another invocation holds the lock.
    pub fn try_lock(&self, path: &Path) -> Result<Option<StageLock>, StageError> {
        Ok(StageLock::try_acquire(path)?)
    }

    /// Persist `artifact` and summarise the run.
    pub async fn finish<P: ArtifactPayload>(
        &self,
        artifact: &Artifact<P>,
    ) -> Result<StageReport, StageError> {
        self.store.write(artifact).await?;
        Ok(StageReport::written(artifact))
    }
}

/// Printed by the binary after every invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageReport {
    pub stage: String,
    pub status: ArtifactStatus,
    pub artifact_id: Option<String>,
    pub items: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl StageReport {
    pub fn written<P: ArtifactPayload>(artifact: &Artifact<P>) -> Self {
        Self {
            stage: P::KIND.service().to_string(),
            status: artifact.status,
            artifact_id: Some(artifact.id.clone()),
            items: artifact.meta.count,
            note: artifact.degraded_reason.clone(),
        }
    }

    /// Another invocation owns the stage family; nothing was written.
    pub fn lock_busy(stage: &str) -> Self {
        Self {
            stage: stage.to_string(),
            status: ArtifactStatus::Partial,
            artifact_id: None,
            items: 0,
            note: Some("lock busy".to_string()),
        }
    }

    /// Clean exit without an artifact.
    pub fn no_op(stage: &str, status: ArtifactStatus, note: impl Into<String>) -> Self {
        Self {
            stage: stage.to_string(),
            status,
            artifact_id: None,
            items: 0,
            note: Some(note.into()),
        }
    }

    pub fn wrote_artifact(&self) -> bool {
        self.artifact_id.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use artifacts::models::trend::TrendSnapshot;

    #[tokio::test]
    async fn finish_writes_and_reports() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = StageContext::new(ArtifactStore::new(dir.path()));
        let artifact = Artifact::degraded(TrendSnapshot::default(), "no sources configured");

        let report = ctx.finish(&artifact).await.unwrap();
        assert_eq!(report.stage, "trend-detector");
        assert_eq!(report.status, ArtifactStatus::Degraded);
        assert_eq!(report.note.as_deref(), Some("no sources configured"));
        assert!(report.wrote_artifact());
    }

    #[test]
    fn lock_busy_is_partial_without_artifact() {
        let report = StageReport::lock_busy("renderer-runner");
        assert_eq!(report.status, ArtifactStatus::Partial);
        assert!(!report.wrote_artifact());
    }
}
