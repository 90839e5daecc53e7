//! Filesystem artifact store.
//!
//! Layout per kind, relative to the factory root:
//!
//! ```text
//! <kind dir>/[<scope>/]latest.json          replaced atomically on every write
//! <kind dir>/[<scope>/]history/<id>.json    written once, never modified
//! ```
//!
//! Every write is validated before it touches disk and every read is
//! validated before it reaches a stage.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::fs;

use crate::{
    envelope::{Artifact, ArtifactKind, ArtifactPayload, SchemaError},
    events::{EventBus, StageEvent},
    models::publish::is_valid_scope,
};

const LATEST_FILE: &str = "latest.json";
const HISTORY_DIR: &str = "history";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed artifact at {path}: {source}")]
    Serde {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("schema violation at {path}: {source}")]
    Schema {
        path: PathBuf,
        #[source]
        source: SchemaError,
    },
    #[error("rejected before write: {0}")]
    Invalid(#[from] SchemaError),
    #[error("invalid scope '{0}'")]
    InvalidScope(String),
}

impl StoreError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Result of resolving an upstream input.
///
/// A stage never crashes on a missing input: absence, unreadable JSON and
/// schema violations all land in `Missing` with a human-readable reason.
#[derive(Debug, Clone)]
pub enum Upstream<P> {
    Ready(Artifact<P>),
    Missing(String),
}

impl<P> Upstream<P> {
    pub fn ready(self) -> Option<Artifact<P>> {
        match self {
            Upstream::Ready(artifact) => Some(artifact),
            Upstream::Missing(_) => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
    events: Option<EventBus>,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            events: None,
        }
    }

    pub fn with_events(mut self, bus: EventBus) -> Self {
        self.events = Some(bus);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn events(&self) -> Option<&EventBus> {
        self.events.as_ref()
    }

    pub fn kind_dir(&self, kind: ArtifactKind, scope: Option<&str>) -> Result<PathBuf, StoreError> {
        let base = self.root.join(kind.dir());
        match scope {
            None => Ok(base),
            Some(s) if is_valid_scope(s) => Ok(base.join(s)),
            Some(s) => Err(StoreError::InvalidScope(s.to_string())),
        }
    }

    pub fn latest_path(&self, kind: ArtifactKind, scope: Option<&str>) -> Result<PathBuf, StoreError> {
        Ok(self.kind_dir(kind, scope)?.join(LATEST_FILE))
    }

    pub fn history_dir(&self, kind: ArtifactKind, scope: Option<&str>) -> Result<PathBuf, StoreError> {
        Ok(self.kind_dir(kind, scope)?.join(HISTORY_DIR))
    }

    pub fn history_path(
        &self,
        kind: ArtifactKind,
        scope: Option<&str>,
        id: &str,
    ) -> Result<PathBuf, StoreError> {
        Ok(self.history_dir(kind, scope)?.join(format!("{}.json", id)))
    }

    /// Validate, persist the immutable history copy, swap `latest.json`,
    /// then publish the event. Returns the path of `latest.json`.
    pub async fn write<P: ArtifactPayload>(&self, artifact: &Artifact<P>) -> Result<PathBuf, StoreError> {
        artifact.validate()?;

        let scope = artifact.payload.scope();
        let history = self.history_path(P::KIND, scope.as_deref(), &artifact.id)?;
        let latest = self.latest_path(P::KIND, scope.as_deref())?;

        let bytes = serde_json::to_vec_pretty(artifact).map_err(|source| StoreError::Serde {
            path: latest.clone(),
            source,
        })?;

        utils::fs::write_new(&history, &bytes)
            .await
            .map_err(|e| StoreError::io(&history, e))?;
        utils::fs::write_atomic(&latest, &bytes)
            .await
            .map_err(|e| StoreError::io(&latest, e))?;

        tracing::info!(
            "Wrote {} {} ({}, {} items)",
            P::KIND.dir(),
            artifact.id,
            artifact.status,
            artifact.meta.count
        );

        if let Some(bus) = &self.events {
            bus.publish(StageEvent::from_artifact(artifact)).await;
        }

        Ok(latest)
    }

    /// Read and validate any artifact file.
    pub async fn read_path<P: ArtifactPayload>(&self, path: &Path) -> Result<Artifact<P>, StoreError> {
        let bytes = fs::read(path).await.map_err(|e| StoreError::io(path, e))?;
        let artifact: Artifact<P> =
            serde_json::from_slice(&bytes).map_err(|source| StoreError::Serde {
                path: path.to_path_buf(),
                source,
            })?;
        artifact.validate().map_err(|source| StoreError::Schema {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(artifact)
    }

    /// `Ok(None)` when the kind has never been written.
    pub async fn latest<P: ArtifactPayload>(&self) -> Result<Option<Artifact<P>>, StoreError> {
        self.latest_in(None).await
    }

    pub async fn latest_in<P: ArtifactPayload>(
        &self,
        scope: Option<&str>,
    ) -> Result<Option<Artifact<P>>, StoreError> {
        let path = self.latest_path(P::KIND, scope)?;
        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(None);
        }
        self.read_path(&path).await.map(Some)
    }

    /// Raw JSON of `latest.json`, without typing. Used for inspection.
    pub async fn latest_raw(
        &self,
        kind: ArtifactKind,
        scope: Option<&str>,
    ) -> Result<Option<serde_json::Value>, StoreError> {
        let path = self.latest_path(kind, scope)?;
        match fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|source| StoreError::Serde { path, source }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::io(&path, e)),
        }
    }

    /// All readable history entries, oldest first. Malformed files are
    /// skipped with a warning.
    pub async fn history<P: ArtifactPayload>(
        &self,
        scope: Option<&str>,
    ) -> Result<Vec<Artifact<P>>, StoreError> {
        let dir = self.history_dir(P::KIND, scope)?;
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::io(&dir, e)),
        };

        let mut artifacts = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| StoreError::io(&dir, e))? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match self.read_path::<P>(&path).await {
                Ok(artifact) => artifacts.push(artifact),
                Err(e) => tracing::warn!("Skipping unreadable history entry: {}", e),
            }
        }
        artifacts.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));
        Ok(artifacts)
    }

    /// Resolve the latest upstream artifact, folding every failure into
    /// [`Upstream::Missing`].
    pub async fn upstream<P: ArtifactPayload>(&self) -> Upstream<P> {
        match self.latest::<P>().await {
            Ok(Some(artifact)) => Upstream::Ready(artifact),
            Ok(None) => Upstream::Missing(format!("no {} artifact yet", P::KIND.dir())),
            Err(e) => {
                tracing::warn!("Upstream {} unusable: {}", P::KIND.dir(), e);
                Upstream::Missing(format!("{} artifact unreadable: {}", P::KIND.dir(), e))
            }
        }
    }

    /// Platforms (scopes) that have at least one receipt-style sub-directory.
    pub async fn scopes(&self, kind: ArtifactKind) -> Result<Vec<String>, StoreError> {
        let dir = self.kind_dir(kind, None)?;
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::io(&dir, e)),
        };
        let mut scopes = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| StoreError::io(&dir, e))? {
            let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
            let name = entry.file_name().to_string_lossy().to_string();
            if is_dir && name != HISTORY_DIR && is_valid_scope(&name) {
                scopes.push(name);
            }
        }
        scopes.sort();
        Ok(scopes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        envelope::ArtifactStatus,
        models::trend::{SourceState, SourceStatus, Trend, TrendSnapshot},
    };

    fn snapshot() -> TrendSnapshot {
        TrendSnapshot {
            sources: vec![SourceStatus {
                name: "feed".to_string(),
                status: SourceState::Ok,
                items: 1,
                error: None,
            }],
            trends: vec![Trend {
                title: "Rust 2026 roadmap".to_string(),
                link: "https://example.org/rust".to_string(),
                source: "feed".to_string(),
                category: "tech".to_string(),
                score: 12.0,
                summary: "Roadmap published.".to_string(),
            }],
        }
    }

    #[tokio::test]
    async fn write_then_read_latest_and_history() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());

        let first = Artifact::new(snapshot(), ArtifactStatus::Healthy);
        store.write(&first).await.unwrap();
        let second = Artifact::new(snapshot(), ArtifactStatus::Partial);
        store.write(&second).await.unwrap();

        let latest = store.latest::<TrendSnapshot>().await.unwrap().unwrap();
        assert_eq!(latest.id, second.id);

        let history = store.history::<TrendSnapshot>(None).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].id, first.id);
    }

    #[tokio::test]
    async fn history_entries_are_never_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let artifact = Artifact::new(snapshot(), ArtifactStatus::Healthy);
        store.write(&artifact).await.unwrap();
        assert!(matches!(
            store.write(&artifact).await,
            Err(StoreError::Io { .. })
        ));
    }

    #[tokio::test]
    async fn invalid_artifact_never_reaches_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let mut artifact = Artifact::new(snapshot(), ArtifactStatus::Healthy);
        artifact.meta.count = 7;
        assert!(matches!(
            store.write(&artifact).await,
            Err(StoreError::Invalid(_))
        ));
        assert!(store.latest::<TrendSnapshot>().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn malformed_upstream_is_missing_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());

        assert!(matches!(
            store.upstream::<TrendSnapshot>().await,
            Upstream::Missing(_)
        ));

        let path = store.latest_path(ArtifactKind::TrendSnapshot, None).unwrap();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"{ not json").unwrap();
        match store.upstream::<TrendSnapshot>().await {
            Upstream::Missing(reason) => assert!(reason.contains("unreadable")),
            Upstream::Ready(_) => panic!("malformed file must not be Ready"),
        }
    }

    #[tokio::test]
    async fn scope_names_are_checked() {
        let store = ArtifactStore::new("/tmp/skybeam");
        assert!(store.kind_dir(ArtifactKind::Receipt, Some("youtube")).is_ok());
        assert!(matches!(
            store.kind_dir(ArtifactKind::Receipt, Some("../etc")),
            Err(StoreError::InvalidScope(_))
        ));
    }
}
