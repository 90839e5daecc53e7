//! Platform credentials from `<root>/credentials/<platform>.json`.
//!
//! Publish mode is derived from these alone: usable credentials mean `live`,
//! anything else means `dry_run`.

use std::path::{Path, PathBuf};

use artifacts::models::{metrics::CredentialState, publish::PublishMode};
use serde::Deserialize;
use tracing::warn;

/// OAuth client plus a long-lived refresh token.
#[derive(Clone, Deserialize)]
pub struct OAuthCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
}

impl std::fmt::Debug for OAuthCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub enum Credentials {
    Available(OAuthCredentials),
    Missing(PathBuf),
    Malformed { path: PathBuf, reason: String },
}

impl Credentials {
    pub fn mode(&self) -> PublishMode {
        match self {
            Credentials::Available(_) => PublishMode::Live,
            _ => PublishMode::DryRun,
        }
    }

    pub fn state(&self) -> CredentialState {
        match self {
            Credentials::Available(_) => CredentialState::Available,
            _ => CredentialState::Unavailable,
        }
    }

    pub fn oauth(&self) -> Option<&OAuthCredentials> {
        match self {
            Credentials::Available(creds) => Some(creds),
            _ => None,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Credentials::Available(_) => "available".to_string(),
            Credentials::Missing(path) => format!("{} not found", path.display()),
            Credentials::Malformed { path, reason } => {
                format!("{} is malformed: {}", path.display(), reason)
            }
        }
    }
}

pub fn credentials_path(dir: &Path, platform: &str) -> PathBuf {
    dir.join(format!("{}.json", platform))
}

fn parse(raw: &[u8]) -> Result<OAuthCredentials, String> {
    let creds: OAuthCredentials = serde_json::from_slice(raw).map_err(|e| e.to_string())?;
    for (field, value) in [
        ("client_id", &creds.client_id),
        ("client_secret", &creds.client_secret),
        ("refresh_token", &creds.refresh_token),
    ] {
        if value.trim().is_empty() {
            return Err(format!("{} is empty", field));
        }
    }
    Ok(creds)
}

#[cfg(unix)]
fn warn_if_exposed(path: &Path, metadata: &std::fs::Metadata) {
    use std::os::unix::fs::PermissionsExt;

    let mode = metadata.permissions().mode();
    if mode & 0o077 != 0 {
        warn!(
            "Credential file {} is accessible by group/others (mode {:o}); chmod 600 recommended",
            path.display(),
            mode & 0o777
        );
    }
}

#[cfg(not(unix))]
fn warn_if_exposed(_path: &Path, _metadata: &std::fs::Metadata) {}

pub async fn load_credentials(dir: &Path, platform: &str) -> Credentials {
    let path = credentials_path(dir, platform);
    let raw = match tokio::fs::read(&path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Credentials::Missing(path),
        Err(e) => {
            return Credentials::Malformed {
                path,
                reason: e.to_string(),
            };
        }
    };
    if let Ok(metadata) = tokio::fs::metadata(&path).await {
        warn_if_exposed(&path, &metadata);
    }
    match parse(&raw) {
        Ok(creds) => Credentials::Available(creds),
        Err(reason) => Credentials::Malformed { path, reason },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn absent_file_means_dry_run() {
        let dir = tempfile::tempdir().unwrap();
        let creds = load_credentials(dir.path(), "youtube").await;
        assert!(matches!(creds, Credentials::Missing(_)));
        assert_eq!(creds.mode(), PublishMode::DryRun);
        assert_eq!(creds.state(), CredentialState::Unavailable);
    }

    #[tokio::test]
    async fn incomplete_file_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(
            dir.path().join("youtube.json"),
            r#"{"client_id": "id", "client_secret": "", "refresh_token": "r"}"#,
        )
        .await
        .unwrap();
        let creds = load_credentials(dir.path(), "youtube").await;
        assert!(matches!(creds, Credentials::Malformed { .. }));
        assert_eq!(creds.mode(), PublishMode::DryRun);

        tokio::fs::write(dir.path().join("youtube.json"), "not json").await.unwrap();
        assert_eq!(load_credentials(dir.path(), "youtube").await.mode(), PublishMode::DryRun);
    }

    #[tokio::test]
    async fn complete_file_means_live() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(
            dir.path().join("youtube.json"),
            r#"{"client_id": "id", "client_secret": "s", "refresh_token": "r", "extra": 1}"#,
        )
        .await
        .unwrap();
        let creds = load_credentials(dir.path(), "youtube").await;
        assert_eq!(creds.mode(), PublishMode::Live);
        assert!(!format!("{:?}", creds).contains("\"s\""));
    }
}
