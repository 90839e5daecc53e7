//! Video platform connectors used by live publishes.

pub mod youtube;

use std::path::PathBuf;

use artifacts::models::publish::PublishPackage;
use async_trait::async_trait;
use thiserror::Error;

use super::credentials::OAuthCredentials;
use crate::services::config::PublishConfig;

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Platform not supported: {0}")]
    UnsupportedPlatform(String),
    #[error("Authentication failed: {0}")]
    AuthError(String),
    #[error("Rate limited by platform")]
    RateLimited,
    #[error("Platform API error: {0}")]
    PlatformError(String),
    #[error("Network error: {0}")]
    NetworkError(String),
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result of a successful upload
#[derive(Debug, Clone, PartialEq)]
pub struct UploadResult {
    pub platform_video_id: String,
    pub platform_url: Option<String>,
}

/// Trait for platform-specific connectors
#[async_trait]
pub trait PlatformConnector: Send + Sync {
    /// Platform name, matching the receipt scope
    fn platform(&self) -> &str;

    /// Upload the package's master with its metadata
    async fn upload(
        &self,
        credentials: &OAuthCredentials,
        package: &PublishPackage,
    ) -> Result<UploadResult, PublishError>;
}

/// Get connector for a specific platform
pub fn get_connector(
    platform: &str,
    config: &PublishConfig,
) -> Result<Box<dyn PlatformConnector>, PublishError> {
    match platform {
        "youtube" => Ok(Box::new(youtube::YouTubeConnector::new(config))),
        other => Err(PublishError::UnsupportedPlatform(other.to_string())),
    }
}
