//! YouTube Platform Connector
//!
//! Exchanges the stored refresh token for an access token, then uploads the
//! master through the resumable upload protocol: one metadata request that
//! returns an upload session URL, then one PUT with the file body.

use std::{path::Path, time::Duration};

use artifacts::models::publish::PublishPackage;
use async_trait::async_trait;
use reqwest::{Client, StatusCode, header};
use serde::{Deserialize, Serialize};

use super::{PlatformConnector, PublishError, UploadResult};
use crate::services::{config::PublishConfig, publish::credentials::OAuthCredentials};

const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const YOUTUBE_UPLOAD_URL: &str =
    "https://www.googleapis.com/upload/youtube/v3/videos?uploadType=resumable&part=snippet,status";
/// "Science & Technology"
const YOUTUBE_CATEGORY_ID: &str = "28";
const MAX_TAGS: usize = 15;

pub struct YouTubeConnector {
    client: Client,
    privacy_status: String,
}

impl YouTubeConnector {
    pub fn new(config: &PublishConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.upload_timeout_secs))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            privacy_status: config.privacy_status.clone(),
        }
    }

    async fn access_token(&self, credentials: &OAuthCredentials) -> Result<String, PublishError> {
        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", credentials.refresh_token.as_str()),
            ("client_id", credentials.client_id.as_str()),
            ("client_secret", credentials.client_secret.as_str()),
        ];

        let response = self
            .client
            .post(GOOGLE_TOKEN_URL)
            .form(&params)
            .send()
            .await
            .map_err(|e| PublishError::NetworkError(e.to_string()))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(PublishError::AuthError(format!(
                "YouTube token refresh failed: {}",
                error_text
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| PublishError::PlatformError(e.to_string()))?;
        Ok(token.access_token)
    }

    fn metadata(&self, package: &PublishPackage) -> VideoResource {
        VideoResource {
            snippet: Snippet {
                title: package.title.clone(),
                description: package.description.clone(),
                tags: package
                    .hashtags
                    .iter()
                    .map(|h| h.trim_start_matches('#').to_string())
                    .filter(|t| !t.is_empty())
                    .take(MAX_TAGS)
                    .collect(),
                category_id: YOUTUBE_CATEGORY_ID.to_string(),
            },
            status: VideoStatus {
                privacy_status: self.privacy_status.clone(),
                self_declared_made_for_kids: false,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Snippet {
    title: String,
    description: String,
    tags: Vec<String>,
    category_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VideoStatus {
    privacy_status: String,
    self_declared_made_for_kids: bool,
}

#[derive(Debug, Serialize)]
struct VideoResource {
    snippet: Snippet,
    status: VideoStatus,
}

#[derive(Debug, Deserialize)]
struct UploadedVideo {
    id: String,
}

fn status_error(status: StatusCode, body: String, step: &str) -> PublishError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => PublishError::RateLimited,
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            PublishError::AuthError(format!("{} ({}): {}", step, status, body))
        }
        _ => PublishError::PlatformError(format!("{} ({}): {}", step, status, body)),
    }
}

#[async_trait]
impl PlatformConnector for YouTubeConnector {
    fn platform(&self) -> &str {
        "youtube"
    }

    async fn upload(
        &self,
        credentials: &OAuthCredentials,
        package: &PublishPackage,
    ) -> Result<UploadResult, PublishError> {
        let path = Path::new(&package.master_path);
        let bytes = tokio::fs::read(path).await.map_err(|source| PublishError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let access_token = self.access_token(credentials).await?;

        let response = self
            .client
            .post(YOUTUBE_UPLOAD_URL)
            .bearer_auth(&access_token)
            .header("X-Upload-Content-Type", "video/mp4")
            .header("X-Upload-Content-Length", bytes.len().to_string())
            .json(&self.metadata(package))
            .send()
            .await
            .map_err(|e| PublishError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, body, "upload session"));
        }
        let session_url = response
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| {
                PublishError::PlatformError("upload session response had no Location".to_string())
            })?;

        let response = self
            .client
            .put(&session_url)
            .bearer_auth(&access_token)
            .header(header::CONTENT_TYPE, "video/mp4")
            .body(bytes)
            .send()
            .await
            .map_err(|e| PublishError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, body, "upload"));
        }
        let video: UploadedVideo = response
            .json()
            .await
            .map_err(|e| PublishError::PlatformError(e.to_string()))?;

        Ok(UploadResult {
            platform_url: Some(format!("https://youtube.com/shorts/{}", video.id)),
            platform_video_id: video.id,
        })
    }
}
