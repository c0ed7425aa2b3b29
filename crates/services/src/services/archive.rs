use chrono::Utc;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Logical folder uploads land in on the storage provider.
pub const UPLOAD_FOLDER: &str = "ml-results";

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Archive upload request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Storage provider returned {status}: {body}")]
    Provider { status: StatusCode, body: String },
    #[error("Storage provider response carried no URL")]
    MissingUrl,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: Option<String>,
}

/// Client for the durable object store. Uploads are signed with the account
/// secret; the provider assigns the permanent URL.
#[derive(Debug, Clone)]
pub struct ArchiveClient {
    client: Client,
    base_url: String,
    cloud_name: String,
    api_key: String,
    api_secret: String,
}

impl ArchiveClient {
    pub fn new(
        base_url: impl Into<String>,
        cloud_name: impl Into<String>,
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            cloud_name: cloud_name.into(),
            api_key: api_key.into(),
            api_secret: api_secret.into(),
        }
    }

    /// Uploads a base64-encoded PNG and returns its permanent URL.
    pub async fn upload_base64_png(&self, base64: &str) -> Result<String, ArchiveError> {
        let timestamp = Utc::now().timestamp();
        let signature = sign_upload(UPLOAD_FOLDER, timestamp, &self.api_secret);
        let form = [
            ("file", format!("data:image/png;base64,{base64}")),
            ("folder", UPLOAD_FOLDER.to_string()),
            ("timestamp", timestamp.to_string()),
            ("api_key", self.api_key.clone()),
            ("signature", signature),
            ("signature_algorithm", "sha256".to_string()),
        ];

        let response = self
            .client
            .post(format!(
                "{}/v1_1/{}/image/upload",
                self.base_url, self.cloud_name
            ))
            .form(&form)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ArchiveError::Provider { status, body });
        }

        let payload: UploadResponse = response.json().await?;
        payload
            .secure_url
            .filter(|url| !url.is_empty())
            .ok_or(ArchiveError::MissingUrl)
    }
}

/// Request signature over the signed params (everything except `file`,
/// `api_key` and the signature itself), alphabetical, with the secret
/// appended.
fn sign_upload(folder: &str, timestamp: i64, api_secret: &str) -> String {
    let to_sign = format!("folder={folder}&timestamp={timestamp}{api_secret}");
    hex::encode(Sha256::digest(to_sign.as_bytes()))
}
