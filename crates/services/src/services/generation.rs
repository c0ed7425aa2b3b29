use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

/// Styling hint forwarded to the provider when the caller did not pick one.
pub const DEFAULT_STYLE: &str = "cartoon";

const TEXT_TO_IMAGE_PATH: &str = "/v1/ai/text-to-image";

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Generation request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Generation provider returned {status}: {body}")]
    Provider { status: StatusCode, body: String },
    #[error("Generation provider response carried no image data")]
    MissingImage,
}

#[derive(Debug, Deserialize)]
struct GenerationResponse {
    data: Option<Vec<GeneratedAsset>>,
}

#[derive(Debug, Deserialize)]
struct GeneratedAsset {
    base64: Option<String>,
}

/// Client for the external text-to-image provider. One image per request,
/// square aspect ratio, low guidance; the style string is the only caller
/// influence beyond the prompt.
#[derive(Debug, Clone)]
pub struct GenerationClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl GenerationClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    /// Generates one image and returns its raw base64 payload, exactly as
    /// the provider produced it.
    pub async fn generate(
        &self,
        prompt: &str,
        style: Option<&str>,
    ) -> Result<String, GenerationError> {
        let response = self
            .client
            .post(format!("{}{TEXT_TO_IMAGE_PATH}", self.base_url))
            .header("x-freepik-api-key", &self.api_key)
            .json(&request_body(prompt, style))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Provider { status, body });
        }

        let payload: GenerationResponse = response.json().await?;
        first_image_base64(payload).ok_or(GenerationError::MissingImage)
    }
}

pub(crate) fn request_body(prompt: &str, style: Option<&str>) -> serde_json::Value {
    let style = style
        .map(str::trim)
        .filter(|style| !style.is_empty())
        .unwrap_or(DEFAULT_STYLE);
    json!({
        "guidance_scale": 1,
        "image": { "size": "square_1_1" },
        "num_images": 1,
        "prompt": prompt,
        "styling": { "style": style },
    })
}

fn first_image_base64(payload: GenerationResponse) -> Option<String> {
    payload
        .data
        .and_then(|assets| assets.into_iter().next())
        .and_then(|asset| asset.base64)
        .filter(|base64| !base64.is_empty())
}
