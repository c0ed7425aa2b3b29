use axum::{Extension, Json, extract::State};
use db::{
    DbService,
    models::generated_image::{CreateGeneratedImage, GeneratedImage},
};
use serde::{Deserialize, Serialize};
use services::services::{archive::ArchiveClient, generation::DEFAULT_STYLE};

use crate::{AppState, error::ApiError, http::AuthUser};

/// Sentinel recorded when the verified credential resolved no caller id.
pub const UNKNOWN_USER: &str = "no-user";

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    pub prompt: Option<String>,
    pub style: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub image: String,
}

pub async fn generate_image(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<GenerateRequest>,
) -> Result<Json<GenerateResponse>, ApiError> {
    let prompt = payload
        .prompt
        .as_deref()
        .map(str::trim)
        .filter(|prompt| !prompt.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Prompt is required".to_string()))?
        .to_string();

    let base64 = state
        .generation()
        .generate(&prompt, payload.style.as_deref())
        .await?;

    let style = payload
        .style
        .as_deref()
        .map(str::trim)
        .filter(|style| !style.is_empty())
        .unwrap_or(DEFAULT_STYLE)
        .to_string();
    let record = CreateGeneratedImage {
        prompt,
        style,
        url: String::new(),
        user_id: user.id.unwrap_or_else(|| UNKNOWN_USER.to_string()),
    };

    // The caller gets the image now; archival and the gallery row are
    // best-effort and never block or fail the response.
    tokio::spawn(archive_and_record(
        state.archive().clone(),
        state.db().clone(),
        base64.clone(),
        record,
    ));

    Ok(Json(GenerateResponse {
        image: format!("data:image/png;base64,{base64}"),
    }))
}

/// Uploads the image to durable storage, then records the generation. An
/// upload failure means no row: the gallery only ever references archived
/// URLs, at the cost of a gap between what the caller saw and what the
/// gallery lists.
async fn archive_and_record(
    archive: ArchiveClient,
    db: DbService,
    base64: String,
    mut record: CreateGeneratedImage,
) {
    match archive.upload_base64_png(&base64).await {
        Ok(url) => {
            record.url = url;
            if let Err(err) = GeneratedImage::create(&db.conn, &record).await {
                tracing::error!(
                    error = %err,
                    prompt = %record.prompt,
                    "Failed to record generation"
                );
            }
        }
        Err(err) => {
            tracing::error!(
                error = %err,
                prompt = %record.prompt,
                "Archive upload failed; generation not recorded"
            );
        }
    }
}
