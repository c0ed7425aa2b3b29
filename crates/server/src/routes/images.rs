use axum::{
    Json,
    extract::{Query, State},
};
use db::models::generated_image::{GalleryImage, GeneratedImage};
use serde::{Deserialize, Serialize};

use crate::{AppState, error::ApiError};

pub const PAGE_SIZE: u64 = 12;

#[derive(Debug, Deserialize)]
pub struct ImagesQuery {
    /// Kept as a raw string so `?page=abc` degrades to page 1 instead of a
    /// rejection.
    pub page: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImagesResponse {
    pub images: Vec<GalleryImage>,
    pub total_pages: u64,
    pub current_page: u64,
}

pub async fn list_images(
    State(state): State<AppState>,
    Query(query): Query<ImagesQuery>,
) -> Result<Json<ImagesResponse>, ApiError> {
    let page = parse_page(query.page.as_deref());
    let offset = (page - 1) * PAGE_SIZE;

    let total = GeneratedImage::count(&state.db().conn).await?;
    let images = GeneratedImage::page(&state.db().conn, PAGE_SIZE, offset).await?;

    Ok(Json(ImagesResponse {
        images,
        total_pages: total.div_ceil(PAGE_SIZE),
        current_page: page,
    }))
}

fn parse_page(raw: Option<&str>) -> u64 {
    raw.and_then(|value| value.trim().parse::<u64>().ok())
        .filter(|page| *page >= 1)
        .unwrap_or(1)
}
