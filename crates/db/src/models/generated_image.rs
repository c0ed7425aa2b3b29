use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ConnectionTrait, DbErr, EntityTrait, PaginatorTrait, QueryOrder, QuerySelect,
    Set,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::generated_image;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedImage {
    pub id: Uuid,
    pub prompt: String,
    pub style: String,
    pub url: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateGeneratedImage {
    pub prompt: String,
    pub style: String,
    pub url: String,
    pub user_id: String,
}

/// Gallery projection. The row id and caller identity stay server-side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GalleryImage {
    pub style: String,
    pub url: String,
    pub prompt: String,
    pub created_at: DateTime<Utc>,
}

impl GeneratedImage {
    fn from_model(model: generated_image::Model) -> Self {
        Self {
            id: model.uuid,
            prompt: model.prompt,
            style: model.style,
            url: model.url,
            user_id: model.user_id,
            created_at: model.created_at,
        }
    }

    pub async fn create<C: ConnectionTrait>(
        db: &C,
        data: &CreateGeneratedImage,
    ) -> Result<Self, DbErr> {
        let active = generated_image::ActiveModel {
            uuid: Set(Uuid::new_v4()),
            prompt: Set(data.prompt.clone()),
            style: Set(data.style.clone()),
            url: Set(data.url.clone()),
            user_id: Set(data.user_id.clone()),
            created_at: Set(Utc::now()),
            ..Default::default()
        };
        let model = active.insert(db).await?;
        Ok(Self::from_model(model))
    }

    pub async fn count<C: ConnectionTrait>(db: &C) -> Result<u64, DbErr> {
        generated_image::Entity::find().count(db).await
    }

    /// One gallery page, newest first. Rows sharing a timestamp fall back to
    /// insertion order so repeated reads page identically.
    pub async fn page<C: ConnectionTrait>(
        db: &C,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<GalleryImage>, DbErr> {
        let rows = generated_image::Entity::find()
            .order_by_desc(generated_image::Column::CreatedAt)
            .order_by_desc(generated_image::Column::Id)
            .limit(limit)
            .offset(offset)
            .all(db)
            .await?;

        Ok(rows
            .into_iter()
            .map(|model| GalleryImage {
                style: model.style,
                url: model.url,
                prompt: model.prompt,
                created_at: model.created_at,
            })
            .collect())
    }
}
