use std::sync::Arc;

use config::Config;
use db::DbService;
use services::services::{archive::ArchiveClient, generation::GenerationClient};

pub mod error;
pub mod http;
pub mod routes;

/// Process-wide handles, built once at startup and cloned into handlers.
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    db: DbService,
    generation: GenerationClient,
    archive: ArchiveClient,
}

impl AppState {
    pub fn new(config: Config, db: DbService) -> Self {
        let generation = GenerationClient::new(&config.freepik_api_url, &config.freepik_api_key);
        let archive = ArchiveClient::new(
            &config.cloudinary.base_url,
            &config.cloudinary.cloud_name,
            &config.cloudinary.api_key,
            &config.cloudinary.api_secret,
        );
        Self {
            config: Arc::new(config),
            db,
            generation,
            archive,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn db(&self) -> &DbService {
        &self.db
    }

    pub fn generation(&self) -> &GenerationClient {
        &self.generation
    }

    pub fn archive(&self) -> &ArchiveClient {
        &self.archive
    }

    /// Teardown hook for graceful shutdown.
    pub async fn shutdown(self) {
        if let Err(err) = self.db.close().await {
            tracing::warn!("Failed to close database connection: {err}");
        }
    }
}
