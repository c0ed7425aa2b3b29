use std::env;

pub const DEFAULT_PORT: u16 = 4000;
pub const DEFAULT_DATABASE_URL: &str = "sqlite://./data/artforge.sqlite?mode=rwc";
pub const FREEPIK_API_URL: &str = "https://api.freepik.com";
pub const CLOUDINARY_API_URL: &str = "https://api.cloudinary.com";

/// Keys the server cannot do useful work without. Absence is logged at
/// startup but never aborts it: the process still serves the health check
/// and the gallery, matching the degraded behavior of missing provider
/// credentials.
const REQUIRED_KEYS: &[&str] = &[
    "CLOUDINARY_CLOUD_NAME",
    "CLOUDINARY_API_KEY",
    "CLOUDINARY_API_SECRET",
    "FREEPIK_API_KEY",
    "DATABASE_URL",
    "AUTH_JWT_SECRET",
];

#[derive(Debug, Clone)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
    /// Overridable so tests can point uploads at a local fake.
    pub base_url: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub allowed_origins: Vec<String>,
    pub database_url: String,
    pub port: u16,
    pub auth_jwt_secret: String,
    pub freepik_api_key: String,
    pub freepik_api_url: String,
    pub cloudinary: CloudinaryConfig,
}

impl Config {
    /// Loads configuration from the process environment, reading a `.env`
    /// file first when one is present.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        for key in REQUIRED_KEYS {
            if env_non_empty(key).is_none() {
                tracing::warn!("{key} not set");
            }
        }

        Self {
            allowed_origins: parse_origins(&env_non_empty("ALLOWED_ORIGINS").unwrap_or_default()),
            database_url: env_non_empty("DATABASE_URL")
                .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            port: parse_port(env_non_empty("PORT").as_deref()),
            auth_jwt_secret: env_non_empty("AUTH_JWT_SECRET").unwrap_or_default(),
            freepik_api_key: env_non_empty("FREEPIK_API_KEY").unwrap_or_default(),
            freepik_api_url: env_non_empty("FREEPIK_API_URL")
                .unwrap_or_else(|| FREEPIK_API_URL.to_string()),
            cloudinary: CloudinaryConfig {
                cloud_name: env_non_empty("CLOUDINARY_CLOUD_NAME").unwrap_or_default(),
                api_key: env_non_empty("CLOUDINARY_API_KEY").unwrap_or_default(),
                api_secret: env_non_empty("CLOUDINARY_API_SECRET").unwrap_or_default(),
                base_url: env_non_empty("CLOUDINARY_API_URL")
                    .unwrap_or_else(|| CLOUDINARY_API_URL.to_string()),
            },
        }
    }
}

fn env_non_empty(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(|origin| origin.trim_end_matches('/').to_string())
        .collect()
}

fn parse_port(raw: Option<&str>) -> u16 {
    match raw.and_then(|value| value.trim().parse::<u16>().ok()) {
        Some(port) => port,
        None => {
            if raw.is_some() {
                tracing::warn!("Invalid PORT value; using default {DEFAULT_PORT}");
            }
            DEFAULT_PORT
        }
    }
}
