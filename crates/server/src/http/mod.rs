use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware::from_fn_with_state,
    routing::{get, post},
};
use config::Config;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::{AppState, routes};

mod auth;

pub use auth::AuthUser;

pub fn router(state: AppState) -> Router {
    let generate_routes = Router::new()
        .route("/generate", post(routes::generate::generate_image))
        .layer(from_fn_with_state(state.clone(), auth::require_auth));

    Router::new()
        .route("/", get(routes::health::health_check))
        .route("/images", get(routes::images::list_images))
        .merge(generate_routes)
        .layer(cors_layer(state.config()))
        .with_state(state)
}

fn cors_layer(config: &Config) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| origin.parse::<HeaderValue>().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    use axum::{
        Json, Router,
        body::{Body, to_bytes},
        http::{Request, StatusCode, header},
        routing::post,
    };
    use chrono::{Duration, Utc};
    use config::{CloudinaryConfig, Config};
    use db::{DbService, entities::generated_image, models::generated_image::GeneratedImage};
    use sea_orm::{ActiveModelTrait, EntityTrait, Set};
    use serde_json::json;
    use tower::ServiceExt;
    use uuid::Uuid;

    use crate::AppState;

    const SECRET: &str = "test-secret";
    const PNG_B64: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mP8z8BQDwAEhQGAhKmMIQAAAABJRU5ErkJggg==";

    /// Minimal stand-in for an external provider: serves one canned JSON
    /// response on any POST and counts how often it was hit.
    async fn spawn_provider(
        status: StatusCode,
        body: serde_json::Value,
    ) -> (String, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let app = Router::new().route(
            "/{*path}",
            post(move || {
                let counter = counter.clone();
                let body = body.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    (status, Json(body))
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}"), hits)
    }

    async fn setup(provider_url: &str, storage_url: &str) -> (AppState, Router) {
        let db_path =
            std::env::temp_dir().join(format!("artforge-http-{}.sqlite", Uuid::new_v4()));
        let database_url = format!("sqlite://{}?mode=rwc", db_path.to_string_lossy());
        let db = DbService::connect(&database_url).await.unwrap();
        let config = Config {
            allowed_origins: vec!["http://localhost:5173".to_string()],
            database_url,
            port: 0,
            auth_jwt_secret: SECRET.to_string(),
            freepik_api_key: "test-key".to_string(),
            freepik_api_url: provider_url.to_string(),
            cloudinary: CloudinaryConfig {
                cloud_name: "test-cloud".to_string(),
                api_key: "cloud-key".to_string(),
                api_secret: "cloud-secret".to_string(),
                base_url: storage_url.to_string(),
            },
        };
        let state = AppState::new(config, db);
        let router = super::router(state.clone());
        (state, router)
    }

    fn bearer(subject: Option<&str>) -> String {
        format!(
            "Bearer {}",
            utils_jwt::sign(subject, SECRET, Duration::minutes(5)).unwrap()
        )
    }

    fn generate_request(auth: Option<&str>, body: serde_json::Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/generate")
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(auth) = auth {
            builder = builder.header(header::AUTHORIZATION, auth);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn wait_for_rows(db: &DbService, expected: u64) {
        for _ in 0..100 {
            if GeneratedImage::count(&db.conn).await.unwrap() == expected {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        panic!("timed out waiting for {expected} gallery rows");
    }

    async fn seed_row(db: &DbService, prompt: &str, created_at: chrono::DateTime<Utc>) {
        let active = generated_image::ActiveModel {
            uuid: Set(Uuid::new_v4()),
            prompt: Set(prompt.to_string()),
            style: Set("photo".to_string()),
            url: Set(format!("https://res.example.com/ml-results/{prompt}.png")),
            user_id: Set("user_seed".to_string()),
            created_at: Set(created_at),
            ..Default::default()
        };
        active.insert(&db.conn).await.unwrap();
    }

    #[tokio::test]
    async fn health_check_is_public() {
        let (provider_url, _) = spawn_provider(StatusCode::OK, json!({})).await;
        let (_state, app) = setup(&provider_url, &provider_url).await;

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"OK");
    }

    #[tokio::test]
    async fn generate_without_token_is_rejected_before_any_provider_call() {
        let (provider_url, hits) =
            spawn_provider(StatusCode::OK, json!({"data": [{"base64": PNG_B64}]})).await;
        let (_state, app) = setup(&provider_url, &provider_url).await;

        let response = app
            .oneshot(generate_request(None, json!({"prompt": "a red fox in snow"})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await["error"], "Unauthorized");
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn generate_with_invalid_token_is_rejected() {
        let (provider_url, hits) =
            spawn_provider(StatusCode::OK, json!({"data": [{"base64": PNG_B64}]})).await;
        let (_state, app) = setup(&provider_url, &provider_url).await;

        let forged = utils_jwt::sign(Some("user_2x9a"), "other-secret", Duration::minutes(5))
            .unwrap();
        let response = app
            .oneshot(generate_request(
                Some(&format!("Bearer {forged}")),
                json!({"prompt": "a red fox in snow"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn generate_rejects_missing_or_blank_prompt() {
        let (provider_url, hits) =
            spawn_provider(StatusCode::OK, json!({"data": [{"base64": PNG_B64}]})).await;
        let (_state, app) = setup(&provider_url, &provider_url).await;
        let auth = bearer(Some("user_2x9a"));

        for body in [json!({}), json!({"prompt": "   "}), json!({"style": "anime"})] {
            let response = app
                .clone()
                .oneshot(generate_request(Some(&auth), body))
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            assert_eq!(json_body(response).await["error"], "Prompt is required");
        }
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn generate_forwards_image_and_records_row() {
        let (provider_url, provider_hits) =
            spawn_provider(StatusCode::OK, json!({"data": [{"base64": PNG_B64}]})).await;
        let (storage_url, _) = spawn_provider(
            StatusCode::OK,
            json!({"secure_url": "https://res.example.com/ml-results/fox.png"}),
        )
        .await;
        let (state, app) = setup(&provider_url, &storage_url).await;

        let response = app
            .oneshot(generate_request(
                Some(&bearer(Some("user_2x9a"))),
                json!({"prompt": "A red fox in snow"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            json_body(response).await["image"],
            format!("data:image/png;base64,{PNG_B64}")
        );
        assert_eq!(provider_hits.load(Ordering::SeqCst), 1);

        wait_for_rows(state.db(), 1).await;
        let rows = generated_image::Entity::find()
            .all(&state.db().conn)
            .await
            .unwrap();
        assert_eq!(rows[0].prompt, "A red fox in snow");
        assert_eq!(rows[0].style, "cartoon");
        assert_eq!(rows[0].user_id, "user_2x9a");
        assert_eq!(rows[0].url, "https://res.example.com/ml-results/fox.png");
    }

    #[tokio::test]
    async fn generate_records_sentinel_for_subjectless_token() {
        let (provider_url, _) =
            spawn_provider(StatusCode::OK, json!({"data": [{"base64": PNG_B64}]})).await;
        let (storage_url, _) = spawn_provider(
            StatusCode::OK,
            json!({"secure_url": "https://res.example.com/ml-results/fox.png"}),
        )
        .await;
        let (state, app) = setup(&provider_url, &storage_url).await;

        let response = app
            .oneshot(generate_request(
                Some(&bearer(None)),
                json!({"prompt": "A red fox in snow", "style": "anime"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        wait_for_rows(state.db(), 1).await;
        let rows = generated_image::Entity::find()
            .all(&state.db().conn)
            .await
            .unwrap();
        assert_eq!(rows[0].user_id, "no-user");
        assert_eq!(rows[0].style, "anime");
    }

    #[tokio::test]
    async fn generate_surfaces_provider_failure_as_500_without_row() {
        let (provider_url, _) =
            spawn_provider(StatusCode::BAD_GATEWAY, json!({"detail": "upstream down"})).await;
        let (storage_url, storage_hits) = spawn_provider(StatusCode::OK, json!({})).await;
        let (state, app) = setup(&provider_url, &storage_url).await;

        let response = app
            .oneshot(generate_request(
                Some(&bearer(Some("user_2x9a"))),
                json!({"prompt": "A red fox in snow"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json_body(response).await["error"], "Failed to generate image");
        assert_eq!(storage_hits.load(Ordering::SeqCst), 0);
        assert_eq!(GeneratedImage::count(&state.db().conn).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn generate_surfaces_malformed_provider_response_as_500() {
        let (provider_url, _) = spawn_provider(StatusCode::OK, json!({"data": []})).await;
        let (_state, app) = setup(&provider_url, &provider_url).await;

        let response = app
            .oneshot(generate_request(
                Some(&bearer(Some("user_2x9a"))),
                json!({"prompt": "A red fox in snow"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            json_body(response).await["error"],
            "Image generation failed"
        );
    }

    #[tokio::test]
    async fn failed_upload_leaves_no_gallery_row() {
        let (provider_url, _) =
            spawn_provider(StatusCode::OK, json!({"data": [{"base64": PNG_B64}]})).await;
        let (storage_url, storage_hits) =
            spawn_provider(StatusCode::INTERNAL_SERVER_ERROR, json!({})).await;
        let (state, app) = setup(&provider_url, &storage_url).await;

        let response = app
            .oneshot(generate_request(
                Some(&bearer(Some("user_2x9a"))),
                json!({"prompt": "A red fox in snow"}),
            ))
            .await
            .unwrap();

        // The caller still got the image; only the gallery misses out.
        assert_eq!(response.status(), StatusCode::OK);

        for _ in 0..100 {
            if storage_hits.load(Ordering::SeqCst) > 0 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(GeneratedImage::count(&state.db().conn).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn gallery_paginates_newest_first() {
        let (provider_url, _) = spawn_provider(StatusCode::OK, json!({})).await;
        let (state, app) = setup(&provider_url, &provider_url).await;
        let base = Utc::now();
        for i in 0..15 {
            seed_row(state.db(), &format!("prompt-{i}"), base + Duration::seconds(i)).await;
        }

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/images").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["totalPages"], 2);
        assert_eq!(body["currentPage"], 1);
        let images = body["images"].as_array().unwrap();
        assert_eq!(images.len(), 12);
        assert_eq!(images[0]["prompt"], "prompt-14");
        assert_eq!(images[11]["prompt"], "prompt-3");

        // Caller identity never leaves the server.
        let keys: Vec<&String> = images[0].as_object().unwrap().keys().collect();
        assert_eq!(keys.len(), 4);
        assert!(images[0].get("userId").is_none());
        assert!(images[0].get("createdAt").is_some());

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/images?page=2")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let body = json_body(response).await;
        assert_eq!(body["currentPage"], 2);
        let images = body["images"].as_array().unwrap();
        let prompts: Vec<_> = images.iter().map(|row| row["prompt"].clone()).collect();
        assert_eq!(prompts, vec!["prompt-2", "prompt-1", "prompt-0"]);
    }

    #[tokio::test]
    async fn gallery_page_falls_back_to_one() {
        let (provider_url, _) = spawn_provider(StatusCode::OK, json!({})).await;
        let (state, app) = setup(&provider_url, &provider_url).await;
        seed_row(state.db(), "solo", Utc::now()).await;

        for uri in ["/images?page=0", "/images?page=abc", "/images"] {
            let response = app
                .clone()
                .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            let body = json_body(response).await;
            assert_eq!(body["currentPage"], 1, "uri: {uri}");
            assert_eq!(body["totalPages"], 1, "uri: {uri}");
            assert_eq!(body["images"].as_array().unwrap().len(), 1, "uri: {uri}");
        }
    }

    #[tokio::test]
    async fn gallery_reads_are_idempotent() {
        let (provider_url, _) = spawn_provider(StatusCode::OK, json!({})).await;
        let (state, app) = setup(&provider_url, &provider_url).await;
        let now = Utc::now();
        for i in 0..3 {
            seed_row(state.db(), &format!("tied-{i}"), now).await;
        }

        let first = json_body(
            app.clone()
                .oneshot(Request::builder().uri("/images?page=1").body(Body::empty()).unwrap())
                .await
                .unwrap(),
        )
        .await;
        let second = json_body(
            app.clone()
                .oneshot(Request::builder().uri("/images?page=1").body(Body::empty()).unwrap())
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(first, second);
    }
}
