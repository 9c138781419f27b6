mod ai;
mod app;
mod auth;
mod batch;
mod db;
mod handlers;
mod identity;
mod image;
mod models;
mod prompts;
mod service;
mod state;
mod storage;

use fabula_common::{bind_listener, env_or, init_tracing, shutdown_signal};
use tokio_postgres::NoTls;

use crate::ai::{StoryClient, StoryConfig};
use crate::identity::{IdentityClient, IdentityConfig};
use crate::image::{ImageClient, ImageConfig};
use crate::state::AppState;
use crate::storage::{StorageClient, StorageConfig};

#[tokio::main]
async fn main() {
    let _guards = init_tracing("story-service");

    let port = env_or("PORT", 8080u16);
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL is required");
    let image_concurrency = env_or("IMAGE_CONCURRENCY", 8usize).max(1);

    let identity = IdentityConfig::from_env()
        .and_then(IdentityClient::new)
        .expect("identity client");
    let story_ai = StoryConfig::from_env()
        .and_then(StoryClient::new)
        .expect("story client");
    let images = ImageConfig::from_env()
        .and_then(ImageClient::new)
        .expect("image client");
    let storage = build_storage().await;
    if storage.is_none() {
        tracing::warn!("object storage not configured, generated images will not be persisted");
    }

    let (db, connection) = tokio_postgres::connect(&database_url, NoTls)
        .await
        .expect("connect db");
    tokio::spawn(async move {
        // Drive the connection in the background.
        if let Err(err) = connection.await {
            tracing::error!(error = %err, "database connection error");
        }
    });

    let state = AppState {
        db: std::sync::Arc::new(tokio::sync::Mutex::new(db)),
        storage,
        identity: std::sync::Arc::new(identity),
        story_ai: std::sync::Arc::new(story_ai),
        images: std::sync::Arc::new(images),
        image_concurrency,
    };

    let app = app::build_router(state);
    let listener = bind_listener(port).await;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("serve");
}

async fn build_storage() -> Option<StorageClient> {
    let endpoint = std::env::var("STORAGE_ENDPOINT").ok()?;
    let access_key = std::env::var("STORAGE_ACCESS_KEY").ok()?;
    let secret_key = std::env::var("STORAGE_SECRET_KEY").ok()?;
    let bucket = std::env::var("STORAGE_BUCKET").unwrap_or_else(|_| "fabula-stories".to_string());
    let region = std::env::var("STORAGE_REGION").unwrap_or_else(|_| "us-east-1".to_string());
    let force_path_style = std::env::var("STORAGE_FORCE_PATH_STYLE")
        .ok()
        .map(|value| value != "0")
        .unwrap_or(true);
    let public_base = std::env::var("STORAGE_PUBLIC_BASE").ok();
    let config = StorageConfig {
        endpoint,
        access_key,
        secret_key,
        bucket,
        region,
        force_path_style,
        public_base,
    };
    match StorageClient::new(config).await {
        Ok(client) => Some(client),
        Err(err) => {
            tracing::warn!(error = %err, "storage client init failed");
            None
        }
    }
}
