use std::time::{Duration, Instant};

use fabula_common::{env_csv, env_or, snippet};
use serde::Deserialize;

use crate::batch::{ItemResult, WorkItem, IMAGE_MIME_PNG};
use crate::prompts;

// Pinned to the official endpoint; a stray base-URL override in the
// environment must not be able to break request paths.
const IMAGE_API_BASE_URL: &str = "https://api.openai.com/v1";

const PROMPT_PREVIEW_CHARS: usize = 160;

#[derive(Clone)]
pub struct ImageConfig {
    /// Always `IMAGE_API_BASE_URL` in production; `from_env` deliberately
    /// offers no override. Only tests point this elsewhere.
    pub base_url: String,
    pub api_key: String,
    /// Models tried in order against the responses API before falling back.
    pub primary_models: Vec<String>,
    /// Model used by the images API fallback path.
    pub fallback_model: String,
    pub size: String,
    pub request_timeout_secs: u64,
}

impl ImageConfig {
    pub fn from_env() -> Result<Self, String> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| "OPENAI_API_KEY is required".to_string())?;
        Ok(Self {
            base_url: IMAGE_API_BASE_URL.to_string(),
            api_key,
            primary_models: env_csv("IMAGE_PRIMARY_MODELS", &["gpt-5", "gpt-4o"]),
            fallback_model: std::env::var("OPENAI_IMAGE_MODEL")
                .unwrap_or_else(|_| "gpt-image-1".to_string()),
            size: std::env::var("IMAGE_SIZE").unwrap_or_else(|_| "1024x768".to_string()),
            request_timeout_secs: env_or("IMAGE_REQUEST_TIMEOUT_SECS", 120u64),
        })
    }
}

#[derive(Clone)]
pub struct ImageClient {
    http: reqwest::Client,
    config: ImageConfig,
}

#[derive(Deserialize)]
struct ResponsesBody {
    #[serde(default)]
    output: Vec<ResponsesOutput>,
}

#[derive(Deserialize)]
struct ResponsesOutput {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    result: Option<String>,
}

#[derive(Deserialize)]
struct ImagesBody {
    #[serde(default)]
    data: Vec<ImagesDatum>,
}

#[derive(Deserialize)]
struct ImagesDatum {
    #[serde(default)]
    b64_json: Option<String>,
}

impl ImageClient {
    pub fn new(config: ImageConfig) -> Result<Self, String> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|err| format!("image http client build failed: {err}"))?;
        Ok(Self { http, config })
    }

    /// Full per-scene chain: local validation, then each primary model via the
    /// responses API, then exactly one images-API fallback. Never returns an
    /// error; every failure mode collapses into `ItemResult::Failure`.
    pub async fn generate_scene(&self, item: WorkItem, batch_id: &str) -> ItemResult {
        let scene_id = item.id;
        let prompt = item.prompt;

        if prompt.trim().is_empty() {
            return ItemResult::Failure {
                id: scene_id,
                error: "image prompt missing".to_string(),
            };
        }
        if !prompts::has_header_template(&prompt) {
            tracing::warn!(
                batch_id,
                scene_id = scene_id.as_str(),
                prompt_preview = snippet(&prompt, PROMPT_PREVIEW_CHARS).as_str(),
                "image prompt lacks required header sections"
            );
            return ItemResult::Failure {
                id: scene_id,
                error: "image prompt lacks required header sections".to_string(),
            };
        }

        let started = Instant::now();
        let mut last_primary_error: Option<String> = None;

        for model in &self.config.primary_models {
            let attempt_started = Instant::now();
            tracing::info!(
                batch_id,
                scene_id = scene_id.as_str(),
                model = model.as_str(),
                prompt_preview = snippet(&prompt, PROMPT_PREVIEW_CHARS).as_str(),
                "responses api attempt"
            );
            match self.generate_with_responses(&prompt, model).await {
                Ok(b64) => {
                    tracing::info!(
                        batch_id,
                        scene_id = scene_id.as_str(),
                        model = model.as_str(),
                        took_ms = started.elapsed().as_millis() as u64,
                        b64_len = b64.len(),
                        "image generated via responses api"
                    );
                    return ItemResult::Success {
                        id: scene_id,
                        b64,
                        mime: IMAGE_MIME_PNG,
                    };
                }
                Err(err) => {
                    tracing::warn!(
                        batch_id,
                        scene_id = scene_id.as_str(),
                        model = model.as_str(),
                        took_ms = attempt_started.elapsed().as_millis() as u64,
                        error = err.as_str(),
                        "responses api attempt failed"
                    );
                    last_primary_error = Some(format!("responses api ({model}): {err}"));
                }
            }
        }

        let fallback_started = Instant::now();
        tracing::info!(
            batch_id,
            scene_id = scene_id.as_str(),
            model = self.config.fallback_model.as_str(),
            size = self.config.size.as_str(),
            "images api fallback attempt"
        );
        match self.generate_with_images_api(&prompt).await {
            Ok(b64) => {
                tracing::info!(
                    batch_id,
                    scene_id = scene_id.as_str(),
                    model = self.config.fallback_model.as_str(),
                    took_ms = started.elapsed().as_millis() as u64,
                    b64_len = b64.len(),
                    "image generated via images api fallback"
                );
                ItemResult::Success {
                    id: scene_id,
                    b64,
                    mime: IMAGE_MIME_PNG,
                }
            }
            Err(fallback_error) => {
                tracing::error!(
                    batch_id,
                    scene_id = scene_id.as_str(),
                    took_ms = fallback_started.elapsed().as_millis() as u64,
                    error = fallback_error.as_str(),
                    "images api fallback failed"
                );
                let error = match last_primary_error {
                    Some(primary) => format!("{primary}; images api: {fallback_error}"),
                    None => format!("images api: {fallback_error}"),
                };
                ItemResult::Failure {
                    id: scene_id,
                    error,
                }
            }
        }
    }

    /// Primary path: responses API with the image_generation tool. The first
    /// image_generation_call output carries the base64 payload.
    async fn generate_with_responses(&self, prompt: &str, model: &str) -> Result<String, String> {
        let url = format!("{}/responses", self.config.base_url);
        let body = serde_json::json!({
            "model": model,
            "input": prompt,
            "tools": [{ "type": "image_generation" }],
        });

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|err| format!("request failed: {err}"))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(format!("status {status}: {}", snippet(&text, 200)));
        }

        let parsed: ResponsesBody = response
            .json()
            .await
            .map_err(|err| format!("malformed response body: {err}"))?;

        parsed
            .output
            .into_iter()
            .filter(|output| output.kind == "image_generation_call")
            .filter_map(|output| output.result)
            .find(|b64| !b64.is_empty())
            .ok_or_else(|| "response contained no image output".to_string())
    }

    /// Fallback path: the plain images API with base64 output.
    async fn generate_with_images_api(&self, prompt: &str) -> Result<String, String> {
        let url = format!("{}/images/generations", self.config.base_url);
        let body = serde_json::json!({
            "model": self.config.fallback_model,
            "prompt": prompt,
            "size": self.config.size,
            "response_format": "b64_json",
        });

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|err| format!("request failed: {err}"))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(format!("status {status}: {}", snippet(&text, 200)));
        }

        let parsed: ImagesBody = response
            .json()
            .await
            .map_err(|err| format!("malformed response body: {err}"))?;

        parsed
            .data
            .into_iter()
            .filter_map(|datum| datum.b64_json)
            .find(|b64| !b64.is_empty())
            .ok_or_else(|| "images api returned no b64_json payload".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};

    use crate::batch::run_batch;

    fn client() -> ImageClient {
        client_with_base(IMAGE_API_BASE_URL.to_string(), vec!["gpt-5".to_string()])
    }

    fn client_with_base(base_url: String, primary_models: Vec<String>) -> ImageClient {
        ImageClient::new(ImageConfig {
            base_url,
            api_key: "test-key".to_string(),
            primary_models,
            fallback_model: "gpt-image-1".to_string(),
            size: "1024x768".to_string(),
            request_timeout_secs: 5,
        })
        .expect("client")
    }

    fn headered_prompt(scene: &str) -> String {
        format!("{}\n{scene}", crate::prompts::IMAGE_PROMPT_HEADER_TEMPLATE)
    }

    async fn spawn_stub(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind stub");
        let addr = listener.local_addr().expect("stub addr");
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });
        format!("http://{addr}/v1")
    }

    fn counting_failure(hits: Arc<AtomicUsize>) -> axum::routing::MethodRouter {
        post(move || {
            let hits = Arc::clone(&hits);
            async move {
                hits.fetch_add(1, Ordering::SeqCst);
                (StatusCode::INTERNAL_SERVER_ERROR, "provider down")
            }
        })
    }

    #[tokio::test]
    async fn fallback_serves_every_item_when_primary_is_down() {
        let responses_hits = Arc::new(AtomicUsize::new(0));
        let images_hits = Arc::new(AtomicUsize::new(0));
        let images_counter = Arc::clone(&images_hits);
        let router = Router::new()
            .route("/v1/responses", counting_failure(Arc::clone(&responses_hits)))
            .route(
                "/v1/images/generations",
                post(move || {
                    let hits = Arc::clone(&images_counter);
                    async move {
                        hits.fetch_add(1, Ordering::SeqCst);
                        Json(serde_json::json!({ "data": [{ "b64_json": "aGVsbG8=" }] }))
                    }
                }),
            );
        let base = spawn_stub(router).await;
        let client = client_with_base(base, vec!["gpt-5".to_string(), "gpt-4o".to_string()]);

        let items: Vec<WorkItem> = (0..3)
            .map(|index| WorkItem {
                id: format!("s{index}"),
                prompt: headered_prompt("a fox crossing a river"),
            })
            .collect();
        let worker_client = client.clone();
        let outcome = run_batch(
            items,
            2,
            move |item| {
                let client = worker_client.clone();
                async move { client.generate_scene(item, "stub-batch").await }
            },
            |_, _| {},
        )
        .await;

        assert_eq!(outcome.succeeded, 3);
        assert_eq!(outcome.failed, 0);
        for result in &outcome.results {
            match result {
                ItemResult::Success { b64, mime, .. } => {
                    assert_eq!(b64, "aGVsbG8=");
                    assert_eq!(*mime, IMAGE_MIME_PNG);
                }
                ItemResult::Failure { error, .. } => panic!("unexpected failure: {error}"),
            }
        }
        // Both primary models were tried for every item before the fallback.
        assert_eq!(responses_hits.load(Ordering::SeqCst), 6);
        assert_eq!(images_hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausted_chain_reports_primary_and_fallback_errors() {
        let responses_hits = Arc::new(AtomicUsize::new(0));
        let images_hits = Arc::new(AtomicUsize::new(0));
        let router = Router::new()
            .route("/v1/responses", counting_failure(Arc::clone(&responses_hits)))
            .route(
                "/v1/images/generations",
                counting_failure(Arc::clone(&images_hits)),
            );
        let base = spawn_stub(router).await;
        let client = client_with_base(base, vec!["gpt-5".to_string()]);

        let result = client
            .generate_scene(
                WorkItem {
                    id: "s9".to_string(),
                    prompt: headered_prompt("a storm over the castle"),
                },
                "stub-batch",
            )
            .await;

        match result {
            ItemResult::Failure { id, error } => {
                assert_eq!(id, "s9");
                assert!(error.contains("responses api (gpt-5)"), "error: {error}");
                assert!(error.contains("images api:"), "error: {error}");
            }
            ItemResult::Success { .. } => panic!("expected exhaustion failure"),
        }
        assert_eq!(responses_hits.load(Ordering::SeqCst), 1);
        assert_eq!(images_hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn missing_prompt_short_circuits_before_any_call() {
        let result = client()
            .generate_scene(
                WorkItem {
                    id: "s1".to_string(),
                    prompt: "   ".to_string(),
                },
                "batch-test",
            )
            .await;
        match result {
            ItemResult::Failure { id, error } => {
                assert_eq!(id, "s1");
                assert_eq!(error, "image prompt missing");
            }
            ItemResult::Success { .. } => panic!("expected failure"),
        }
    }

    #[tokio::test]
    async fn prompt_without_header_short_circuits_before_any_call() {
        let result = client()
            .generate_scene(
                WorkItem {
                    id: "s2".to_string(),
                    prompt: "a fox on a hill".to_string(),
                },
                "batch-test",
            )
            .await;
        match result {
            ItemResult::Failure { id, error } => {
                assert_eq!(id, "s2");
                assert!(error.contains("header"));
            }
            ItemResult::Success { .. } => panic!("expected failure"),
        }
    }

    #[test]
    fn responses_body_extracts_first_image_call() {
        let raw = r#"{
            "output": [
                { "type": "message" },
                { "type": "image_generation_call", "result": "aGVsbG8=" },
                { "type": "image_generation_call", "result": "c2Vjb25k" }
            ]
        }"#;
        let parsed: ResponsesBody = serde_json::from_str(raw).expect("parse");
        let first = parsed
            .output
            .into_iter()
            .filter(|output| output.kind == "image_generation_call")
            .filter_map(|output| output.result)
            .find(|b64| !b64.is_empty());
        assert_eq!(first.as_deref(), Some("aGVsbG8="));
    }
}
