use std::time::{Duration, Instant};

use fabula_common::{env_or, snippet};
use serde::Deserialize;

use crate::models::{StartStoryRequest, Story};
use crate::prompts;

#[derive(Clone)]
pub struct StoryConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    /// Language the story text is written in.
    pub language: String,
    pub request_timeout_secs: u64,
}

impl StoryConfig {
    pub fn from_env() -> Result<Self, String> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .map_err(|_| "GEMINI_API_KEY is required".to_string())?;
        Ok(Self {
            base_url: std::env::var("GEMINI_BASE_URL")
                .unwrap_or_else(|_| "https://generativelanguage.googleapis.com".to_string()),
            api_key,
            model: std::env::var("STORY_MODEL").unwrap_or_else(|_| "gemini-2.0-flash".to_string()),
            language: std::env::var("STORY_LANGUAGE").unwrap_or_else(|_| "Spanish".to_string()),
            request_timeout_secs: env_or("STORY_REQUEST_TIMEOUT_SECS", 120u64),
        })
    }
}

#[derive(Clone)]
pub struct StoryClient {
    http: reqwest::Client,
    config: StoryConfig,
}

#[derive(Deserialize)]
struct GenerateContentBody {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

impl StoryClient {
    pub fn new(config: StoryConfig) -> Result<Self, String> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|err| format!("story http client build failed: {err}"))?;
        Ok(Self { http, config })
    }

    /// Asks the generator for a full branching story constrained by the JSON
    /// response schema, then parses the returned text into a `Story`.
    pub async fn generate_story(&self, params: &StartStoryRequest) -> Result<Story, String> {
        let prompt = prompts::build_story_prompt(params, &self.config.language);
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url, self.config.model
        );
        let body = serde_json::json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": prompts::story_response_schema(),
            },
        });

        let started = Instant::now();
        let response = self
            .http
            .post(&url)
            .query(&[("key", self.config.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|err| format!("request failed: {err}"))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(format!("status {status}: {}", snippet(&text, 200)));
        }

        let parsed: GenerateContentBody = response
            .json()
            .await
            .map_err(|err| format!("malformed response body: {err}"))?;

        let text = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .and_then(|content| content.parts.into_iter().next())
            .and_then(|part| part.text)
            .ok_or_else(|| "generator returned no candidates".to_string())?;

        let story: Story = serde_json::from_str(&text)
            .map_err(|err| format!("story payload did not match schema: {err}"))?;

        tracing::info!(
            model = self.config.model.as_str(),
            took_ms = started.elapsed().as_millis() as u64,
            scenes = story.scenes.len(),
            characters = story.characters.len(),
            "story generated"
        );
        Ok(story)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidate_text_parses_into_story() {
        let raw = r#"{
            "candidates": [{
                "content": { "parts": [{ "text": "{\"id\":\"st-1\",\"title\":\"T\",\"synopsis\":\"S\",\"characters\":[],\"environments\":[],\"scenes\":[{\"id\":\"s1\",\"type\":\"start\",\"content\":\"c\",\"sceneCharacters\":[\"main_character\"],\"sceneEnvironment\":\"main_environment\",\"imagePrompt\":\"p\",\"options\":[]}]}" }] }
            }]
        }"#;
        let parsed: GenerateContentBody = serde_json::from_str(raw).expect("body");
        let text = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .and_then(|content| content.parts.into_iter().next())
            .and_then(|part| part.text)
            .expect("text");
        let story: Story = serde_json::from_str(&text).expect("story");
        assert_eq!(story.id, "st-1");
        assert_eq!(story.scenes.len(), 1);
        assert_eq!(story.scenes[0].scene_type, "start");
    }
}
