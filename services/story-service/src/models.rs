use serde::{Deserialize, Serialize};
use uuid::Uuid;

/* Story document, as produced by the story generator and stored in
 * stories.raw_payload. Field names stay camelCase on the wire so the
 * generator schema and the frontend payloads line up. */

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Story {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub synopsis: String,
    #[serde(default)]
    pub characters: Vec<Character>,
    #[serde(default)]
    pub environments: Vec<EnvironmentDef>,
    #[serde(default)]
    pub scenes: Vec<Scene>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Character {
    pub id: String,
    pub name: String,
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentDef {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scene {
    pub id: String,
    // "start" | "normal" | "ending"
    #[serde(rename = "type")]
    pub scene_type: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub scene_characters: Vec<String>,
    #[serde(default)]
    pub scene_environment: String,
    #[serde(default)]
    pub image_prompt: Option<String>,
    #[serde(default)]
    pub options: Vec<SceneOption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneOption {
    pub text: String,
    pub target_scene_id: String,
}

/* Story endpoints */

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartStoryRequest {
    pub title: String,
    pub character_name: String,
    pub environment: String,
    pub theme: String,
    // Historic frontend payloads spell this "objetive".
    #[serde(alias = "objetive")]
    pub objective: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartStoryResponse {
    pub success: bool,
    pub story: Story,
    pub images_ok: usize,
    pub images_failed: usize,
    pub meta: RequestMeta,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestMeta {
    pub request_id: String,
    pub took_ms: u64,
}

#[derive(Deserialize)]
pub struct UpsertStoryRequest {
    pub story: Story,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertStoryResponse {
    pub ok: bool,
    pub story_id: String,
}

#[derive(Deserialize)]
pub struct CardsRequest {
    pub from: Option<i64>,
    pub to: Option<i64>,
}

#[derive(Serialize)]
pub struct CardsResponse {
    pub ok: bool,
    pub items: Vec<StoryCard>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryCard {
    pub id: String,
    pub title: String,
    pub synopsis: Option<String>,
    pub cover_url: Option<String>,
    pub updated_at: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetStoryRequest {
    pub story_id: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GetStoryResponse {
    pub ok: bool,
    pub raw_payload: serde_json::Value,
}

#[derive(Serialize)]
pub struct TestStoryResponse {
    pub success: bool,
    pub story: &'static str,
}

/* Account endpoints */

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct ResetPasswordRequest {
    pub email: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePasswordRequest {
    pub new_password: String,
}

#[derive(Deserialize)]
pub struct VerifyEmailRequest {
    pub token: String,
}

#[derive(Deserialize)]
pub struct NewPasswordRequest {
    pub new_password: String,
    pub token_hash: String,
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub success: bool,
}

/// Raw provider payload from sign-up; its shape depends on whether email
/// confirmation is enabled, so it is passed through untouched.
#[derive(Serialize)]
pub struct RegisterResponse {
    pub success: bool,
    pub data: serde_json::Value,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<crate::identity::IdentityUser>,
    pub session: crate::identity::SessionTokens,
}

#[derive(Serialize)]
pub struct UserResponse {
    pub success: bool,
    pub user: crate::identity::IdentityUser,
}

#[derive(Serialize)]
pub struct MeResponse {
    pub success: bool,
    pub user: crate::identity::IdentityUser,
    pub config: FullConfig,
}

/* Config / parental-control endpoints */

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetAgeRequest {
    #[serde(alias = "age")]
    pub age_range: Option<i32>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgeRangeResponse {
    pub ok: bool,
    pub age_range: Option<i32>,
}

/// Themes arrive either as a JSON array or as a single CSV string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ThemesInput {
    List(Vec<String>),
    Csv(String),
}

#[derive(Deserialize)]
pub struct SetThemesRequest {
    pub themes: Option<ThemesInput>,
}

#[derive(Serialize)]
pub struct ThemesResponse {
    pub ok: bool,
    pub themes: Vec<String>,
}

#[derive(Serialize)]
pub struct ValidConfigResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<&'static str>,
    pub completed: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct FullConfig {
    pub child_age_range: Option<i32>,
    pub child_themes: Vec<String>,
    pub allowed_themes: Vec<String>,
    pub blocked_themes: Vec<String>,
    pub parent_pin: Option<String>,
    pub completed: bool,
}

#[derive(Serialize)]
pub struct FullConfigResponse {
    pub ok: bool,
    pub result: FullConfig,
}

#[derive(Deserialize)]
pub struct SetConfigRequest {
    #[serde(alias = "ageRange")]
    pub child_age_range: Option<i32>,
    #[serde(alias = "themes")]
    pub child_themes: Option<ThemesInput>,
    #[serde(alias = "allowed")]
    pub allowed_themes: Option<ThemesInput>,
    #[serde(alias = "blocked")]
    pub blocked_themes: Option<ThemesInput>,
    #[serde(alias = "pin")]
    pub parent_pin: Option<String>,
}

impl SetConfigRequest {
    pub fn is_empty(&self) -> bool {
        self.child_age_range.is_none()
            && self.child_themes.is_none()
            && self.allowed_themes.is_none()
            && self.blocked_themes.is_none()
            && self.parent_pin.is_none()
    }
}

#[derive(Deserialize)]
pub struct PinRequest {
    #[serde(alias = "newPin")]
    pub pin: String,
}

#[derive(Serialize)]
pub struct PinResponse {
    pub ok: bool,
}

/* Shared error body, one shape for every failing endpoint. */

#[derive(Serialize)]
pub struct ErrorResponse {
    pub code: &'static str,
    pub message: String,
}

/* Rows read back from the config table. */

#[derive(Debug, Clone, Default)]
pub struct ConfigRow {
    pub child_age_range: Option<i32>,
    pub child_themes: Option<String>,
    pub allowed_themes: Option<String>,
    pub blocked_themes: Option<String>,
    pub parent_pin: Option<String>,
}

#[derive(Debug, Clone)]
pub struct StoryRow {
    pub owner_id: Uuid,
    pub raw_payload: serde_json::Value,
}
