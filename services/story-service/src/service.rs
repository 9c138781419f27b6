use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use base64::Engine as _;
use uuid::Uuid;

use crate::batch::{self, ItemResult, WorkItem};
use crate::db;
use crate::identity::{IdentityError, IdentityUser};
use crate::models::{
    AgeRangeResponse, CardsRequest, CardsResponse, ConfigRow, ErrorResponse, FullConfig,
    FullConfigResponse, GetStoryRequest, GetStoryResponse, LoginRequest, LoginResponse,
    MeResponse, NewPasswordRequest, PinRequest, PinResponse, RegisterRequest, RegisterResponse,
    RequestMeta, ResetPasswordRequest, Scene, SetAgeRequest, SetConfigRequest, SetThemesRequest,
    StartStoryRequest, StartStoryResponse, StatusResponse, Story, ThemesInput, ThemesResponse,
    UpdatePasswordRequest, UpsertStoryRequest, UpsertStoryResponse, UserResponse,
    ValidConfigResponse, VerifyEmailRequest,
};
use crate::state::AppState;
use crate::storage;

pub struct ServiceError {
    pub status: StatusCode,
    pub body: ErrorResponse,
}

impl ServiceError {
    pub fn new(status: StatusCode, code: &'static str, message: String) -> Self {
        Self {
            status,
            body: ErrorResponse { code, message },
        }
    }

    pub fn unauthorized(message: &str) -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            "unauthorized",
            message.to_string(),
        )
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

fn identity_error(err: IdentityError) -> ServiceError {
    tracing::warn!(
        status = err.status,
        error = err.message.as_str(),
        "identity provider error"
    );
    let status = if err.is_client_error() {
        StatusCode::from_u16(err.status).unwrap_or(StatusCode::BAD_REQUEST)
    } else {
        StatusCode::BAD_GATEWAY
    };
    ServiceError::new(status, "identity_error", err.message)
}

fn db_error(err: String) -> ServiceError {
    tracing::error!(error = err.as_str(), "database error");
    ServiceError::new(
        StatusCode::INTERNAL_SERVER_ERROR,
        "db_error",
        "database error".to_string(),
    )
}

/* ------------------------------------------------------------------ */
/* Accounts                                                            */
/* ------------------------------------------------------------------ */

pub async fn register(
    state: &AppState,
    payload: RegisterRequest,
) -> Result<RegisterResponse, ServiceError> {
    require_field("email", &payload.email)?;
    require_field("password", &payload.password)?;
    let data = state
        .identity
        .sign_up(&payload.email, &payload.password)
        .await
        .map_err(identity_error)?;
    Ok(RegisterResponse {
        success: true,
        data,
    })
}

pub async fn login(state: &AppState, payload: LoginRequest) -> Result<LoginResponse, ServiceError> {
    require_field("email", &payload.email)?;
    require_field("password", &payload.password)?;
    let session = state
        .identity
        .login(&payload.email, &payload.password)
        .await
        .map_err(identity_error)?;
    Ok(LoginResponse {
        success: true,
        user: session.user.clone(),
        session,
    })
}

pub async fn logout(state: &AppState, access_token: &str) -> Result<StatusResponse, ServiceError> {
    state
        .identity
        .logout(access_token)
        .await
        .map_err(identity_error)?;
    Ok(StatusResponse { success: true })
}

pub async fn reset_password(
    state: &AppState,
    payload: ResetPasswordRequest,
) -> Result<StatusResponse, ServiceError> {
    require_field("email", &payload.email)?;
    state
        .identity
        .recover(&payload.email)
        .await
        .map_err(identity_error)?;
    Ok(StatusResponse { success: true })
}

pub async fn update_password(
    state: &AppState,
    access_token: &str,
    payload: UpdatePasswordRequest,
) -> Result<UserResponse, ServiceError> {
    require_field("newPassword", &payload.new_password)?;
    let user = state
        .identity
        .update_password(access_token, &payload.new_password)
        .await
        .map_err(identity_error)?;
    Ok(UserResponse {
        success: true,
        user,
    })
}

pub async fn verify_email(
    state: &AppState,
    payload: VerifyEmailRequest,
) -> Result<UserResponse, ServiceError> {
    require_field("token", &payload.token)?;
    let session = state
        .identity
        .verify_otp("email", &payload.token)
        .await
        .map_err(identity_error)?;
    let user = session.user.ok_or_else(|| {
        ServiceError::new(
            StatusCode::BAD_GATEWAY,
            "identity_error",
            "verification returned no user".to_string(),
        )
    })?;
    Ok(UserResponse {
        success: true,
        user,
    })
}

/// Password recovery: verify the one-time token, then update the password
/// with the short-lived session it grants.
pub async fn new_password(
    state: &AppState,
    payload: NewPasswordRequest,
) -> Result<StatusResponse, ServiceError> {
    require_field("new_password", &payload.new_password)?;
    require_field("token_hash", &payload.token_hash)?;
    let session = state
        .identity
        .verify_otp("recovery", &payload.token_hash)
        .await
        .map_err(identity_error)?;
    state
        .identity
        .update_password(&session.access_token, &payload.new_password)
        .await
        .map_err(identity_error)?;
    Ok(StatusResponse { success: true })
}

pub async fn deactivate(
    state: &AppState,
    user: &IdentityUser,
) -> Result<StatusResponse, ServiceError> {
    let mut db = state.db.lock().await;
    db::deactivate_user(&mut db, &user.id)
        .await
        .map_err(db_error)?;
    tracing::info!(user_id = %user.id, "account deactivated");
    Ok(StatusResponse { success: true })
}

pub async fn me(state: &AppState, user: &IdentityUser) -> Result<MeResponse, ServiceError> {
    let row = {
        let mut db = state.db.lock().await;
        db::select_config(&mut db, &user.id)
            .await
            .map_err(db_error)?
    };
    Ok(MeResponse {
        success: true,
        user: user.clone(),
        config: full_config_from_row(row.unwrap_or_default()),
    })
}

/* ------------------------------------------------------------------ */
/* Stories                                                             */
/* ------------------------------------------------------------------ */

pub async fn start_story(
    state: &AppState,
    user: &IdentityUser,
    payload: StartStoryRequest,
) -> Result<StartStoryResponse, ServiceError> {
    let request_id = format!("start-{}", Uuid::new_v4().simple());
    let started = Instant::now();

    require_field("title", &payload.title)?;
    require_field("characterName", &payload.character_name)?;
    require_field("environment", &payload.environment)?;
    require_field("theme", &payload.theme)?;
    require_field("objective", &payload.objective)?;

    tracing::info!(
        request_id = request_id.as_str(),
        user_id = %user.id,
        title = payload.title.as_str(),
        theme = payload.theme.as_str(),
        "story requested"
    );

    let mut story = state.story_ai.generate_story(&payload).await.map_err(|err| {
        tracing::error!(
            request_id = request_id.as_str(),
            error = err.as_str(),
            "story generation failed"
        );
        ServiceError::new(StatusCode::BAD_GATEWAY, "story_generation_failed", err)
    })?;

    if story.id.trim().is_empty() {
        story.id = Uuid::new_v4().to_string();
    }

    if story.scenes.is_empty() {
        return Err(ServiceError::new(
            StatusCode::BAD_GATEWAY,
            "no_scenes",
            "story generator returned no scenes".to_string(),
        ));
    }

    let missing_prompts: Vec<&str> = story
        .scenes
        .iter()
        .filter(|scene| {
            scene
                .image_prompt
                .as_deref()
                .map_or(true, |prompt| prompt.trim().is_empty())
        })
        .map(|scene| scene.id.as_str())
        .collect();
    if !missing_prompts.is_empty() {
        tracing::warn!(
            request_id = request_id.as_str(),
            scene_ids = ?missing_prompts,
            "scenes missing image prompts"
        );
    }

    let items: Vec<WorkItem> = story
        .scenes
        .iter()
        .filter_map(|scene| {
            let prompt = scene.image_prompt.clone()?;
            if scene.id.trim().is_empty() || prompt.trim().is_empty() {
                return None;
            }
            Some(WorkItem {
                id: scene.id.clone(),
                prompt,
            })
        })
        .collect();

    if items.is_empty() {
        return Err(ServiceError::new(
            StatusCode::BAD_GATEWAY,
            "no_image_prompts",
            "generated scenes contain no image prompts".to_string(),
        ));
    }

    tracing::info!(
        request_id = request_id.as_str(),
        scenes = story.scenes.len(),
        to_render = items.len(),
        max_concurrency = state.image_concurrency,
        "image batch starting"
    );

    let images = Arc::clone(&state.images);
    let batch_id = request_id.clone();
    let progress_id = request_id.clone();
    let last_logged_pct = Arc::new(AtomicUsize::new(0));
    let batch_started = Instant::now();

    let outcome = batch::run_batch(
        items,
        state.image_concurrency,
        move |item| {
            let images = Arc::clone(&images);
            let batch_id = batch_id.clone();
            async move { images.generate_scene(item, &batch_id).await }
        },
        move |done, total| {
            // Log every 10% step, plus the final item.
            let pct = done * 100 / total;
            let last = last_logged_pct.load(Ordering::SeqCst);
            if pct >= last + 10 || done == total {
                last_logged_pct.store(pct, Ordering::SeqCst);
                tracing::info!(
                    batch_id = progress_id.as_str(),
                    done,
                    total,
                    pct,
                    "image batch progress"
                );
            }
        },
    )
    .await;

    tracing::info!(
        request_id = request_id.as_str(),
        took_ms = batch_started.elapsed().as_millis() as u64,
        ok = outcome.succeeded,
        failed = outcome.failed,
        "image batch finished"
    );

    let mut images_ok = 0usize;
    let mut images_failed = 0usize;
    for result in outcome.results {
        match result {
            ItemResult::Success { id, b64, mime } => {
                match attach_image(state, &story.id, &id, &b64, mime).await {
                    Ok(url) => {
                        if let Some(scene) = scene_mut(&mut story, &id) {
                            scene.image_url = Some(url);
                        }
                        images_ok += 1;
                    }
                    Err(err) => {
                        tracing::warn!(
                            request_id = request_id.as_str(),
                            scene_id = id.as_str(),
                            error = err.as_str(),
                            "image upload failed"
                        );
                        if let Some(scene) = scene_mut(&mut story, &id) {
                            scene.image_error = Some(err);
                        }
                        images_failed += 1;
                    }
                }
            }
            ItemResult::Failure { id, error } => {
                if let Some(scene) = scene_mut(&mut story, &id) {
                    scene.image_error = Some(error);
                }
                images_failed += 1;
            }
        }
    }

    // Persistence is best effort: a partially illustrated story still goes
    // back to the caller even if the write fails.
    match serde_json::to_value(&story) {
        Ok(raw_payload) => {
            let cover_url = pick_cover_image(&story);
            let mut db = state.db.lock().await;
            if let Err(err) = db::upsert_story(
                &mut db,
                &story.id,
                &user.id,
                &story.title,
                &story.synopsis,
                cover_url.as_deref(),
                &raw_payload,
            )
            .await
            {
                tracing::error!(
                    request_id = request_id.as_str(),
                    story_id = story.id.as_str(),
                    error = err.as_str(),
                    "story not persisted"
                );
            }
        }
        Err(err) => {
            tracing::error!(
                request_id = request_id.as_str(),
                error = %err,
                "story serialization failed"
            );
        }
    }

    let took_ms = started.elapsed().as_millis() as u64;
    tracing::info!(
        request_id = request_id.as_str(),
        took_ms,
        images_ok,
        images_failed,
        "story assembled"
    );

    Ok(StartStoryResponse {
        success: true,
        story,
        images_ok,
        images_failed,
        meta: RequestMeta {
            request_id,
            took_ms,
        },
    })
}

async fn attach_image(
    state: &AppState,
    story_id: &str,
    scene_id: &str,
    b64: &str,
    mime: &str,
) -> Result<String, String> {
    let Some(storage_client) = state.storage.as_ref() else {
        return Err("object storage not configured".to_string());
    };
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(storage::strip_data_url_prefix(b64))
        .map_err(|err| format!("base64 decode failed: {err}"))?;
    let key = format!("stories/{story_id}/{scene_id}.png");
    storage_client.put_object(&key, bytes, mime).await?;
    Ok(storage_client.public_url(&key))
}

fn scene_mut<'a>(story: &'a mut Story, scene_id: &str) -> Option<&'a mut Scene> {
    story.scenes.iter_mut().find(|scene| scene.id == scene_id)
}

pub async fn upsert_story(
    state: &AppState,
    user: &IdentityUser,
    payload: UpsertStoryRequest,
) -> Result<UpsertStoryResponse, ServiceError> {
    let story = payload.story;
    if story.id.trim().is_empty() {
        return Err(ServiceError::new(
            StatusCode::BAD_REQUEST,
            "missing_story_id",
            "story.id is required".to_string(),
        ));
    }
    let cover_url = pick_cover_image(&story);
    let raw_payload = serde_json::to_value(&story).map_err(|err| {
        ServiceError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "serialize_failed",
            format!("story serialization failed: {err}"),
        )
    })?;

    let mut db = state.db.lock().await;
    db::upsert_story(
        &mut db,
        &story.id,
        &user.id,
        &story.title,
        &story.synopsis,
        cover_url.as_deref(),
        &raw_payload,
    )
    .await
    .map_err(db_error)?;

    Ok(UpsertStoryResponse {
        ok: true,
        story_id: story.id,
    })
}

pub async fn story_cards(
    state: &AppState,
    user: &IdentityUser,
    payload: CardsRequest,
) -> Result<CardsResponse, ServiceError> {
    let from = payload.from.unwrap_or(0).max(0);
    let to = payload.to.unwrap_or_else(|| from.saturating_add(19));
    if to < from {
        return Err(ServiceError::new(
            StatusCode::BAD_REQUEST,
            "invalid_range",
            "to must not be less than from".to_string(),
        ));
    }

    let mut db = state.db.lock().await;
    let items = db::list_story_cards(&mut db, &user.id, from, page_limit(from, to))
        .await
        .map_err(db_error)?;
    Ok(CardsResponse { ok: true, items })
}

pub async fn get_story(
    state: &AppState,
    user: &IdentityUser,
    payload: GetStoryRequest,
) -> Result<GetStoryResponse, ServiceError> {
    if payload.story_id.trim().is_empty() {
        return Err(ServiceError::new(
            StatusCode::BAD_REQUEST,
            "missing_story_id",
            "storyId is required".to_string(),
        ));
    }

    let row = {
        let mut db = state.db.lock().await;
        db::select_story_raw(&mut db, &payload.story_id)
            .await
            .map_err(db_error)?
    };

    let row = row.ok_or_else(|| {
        ServiceError::new(
            StatusCode::NOT_FOUND,
            "not_found",
            "story not found".to_string(),
        )
    })?;
    if row.owner_id != user.id {
        return Err(ServiceError::new(
            StatusCode::FORBIDDEN,
            "forbidden",
            "story belongs to another user".to_string(),
        ));
    }

    Ok(GetStoryResponse {
        ok: true,
        raw_payload: row.raw_payload,
    })
}

/* ------------------------------------------------------------------ */
/* Config & parental controls                                          */
/* ------------------------------------------------------------------ */

pub async fn get_age_range(
    state: &AppState,
    user: &IdentityUser,
) -> Result<AgeRangeResponse, ServiceError> {
    let mut db = state.db.lock().await;
    let row = db::select_config(&mut db, &user.id)
        .await
        .map_err(db_error)?;
    Ok(AgeRangeResponse {
        ok: true,
        age_range: row.and_then(|row| row.child_age_range),
    })
}

pub async fn set_age_range(
    state: &AppState,
    user: &IdentityUser,
    payload: SetAgeRequest,
) -> Result<AgeRangeResponse, ServiceError> {
    let Some(age_range) = payload.age_range else {
        return Err(ServiceError::new(
            StatusCode::BAD_REQUEST,
            "missing_age_range",
            "ageRange (number) is required".to_string(),
        ));
    };
    let mut db = state.db.lock().await;
    let age_range = db::upsert_age_range(&mut db, &user.id, age_range)
        .await
        .map_err(db_error)?;
    Ok(AgeRangeResponse {
        ok: true,
        age_range,
    })
}

pub async fn get_themes(
    state: &AppState,
    user: &IdentityUser,
) -> Result<ThemesResponse, ServiceError> {
    let mut db = state.db.lock().await;
    let row = db::select_config(&mut db, &user.id)
        .await
        .map_err(db_error)?;
    let themes = from_csv(row.and_then(|row| row.child_themes).as_deref());
    Ok(ThemesResponse { ok: true, themes })
}

pub async fn set_themes(
    state: &AppState,
    user: &IdentityUser,
    payload: SetThemesRequest,
) -> Result<ThemesResponse, ServiceError> {
    let Some(input) = payload.themes else {
        return Err(ServiceError::new(
            StatusCode::BAD_REQUEST,
            "missing_themes",
            "themes must be an array or a CSV string".to_string(),
        ));
    };
    let csv = themes_to_csv(input);
    let mut db = state.db.lock().await;
    let stored = db::upsert_themes(&mut db, &user.id, &csv)
        .await
        .map_err(db_error)?;
    Ok(ThemesResponse {
        ok: true,
        themes: from_csv(stored.as_deref()),
    })
}

pub async fn valid_config(
    state: &AppState,
    user: &IdentityUser,
) -> Result<ValidConfigResponse, ServiceError> {
    let mut db = state.db.lock().await;
    let row = db::select_config(&mut db, &user.id)
        .await
        .map_err(db_error)?
        .unwrap_or_default();
    let themes = from_csv(row.child_themes.as_deref());
    let (config, completed) = config_step(row.child_age_range, &themes);
    Ok(ValidConfigResponse { config, completed })
}

pub async fn get_full_config(
    state: &AppState,
    user: &IdentityUser,
) -> Result<FullConfigResponse, ServiceError> {
    let mut db = state.db.lock().await;
    let row = db::select_config(&mut db, &user.id)
        .await
        .map_err(db_error)?
        .unwrap_or_default();
    Ok(FullConfigResponse {
        ok: true,
        result: full_config_from_row(row),
    })
}

pub async fn set_full_config(
    state: &AppState,
    user: &IdentityUser,
    payload: SetConfigRequest,
) -> Result<FullConfigResponse, ServiceError> {
    if payload.is_empty() {
        return Err(ServiceError::new(
            StatusCode::BAD_REQUEST,
            "empty_update",
            "at least one field must be provided".to_string(),
        ));
    }

    let mut db = state.db.lock().await;
    let existing = db::select_config(&mut db, &user.id)
        .await
        .map_err(db_error)?
        .unwrap_or_default();

    // Patch semantics: only fields present in the payload are touched.
    let merged = ConfigRow {
        child_age_range: payload.child_age_range.or(existing.child_age_range),
        child_themes: payload
            .child_themes
            .map(themes_to_csv)
            .or(existing.child_themes),
        allowed_themes: payload
            .allowed_themes
            .map(themes_to_csv)
            .or(existing.allowed_themes),
        blocked_themes: payload
            .blocked_themes
            .map(themes_to_csv)
            .or(existing.blocked_themes),
        parent_pin: payload.parent_pin.or(existing.parent_pin),
    };

    let row = db::upsert_full_config(&mut db, &user.id, &merged)
        .await
        .map_err(db_error)?;
    Ok(FullConfigResponse {
        ok: true,
        result: full_config_from_row(row),
    })
}

pub async fn verify_pin(
    state: &AppState,
    user: &IdentityUser,
    payload: PinRequest,
) -> Result<PinResponse, ServiceError> {
    let stored = {
        let mut db = state.db.lock().await;
        db::select_config(&mut db, &user.id)
            .await
            .map_err(db_error)?
            .and_then(|row| row.parent_pin)
    };
    let Some(stored) = stored else {
        return Err(ServiceError::new(
            StatusCode::NOT_FOUND,
            "pin_not_set",
            "no parental PIN configured".to_string(),
        ));
    };
    if stored != payload.pin {
        return Err(ServiceError::new(
            StatusCode::FORBIDDEN,
            "pin_incorrect",
            "incorrect PIN".to_string(),
        ));
    }
    Ok(PinResponse { ok: true })
}

pub async fn set_pin(
    state: &AppState,
    user: &IdentityUser,
    payload: PinRequest,
) -> Result<PinResponse, ServiceError> {
    require_field("pin", &payload.pin)?;
    let mut db = state.db.lock().await;
    db::upsert_parent_pin(&mut db, &user.id, &payload.pin)
        .await
        .map_err(db_error)?;
    Ok(PinResponse { ok: true })
}

/* ------------------------------------------------------------------ */
/* Pure helpers                                                        */
/* ------------------------------------------------------------------ */

fn require_field(name: &'static str, value: &str) -> Result<(), ServiceError> {
    if value.trim().is_empty() {
        return Err(ServiceError::new(
            StatusCode::BAD_REQUEST,
            "missing_field",
            format!("{name} is required"),
        ));
    }
    Ok(())
}

const MAX_PAGE_SIZE: i64 = 100;

/// Requested page size, bounded so an arbitrary range can neither overflow
/// nor turn into an unbounded LIMIT.
fn page_limit(from: i64, to: i64) -> i64 {
    to.saturating_sub(from).saturating_add(1).min(MAX_PAGE_SIZE)
}

pub fn from_csv(raw: Option<&str>) -> Vec<String> {
    match raw {
        Some(raw) if !raw.trim().is_empty() => raw
            .split(',')
            .map(|entry| entry.trim().to_string())
            .filter(|entry| !entry.is_empty())
            .collect(),
        _ => Vec::new(),
    }
}

pub fn themes_to_csv(input: ThemesInput) -> String {
    let themes = match input {
        ThemesInput::List(list) => list,
        ThemesInput::Csv(csv) => csv.split(',').map(ToString::to_string).collect(),
    };
    themes
        .into_iter()
        .map(|theme| theme.trim().to_string())
        .filter(|theme| !theme.is_empty())
        .collect::<Vec<_>>()
        .join(",")
}

/// First missing onboarding step, and whether the config is complete.
pub fn config_step(age: Option<i32>, themes: &[String]) -> (Option<&'static str>, bool) {
    let step = if age.is_none() {
        Some("age")
    } else if themes.is_empty() {
        Some("themes")
    } else {
        None
    };
    (step, age.is_some() && !themes.is_empty())
}

fn full_config_from_row(row: ConfigRow) -> FullConfig {
    let child_themes = from_csv(row.child_themes.as_deref());
    let completed = row.child_age_range.is_some() && !child_themes.is_empty();
    FullConfig {
        child_age_range: row.child_age_range,
        child_themes,
        allowed_themes: from_csv(row.allowed_themes.as_deref()),
        blocked_themes: from_csv(row.blocked_themes.as_deref()),
        parent_pin: row.parent_pin,
        completed,
    }
}

pub fn pick_cover_image(story: &Story) -> Option<String> {
    story
        .scenes
        .first()
        .and_then(|scene| scene.image_url.clone())
        .or_else(|| {
            story
                .scenes
                .iter()
                .find_map(|scene| scene.image_url.clone())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_round_trip_trims_and_drops_empties() {
        assert_eq!(
            from_csv(Some(" dragons , space,, pirates ")),
            vec!["dragons", "space", "pirates"]
        );
        assert!(from_csv(Some("   ")).is_empty());
        assert!(from_csv(None).is_empty());
    }

    #[test]
    fn themes_input_accepts_list_or_csv() {
        assert_eq!(
            themes_to_csv(ThemesInput::List(vec![
                " dragons ".to_string(),
                "space".to_string(),
                "".to_string(),
            ])),
            "dragons,space"
        );
        assert_eq!(
            themes_to_csv(ThemesInput::Csv("dragons, space ,".to_string())),
            "dragons,space"
        );
    }

    #[test]
    fn page_limit_is_capped_and_overflow_safe() {
        assert_eq!(page_limit(0, 19), 20);
        assert_eq!(page_limit(5, 5), 1);
        assert_eq!(page_limit(0, 150), MAX_PAGE_SIZE);
        assert_eq!(page_limit(0, i64::MAX), MAX_PAGE_SIZE);
        assert_eq!(page_limit(i64::MIN, i64::MAX), MAX_PAGE_SIZE);
    }

    #[test]
    fn config_step_reports_first_missing_piece() {
        assert_eq!(config_step(None, &[]), (Some("age"), false));
        assert_eq!(config_step(Some(6), &[]), (Some("themes"), false));
        let themes = vec!["dragons".to_string()];
        assert_eq!(config_step(Some(6), &themes), (None, true));
    }

    #[test]
    fn cover_image_prefers_first_scene() {
        let scene = |id: &str, url: Option<&str>| Scene {
            id: id.to_string(),
            scene_type: "normal".to_string(),
            content: String::new(),
            scene_characters: Vec::new(),
            scene_environment: String::new(),
            image_prompt: None,
            options: Vec::new(),
            image_url: url.map(ToString::to_string),
            image_error: None,
        };
        let story = Story {
            id: "st".to_string(),
            title: "t".to_string(),
            synopsis: "s".to_string(),
            characters: Vec::new(),
            environments: Vec::new(),
            scenes: vec![scene("s1", None), scene("s2", Some("https://img/2.png"))],
        };
        assert_eq!(pick_cover_image(&story).as_deref(), Some("https://img/2.png"));
    }
}
