use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::handlers::{
    deactivate, get_age_range, get_full_config, get_story, get_themes, healthz, login, logout, me,
    new_password, readyz, register, reset_password, set_age_range, set_full_config, set_pin,
    set_themes, start_story, story_cards, test_story, update_password, upsert_story, valid_config,
    verify_email, verify_pin,
};
use crate::state::AppState;

// Companion apps ship with these exact spellings baked in.
const VERIFY_EMAIL_PATH: &str = "/api/users/verifyEmail";
const VALIDATE_PIN_PATH: &str = "/api/config/validate-parental-pin";
const SET_PIN_PATH: &str = "/api/config/set-parental-pin";

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/api/users/register", post(register))
        .route("/api/users/login", post(login))
        .route("/api/users/logout", post(logout))
        .route("/api/users/reset-password", post(reset_password))
        .route("/api/users/update-password", post(update_password))
        .route(VERIFY_EMAIL_PATH, post(verify_email))
        .route("/api/users/new-password", post(new_password))
        .route("/api/users/me", get(me))
        .route("/api/users/deactivate", post(deactivate))
        .route("/api/story/test", get(test_story))
        .route("/api/story/introduction", post(start_story))
        .route("/api/story/stories/upsert", post(upsert_story))
        .route("/api/story/cards", post(story_cards))
        .route("/api/story/get-story", post(get_story))
        .route("/api/config/get-age", post(get_age_range))
        .route("/api/config/set-age", post(set_age_range))
        .route("/api/config/get-themes", post(get_themes))
        .route("/api/config/set-themes", post(set_themes))
        .route("/api/config/valid-config", post(valid_config))
        .route("/api/config/get-config", post(get_full_config))
        .route("/api/config/set-config", post(set_full_config))
        .route(VALIDATE_PIN_PATH, post(verify_pin))
        .route(SET_PIN_PATH, post(set_pin))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Spellings the shipped frontends call; renaming any of these breaks them.
    #[test]
    fn legacy_client_spellings_are_preserved() {
        assert_eq!(VERIFY_EMAIL_PATH, "/api/users/verifyEmail");
        assert_eq!(VALIDATE_PIN_PATH, "/api/config/validate-parental-pin");
        assert_eq!(SET_PIN_PATH, "/api/config/set-parental-pin");
    }
}
