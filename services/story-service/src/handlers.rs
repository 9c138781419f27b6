use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use crate::auth::AuthUser;
use crate::models::{
    CardsRequest, GetStoryRequest, LoginRequest, NewPasswordRequest, PinRequest, RegisterRequest,
    ResetPasswordRequest, SetAgeRequest, SetConfigRequest, SetThemesRequest, StartStoryRequest,
    TestStoryResponse, UpdatePasswordRequest, UpsertStoryRequest, VerifyEmailRequest,
};
use crate::service;
use crate::state::AppState;

pub async fn healthz() -> StatusCode {
    StatusCode::OK
}

pub async fn readyz() -> StatusCode {
    StatusCode::OK
}

/* Accounts */

pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> impl IntoResponse {
    match service::register(&state, payload).await {
        Ok(body) => (StatusCode::OK, Json(body)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> impl IntoResponse {
    match service::login(&state, payload).await {
        Ok(body) => (StatusCode::OK, Json(body)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub async fn logout(State(state): State<AppState>, auth: AuthUser) -> impl IntoResponse {
    match service::logout(&state, &auth.token).await {
        Ok(body) => (StatusCode::OK, Json(body)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub async fn reset_password(
    State(state): State<AppState>,
    Json(payload): Json<ResetPasswordRequest>,
) -> impl IntoResponse {
    match service::reset_password(&state, payload).await {
        Ok(body) => (StatusCode::OK, Json(body)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub async fn update_password(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<UpdatePasswordRequest>,
) -> impl IntoResponse {
    match service::update_password(&state, &auth.token, payload).await {
        Ok(body) => (StatusCode::OK, Json(body)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub async fn verify_email(
    State(state): State<AppState>,
    Json(payload): Json<VerifyEmailRequest>,
) -> impl IntoResponse {
    match service::verify_email(&state, payload).await {
        Ok(body) => (StatusCode::OK, Json(body)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub async fn new_password(
    State(state): State<AppState>,
    Json(payload): Json<NewPasswordRequest>,
) -> impl IntoResponse {
    match service::new_password(&state, payload).await {
        Ok(body) => (StatusCode::OK, Json(body)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub async fn me(State(state): State<AppState>, auth: AuthUser) -> impl IntoResponse {
    match service::me(&state, &auth.user).await {
        Ok(body) => (StatusCode::OK, Json(body)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub async fn deactivate(State(state): State<AppState>, auth: AuthUser) -> impl IntoResponse {
    match service::deactivate(&state, &auth.user).await {
        Ok(body) => (StatusCode::OK, Json(body)).into_response(),
        Err(err) => err.into_response(),
    }
}

/* Stories */

pub async fn test_story() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(TestStoryResponse {
            success: true,
            story: "story service is up",
        }),
    )
}

pub async fn start_story(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<StartStoryRequest>,
) -> impl IntoResponse {
    match service::start_story(&state, &auth.user, payload).await {
        Ok(body) => (StatusCode::OK, Json(body)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub async fn upsert_story(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<UpsertStoryRequest>,
) -> impl IntoResponse {
    match service::upsert_story(&state, &auth.user, payload).await {
        Ok(body) => (StatusCode::OK, Json(body)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub async fn story_cards(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<CardsRequest>,
) -> impl IntoResponse {
    match service::story_cards(&state, &auth.user, payload).await {
        Ok(body) => (StatusCode::OK, Json(body)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub async fn get_story(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<GetStoryRequest>,
) -> impl IntoResponse {
    match service::get_story(&state, &auth.user, payload).await {
        Ok(body) => (StatusCode::OK, Json(body)).into_response(),
        Err(err) => err.into_response(),
    }
}

/* Config & parental controls */

pub async fn get_age_range(State(state): State<AppState>, auth: AuthUser) -> impl IntoResponse {
    match service::get_age_range(&state, &auth.user).await {
        Ok(body) => (StatusCode::OK, Json(body)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub async fn set_age_range(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<SetAgeRequest>,
) -> impl IntoResponse {
    match service::set_age_range(&state, &auth.user, payload).await {
        Ok(body) => (StatusCode::OK, Json(body)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub async fn get_themes(State(state): State<AppState>, auth: AuthUser) -> impl IntoResponse {
    match service::get_themes(&state, &auth.user).await {
        Ok(body) => (StatusCode::OK, Json(body)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub async fn set_themes(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<SetThemesRequest>,
) -> impl IntoResponse {
    match service::set_themes(&state, &auth.user, payload).await {
        Ok(body) => (StatusCode::OK, Json(body)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub async fn valid_config(State(state): State<AppState>, auth: AuthUser) -> impl IntoResponse {
    match service::valid_config(&state, &auth.user).await {
        Ok(body) => (StatusCode::OK, Json(body)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub async fn get_full_config(State(state): State<AppState>, auth: AuthUser) -> impl IntoResponse {
    match service::get_full_config(&state, &auth.user).await {
        Ok(body) => (StatusCode::OK, Json(body)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub async fn set_full_config(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<SetConfigRequest>,
) -> impl IntoResponse {
    match service::set_full_config(&state, &auth.user, payload).await {
        Ok(body) => (StatusCode::OK, Json(body)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub async fn verify_pin(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<PinRequest>,
) -> impl IntoResponse {
    match service::verify_pin(&state, &auth.user, payload).await {
        Ok(body) => (StatusCode::OK, Json(body)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub async fn set_pin(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<PinRequest>,
) -> impl IntoResponse {
    match service::set_pin(&state, &auth.user, payload).await {
        Ok(body) => (StatusCode::OK, Json(body)).into_response(),
        Err(err) => err.into_response(),
    }
}
