use tokio_postgres::Client;
use uuid::Uuid;

use crate::models::{ConfigRow, StoryCard, StoryRow};

const SQL_SELECT_CONFIG: &str = "SELECT child_age_range, child_themes, allowed_themes, \
blocked_themes, parent_pin FROM config WHERE user_id = $1";

const SQL_UPSERT_AGE: &str = "INSERT INTO config (user_id, child_age_range) VALUES ($1, $2) \
ON CONFLICT (user_id) DO UPDATE SET child_age_range = EXCLUDED.child_age_range \
RETURNING child_age_range";

const SQL_UPSERT_THEMES: &str = "INSERT INTO config (user_id, child_themes) VALUES ($1, $2) \
ON CONFLICT (user_id) DO UPDATE SET child_themes = EXCLUDED.child_themes \
RETURNING child_themes";

const SQL_UPSERT_PIN: &str = "INSERT INTO config (user_id, parent_pin) VALUES ($1, $2) \
ON CONFLICT (user_id) DO UPDATE SET parent_pin = EXCLUDED.parent_pin \
RETURNING parent_pin";

const SQL_UPSERT_FULL_CONFIG: &str = "INSERT INTO config \
(user_id, child_age_range, child_themes, allowed_themes, blocked_themes, parent_pin) \
VALUES ($1, $2, $3, $4, $5, $6) \
ON CONFLICT (user_id) DO UPDATE SET \
child_age_range = EXCLUDED.child_age_range, \
child_themes = EXCLUDED.child_themes, \
allowed_themes = EXCLUDED.allowed_themes, \
blocked_themes = EXCLUDED.blocked_themes, \
parent_pin = EXCLUDED.parent_pin \
RETURNING child_age_range, child_themes, allowed_themes, blocked_themes, parent_pin";

const SQL_UPSERT_STORY: &str = "INSERT INTO stories \
(id, user_id, title, synopsis, cover_url, raw_payload, updated_at) \
VALUES ($1, $2, $3, $4, $5, $6, NOW()) \
ON CONFLICT (id) DO UPDATE SET \
title = EXCLUDED.title, \
synopsis = EXCLUDED.synopsis, \
cover_url = EXCLUDED.cover_url, \
raw_payload = EXCLUDED.raw_payload, \
updated_at = NOW()";

const SQL_LIST_STORY_CARDS: &str = "SELECT id, title, synopsis, cover_url, \
updated_at::text AS updated_at FROM stories WHERE user_id = $1 \
ORDER BY updated_at DESC, id OFFSET $2 LIMIT $3";

const SQL_SELECT_STORY_RAW: &str =
    "SELECT user_id, raw_payload FROM stories WHERE id = $1";

const SQL_DEACTIVATE_USER: &str = "UPDATE users SET active = FALSE WHERE id = $1";

fn map_config_row(row: &tokio_postgres::Row) -> ConfigRow {
    ConfigRow {
        child_age_range: row.get("child_age_range"),
        child_themes: row.get("child_themes"),
        allowed_themes: row.get("allowed_themes"),
        blocked_themes: row.get("blocked_themes"),
        parent_pin: row.get("parent_pin"),
    }
}

pub async fn select_config(db: &mut Client, user_id: &Uuid) -> Result<Option<ConfigRow>, String> {
    let row = db
        .query_opt(SQL_SELECT_CONFIG, &[user_id])
        .await
        .map_err(|err| format!("select config failed: {err}"))?;
    Ok(row.as_ref().map(map_config_row))
}

pub async fn upsert_age_range(
    db: &mut Client,
    user_id: &Uuid,
    age_range: i32,
) -> Result<Option<i32>, String> {
    let row = db
        .query_one(SQL_UPSERT_AGE, &[user_id, &age_range])
        .await
        .map_err(|err| format!("set age range failed: {err}"))?;
    Ok(row.get("child_age_range"))
}

pub async fn upsert_themes(
    db: &mut Client,
    user_id: &Uuid,
    themes_csv: &str,
) -> Result<Option<String>, String> {
    let row = db
        .query_one(SQL_UPSERT_THEMES, &[user_id, &themes_csv])
        .await
        .map_err(|err| format!("set themes failed: {err}"))?;
    Ok(row.get("child_themes"))
}

pub async fn upsert_parent_pin(
    db: &mut Client,
    user_id: &Uuid,
    pin: &str,
) -> Result<Option<String>, String> {
    let row = db
        .query_one(SQL_UPSERT_PIN, &[user_id, &pin])
        .await
        .map_err(|err| format!("set parent pin failed: {err}"))?;
    Ok(row.get("parent_pin"))
}

pub async fn upsert_full_config(
    db: &mut Client,
    user_id: &Uuid,
    config: &ConfigRow,
) -> Result<ConfigRow, String> {
    let row = db
        .query_one(
            SQL_UPSERT_FULL_CONFIG,
            &[
                user_id,
                &config.child_age_range,
                &config.child_themes,
                &config.allowed_themes,
                &config.blocked_themes,
                &config.parent_pin,
            ],
        )
        .await
        .map_err(|err| format!("update config failed: {err}"))?;
    Ok(map_config_row(&row))
}

#[allow(clippy::too_many_arguments)]
pub async fn upsert_story(
    db: &mut Client,
    story_id: &str,
    user_id: &Uuid,
    title: &str,
    synopsis: &str,
    cover_url: Option<&str>,
    raw_payload: &serde_json::Value,
) -> Result<(), String> {
    db.execute(
        SQL_UPSERT_STORY,
        &[
            &story_id,
            user_id,
            &title,
            &synopsis,
            &cover_url,
            raw_payload,
        ],
    )
    .await
    .map_err(|err| format!("upsert story failed: {err}"))?;
    Ok(())
}

pub async fn list_story_cards(
    db: &mut Client,
    user_id: &Uuid,
    offset: i64,
    limit: i64,
) -> Result<Vec<StoryCard>, String> {
    let rows = db
        .query(SQL_LIST_STORY_CARDS, &[user_id, &offset, &limit])
        .await
        .map_err(|err| format!("list stories failed: {err}"))?;

    Ok(rows
        .into_iter()
        .map(|row| StoryCard {
            id: row.get("id"),
            title: row.get("title"),
            synopsis: row.get("synopsis"),
            cover_url: row.get("cover_url"),
            updated_at: row.get("updated_at"),
        })
        .collect())
}

pub async fn select_story_raw(
    db: &mut Client,
    story_id: &str,
) -> Result<Option<StoryRow>, String> {
    let row = db
        .query_opt(SQL_SELECT_STORY_RAW, &[&story_id])
        .await
        .map_err(|err| format!("select story failed: {err}"))?;

    Ok(row.map(|row| StoryRow {
        owner_id: row.get("user_id"),
        raw_payload: row.get("raw_payload"),
    }))
}

pub async fn deactivate_user(db: &mut Client, user_id: &Uuid) -> Result<(), String> {
    db.execute(SQL_DEACTIVATE_USER, &[user_id])
        .await
        .map_err(|err| format!("deactivate user failed: {err}"))?;
    Ok(())
}
