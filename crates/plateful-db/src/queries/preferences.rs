//! Database query functions for the `meal_preferences` table.

use anyhow::{Context, Result};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::MealPreferences;

/// Fetch the stored preferences for a user, if any.
pub async fn get_preferences(pool: &PgPool, user_id: Uuid) -> Result<Option<MealPreferences>> {
    let prefs = sqlx::query_as::<_, MealPreferences>(
        "SELECT * FROM meal_preferences WHERE user_id = $1",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await
    .context("failed to fetch meal preferences")?;

    Ok(prefs)
}

/// Insert or replace a user's preferences, bumping `updated_at`.
///
/// Out-of-range values are rejected by the table's CHECK constraints.
pub async fn upsert_preferences(
    pool: &PgPool,
    user_id: Uuid,
    meals_per_day: i16,
    max_prep_minutes: i32,
    quick_cook: bool,
) -> Result<MealPreferences> {
    let prefs = sqlx::query_as::<_, MealPreferences>(
        "INSERT INTO meal_preferences (user_id, meals_per_day, max_prep_minutes, quick_cook) \
         VALUES ($1, $2, $3, $4) \
         ON CONFLICT (user_id) DO UPDATE \
         SET meals_per_day = EXCLUDED.meals_per_day, \
             max_prep_minutes = EXCLUDED.max_prep_minutes, \
             quick_cook = EXCLUDED.quick_cook, \
             updated_at = now() \
         RETURNING *",
    )
    .bind(user_id)
    .bind(meals_per_day)
    .bind(max_prep_minutes)
    .bind(quick_cook)
    .fetch_one(pool)
    .await
    .context("failed to upsert meal preferences")?;

    Ok(prefs)
}
