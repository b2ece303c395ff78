//! Meal-planning preferences: validation and defaults.

use serde::{Deserialize, Serialize};

use plateful_db::models::MealPreferences;

/// Allowed range for meals per day.
pub const MEALS_PER_DAY_RANGE: std::ops::RangeInclusive<i16> = 1..=6;

/// Prep-time choices offered in the settings UI, in minutes.
pub const PREP_TIME_CHOICES: [i32; 5] = [15, 30, 45, 60, 90];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PreferencesError {
    #[error("meals per day must be between 1 and 6, got {0}")]
    MealsPerDayOutOfRange(i16),

    #[error("max prep time must be one of 15, 30, 45, 60 or 90 minutes, got {0}")]
    UnsupportedPrepTime(i32),
}

/// Preferences as submitted by a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MealPreferencesInput {
    pub meals_per_day: i16,
    pub max_prep_minutes: i32,
    #[serde(default)]
    pub quick_cook: bool,
}

impl Default for MealPreferencesInput {
    fn default() -> Self {
        Self {
            meals_per_day: 3,
            max_prep_minutes: 30,
            quick_cook: false,
        }
    }
}

impl MealPreferencesInput {
    pub fn validate(&self) -> Result<(), PreferencesError> {
        if !MEALS_PER_DAY_RANGE.contains(&self.meals_per_day) {
            return Err(PreferencesError::MealsPerDayOutOfRange(self.meals_per_day));
        }
        if !PREP_TIME_CHOICES.contains(&self.max_prep_minutes) {
            return Err(PreferencesError::UnsupportedPrepTime(self.max_prep_minutes));
        }
        Ok(())
    }
}

impl From<&MealPreferences> for MealPreferencesInput {
    fn from(p: &MealPreferences) -> Self {
        Self {
            meals_per_day: p.meals_per_day,
            max_prep_minutes: p.max_prep_minutes,
            quick_cook: p.quick_cook,
        }
    }
}

/// Stored preferences, or the defaults for a user who never saved any.
pub fn effective(stored: Option<&MealPreferences>) -> MealPreferencesInput {
    stored.map(MealPreferencesInput::from).unwrap_or_default()
}
