//! Wellness library: recipes, meditation videos and articles. Readable without signing in.

use std::sync::Arc;
use tauri::State;

use super::{non_blank_filter, normalize_filter};
use crate::cycle::Phase;
use crate::db::AppState;
use crate::error::{AppError, AppResult};
use crate::models::{EducationalContent, MeditationVideo, Recipe};
use crate::storage;

/// ---------------------------------------------------------------------------
/// Recipes
/// ---------------------------------------------------------------------------

#[tauri::command]
pub async fn get_recipes(
  state: State<'_, Arc<AppState>>,
  phase: Option<String>,
) -> Result<Vec<Recipe>, AppError> {
  let phase = parse_phase_filter(phase)?;
  storage::get_recipes(&state.db, phase).await
}

/// ---------------------------------------------------------------------------
/// Meditation Videos
/// ---------------------------------------------------------------------------

#[tauri::command]
pub async fn get_meditation_videos(
  state: State<'_, Arc<AppState>>,
  category: Option<String>,
) -> Result<Vec<MeditationVideo>, AppError> {
  let category = normalize_filter(category);
  storage::get_meditation_videos(&state.db, category.as_deref()).await
}

/// ---------------------------------------------------------------------------
/// Educational Content
/// ---------------------------------------------------------------------------

/// Articles, optionally in one category. Unlike the other filters, "all" is
/// matched as a literal category name.
#[tauri::command]
pub async fn get_educational_content(
  state: State<'_, Arc<AppState>>,
  category: Option<String>,
) -> Result<Vec<EducationalContent>, AppError> {
  let category = non_blank_filter(category);
  storage::get_educational_content(&state.db, category.as_deref()).await
}

/// ---------------------------------------------------------------------------
/// Filters
/// ---------------------------------------------------------------------------

fn parse_phase_filter(phase: Option<String>) -> AppResult<Option<Phase>> {
  normalize_filter(phase)
    .map(|p| p.to_lowercase().parse::<Phase>().map_err(AppError::Validation))
    .transpose()
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------
