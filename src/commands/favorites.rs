use std::sync::Arc;
use tauri::State;

use super::auth::require_user;
use crate::db::AppState;
use crate::error::{AppError, AppResult};
use crate::models::{Favorite, FavoriteKind};
use crate::storage;

/// ---------------------------------------------------------------------------
/// Favorites
/// ---------------------------------------------------------------------------

#[tauri::command]
pub async fn get_favorites(state: State<'_, Arc<AppState>>) -> Result<Vec<Favorite>, AppError> {
  let user = require_user(&state.db).await?;
  storage::get_favorites(&state.db, &user.id).await
}

#[tauri::command]
pub async fn add_favorite(
  state: State<'_, Arc<AppState>>,
  item_type: Option<String>,
  item_id: Option<i64>,
) -> Result<Favorite, AppError> {
  let user = require_user(&state.db).await?;
  let (kind, item_id) = parse_item(item_type, item_id)?;
  storage::add_favorite(&state.db, &user.id, kind, item_id).await
}

/// Returns whether anything was removed
#[tauri::command]
pub async fn remove_favorite(
  state: State<'_, Arc<AppState>>,
  item_type: Option<String>,
  item_id: Option<i64>,
) -> Result<bool, AppError> {
  let user = require_user(&state.db).await?;
  let (kind, item_id) = parse_item(item_type, item_id)?;
  storage::remove_favorite(&state.db, &user.id, kind, item_id).await
}

/// ---------------------------------------------------------------------------
/// Input Parsing
/// ---------------------------------------------------------------------------

fn parse_item(item_type: Option<String>, item_id: Option<i64>) -> AppResult<(FavoriteKind, i64)> {
  let (item_type, item_id) = match (item_type, item_id) {
    (Some(t), Some(id)) if !t.trim().is_empty() => (t, id),
    _ => return Err(AppError::validation("Item type and ID are required")),
  };
  let kind = item_type
    .trim()
    .parse::<FavoriteKind>()
    .map_err(AppError::Validation)?;
  Ok((kind, item_id))
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------
