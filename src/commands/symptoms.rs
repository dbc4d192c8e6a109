use chrono::NaiveDate;
use std::sync::Arc;
use tauri::State;

use super::auth::require_user;
use crate::db::{AppState, DbPool};
use crate::error::{AppError, AppResult};
use crate::models::{NewSymptom, Symptom};
use crate::storage;

/// ---------------------------------------------------------------------------
/// Validation Limits
/// ---------------------------------------------------------------------------

const MIN_SEVERITY: i64 = 1;
const MAX_SEVERITY: i64 = 5;

/// ---------------------------------------------------------------------------
/// Symptom Log
/// ---------------------------------------------------------------------------

/// Logged symptoms, newest first
#[tauri::command]
pub async fn get_symptoms(
  state: State<'_, Arc<AppState>>,
  limit: Option<i64>,
) -> Result<Vec<Symptom>, AppError> {
  let user = require_user(&state.db).await?;
  storage::get_symptoms(&state.db, &user.id, limit).await
}

/// Log a batch of symptoms for today
#[tauri::command]
pub async fn log_symptoms(
  state: State<'_, Arc<AppState>>,
  symptoms: Option<Vec<NewSymptom>>,
) -> Result<Vec<Symptom>, AppError> {
  let user = require_user(&state.db).await?;
  record_symptoms(&state.db, &user.id, symptoms.unwrap_or_default(), super::today()).await
}

pub(crate) async fn record_symptoms(
  db: &DbPool,
  user_id: &str,
  symptoms: Vec<NewSymptom>,
  date: NaiveDate,
) -> AppResult<Vec<Symptom>> {
  let symptoms = validate_symptoms(symptoms)?;
  let created = storage::create_symptoms(db, user_id, date, &symptoms).await?;
  tracing::info!(user_id, count = created.len(), "Symptoms logged");
  Ok(created)
}

/// ---------------------------------------------------------------------------
/// Validation
/// ---------------------------------------------------------------------------

fn validate_symptoms(symptoms: Vec<NewSymptom>) -> AppResult<Vec<NewSymptom>> {
  if symptoms.is_empty() {
    return Err(AppError::validation("Symptoms array is required"));
  }

  symptoms
    .into_iter()
    .map(|symptom| {
      let symptom_type = symptom.symptom_type.trim().to_string();
      if symptom_type.is_empty() {
        return Err(AppError::validation("Symptom type is required"));
      }
      if let Some(severity) = symptom.severity {
        if !(MIN_SEVERITY..=MAX_SEVERITY).contains(&severity) {
          return Err(AppError::validation(format!(
            "Severity must be between {} and {}, got {}",
            MIN_SEVERITY, MAX_SEVERITY, severity
          )));
        }
      }
      let notes = symptom.notes.filter(|n| !n.trim().is_empty());
      Ok(NewSymptom {
        symptom_type,
        notes,
        ..symptom
      })
    })
    .collect()
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------
