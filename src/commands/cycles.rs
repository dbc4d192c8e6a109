//! Tauri commands for cycle records, phase status and the calendar

use chrono::NaiveDate;
use serde::Serialize;
use std::sync::Arc;
use tauri::State;

use super::auth::require_user;
use crate::cycle::{calendar_month, estimate_cycle_length, CalendarMonth, CycleLength, CycleStatus};
use crate::db::{AppState, DbPool};
use crate::error::{AppError, AppResult};
use crate::models::{Cycle, User};
use crate::storage;

/// ---------------------------------------------------------------------------
/// Cycle Records
/// ---------------------------------------------------------------------------

/// Recorded cycles, oldest first
#[tauri::command]
pub async fn get_cycles(state: State<'_, Arc<AppState>>) -> Result<Vec<Cycle>, AppError> {
  let user = require_user(&state.db).await?;
  storage::get_cycles(&state.db, &user.id).await
}

/// Record a new period start
#[tauri::command]
pub async fn create_cycle(
  state: State<'_, Arc<AppState>>,
  start_date: Option<String>,
) -> Result<Cycle, AppError> {
  let user = require_user(&state.db).await?;
  let start_date = super::parse_date("Start date", start_date.as_deref().unwrap_or_default())?;

  let cycle = storage::create_cycle(&state.db, &user.id, start_date).await?;
  tracing::info!(user_id = %user.id, start_date = %start_date, "Cycle recorded");
  Ok(cycle)
}

/// Backfill when a period ended
#[tauri::command]
pub async fn set_cycle_end_date(
  state: State<'_, Arc<AppState>>,
  cycle_id: i64,
  end_date: String,
) -> Result<Cycle, AppError> {
  let user = require_user(&state.db).await?;
  let end_date = super::parse_date("End date", &end_date)?;
  storage::set_cycle_end_date(&state.db, &user.id, cycle_id, end_date).await
}

/// ---------------------------------------------------------------------------
/// Phase Status
/// ---------------------------------------------------------------------------

/// Phase card data for today, or `None` before any cycle is recorded
#[tauri::command]
pub async fn get_cycle_status(
  state: State<'_, Arc<AppState>>,
) -> Result<Option<CycleStatus>, AppError> {
  let user = require_user(&state.db).await?;
  cycle_status_for(&state.db, &user, super::today()).await
}

pub(crate) async fn cycle_status_for(
  db: &DbPool,
  user: &User,
  today: NaiveDate,
) -> AppResult<Option<CycleStatus>> {
  let latest = storage::latest_cycle(db, &user.id).await?;
  Ok(latest.map(|cycle| CycleStatus::compute(today, cycle.start_date, user.cycle_length())))
}

/// ---------------------------------------------------------------------------
/// Calendar
/// ---------------------------------------------------------------------------

/// Month calendar (month is 1-based) annotated from the most recent cycle
#[tauri::command]
pub async fn get_calendar(
  state: State<'_, Arc<AppState>>,
  year: i32,
  month: u32,
) -> Result<CalendarMonth, AppError> {
  let user = require_user(&state.db).await?;
  calendar_for(&state.db, &user, year, month, super::today()).await
}

pub(crate) async fn calendar_for(
  db: &DbPool,
  user: &User,
  year: i32,
  month: u32,
  today: NaiveDate,
) -> AppResult<CalendarMonth> {
  let last_start = storage::latest_cycle(db, &user.id).await?.map(|c| c.start_date);
  Ok(calendar_month(year, month, last_start, user.cycle_length(), today)?)
}

/// ---------------------------------------------------------------------------
/// History Insights
/// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct CycleInsights {
  pub recorded_cycles: usize,
  pub configured_cycle_length: CycleLength,
  /// Average gap between recorded starts, or the configured length without history
  pub estimated_cycle_length: CycleLength,
  /// Average of backfilled period lengths (start through end, inclusive)
  pub observed_period_length: Option<f64>,
}

impl CycleInsights {
  pub fn from_history(cycles: &[Cycle], configured: CycleLength) -> Self {
    let starts: Vec<NaiveDate> = cycles.iter().map(|c| c.start_date).collect();

    let period_lengths: Vec<i64> = cycles
      .iter()
      .filter_map(|c| c.end_date.map(|end| (end - c.start_date).num_days() + 1))
      .collect();
    let observed_period_length = if period_lengths.is_empty() {
      None
    } else {
      Some(period_lengths.iter().sum::<i64>() as f64 / period_lengths.len() as f64)
    };

    Self {
      recorded_cycles: cycles.len(),
      configured_cycle_length: configured,
      estimated_cycle_length: estimate_cycle_length(&starts, configured),
      observed_period_length,
    }
  }
}

#[tauri::command]
pub async fn get_cycle_insights(
  state: State<'_, Arc<AppState>>,
) -> Result<CycleInsights, AppError> {
  let user = require_user(&state.db).await?;
  let cycles = storage::get_cycles(&state.db, &user.id).await?;
  Ok(CycleInsights::from_history(&cycles, user.cycle_length()))
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------
