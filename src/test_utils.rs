//! Test utilities and helpers for unit and command tests
//!
//! This module provides common test infrastructure including:
//! - Database setup/teardown
//! - Seeded users, sessions and cycles
//! - Mock data factories

use crate::auth::SessionTokens;
use crate::commands::auth::save_session;
use crate::models::{Cycle, NewSymptom, NewUser, User};
use crate::storage;
use chrono::{Duration, NaiveDate, Utc};
use sqlx::SqlitePool;

/// ---------------------------------------------------------------------------
/// Database Test Utilities
/// ---------------------------------------------------------------------------

/// Create an in-memory SQLite database for testing
/// Runs all migrations (schema and seeded content) and returns a ready-to-use pool
///
/// Uses max_connections(1) so every query sees the same in-memory database
pub async fn setup_test_db() -> SqlitePool {
  let pool = sqlx::sqlite::SqlitePoolOptions::new()
    .max_connections(1)
    .connect("sqlite::memory:")
    .await
    .expect("Failed to create in-memory database");

  sqlx::migrate!("./migrations")
    .run(&pool)
    .await
    .expect("Failed to run migrations");

  pool
}

/// Close a test database pool
pub async fn teardown_test_db(pool: SqlitePool) {
  pool.close().await;
}

/// Insert the mock user with default cycle settings (28 / 5 days)
pub async fn seed_test_user(pool: &SqlitePool) -> User {
  storage::upsert_user(pool, &mock_new_user())
    .await
    .expect("Failed to seed test user")
}

/// Insert the mock user and open a session for them
pub async fn seed_signed_in_user(pool: &SqlitePool) -> User {
  let user = seed_test_user(pool).await;
  save_session(pool, &user.id, &mock_session_tokens())
    .await
    .expect("Failed to seed session");
  user
}

/// Record one cycle per start date
pub async fn seed_test_cycles(pool: &SqlitePool, user_id: &str, starts: &[NaiveDate]) -> Vec<Cycle> {
  let mut cycles = Vec::with_capacity(starts.len());
  for start in starts {
    let cycle = storage::create_cycle(pool, user_id, *start)
      .await
      .expect("Failed to seed test cycle");
    cycles.push(cycle);
  }
  cycles
}

/// ---------------------------------------------------------------------------
/// Mock Data Factories
/// ---------------------------------------------------------------------------

/// Identity claims as they arrive from the provider
pub fn mock_new_user() -> NewUser {
  NewUser {
    id: "user-42".to_string(),
    email: Some("maya@example.com".to_string()),
    first_name: Some("Maya".to_string()),
    last_name: None,
    profile_image_url: None,
  }
}

/// Tokens valid for another hour
pub fn mock_session_tokens() -> SessionTokens {
  SessionTokens {
    access_token: "access-token".to_string(),
    refresh_token: Some("refresh-token".to_string()),
    expires_at: Some(Utc::now() + Duration::hours(1)),
  }
}

pub fn mock_new_symptom(symptom_type: &str, severity: Option<i64>) -> NewSymptom {
  NewSymptom {
    symptom_type: symptom_type.to_string(),
    severity,
    notes: None,
  }
}

/// Unsaved cycle row for pure computations over history
pub fn mock_cycle(id: i64, start_date: NaiveDate, end_date: Option<NaiveDate>) -> Cycle {
  Cycle {
    id,
    user_id: mock_new_user().id,
    start_date,
    end_date,
    created_at: None,
  }
}

/// ---------------------------------------------------------------------------
/// Time Helpers
/// ---------------------------------------------------------------------------

pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
  NaiveDate::from_ymd_opt(year, month, day).expect("Invalid test date")
}

/// ---------------------------------------------------------------------------
/// Tests for Test Utilities
/// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn test_setup_db_creates_schema_and_content() {
    let pool = setup_test_db().await;

    let tables: Vec<(String,)> = sqlx::query_as(
      "SELECT name FROM sqlite_master WHERE type='table' AND name IN ('users', 'session', 'cycles', 'symptoms', 'chat_messages', 'favorites')"
    )
    .fetch_all(&pool)
    .await
    .expect("Failed to query tables");
    assert_eq!(tables.len(), 6);

    let recipes: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM recipes")
      .fetch_one(&pool)
      .await
      .expect("Failed to count recipes");
    assert!(recipes > 0);

    teardown_test_db(pool).await;
  }

  #[tokio::test]
  async fn test_seed_helpers() {
    let pool = setup_test_db().await;

    let user = seed_signed_in_user(&pool).await;
    assert_eq!(user.id, "user-42");
    assert_eq!(user.average_cycle_length, 28);

    let cycles = seed_test_cycles(&pool, &user.id, &[date(2025, 1, 1), date(2025, 1, 29)]).await;
    assert_eq!(cycles.len(), 2);
    assert_eq!(cycles[1].start_date, date(2025, 1, 29));

    teardown_test_db(pool).await;
  }

  #[test]
  fn test_mock_factories_create_valid_data() {
    assert!(!mock_session_tokens().needs_refresh());
    assert_eq!(mock_new_symptom("cramps", None).severity, None);
    assert_eq!(mock_cycle(1, date(2025, 1, 1), None).user_id, "user-42");
  }
}
