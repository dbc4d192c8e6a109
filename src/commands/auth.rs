use crate::auth::{
  build_auth_url, exchange_code_for_tokens, fetch_user_info, new_login_state, refresh_tokens,
  wait_for_callback, AuthConfig, AuthError, SessionTokens, CALLBACK_TIMEOUT_SECONDS,
};
use crate::cycle::CycleLength;
use crate::db::{AppState, DbPool};
use crate::error::{AppError, AppResult};
use crate::models::{NewUser, ProfileUpdate, User};
use crate::storage;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::sync::Arc;
use tauri::State;

/// Longest period length accepted from profile input
const MAX_PERIOD_LENGTH: i64 = 15;

/// ---------------------------------------------------------------------------
/// Start Sign-In
/// ---------------------------------------------------------------------------

/// Returns the provider's authorization URL.
/// Frontend should open this URL in the default browser.
#[tauri::command]
pub async fn auth_start_login(state: State<'_, Arc<AppState>>) -> Result<String, AppError> {
  let config = AuthConfig::from_env()?;
  let login_state = begin_login(&state)?;
  Ok(build_auth_url(&config, &login_state)?)
}

/// Remember a fresh OAuth state for the callback, replacing any abandoned attempt
pub(crate) fn begin_login(app_state: &AppState) -> AppResult<String> {
  let login_state = new_login_state();
  let mut pending = app_state
    .pending_login
    .lock()
    .map_err(|e| AuthError::Server(e.to_string()))?;
  *pending = Some(login_state.clone());
  Ok(login_state)
}

/// The state issued by `begin_login`, usable once
pub(crate) fn take_pending_login(app_state: &AppState) -> AppResult<String> {
  let mut pending = app_state
    .pending_login
    .lock()
    .map_err(|e| AuthError::Server(e.to_string()))?;
  pending
    .take()
    .ok_or_else(|| AuthError::OAuth("No sign-in in progress".into()).into())
}

/// ---------------------------------------------------------------------------
/// Wait for Callback and Complete Sign-In
/// ---------------------------------------------------------------------------

/// Waits for the OAuth callback, exchanges the code, loads the user's claims
/// and opens the local session. Call immediately after auth_start_login.
#[tauri::command]
pub async fn auth_complete_login(state: State<'_, Arc<AppState>>) -> Result<User, AppError> {
  let config = AuthConfig::from_env()?;
  let expected_state = take_pending_login(&state)?;

  // Wait for callback (blocking - runs on the blocking pool)
  let callback = tokio::task::spawn_blocking(move || {
    wait_for_callback(&expected_state, CALLBACK_TIMEOUT_SECONDS)
  })
  .await
  .map_err(|e| AuthError::Server(e.to_string()))??;

  let tokens = exchange_code_for_tokens(&config, &callback.code).await?;
  let info = fetch_user_info(&config, &tokens.access_token).await?;

  let user = complete_login(&state.db, info.into(), &tokens).await?;
  tracing::info!(user_id = %user.id, "Sign-in completed");
  Ok(user)
}

/// Store the user and open the session for them
pub(crate) async fn complete_login(
  db: &DbPool,
  new_user: NewUser,
  tokens: &SessionTokens,
) -> AppResult<User> {
  let user = storage::upsert_user(db, &new_user).await?;
  save_session(db, &user.id, tokens).await?;
  Ok(user)
}

/// ---------------------------------------------------------------------------
/// Session Status
/// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct AuthStatus {
  pub is_authenticated: bool,
  pub expires_at: Option<String>,
  pub needs_refresh: bool,
}

#[tauri::command]
pub async fn auth_get_status(state: State<'_, Arc<AppState>>) -> Result<AuthStatus, AppError> {
  match load_session(&state.db).await? {
    Some((_, tokens)) => Ok(AuthStatus {
      // An expired session still counts while it can be renewed
      is_authenticated: !tokens.is_expired() || tokens.refresh_token.is_some(),
      expires_at: tokens.expires_at.map(|t| t.to_rfc3339()),
      needs_refresh: tokens.needs_refresh(),
    }),
    None => Ok(AuthStatus {
      is_authenticated: false,
      expires_at: None,
      needs_refresh: false,
    }),
  }
}

/// ---------------------------------------------------------------------------
/// Refresh / Sign Out
/// ---------------------------------------------------------------------------

#[tauri::command]
pub async fn auth_refresh_session(state: State<'_, Arc<AppState>>) -> Result<(), AppError> {
  let config = AuthConfig::from_env()?;

  let (user_id, tokens) = load_session(&state.db)
    .await?
    .ok_or(AppError::NotAuthenticated)?;
  let refresh_token = tokens
    .refresh_token
    .ok_or_else(|| AuthError::OAuth("Session has no refresh token".into()))?;

  let new_tokens = refresh_tokens(&config, &refresh_token).await?;
  save_session(&state.db, &user_id, &new_tokens).await?;

  tracing::info!("Session tokens refreshed");
  Ok(())
}

#[tauri::command]
pub async fn auth_logout(state: State<'_, Arc<AppState>>) -> Result<(), AppError> {
  clear_session(&state.db).await?;
  tracing::info!("Signed out");
  Ok(())
}

/// ---------------------------------------------------------------------------
/// Current User
/// ---------------------------------------------------------------------------

#[tauri::command]
pub async fn get_current_user(state: State<'_, Arc<AppState>>) -> Result<User, AppError> {
  require_user(&state.db).await
}

#[tauri::command]
pub async fn update_profile(
  state: State<'_, Arc<AppState>>,
  first_name: Option<String>,
  last_name: Option<String>,
  date_of_birth: Option<String>,
  average_cycle_length: Option<i64>,
  average_period_length: Option<i64>,
) -> Result<User, AppError> {
  let user = require_user(&state.db).await?;

  let date_of_birth = match date_of_birth.as_deref() {
    Some(value) => Some(super::parse_date("Date of birth", value)?),
    None => None,
  };

  let update = ProfileUpdate {
    first_name,
    last_name,
    date_of_birth,
    average_cycle_length,
    average_period_length,
  };

  apply_profile_update(&state.db, &user, update, super::today()).await
}

pub(crate) async fn apply_profile_update(
  db: &DbPool,
  user: &User,
  update: ProfileUpdate,
  today: NaiveDate,
) -> AppResult<User> {
  validate_profile_update(user, &update, today)?;
  let updated = storage::update_user(db, &user.id, &update).await?;
  tracing::info!(user_id = %user.id, "Profile updated");
  Ok(updated)
}

fn validate_profile_update(user: &User, update: &ProfileUpdate, today: NaiveDate) -> AppResult<()> {
  let cycle_length = match update.average_cycle_length {
    Some(days) => CycleLength::new(days)?,
    None => user.cycle_length(),
  };

  if let Some(days) = update.average_period_length {
    if days < 1 || days > MAX_PERIOD_LENGTH || days > cycle_length.days() as i64 {
      return Err(AppError::validation(format!(
        "Period length must be between 1 and {} days and no longer than the cycle, got {}",
        MAX_PERIOD_LENGTH, days
      )));
    }
  }

  if let Some(dob) = update.date_of_birth {
    if dob > today {
      return Err(AppError::validation("Date of birth cannot be in the future"));
    }
  }

  Ok(())
}

/// ---------------------------------------------------------------------------
/// Session Management (Database Helpers)
/// ---------------------------------------------------------------------------

/// The signed-in user, or `NotAuthenticated`.
/// An expired session is renewed with its refresh token when possible.
pub(crate) async fn require_user(db: &DbPool) -> AppResult<User> {
  require_user_with(db, AuthConfig::from_env).await
}

async fn require_user_with<F>(db: &DbPool, load_config: F) -> AppResult<User>
where
  F: FnOnce() -> Result<AuthConfig, AuthError>,
{
  let (user_id, tokens) = load_session(db).await?.ok_or(AppError::NotAuthenticated)?;

  if tokens.is_expired() {
    renew_session(db, &user_id, tokens, load_config).await?;
  }

  storage::get_user(db, &user_id)
    .await?
    .ok_or(AppError::NotAuthenticated)
}

async fn renew_session<F>(
  db: &DbPool,
  user_id: &str,
  tokens: SessionTokens,
  load_config: F,
) -> AppResult<()>
where
  F: FnOnce() -> Result<AuthConfig, AuthError>,
{
  let Some(refresh_token) = tokens.refresh_token else {
    tracing::warn!(user_id, "Session expired without a refresh token");
    return Err(AppError::NotAuthenticated);
  };

  let renewed = match load_config() {
    Ok(config) => refresh_tokens(&config, &refresh_token).await,
    Err(e) => Err(e),
  };

  match renewed {
    Ok(new_tokens) => {
      save_session(db, user_id, &new_tokens).await?;
      tracing::info!(user_id, "Expired session renewed");
      Ok(())
    }
    Err(e) => {
      tracing::warn!(user_id, error = %e, "Could not renew expired session");
      Err(AppError::NotAuthenticated)
    }
  }
}

async fn load_session(db: &DbPool) -> AppResult<Option<(String, SessionTokens)>> {
  let row: Option<(String, String, Option<String>, Option<DateTime<Utc>>)> = sqlx::query_as(
    "SELECT user_id, access_token, refresh_token, expires_at FROM session WHERE id = 1",
  )
  .fetch_optional(db)
  .await?;

  Ok(row.map(|(user_id, access_token, refresh_token, expires_at)| {
    (
      user_id,
      SessionTokens {
        access_token,
        refresh_token,
        expires_at,
      },
    )
  }))
}

pub(crate) async fn save_session(db: &DbPool, user_id: &str, tokens: &SessionTokens) -> AppResult<()> {
  sqlx::query(
    r#"
    INSERT INTO session (id, user_id, access_token, refresh_token, expires_at)
    VALUES (1, ?1, ?2, ?3, ?4)
    ON CONFLICT(id) DO UPDATE SET
      user_id = excluded.user_id,
      access_token = excluded.access_token,
      refresh_token = excluded.refresh_token,
      expires_at = excluded.expires_at,
      updated_at = CURRENT_TIMESTAMP
    "#,
  )
  .bind(user_id)
  .bind(&tokens.access_token)
  .bind(&tokens.refresh_token)
  .bind(tokens.expires_at)
  .execute(db)
  .await?;

  Ok(())
}

async fn clear_session(db: &DbPool) -> AppResult<()> {
  sqlx::query("DELETE FROM session WHERE id = 1")
    .execute(db)
    .await?;
  Ok(())
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------
