//! Persistence for users, cycles, symptoms, chat and wellness content
//!
//! Thin sqlx wrappers over the SQLite schema in `migrations/`. Input is
//! expected to be validated by the command layer before it reaches here.

use chrono::NaiveDate;

use crate::cycle::Phase;
use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::{
  ChatMessage, ChatRole, Cycle, EducationalContent, Favorite, FavoriteKind, MeditationVideo,
  NewSymptom, NewUser, ProfileUpdate, Recipe, Symptom, User,
};
use crate::models::symptom::DEFAULT_SEVERITY;

/// Filter value meaning "no filter" for content listings
pub const ALL_FILTER: &str = "all";

fn is_unique_violation(e: &sqlx::Error) -> bool {
  matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
}

/// ---------------------------------------------------------------------------
/// Users
/// ---------------------------------------------------------------------------

pub async fn get_user(db: &DbPool, user_id: &str) -> AppResult<Option<User>> {
  let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?1")
    .bind(user_id)
    .fetch_optional(db)
    .await?;
  Ok(user)
}

/// Insert a user from provider claims, or refresh the claim fields of an existing one.
/// Profile settings (cycle length, date of birth) are never overwritten here.
pub async fn upsert_user(db: &DbPool, new_user: &NewUser) -> AppResult<User> {
  let user = sqlx::query_as::<_, User>(
    r#"
    INSERT INTO users (id, email, first_name, last_name, profile_image_url)
    VALUES (?1, ?2, ?3, ?4, ?5)
    ON CONFLICT(id) DO UPDATE SET
      email = excluded.email,
      first_name = COALESCE(users.first_name, excluded.first_name),
      last_name = COALESCE(users.last_name, excluded.last_name),
      profile_image_url = excluded.profile_image_url,
      updated_at = CURRENT_TIMESTAMP
    RETURNING *
    "#,
  )
  .bind(&new_user.id)
  .bind(&new_user.email)
  .bind(&new_user.first_name)
  .bind(&new_user.last_name)
  .bind(&new_user.profile_image_url)
  .fetch_one(db)
  .await?;

  Ok(user)
}

pub async fn update_user(db: &DbPool, user_id: &str, update: &ProfileUpdate) -> AppResult<User> {
  sqlx::query_as::<_, User>(
    r#"
    UPDATE users SET
      first_name = COALESCE(?1, first_name),
      last_name = COALESCE(?2, last_name),
      date_of_birth = COALESCE(?3, date_of_birth),
      average_cycle_length = COALESCE(?4, average_cycle_length),
      average_period_length = COALESCE(?5, average_period_length),
      updated_at = CURRENT_TIMESTAMP
    WHERE id = ?6
    RETURNING *
    "#,
  )
  .bind(&update.first_name)
  .bind(&update.last_name)
  .bind(update.date_of_birth)
  .bind(update.average_cycle_length)
  .bind(update.average_period_length)
  .bind(user_id)
  .fetch_optional(db)
  .await?
  .ok_or_else(|| AppError::NotFound(format!("user {}", user_id)))
}

/// ---------------------------------------------------------------------------
/// Cycles
/// ---------------------------------------------------------------------------

/// All recorded cycles, oldest first
pub async fn get_cycles(db: &DbPool, user_id: &str) -> AppResult<Vec<Cycle>> {
  let cycles = sqlx::query_as::<_, Cycle>(
    "SELECT * FROM cycles WHERE user_id = ?1 ORDER BY start_date ASC",
  )
  .bind(user_id)
  .fetch_all(db)
  .await?;
  Ok(cycles)
}

pub async fn latest_cycle(db: &DbPool, user_id: &str) -> AppResult<Option<Cycle>> {
  let cycle = sqlx::query_as::<_, Cycle>(
    "SELECT * FROM cycles WHERE user_id = ?1 ORDER BY start_date DESC LIMIT 1",
  )
  .bind(user_id)
  .fetch_optional(db)
  .await?;
  Ok(cycle)
}

pub async fn create_cycle(db: &DbPool, user_id: &str, start_date: NaiveDate) -> AppResult<Cycle> {
  sqlx::query_as::<_, Cycle>(
    "INSERT INTO cycles (user_id, start_date) VALUES (?1, ?2) RETURNING *",
  )
  .bind(user_id)
  .bind(start_date)
  .fetch_one(db)
  .await
  .map_err(|e| {
    if is_unique_violation(&e) {
      AppError::validation(format!("A cycle starting on {} is already recorded", start_date))
    } else {
      e.into()
    }
  })
}

/// Backfill the end date of a cycle owned by `user_id`
pub async fn set_cycle_end_date(
  db: &DbPool,
  user_id: &str,
  cycle_id: i64,
  end_date: NaiveDate,
) -> AppResult<Cycle> {
  let cycle = sqlx::query_as::<_, Cycle>("SELECT * FROM cycles WHERE id = ?1 AND user_id = ?2")
    .bind(cycle_id)
    .bind(user_id)
    .fetch_optional(db)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("cycle {}", cycle_id)))?;

  if end_date < cycle.start_date {
    return Err(AppError::validation(format!(
      "End date {} is before the cycle start {}",
      end_date, cycle.start_date
    )));
  }

  let updated = sqlx::query_as::<_, Cycle>(
    "UPDATE cycles SET end_date = ?1 WHERE id = ?2 RETURNING *",
  )
  .bind(end_date)
  .bind(cycle_id)
  .fetch_one(db)
  .await?;

  Ok(updated)
}

/// ---------------------------------------------------------------------------
/// Symptoms
/// ---------------------------------------------------------------------------

/// Logged symptoms, newest first
pub async fn get_symptoms(db: &DbPool, user_id: &str, limit: Option<i64>) -> AppResult<Vec<Symptom>> {
  let symptoms = sqlx::query_as::<_, Symptom>(
    "SELECT * FROM symptoms WHERE user_id = ?1 ORDER BY date DESC, id DESC LIMIT ?2",
  )
  .bind(user_id)
  .bind(limit.unwrap_or(-1))
  .fetch_all(db)
  .await?;
  Ok(symptoms)
}

/// Insert a batch of symptoms for one date, all or nothing
pub async fn create_symptoms(
  db: &DbPool,
  user_id: &str,
  date: NaiveDate,
  symptoms: &[NewSymptom],
) -> AppResult<Vec<Symptom>> {
  let mut tx = db.begin().await?;
  let mut created = Vec::with_capacity(symptoms.len());

  for symptom in symptoms {
    let row = sqlx::query_as::<_, Symptom>(
      r#"
      INSERT INTO symptoms (user_id, date, symptom_type, severity, notes)
      VALUES (?1, ?2, ?3, ?4, ?5)
      RETURNING *
      "#,
    )
    .bind(user_id)
    .bind(date)
    .bind(&symptom.symptom_type)
    .bind(symptom.severity.unwrap_or(DEFAULT_SEVERITY))
    .bind(&symptom.notes)
    .fetch_one(&mut *tx)
    .await?;
    created.push(row);
  }

  tx.commit().await?;
  Ok(created)
}

/// ---------------------------------------------------------------------------
/// Chat
/// ---------------------------------------------------------------------------

pub async fn create_chat_message(
  db: &DbPool,
  user_id: &str,
  role: ChatRole,
  content: &str,
  cycle_phase: Option<Phase>,
) -> AppResult<ChatMessage> {
  let message = sqlx::query_as::<_, ChatMessage>(
    r#"
    INSERT INTO chat_messages (user_id, role, content, cycle_phase)
    VALUES (?1, ?2, ?3, ?4)
    RETURNING *
    "#,
  )
  .bind(user_id)
  .bind(role.as_str())
  .bind(content)
  .bind(cycle_phase.map(|p| p.as_str()))
  .fetch_one(db)
  .await?;
  Ok(message)
}

/// The most recent `limit` messages (all when `None`), oldest first
pub async fn get_chat_history(
  db: &DbPool,
  user_id: &str,
  limit: Option<i64>,
) -> AppResult<Vec<ChatMessage>> {
  let messages = sqlx::query_as::<_, ChatMessage>(
    r#"
    SELECT * FROM (
      SELECT * FROM chat_messages WHERE user_id = ?1 ORDER BY id DESC LIMIT ?2
    )
    ORDER BY id ASC
    "#,
  )
  .bind(user_id)
  .bind(limit.unwrap_or(-1))
  .fetch_all(db)
  .await?;
  Ok(messages)
}

/// ---------------------------------------------------------------------------
/// Wellness Content
/// ---------------------------------------------------------------------------

/// Recipes, optionally limited to one phase. Recipes tagged "all" match every phase.
pub async fn get_recipes(db: &DbPool, phase: Option<Phase>) -> AppResult<Vec<Recipe>> {
  let recipes = match phase {
    Some(phase) => {
      sqlx::query_as::<_, Recipe>(
        "SELECT * FROM recipes WHERE phase = ?1 OR phase = ?2 ORDER BY id",
      )
      .bind(phase.as_str())
      .bind(ALL_FILTER)
      .fetch_all(db)
      .await?
    }
    None => {
      sqlx::query_as::<_, Recipe>("SELECT * FROM recipes ORDER BY id")
        .fetch_all(db)
        .await?
    }
  };
  Ok(recipes)
}

pub async fn get_meditation_videos(
  db: &DbPool,
  category: Option<&str>,
) -> AppResult<Vec<MeditationVideo>> {
  let videos = match category {
    Some(category) => {
      sqlx::query_as::<_, MeditationVideo>(
        "SELECT * FROM meditation_videos WHERE category = ?1 ORDER BY id",
      )
      .bind(category)
      .fetch_all(db)
      .await?
    }
    None => {
      sqlx::query_as::<_, MeditationVideo>("SELECT * FROM meditation_videos ORDER BY id")
        .fetch_all(db)
        .await?
    }
  };
  Ok(videos)
}

pub async fn get_educational_content(
  db: &DbPool,
  category: Option<&str>,
) -> AppResult<Vec<EducationalContent>> {
  let content = match category {
    Some(category) => {
      sqlx::query_as::<_, EducationalContent>(
        "SELECT * FROM educational_content WHERE category = ?1 ORDER BY id",
      )
      .bind(category)
      .fetch_all(db)
      .await?
    }
    None => {
      sqlx::query_as::<_, EducationalContent>("SELECT * FROM educational_content ORDER BY id")
        .fetch_all(db)
        .await?
    }
  };
  Ok(content)
}

/// ---------------------------------------------------------------------------
/// Favorites
/// ---------------------------------------------------------------------------

pub async fn get_favorites(db: &DbPool, user_id: &str) -> AppResult<Vec<Favorite>> {
  let favorites = sqlx::query_as::<_, Favorite>(
    "SELECT * FROM favorites WHERE user_id = ?1 ORDER BY created_at DESC, id DESC",
  )
  .bind(user_id)
  .fetch_all(db)
  .await?;
  Ok(favorites)
}

/// Favorite an item. Adding an existing favorite returns the stored row.
pub async fn add_favorite(
  db: &DbPool,
  user_id: &str,
  kind: FavoriteKind,
  item_id: i64,
) -> AppResult<Favorite> {
  // Table name comes from a fixed enum mapping, never from input
  let exists_sql = format!("SELECT COUNT(*) FROM {} WHERE id = ?1", kind.table());
  let exists: i64 = sqlx::query_scalar(&exists_sql)
    .bind(item_id)
    .fetch_one(db)
    .await?;
  if exists == 0 {
    return Err(AppError::NotFound(format!("{} {}", kind, item_id)));
  }

  sqlx::query(
    r#"
    INSERT INTO favorites (user_id, item_type, item_id)
    VALUES (?1, ?2, ?3)
    ON CONFLICT(user_id, item_type, item_id) DO NOTHING
    "#,
  )
  .bind(user_id)
  .bind(kind.as_str())
  .bind(item_id)
  .execute(db)
  .await?;

  let favorite = sqlx::query_as::<_, Favorite>(
    "SELECT * FROM favorites WHERE user_id = ?1 AND item_type = ?2 AND item_id = ?3",
  )
  .bind(user_id)
  .bind(kind.as_str())
  .bind(item_id)
  .fetch_one(db)
  .await?;

  Ok(favorite)
}

/// Returns whether a favorite was removed
pub async fn remove_favorite(
  db: &DbPool,
  user_id: &str,
  kind: FavoriteKind,
  item_id: i64,
) -> AppResult<bool> {
  let result = sqlx::query(
    "DELETE FROM favorites WHERE user_id = ?1 AND item_type = ?2 AND item_id = ?3",
  )
  .bind(user_id)
  .bind(kind.as_str())
  .bind(item_id)
  .execute(db)
  .await?;

  Ok(result.rows_affected() > 0)
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------
