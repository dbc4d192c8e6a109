use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Recipe {
  pub id: i64,
  pub title: String,
  pub description: String,
  /// A phase name, or "all" for recipes suited to every phase
  pub phase: String,
  /// Stored as a JSON array of strings
  #[sqlx(rename = "ingredients_json")]
  #[sqlx(json)]
  pub ingredients: Vec<String>,
  pub instructions: String,
  pub prep_time_minutes: Option<i64>,
  pub image_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct MeditationVideo {
  pub id: i64,
  pub title: String,
  pub description: String,
  pub category: String,
  pub video_url: String,
  pub duration_minutes: Option<i64>,
  pub thumbnail_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct EducationalContent {
  pub id: i64,
  pub title: String,
  pub summary: String,
  pub body: String,
  pub category: String,
  pub read_time_minutes: Option<i64>,
}
