use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FavoriteKind {
  Recipe,
  MeditationVideo,
  EducationalContent,
}

impl FavoriteKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      FavoriteKind::Recipe => "recipe",
      FavoriteKind::MeditationVideo => "meditation_video",
      FavoriteKind::EducationalContent => "educational_content",
    }
  }

  /// Table holding the favorited item
  pub fn table(&self) -> &'static str {
    match self {
      FavoriteKind::Recipe => "recipes",
      FavoriteKind::MeditationVideo => "meditation_videos",
      FavoriteKind::EducationalContent => "educational_content",
    }
  }
}

impl std::fmt::Display for FavoriteKind {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

impl std::str::FromStr for FavoriteKind {
  type Err = String;
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "recipe" => Ok(FavoriteKind::Recipe),
      "meditation_video" => Ok(FavoriteKind::MeditationVideo),
      "educational_content" => Ok(FavoriteKind::EducationalContent),
      _ => Err(format!("Unknown favorite type: {}", s)),
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Favorite {
  pub id: i64,
  pub user_id: String,
  pub item_type: String,
  pub item_id: i64,
  pub created_at: Option<DateTime<Utc>>,
}
