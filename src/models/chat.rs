use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
  User,
  Assistant,
}

impl ChatRole {
  pub fn as_str(&self) -> &'static str {
    match self {
      ChatRole::User => "user",
      ChatRole::Assistant => "assistant",
    }
  }
}

impl std::str::FromStr for ChatRole {
  type Err = String;
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "user" => Ok(ChatRole::User),
      "assistant" => Ok(ChatRole::Assistant),
      _ => Err(format!("Unknown chat role: {}", s)),
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ChatMessage {
  pub id: i64,
  pub user_id: String,
  pub role: String,
  pub content: String,
  pub cycle_phase: Option<String>,
  pub created_at: Option<DateTime<Utc>>,
}
