use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_SEVERITY: i64 = 3;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Symptom {
  pub id: i64,
  pub user_id: String,
  pub date: NaiveDate,
  pub symptom_type: String,
  pub severity: i64,
  pub notes: Option<String>,
  pub created_at: Option<DateTime<Utc>>,
}

/// Symptom as submitted by the frontend (date is assigned server-side)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSymptom {
  pub symptom_type: String,
  pub severity: Option<i64>,
  pub notes: Option<String>,
}
