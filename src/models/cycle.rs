use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// One recorded period start
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Cycle {
  pub id: i64,
  pub user_id: String,
  pub start_date: NaiveDate,
  pub end_date: Option<NaiveDate>,
  pub created_at: Option<DateTime<Utc>>,
}
