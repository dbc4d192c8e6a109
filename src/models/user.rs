use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::cycle::CycleLength;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
  pub id: String,
  pub email: Option<String>,
  pub first_name: Option<String>,
  pub last_name: Option<String>,
  pub profile_image_url: Option<String>,
  pub date_of_birth: Option<NaiveDate>,
  pub average_cycle_length: i64,
  pub average_period_length: i64,
  pub created_at: Option<DateTime<Utc>>,
  pub updated_at: Option<DateTime<Utc>>,
}

impl User {
  /// Configured cycle length, canonical 28 if the stored value is out of range
  pub fn cycle_length(&self) -> CycleLength {
    CycleLength::new(self.average_cycle_length).unwrap_or_default()
  }
}

/// Identity claims from the provider, used to create or refresh a user row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUser {
  pub id: String,
  pub email: Option<String>,
  pub first_name: Option<String>,
  pub last_name: Option<String>,
  pub profile_image_url: Option<String>,
}

/// Partial profile update; `None` keeps the stored value
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileUpdate {
  pub first_name: Option<String>,
  pub last_name: Option<String>,
  pub date_of_birth: Option<NaiveDate>,
  pub average_cycle_length: Option<i64>,
  pub average_period_length: Option<i64>,
}
