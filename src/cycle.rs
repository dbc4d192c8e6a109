//! Cycle phase engine
//!
//! Deterministic date arithmetic over a proportional 28-day model:
//! - which phase a calendar date falls into
//! - cycle day, days until the next period, PMS window
//! - month calendars annotated with phases and predictions
//!
//! Everything here is pure. Persistence and "today" are supplied by callers.

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// ---------------------------------------------------------------------------
/// Phase Band Constants
/// ---------------------------------------------------------------------------

/// Reference cycle length the band boundaries are expressed against
pub const CANONICAL_CYCLE_LENGTH: u32 = 28;

/// First canonical day (0-based) of the follicular phase
const FOLLICULAR_START: u32 = 5;

/// First canonical day of the ovulation phase
const OVULATION_START: u32 = 12;

/// First canonical day of the luteal phase
const LUTEAL_START: u32 = 15;

/// Width of the PMS window at the end of a canonical cycle
pub const PMS_WINDOW_DAYS: u32 = 5;

/// Longest cycle length accepted from user input
pub const MAX_CYCLE_LENGTH: u32 = 90;

/// Gaps shorter than this between recorded starts are treated as data-entry noise
const MIN_PLAUSIBLE_GAP_DAYS: i64 = 15;

/// ---------------------------------------------------------------------------
/// Error Types
/// ---------------------------------------------------------------------------

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CycleError {
  #[error("Cycle length must be between 1 and {max} days, got {0}", max = MAX_CYCLE_LENGTH)]
  InvalidCycleLength(i64),

  #[error("Invalid calendar month: {year}-{month}")]
  InvalidMonth { year: i32, month: u32 },
}

/// ---------------------------------------------------------------------------
/// Cycle Length
/// ---------------------------------------------------------------------------

/// A validated cycle length in days (1..=90)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct CycleLength(u32);

impl CycleLength {
  pub const CANONICAL: CycleLength = CycleLength(CANONICAL_CYCLE_LENGTH);

  pub fn new(days: i64) -> Result<Self, CycleError> {
    if days < 1 || days > MAX_CYCLE_LENGTH as i64 {
      return Err(CycleError::InvalidCycleLength(days));
    }
    Ok(Self(days as u32))
  }

  pub fn days(self) -> u32 {
    self.0
  }
}

impl Default for CycleLength {
  fn default() -> Self {
    Self::CANONICAL
  }
}

impl TryFrom<i64> for CycleLength {
  type Error = CycleError;

  fn try_from(days: i64) -> Result<Self, Self::Error> {
    Self::new(days)
  }
}

impl<'de> Deserialize<'de> for CycleLength {
  fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
  where
    D: serde::Deserializer<'de>,
  {
    let days = i64::deserialize(deserializer)?;
    CycleLength::new(days).map_err(serde::de::Error::custom)
  }
}

/// ---------------------------------------------------------------------------
/// Phase
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
  Menstrual,
  Follicular,
  Ovulation,
  Luteal,
}

/// Display copy for a phase card
#[derive(Debug, Clone, Serialize)]
pub struct PhaseInfo {
  pub phase: Phase,
  pub name: &'static str,
  pub description: &'static str,
  pub tips: &'static [&'static str],
  pub color: &'static str,
}

impl Phase {
  pub const ALL: [Phase; 4] = [
    Phase::Menstrual,
    Phase::Follicular,
    Phase::Ovulation,
    Phase::Luteal,
  ];

  pub fn as_str(&self) -> &'static str {
    match self {
      Phase::Menstrual => "menstrual",
      Phase::Follicular => "follicular",
      Phase::Ovulation => "ovulation",
      Phase::Luteal => "luteal",
    }
  }

  pub fn display_name(&self) -> &'static str {
    match self {
      Phase::Menstrual => "Menstrual Phase",
      Phase::Follicular => "Follicular Phase",
      Phase::Ovulation => "Ovulation Phase",
      Phase::Luteal => "Luteal Phase",
    }
  }

  /// Calendar dot color
  pub fn indicator_color(&self) -> &'static str {
    match self {
      Phase::Menstrual => "#E8B4BC",
      Phase::Follicular => "#D4C4B0",
      Phase::Ovulation => "#C9A9A6",
      Phase::Luteal => "#BFA89E",
    }
  }

  pub fn info(&self) -> PhaseInfo {
    let (description, tips): (&'static str, &'static [&'static str]) = match self {
      Phase::Menstrual => (
        "Your period has started. Hormone levels are at their lowest, so energy may dip and rest matters most.",
        &[
          "Prioritize sleep and gentle movement like walking or yoga",
          "Eat iron-rich foods such as leafy greens and lentils",
          "Use heat on your lower abdomen for cramps",
        ],
      ),
      Phase::Follicular => (
        "Estrogen is rising as your body prepares to ovulate. Energy, mood and focus usually climb.",
        &[
          "A good window for harder workouts and new projects",
          "Favor fresh vegetables, lean protein and fermented foods",
          "Plan social activities while energy is high",
        ],
      ),
      Phase::Ovulation => (
        "An egg is released and estrogen peaks. Many people feel their most confident and energetic.",
        &[
          "Stay hydrated and keep up fiber to support hormone balance",
          "High-intensity training tends to feel easier now",
          "Notice changes in cervical mucus and body temperature",
        ],
      ),
      Phase::Luteal => (
        "Progesterone rises after ovulation. Energy tapers and premenstrual symptoms can appear late in this phase.",
        &[
          "Choose complex carbohydrates and magnesium-rich foods",
          "Shift toward moderate exercise and stretching",
          "Limit caffeine and salt if you notice bloating or irritability",
        ],
      ),
    };

    PhaseInfo {
      phase: *self,
      name: self.display_name(),
      description,
      tips,
      color: self.indicator_color(),
    }
  }
}

impl std::fmt::Display for Phase {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

impl std::str::FromStr for Phase {
  type Err = String;
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "menstrual" => Ok(Phase::Menstrual),
      "follicular" => Ok(Phase::Follicular),
      "ovulation" => Ok(Phase::Ovulation),
      "luteal" => Ok(Phase::Luteal),
      _ => Err(format!("Unknown cycle phase: {}", s)),
    }
  }
}

/// ---------------------------------------------------------------------------
/// Phase Calculator
/// ---------------------------------------------------------------------------

/// True when `offset` lies before the canonical boundary scaled to `length`.
/// Integer comparison, so an offset exactly on a scaled boundary is not before it.
fn before_boundary(offset: u32, canonical_boundary: u32, length: CycleLength) -> bool {
  (offset as u64) * (CANONICAL_CYCLE_LENGTH as u64) < (canonical_boundary as u64) * (length.days() as u64)
}

/// Days since the most recent cycle boundary at or before `date`
pub fn day_offset(date: NaiveDate, last_period_start: NaiveDate, cycle_length: CycleLength) -> u32 {
  let elapsed = (date - last_period_start).num_days();
  elapsed.rem_euclid(cycle_length.days() as i64) as u32
}

/// Map an in-cycle offset onto its phase band.
///
/// Offsets at or past the cycle length wrap around first.
pub fn phase_for_offset(offset: u32, cycle_length: CycleLength) -> Phase {
  let offset = offset % cycle_length.days();

  if before_boundary(offset, FOLLICULAR_START, cycle_length) {
    Phase::Menstrual
  } else if before_boundary(offset, OVULATION_START, cycle_length) {
    Phase::Follicular
  } else if before_boundary(offset, LUTEAL_START, cycle_length) {
    Phase::Ovulation
  } else {
    Phase::Luteal
  }
}

pub fn phase_for(date: NaiveDate, last_period_start: NaiveDate, cycle_length: CycleLength) -> Phase {
  phase_for_offset(day_offset(date, last_period_start, cycle_length), cycle_length)
}

/// 1-based day within the current cycle
pub fn cycle_day(date: NaiveDate, last_period_start: NaiveDate, cycle_length: CycleLength) -> u32 {
  day_offset(date, last_period_start, cycle_length) + 1
}

/// Days until the next period starts, in `1..=cycle_length`.
///
/// The first day of a period reports the full cycle length; the day before
/// the next expected start reports 1.
pub fn days_until_next_period(
  date: NaiveDate,
  last_period_start: NaiveDate,
  cycle_length: CycleLength,
) -> u32 {
  cycle_length.days() - day_offset(date, last_period_start, cycle_length)
}

/// PMS window: the final 5/28 of the cycle, restricted to the luteal band.
/// Always at least the last day of the cycle when that day is luteal.
pub fn is_in_pms_window(offset: u32, cycle_length: CycleLength) -> bool {
  let offset = offset % cycle_length.days();
  if phase_for_offset(offset, cycle_length) != Phase::Luteal {
    return false;
  }

  let window_start = CANONICAL_CYCLE_LENGTH - PMS_WINDOW_DAYS;
  offset + 1 == cycle_length.days() || !before_boundary(offset, window_start, cycle_length)
}

/// Average gap between consecutive recorded starts.
///
/// Gaps outside 15..=90 days are skipped as missed or duplicate entries.
/// Falls back to `fallback` without at least one usable gap.
pub fn estimate_cycle_length(starts: &[NaiveDate], fallback: CycleLength) -> CycleLength {
  let mut sorted = starts.to_vec();
  sorted.sort();
  sorted.dedup();

  let gaps: Vec<i64> = sorted
    .windows(2)
    .map(|pair| (pair[1] - pair[0]).num_days())
    .filter(|gap| (MIN_PLAUSIBLE_GAP_DAYS..=MAX_CYCLE_LENGTH as i64).contains(gap))
    .collect();

  if gaps.is_empty() {
    return fallback;
  }

  let total: i64 = gaps.iter().sum();
  let count = gaps.len() as i64;
  // Round half up
  let average = (total + count / 2) / count;
  CycleLength::new(average).unwrap_or(fallback)
}

/// ---------------------------------------------------------------------------
/// Cycle Status (phase card)
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct CycleStatus {
  pub phase: Phase,
  pub current_day: u32,
  pub cycle_length: CycleLength,
  pub days_until_next_period: u32,
  pub is_in_pms: bool,
  pub last_period_start: NaiveDate,
  pub next_period_date: NaiveDate,
  pub phase_info: PhaseInfo,
}

impl CycleStatus {
  pub fn compute(today: NaiveDate, last_period_start: NaiveDate, cycle_length: CycleLength) -> Self {
    let offset = day_offset(today, last_period_start, cycle_length);
    let phase = phase_for_offset(offset, cycle_length);
    let days_until = cycle_length.days() - offset;

    Self {
      phase,
      current_day: offset + 1,
      cycle_length,
      days_until_next_period: days_until,
      is_in_pms: is_in_pms_window(offset, cycle_length),
      last_period_start,
      next_period_date: today + Duration::days(days_until as i64),
      phase_info: phase.info(),
    }
  }
}

/// ---------------------------------------------------------------------------
/// Calendar Day Generator
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalendarDay {
  pub date: NaiveDate,
  pub phase: Option<Phase>,
  pub is_today: bool,
  pub is_predicted: bool,
}

/// A month grid, Sunday-first
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalendarMonth {
  pub year: i32,
  /// 1-based
  pub month: u32,
  /// Empty cells before the 1st in a Sunday-first week row
  pub leading_blank_days: u32,
  pub days: Vec<CalendarDay>,
}

impl CalendarMonth {
  /// (year, month) of the preceding month
  pub fn previous(&self) -> (i32, u32) {
    if self.month == 1 {
      (self.year - 1, 12)
    } else {
      (self.year, self.month - 1)
    }
  }

  /// (year, month) of the following month
  pub fn next(&self) -> (i32, u32) {
    if self.month == 12 {
      (self.year + 1, 1)
    } else {
      (self.year, self.month + 1)
    }
  }
}

fn first_of_month(year: i32, month: u32) -> Result<NaiveDate, CycleError> {
  NaiveDate::from_ymd_opt(year, month, 1).ok_or(CycleError::InvalidMonth { year, month })
}

/// One entry per day of `month` (1-based), ascending.
///
/// Days strictly after `last_period_start + cycle_length` are flagged as
/// predicted. The day exactly one cycle past the start is the expected next
/// start and is not itself predicted.
pub fn generate_calendar_days(
  year: i32,
  month: u32,
  last_period_start: Option<NaiveDate>,
  cycle_length: CycleLength,
  today: NaiveDate,
) -> Result<Vec<CalendarDay>, CycleError> {
  let first = first_of_month(year, month)?;
  let prediction_start =
    last_period_start.map(|start| start + Duration::days(cycle_length.days() as i64));

  let days = first
    .iter_days()
    .take_while(|date| date.month() == month)
    .map(|date| CalendarDay {
      date,
      phase: last_period_start.map(|start| phase_for(date, start, cycle_length)),
      is_today: date == today,
      is_predicted: prediction_start.is_some_and(|boundary| date > boundary),
    })
    .collect();

  Ok(days)
}

pub fn calendar_month(
  year: i32,
  month: u32,
  last_period_start: Option<NaiveDate>,
  cycle_length: CycleLength,
  today: NaiveDate,
) -> Result<CalendarMonth, CycleError> {
  let first = first_of_month(year, month)?;
  let days = generate_calendar_days(year, month, last_period_start, cycle_length, today)?;

  Ok(CalendarMonth {
    year,
    month,
    leading_blank_days: first.weekday().num_days_from_sunday(),
    days,
  })
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------
