use std::fmt;
use std::str::FromStr;

use chrono::Datelike;
use chrono::NaiveDate;
use chrono::NaiveDateTime;
use chrono::Weekday;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
  Pending,
  Approved,
}

impl UserStatus {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Pending => "pending",
      Self::Approved => "approved",
    }
  }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown user status `{0}`")]
pub struct ParseStatusError(pub String);

impl FromStr for UserStatus {
  type Err = ParseStatusError;

  fn from_str(value: &str) -> Result<Self, Self::Err> {
    match value {
      "pending" => Ok(Self::Pending),
      "approved" => Ok(Self::Approved),
      other => Err(ParseStatusError(other.to_string())),
    }
  }
}

/// Which calendar weeks a schedule image applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WeekVariant {
  #[default]
  All,
  Even,
  Odd,
}

impl WeekVariant {
  pub const ALL: [WeekVariant; 3] = [Self::All, Self::Even, Self::Odd];

  pub fn as_str(self) -> &'static str {
    match self {
      Self::All => "all",
      Self::Even => "even",
      Self::Odd => "odd",
    }
  }

  pub fn label(self) -> &'static str {
    match self {
      Self::All => "all weeks",
      Self::Even => "even weeks",
      Self::Odd => "odd weeks",
    }
  }

  /// Parity of the ISO week `date` falls in.
  pub fn for_date(date: NaiveDate) -> Self {
    if date.iso_week().week() % 2 == 0 {
      Self::Even
    } else {
      Self::Odd
    }
  }

  /// Variants to try, most specific first.
  pub fn fallback_chain(self) -> Vec<WeekVariant> {
    match self {
      Self::All => vec![Self::All],
      specific => vec![specific, Self::All],
    }
  }
}

impl fmt::Display for WeekVariant {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown week variant `{0}`")]
pub struct ParseVariantError(pub String);

impl FromStr for WeekVariant {
  type Err = ParseVariantError;

  fn from_str(value: &str) -> Result<Self, Self::Err> {
    match value {
      "all" => Ok(Self::All),
      "even" => Ok(Self::Even),
      "odd" => Ok(Self::Odd),
      other => Err(ParseVariantError(other.to_string())),
    }
  }
}

/// Key under which a schedule image is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageSlot {
  Day { weekday: Weekday, variant: WeekVariant },
  Date { date: NaiveDate },
  Week { variant: WeekVariant },
}

impl ImageSlot {
  /// Slots to look up for this key, exact match first, `all` afterwards.
  pub fn lookup_chain(self) -> Vec<ImageSlot> {
    match self {
      Self::Day { weekday, variant } => variant
        .fallback_chain()
        .into_iter()
        .map(|variant| Self::Day { weekday, variant })
        .collect(),
      Self::Date { .. } => vec![self],
      Self::Week { variant } => variant
        .fallback_chain()
        .into_iter()
        .map(|variant| Self::Week { variant })
        .collect(),
    }
  }

  /// Date override first, then the weekday image for the week's parity, then `all`.
  pub fn schedule_chain_for(date: NaiveDate) -> Vec<ImageSlot> {
    let mut chain = vec![Self::Date { date }];
    chain.extend(
      Self::Day {
        weekday: date.weekday(),
        variant: WeekVariant::for_date(date),
      }
      .lookup_chain(),
    );
    chain
  }

  /// File name of the blob backing this slot.
  pub fn file_name(self) -> String {
    match self {
      Self::Day { weekday, variant } => format!("day_{}_{}.jpg", weekday.num_days_from_monday(), variant),
      Self::Date { date } => format!("date_{}.jpg", date.format("%Y-%m-%d")),
      Self::Week { variant } => format!("week_{variant}.jpg"),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredImage {
  pub slot: ImageSlot,
  pub blob_ref: String,
}

/// Outcome of dropping expired date overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PurgeReport {
  pub rows: u64,
  /// Photo files whose rows were dropped.
  pub blob_refs: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRow {
  pub user_id: i64,
  pub username: Option<String>,
  pub full_name: String,
  pub status: UserStatus,
  pub registered_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Lesson {
  pub number: i64,
  pub subject: String,
  pub classroom: String,
  pub time_start: String,
  pub time_end: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HomeworkRow {
  pub id: i64,
  pub subject: String,
  pub task: String,
  pub date_assigned: NaiveDate,
  pub date_due: NaiveDate,
}

#[cfg(test)]
mod tests {
  use chrono::NaiveDate;
  use chrono::Weekday;

  use super::ImageSlot;
  use super::UserStatus;
  use super::WeekVariant;

  fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
  }

  #[test]
  fn parity_follows_iso_week_number() {
    // 2024-01-01 is a Monday in ISO week 1, a week later is week 2.
    assert_eq!(WeekVariant::for_date(date(2024, 1, 1)), WeekVariant::Odd);
    assert_eq!(WeekVariant::for_date(date(2024, 1, 8)), WeekVariant::Even);
  }

  #[test]
  fn specific_variant_falls_back_to_all() {
    let chain = ImageSlot::Day {
      weekday: Weekday::Tue,
      variant: WeekVariant::Even,
    }
    .lookup_chain();
    assert_eq!(
      chain,
      vec![
        ImageSlot::Day {
          weekday: Weekday::Tue,
          variant: WeekVariant::Even
        },
        ImageSlot::Day {
          weekday: Weekday::Tue,
          variant: WeekVariant::All
        },
      ]
    );
    assert_eq!(
      ImageSlot::Week {
        variant: WeekVariant::All
      }
      .lookup_chain()
      .len(),
      1
    );
  }

  #[test]
  fn schedule_chain_starts_with_date_override() {
    let chain = ImageSlot::schedule_chain_for(date(2024, 1, 8));
    assert_eq!(chain[0], ImageSlot::Date { date: date(2024, 1, 8) });
    assert_eq!(
      chain[1],
      ImageSlot::Day {
        weekday: Weekday::Mon,
        variant: WeekVariant::Even
      }
    );
    assert_eq!(
      chain[2],
      ImageSlot::Day {
        weekday: Weekday::Mon,
        variant: WeekVariant::All
      }
    );
  }

  #[test]
  fn file_names_encode_the_slot() {
    let slot = ImageSlot::Day {
      weekday: Weekday::Mon,
      variant: WeekVariant::All,
    };
    assert_eq!(slot.file_name(), "day_0_all.jpg");
    assert_eq!(ImageSlot::Date { date: date(2024, 1, 15) }.file_name(), "date_2024-01-15.jpg");
    assert_eq!(
      ImageSlot::Week {
        variant: WeekVariant::Odd
      }
      .file_name(),
      "week_odd.jpg"
    );
  }

  #[test]
  fn statuses_round_trip_through_text() {
    assert_eq!("approved".parse::<UserStatus>(), Ok(UserStatus::Approved));
    assert!("banned".parse::<UserStatus>().is_err());
    assert_eq!(UserStatus::Pending.as_str(), "pending");
  }
}
