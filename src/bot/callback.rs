use std::fmt;
use std::str::FromStr;

use chrono::Weekday;
use teloxide::types::InlineKeyboardButton;
use thiserror::Error;

use crate::bot::access::CommandClass;
use crate::models::ImageSlot;
use crate::models::ParseVariantError;
use crate::models::WeekVariant;
use crate::util::parse_date;
use crate::util::weekday_from_index;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuItem {
  Schedule,
  Today,
  Week,
  Homework,
  Users,
  Admin,
}

impl MenuItem {
  fn as_str(self) -> &'static str {
    match self {
      Self::Schedule => "schedule",
      Self::Today => "today",
      Self::Week => "week",
      Self::Homework => "homework",
      Self::Users => "users",
      Self::Admin => "admin",
    }
  }
}

/// Decoded inline-button payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackAction {
  Menu(MenuItem),
  PanelRoot,
  PanelToday,
  PanelTomorrow,
  PanelWeek,
  PanelWeekUpload,
  PanelDay(Weekday),
  ShowDay(Weekday, WeekVariant),
  Upload(ImageSlot),
  Approve(i64),
}

impl CallbackAction {
  /// Which gate rules apply to the button, mirroring the equivalent command.
  pub fn class(self) -> CommandClass {
    match self {
      Self::Menu(MenuItem::Users | MenuItem::Admin) => CommandClass::AdminOnly,
      Self::Menu(_) => CommandClass::Restricted,
      _ => CommandClass::AdminOnly,
    }
  }
}

pub fn button(label: impl Into<String>, action: CallbackAction) -> InlineKeyboardButton {
  InlineKeyboardButton::callback(label, action.to_string())
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CallbackError {
  #[error("empty callback payload")]
  Empty,
  #[error("unknown callback `{0}`")]
  Unknown(String),
  #[error("day index `{0}` is out of range")]
  InvalidDay(String),
  #[error("invalid date `{0}`")]
  InvalidDate(String),
  #[error("invalid user id `{0}`")]
  InvalidUserId(String),
  #[error(transparent)]
  InvalidVariant(#[from] ParseVariantError),
}

fn parse_day(token: &str) -> Result<Weekday, CallbackError> {
  token
    .parse::<i64>()
    .ok()
    .and_then(weekday_from_index)
    .ok_or_else(|| CallbackError::InvalidDay(token.to_string()))
}

impl FromStr for CallbackAction {
  type Err = CallbackError;

  fn from_str(data: &str) -> Result<Self, Self::Err> {
    if data.is_empty() {
      return Err(CallbackError::Empty);
    }
    let tokens: Vec<&str> = data.split(':').collect();
    let action = match tokens.as_slice() {
      ["menu", "schedule"] => Self::Menu(MenuItem::Schedule),
      ["menu", "today"] => Self::Menu(MenuItem::Today),
      ["menu", "week"] => Self::Menu(MenuItem::Week),
      ["menu", "homework"] => Self::Menu(MenuItem::Homework),
      ["menu", "users"] => Self::Menu(MenuItem::Users),
      ["menu", "admin"] => Self::Menu(MenuItem::Admin),
      ["panel", "root"] => Self::PanelRoot,
      ["panel", "today"] => Self::PanelToday,
      ["panel", "tomorrow"] => Self::PanelTomorrow,
      ["panel", "week"] => Self::PanelWeek,
      ["panel", "week_upload"] => Self::PanelWeekUpload,
      ["panel", "day", day] => Self::PanelDay(parse_day(day)?),
      ["show", "day", day, variant] => Self::ShowDay(parse_day(day)?, variant.parse()?),
      ["upload", "day", day, variant] => Self::Upload(ImageSlot::Day {
        weekday: parse_day(day)?,
        variant: variant.parse()?,
      }),
      ["upload", "date", date] => Self::Upload(ImageSlot::Date {
        date: parse_date(date).map_err(|_| CallbackError::InvalidDate(date.to_string()))?,
      }),
      ["upload", "week", variant] => Self::Upload(ImageSlot::Week {
        variant: variant.parse()?,
      }),
      ["approve", id] => Self::Approve(
        id.parse::<i64>()
          .map_err(|_| CallbackError::InvalidUserId(id.to_string()))?,
      ),
      _ => return Err(CallbackError::Unknown(data.to_string())),
    };
    Ok(action)
  }
}

impl fmt::Display for CallbackAction {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Menu(item) => write!(f, "menu:{}", item.as_str()),
      Self::PanelRoot => f.write_str("panel:root"),
      Self::PanelToday => f.write_str("panel:today"),
      Self::PanelTomorrow => f.write_str("panel:tomorrow"),
      Self::PanelWeek => f.write_str("panel:week"),
      Self::PanelWeekUpload => f.write_str("panel:week_upload"),
      Self::PanelDay(day) => write!(f, "panel:day:{}", day.num_days_from_monday()),
      Self::ShowDay(day, variant) => write!(f, "show:day:{}:{variant}", day.num_days_from_monday()),
      Self::Upload(ImageSlot::Day { weekday, variant }) => {
        write!(f, "upload:day:{}:{variant}", weekday.num_days_from_monday())
      },
      Self::Upload(ImageSlot::Date { date }) => write!(f, "upload:date:{}", date.format("%Y-%m-%d")),
      Self::Upload(ImageSlot::Week { variant }) => write!(f, "upload:week:{variant}"),
      Self::Approve(user_id) => write!(f, "approve:{user_id}"),
    }
  }
}

#[cfg(test)]
mod tests {
  use chrono::NaiveDate;
  use chrono::Weekday;

  use super::CallbackAction;
  use super::CallbackError;
  use super::MenuItem;
  use crate::bot::access::CommandClass;
  use crate::models::ImageSlot;
  use crate::models::WeekVariant;

  #[test]
  fn decodes_upload_targets() {
    assert_eq!(
      "upload:day:0:all".parse::<CallbackAction>(),
      Ok(CallbackAction::Upload(ImageSlot::Day {
        weekday: Weekday::Mon,
        variant: WeekVariant::All,
      }))
    );
    assert_eq!(
      "upload:date:2024-01-15".parse::<CallbackAction>(),
      Ok(CallbackAction::Upload(ImageSlot::Date {
        date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
      }))
    );
    assert_eq!(
      "upload:week:odd".parse::<CallbackAction>(),
      Ok(CallbackAction::Upload(ImageSlot::Week {
        variant: WeekVariant::Odd
      }))
    );
  }

  #[test]
  fn rejects_malformed_tokens() {
    assert_eq!(
      "panel:day:7".parse::<CallbackAction>(),
      Err(CallbackError::InvalidDay("7".to_string()))
    );
    assert_eq!(
      "show:day:x:all".parse::<CallbackAction>(),
      Err(CallbackError::InvalidDay("x".to_string()))
    );
    assert!(matches!(
      "upload:day:1:weekly".parse::<CallbackAction>(),
      Err(CallbackError::InvalidVariant(_))
    ));
    assert_eq!(
      "upload:date:tomorrow".parse::<CallbackAction>(),
      Err(CallbackError::InvalidDate("tomorrow".to_string()))
    );
    assert_eq!(
      "approve:abc".parse::<CallbackAction>(),
      Err(CallbackError::InvalidUserId("abc".to_string()))
    );
    assert_eq!(
      "upload:day:1".parse::<CallbackAction>(),
      Err(CallbackError::Unknown("upload:day:1".to_string()))
    );
    assert_eq!("".parse::<CallbackAction>(), Err(CallbackError::Empty));
  }

  #[test]
  fn encoded_buttons_decode_to_the_same_action() {
    let actions = [
      CallbackAction::Menu(MenuItem::Homework),
      CallbackAction::PanelWeekUpload,
      CallbackAction::PanelDay(Weekday::Sun),
      CallbackAction::ShowDay(Weekday::Fri, WeekVariant::Even),
      CallbackAction::Approve(42),
    ];
    for action in actions {
      assert_eq!(action.to_string().parse::<CallbackAction>(), Ok(action));
    }
  }

  #[test]
  fn only_user_menu_buttons_are_open_to_approved_users() {
    assert_eq!(
      CallbackAction::Menu(MenuItem::Schedule).class(),
      CommandClass::Restricted
    );
    assert_eq!(CallbackAction::Menu(MenuItem::Users).class(), CommandClass::AdminOnly);
    assert_eq!(CallbackAction::PanelRoot.class(), CommandClass::AdminOnly);
    assert_eq!(CallbackAction::Approve(1).class(), CommandClass::AdminOnly);
  }
}
