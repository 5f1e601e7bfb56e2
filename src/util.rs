use chrono::Days;
use chrono::Local;
use chrono::NaiveDate;
use chrono::Weekday;
use once_cell::sync::Lazy;
use regex::Regex;
use teloxide::utils::html;
use thiserror::Error;

use crate::models::Lesson;
use crate::models::ParseVariantError;
use crate::models::WeekVariant;

static DATE_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("valid regex"));
static TIME_RANGE_PATTERN: Lazy<Regex> =
  Lazy::new(|| Regex::new(r"^(\d{1,2}:\d{2})(?:-(\d{1,2}:\d{2}))?$").expect("valid regex"));

const DAY_NAMES: [&str; 7] = ["Monday", "Tuesday", "Wednesday", "Thursday", "Friday", "Saturday", "Sunday"];
const SHORT_DAY_NAMES: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InputError {
  #[error("missing arguments, usage: {0}")]
  MissingArguments(&'static str),
  #[error("day must be a number from 0 (Mon) to 6 (Sun), got `{0}`")]
  InvalidDay(String),
  #[error("date must look like 2024-01-15, got `{0}`")]
  InvalidDate(String),
  #[error("expected a number, got `{0}`")]
  InvalidNumber(String),
  #[error("time must look like 9:00-10:30, got `{0}`")]
  InvalidTime(String),
  #[error(transparent)]
  InvalidVariant(#[from] ParseVariantError),
}

pub fn today() -> NaiveDate {
  Local::now().date_naive()
}

pub fn tomorrow() -> NaiveDate {
  let today = today();
  today.checked_add_days(Days::new(1)).unwrap_or(today)
}

pub fn weekday_from_index(index: i64) -> Option<Weekday> {
  u8::try_from(index).ok().and_then(|value| Weekday::try_from(value).ok())
}

pub fn weekday_index(weekday: Weekday) -> i64 {
  i64::from(weekday.num_days_from_monday())
}

pub fn day_name(weekday: Weekday) -> &'static str {
  DAY_NAMES[weekday.num_days_from_monday() as usize]
}

pub fn short_day_name(weekday: Weekday) -> &'static str {
  SHORT_DAY_NAMES[weekday.num_days_from_monday() as usize]
}

pub fn all_weekdays() -> impl Iterator<Item = Weekday> {
  (0 .. 7).filter_map(weekday_from_index)
}

pub fn parse_weekday(input: &str) -> Result<Weekday, InputError> {
  input
    .trim()
    .parse::<i64>()
    .ok()
    .and_then(weekday_from_index)
    .ok_or_else(|| InputError::InvalidDay(input.trim().to_string()))
}

pub fn parse_date(input: &str) -> Result<NaiveDate, InputError> {
  let trimmed = input.trim();
  if !DATE_PATTERN.is_match(trimmed) {
    return Err(InputError::InvalidDate(trimmed.to_string()));
  }
  NaiveDate::parse_from_str(trimmed, "%Y-%m-%d").map_err(|_| InputError::InvalidDate(trimmed.to_string()))
}

pub fn parse_variant_or_all(input: Option<&str>) -> Result<WeekVariant, InputError> {
  match input.map(str::trim).filter(|value| !value.is_empty()) {
    None => Ok(WeekVariant::All),
    Some(value) => Ok(value.to_lowercase().parse()?),
  }
}

/// `/upload_day <day> [variant]`
pub fn parse_upload_day_args(args: &str) -> Result<(Weekday, WeekVariant), InputError> {
  let mut parts = args.split_whitespace();
  let day = parts.next().ok_or(InputError::MissingArguments("/upload_day 0 [all|even|odd]"))?;
  let weekday = parse_weekday(day)?;
  let variant = parse_variant_or_all(parts.next())?;
  Ok((weekday, variant))
}

/// `/add_day <day> <number> <subject> <start-end> <classroom...>`
pub fn parse_lesson_args(args: &str) -> Result<(Weekday, Lesson), InputError> {
  const USAGE: &str = "/add_day 0 1 Math 9:00-10:30 301";
  let parts: Vec<&str> = args.split_whitespace().collect();
  if parts.len() < 5 {
    return Err(InputError::MissingArguments(USAGE));
  }
  let weekday = parse_weekday(parts[0])?;
  Ok((weekday, parse_lesson_fields(&parts[1 ..])?))
}

/// `<number> <subject> <start-end> <classroom...>`, at least four fields.
fn parse_lesson_fields(parts: &[&str]) -> Result<Lesson, InputError> {
  let number = parts[0]
    .parse::<i64>()
    .ok()
    .filter(|value| *value > 0)
    .ok_or_else(|| InputError::InvalidNumber(parts[0].to_string()))?;
  let captures = TIME_RANGE_PATTERN
    .captures(parts[2])
    .ok_or_else(|| InputError::InvalidTime(parts[2].to_string()))?;
  let time_start = captures.get(1).map(|m| m.as_str().to_string()).unwrap_or_default();
  let time_end = captures.get(2).map(|m| m.as_str().to_string()).unwrap_or_default();

  Ok(Lesson {
    number,
    subject: parts[1].to_string(),
    classroom: parts[3 ..].join(" "),
    time_start,
    time_end,
  })
}

/// Splits `<key>\n<lesson line>...` into the key and the parsed lessons.
/// No lesson lines means an empty day.
fn parse_lesson_block<'a>(args: &'a str, usage: &'static str) -> Result<(&'a str, Vec<Lesson>), InputError> {
  let mut lines = args.trim().lines();
  let key = lines
    .next()
    .map(str::trim)
    .filter(|key| !key.is_empty())
    .ok_or(InputError::MissingArguments(usage))?;
  let mut lessons = Vec::new();
  for line in lines {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.is_empty() {
      continue;
    }
    if parts.len() < 4 {
      return Err(InputError::MissingArguments(usage));
    }
    lessons.push(parse_lesson_fields(&parts)?);
  }
  Ok((key, lessons))
}

/// `/set_day <day>` followed by one `<number> <subject> <start-end> <classroom>` line per lesson.
pub fn parse_set_day_args(args: &str) -> Result<(Weekday, Vec<Lesson>), InputError> {
  let (key, lessons) = parse_lesson_block(args, "/set_day 0, then lines like 1 Math 9:00-10:30 301")?;
  Ok((parse_weekday(key)?, lessons))
}

/// `/set_date <YYYY-MM-DD>` followed by lesson lines, as for `/set_day`.
pub fn parse_set_date_args(args: &str) -> Result<(NaiveDate, Vec<Lesson>), InputError> {
  let (key, lessons) = parse_lesson_block(args, "/set_date 2024-01-15, then lines like 1 Math 9:00-10:30 301")?;
  Ok((parse_date(key)?, lessons))
}

/// `/add_homework <subject> <due-date> <task...>`
pub fn parse_homework_args(args: &str) -> Result<(String, NaiveDate, String), InputError> {
  const USAGE: &str = "/add_homework Math 2024-01-15 Exercises 1-5";
  let mut parts = args.trim().splitn(3, char::is_whitespace);
  let subject = parts.next().filter(|s| !s.is_empty()).ok_or(InputError::MissingArguments(USAGE))?;
  let due = parts.next().ok_or(InputError::MissingArguments(USAGE))?;
  let due = parse_date(due)?;
  let task = parts
    .next()
    .map(str::trim)
    .filter(|task| !task.is_empty())
    .ok_or(InputError::MissingArguments(USAGE))?;
  Ok((subject.to_string(), due, task.to_string()))
}

pub fn format_lessons(lessons: &[Lesson]) -> String {
  let mut text = String::new();
  for lesson in lessons {
    let time = if lesson.time_end.is_empty() {
      lesson.time_start.clone()
    } else {
      format!("{}-{}", lesson.time_start, lesson.time_end)
    };
    text.push_str(&format!(
      "{}. <b>{}</b> {} {}\n",
      lesson.number,
      html::escape(&lesson.subject),
      html::escape(&time),
      html::escape(&lesson.classroom),
    ));
  }
  text
}
