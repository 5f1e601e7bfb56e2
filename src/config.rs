use std::env;
use std::path::PathBuf;

use anyhow::Context;
use anyhow::Result;

const DEFAULT_DATABASE_URL: &str = "sqlite://bot_database.db";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_SCHEDULE_DIR: &str = "schedules";

#[derive(Debug, Clone)]
pub struct Config {
  pub bot_token: String,
  pub database_url: String,
  pub admins: Vec<i64>,
  pub port: u16,
  pub schedule_dir: PathBuf,
}

impl Config {
  pub fn from_env() -> Result<Self> {
    let bot_token = env::var("BOT_TOKEN")
      .or_else(|_| env::var("TELOXIDE_TOKEN"))
      .context("BOT_TOKEN or TELOXIDE_TOKEN must be set")?;
    let database_url = env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string());
    let admins_raw = env::var("ADMIN_IDS").unwrap_or_default();
    let admins = parse_admins(&admins_raw);
    let port = parse_port(env::var("PORT").ok().as_deref())?;
    let schedule_dir = env::var("SCHEDULE_DIR")
      .map(PathBuf::from)
      .unwrap_or_else(|_| PathBuf::from(DEFAULT_SCHEDULE_DIR));
    Ok(Self {
      bot_token,
      database_url,
      admins,
      port,
      schedule_dir,
    })
  }
}

fn parse_admins(raw: &str) -> Vec<i64> {
  raw
    .split(',')
    .filter_map(|id| {
      let trimmed = id.trim();
      if trimmed.is_empty() {
        return None;
      }
      match trimmed.parse::<i64>() {
        Ok(value) => Some(value),
        Err(err) => {
          tracing::warn!(value = trimmed, error = %err, "invalid ADMIN_IDS entry");
          None
        },
      }
    })
    .collect()
}

fn parse_port(raw: Option<&str>) -> Result<u16> {
  match raw.map(str::trim).filter(|value| !value.is_empty()) {
    None => Ok(DEFAULT_PORT),
    Some(value) => value.parse::<u16>().with_context(|| format!("PORT must be a port number, got `{value}`")),
  }
}

#[cfg(test)]
mod tests {
  use super::parse_admins;
  use super::parse_port;

  #[test]
  fn parses_valid_admins() {
    let admins = parse_admins("5140862195, 2 ,3");
    assert_eq!(admins, vec![5140862195, 2, 3]);
  }

  #[test]
  fn skips_invalid_entries() {
    let admins = parse_admins("42,abc,  7");
    assert_eq!(admins, vec![42, 7]);
  }

  #[test]
  fn empty_input_yields_empty_list() {
    let admins = parse_admins("");
    assert!(admins.is_empty());
  }

  #[test]
  fn port_defaults_to_8080() {
    assert_eq!(parse_port(None).unwrap(), 8080);
    assert_eq!(parse_port(Some(" ")).unwrap(), 8080);
    assert_eq!(parse_port(Some("10000")).unwrap(), 10000);
    assert!(parse_port(Some("http")).is_err());
  }
}
