use crate::models::UserStatus;

/// Commands anyone may send, registered or not.
pub const OPEN_COMMANDS: [&str; 3] = ["start", "help", "myid"];
/// Commands reserved for the configured admins.
pub const ADMIN_COMMANDS: [&str; 7] = [
  "approve",
  "users",
  "admin",
  "upload_schedule",
  "upload_day",
  "upload_date",
  "upload_week",
];
const APPROVE_SHORTCUT_PREFIX: &str = "approve_";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
  Allow,
  BlockPendingApproval,
  BlockUnregistered,
  BlockNoPermission,
}

impl Access {
  pub fn is_allowed(self) -> bool {
    matches!(self, Self::Allow)
  }

  pub fn notice(self) -> Option<&'static str> {
    match self {
      Self::Allow => None,
      Self::BlockPendingApproval => Some("⏳ Please wait until an admin approves your request."),
      Self::BlockUnregistered => Some("📝 Send /start first to request access."),
      Self::BlockNoPermission => Some("❌ You do not have permission for this."),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandClass {
  Open,
  AdminOnly,
  /// Photos complete an upload session: admins pass, everyone else needs approval.
  Photo,
  Restricted,
}

/// Extracts the lower-cased command name from a message text: `/Day@my_bot 3` -> `day`.
pub fn command_name(text: &str) -> Option<String> {
  let head = text.trim_start().split_whitespace().next()?;
  let name = head.strip_prefix('/')?;
  let name = name.split('@').next().unwrap_or(name);
  if name.is_empty() {
    return None;
  }
  Some(name.to_lowercase())
}

/// Anything else that is not a command (plain text, stickers) counts as restricted.
pub fn classify(command: Option<&str>, has_photo: bool) -> CommandClass {
  match command {
    None if has_photo => CommandClass::Photo,
    Some(name) if OPEN_COMMANDS.contains(&name) => CommandClass::Open,
    Some(name) if ADMIN_COMMANDS.contains(&name) || name.starts_with(APPROVE_SHORTCUT_PREFIX) => {
      CommandClass::AdminOnly
    },
    _ => CommandClass::Restricted,
  }
}

pub fn decide(class: CommandClass, is_admin: bool, status: Option<UserStatus>) -> Access {
  match class {
    CommandClass::Open => Access::Allow,
    CommandClass::AdminOnly if is_admin => Access::Allow,
    CommandClass::AdminOnly => Access::BlockNoPermission,
    CommandClass::Photo if is_admin => Access::Allow,
    CommandClass::Photo | CommandClass::Restricted => match status {
      Some(UserStatus::Approved) => Access::Allow,
      Some(UserStatus::Pending) => Access::BlockPendingApproval,
      None => Access::BlockUnregistered,
    },
  }
}

#[cfg(test)]
mod tests {
  use super::Access;
  use super::CommandClass;
  use super::classify;
  use super::command_name;
  use super::decide;
  use crate::models::UserStatus;

  #[test]
  fn extracts_command_names() {
    assert_eq!(command_name("/start").as_deref(), Some("start"));
    assert_eq!(command_name("/Day@class_bot 3").as_deref(), Some("day"));
    assert_eq!(command_name("  /approve_42").as_deref(), Some("approve_42"));
    assert_eq!(command_name("hello"), None);
    assert_eq!(command_name("/"), None);
  }

  #[test]
  fn classifies_commands() {
    assert_eq!(classify(Some("help"), false), CommandClass::Open);
    assert_eq!(classify(Some("myid"), false), CommandClass::Open);
    assert_eq!(classify(Some("users"), false), CommandClass::AdminOnly);
    assert_eq!(classify(Some("approve_42"), false), CommandClass::AdminOnly);
    assert_eq!(classify(Some("schedule"), false), CommandClass::Restricted);
    assert_eq!(classify(None, false), CommandClass::Restricted);
  }

  #[test]
  fn upload_flow_is_admin_only() {
    for name in ["upload_schedule", "upload_day", "upload_date", "upload_week"] {
      assert_eq!(classify(Some(name), false), CommandClass::AdminOnly);
    }
    assert_eq!(classify(None, true), CommandClass::Photo);
  }

  #[test]
  fn photos_pass_for_admins_without_approval() {
    assert_eq!(decide(CommandClass::Photo, true, None), Access::Allow);
    assert_eq!(decide(CommandClass::Photo, true, Some(UserStatus::Pending)), Access::Allow);
    assert_eq!(decide(CommandClass::Photo, false, None), Access::BlockUnregistered);
    assert_eq!(
      decide(CommandClass::Photo, false, Some(UserStatus::Pending)),
      Access::BlockPendingApproval
    );
    assert_eq!(decide(CommandClass::Photo, false, Some(UserStatus::Approved)), Access::Allow);
  }

  #[test]
  fn open_commands_are_always_allowed() {
    for status in [None, Some(UserStatus::Pending), Some(UserStatus::Approved)] {
      assert_eq!(decide(CommandClass::Open, false, status), Access::Allow);
    }
  }

  #[test]
  fn restricted_commands_need_approval() {
    assert_eq!(decide(CommandClass::Restricted, false, None), Access::BlockUnregistered);
    assert_eq!(
      decide(CommandClass::Restricted, false, Some(UserStatus::Pending)),
      Access::BlockPendingApproval
    );
    assert_eq!(
      decide(CommandClass::Restricted, false, Some(UserStatus::Approved)),
      Access::Allow
    );
  }

  #[test]
  fn admin_commands_ignore_approval_status() {
    assert_eq!(decide(CommandClass::AdminOnly, true, None), Access::Allow);
    assert_eq!(decide(CommandClass::AdminOnly, true, Some(UserStatus::Pending)), Access::Allow);
    assert_eq!(
      decide(CommandClass::AdminOnly, false, Some(UserStatus::Approved)),
      Access::BlockNoPermission
    );
  }

  #[test]
  fn blocked_outcomes_carry_a_notice() {
    assert!(Access::Allow.notice().is_none());
    assert!(Access::BlockUnregistered.notice().unwrap().contains("/start"));
  }
}
