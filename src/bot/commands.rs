use teloxide::utils::command::BotCommands;

#[derive(BotCommands, Clone, Debug)]
#[command(rename_rule = "snake_case", description = "Available commands:")]
pub enum Command {
  /// Request access or open the menu
  Start,
  /// Show the help text
  Help,
  /// Show your Telegram id
  Myid,
  /// Schedule for tomorrow
  Schedule,
  /// Schedule for today
  Today,
  /// Schedule for the whole week
  Week,
  /// Schedule for a weekday: /day 0 (Mon) .. 6 (Sun)
  Day(String),
  /// Homework: /homework [YYYY-MM-DD | subject]
  Homework(String),
  /// Admin: schedule panel
  Admin,
  /// Admin: list users
  Users,
  /// Admin: approve a user, /approve <id>
  Approve(String),
  /// Admin: how to upload schedules
  UploadSchedule,
  /// Admin: upload a weekday photo, /upload_day 0 [all|even|odd]
  UploadDay(String),
  /// Admin: upload a photo for a date, /upload_date 2024-01-15
  UploadDate(String),
  /// Admin: upload a whole-week photo, /upload_week [all|even|odd]
  UploadWeek(String),
  /// Admin: add a lesson, /add_day 0 1 Math 9:00-10:30 301
  AddDay(String),
  /// Admin: replace a day's lessons, /set_day 0 then one lesson per line
  SetDay(String),
  /// Admin: lessons for one date only, /set_date 2024-01-15 then one lesson per line
  SetDate(String),
  /// Admin: add homework, /add_homework Math 2024-01-15 Exercises 1-5
  AddHomework(String),
  /// Admin: message every approved user
  Broadcast(String),
}
