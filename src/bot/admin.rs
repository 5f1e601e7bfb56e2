use anyhow::Context;
use chrono::NaiveDate;
use chrono::Weekday;
use teloxide::ApiError;
use teloxide::RequestError;
use teloxide::prelude::*;
use teloxide::types::ChatId;
use teloxide::types::InlineKeyboardButton;
use teloxide::types::InlineKeyboardMarkup;
use teloxide::types::Message;
use teloxide::types::MessageId;
use teloxide::types::ParseMode;
use teloxide::utils::html;
use tracing::info;
use tracing::instrument;
use tracing::warn;

use crate::bot::HandlerResult;
use crate::bot::SharedContext;
use crate::bot::access;
use crate::bot::callback::CallbackAction;
use crate::bot::callback::button;
use crate::bot::handlers::send_photo;
use crate::models::ImageSlot;
use crate::models::Lesson;
use crate::models::UserRow;
use crate::models::UserStatus;
use crate::models::WeekVariant;
use crate::util::all_weekdays;
use crate::util::day_name;
use crate::util::parse_date;
use crate::util::parse_homework_args;
use crate::util::format_lessons;
use crate::util::parse_lesson_args;
use crate::util::parse_set_date_args;
use crate::util::parse_set_day_args;
use crate::util::parse_upload_day_args;
use crate::util::parse_variant_or_all;
use crate::util::short_day_name;
use crate::util::today;

const PANEL_TEXT: &str = "⚙️ <b>Schedule editor</b>\n\nPick a day to manage its photos, or jump to today, tomorrow or the whole week.";
const ADMIN_ONLY: &str = "❌ This command is for admins only.";

/// Payload of the `/approve_<id>` shortcut that admins tap in registration notices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApproveShortcut(pub String);

impl ApproveShortcut {
  pub fn from_message(msg: Message) -> Option<Self> {
    let name = msg.text().and_then(access::command_name)?;
    name.strip_prefix("approve_").map(|id| Self(id.to_string()))
  }
}

fn sender_id(msg: &Message) -> anyhow::Result<i64> {
  let user = msg.from.as_ref().context("message missing sender")?;
  Ok(user.id.0 as i64)
}

/// Replies with a refusal and returns `false` when the sender is not an admin.
async fn require_admin(bot: &Bot, ctx: &SharedContext, msg: &Message) -> anyhow::Result<bool> {
  if ctx.is_admin(sender_id(msg)?) {
    return Ok(true);
  }
  bot.send_message(msg.chat.id, ADMIN_ONLY).await?;
  Ok(false)
}

async fn edit_or_send(
  bot: &Bot,
  chat: ChatId,
  message_id: MessageId,
  text: String,
  keyboard: InlineKeyboardMarkup,
) -> HandlerResult {
  let request = bot
    .edit_message_text(chat, message_id, text.clone())
    .parse_mode(ParseMode::Html)
    .reply_markup(keyboard.clone());
  match request.await {
    Ok(_) => info!(chat_id = %chat, message_id = %message_id, "updated panel message"),
    Err(RequestError::Api(ApiError::MessageNotModified)) => {
      info!(chat_id = %chat, message_id = %message_id, "panel message already current");
    },
    Err(err) => {
      warn!(chat_id = %chat, message_id = %message_id, error = %err, "failed to edit panel, sending a new one");
      bot
        .send_message(chat, text)
        .parse_mode(ParseMode::Html)
        .reply_markup(keyboard)
        .await?;
    },
  }
  Ok(())
}

fn panel_keyboard() -> InlineKeyboardMarkup {
  let days: Vec<InlineKeyboardButton> = all_weekdays()
    .map(|weekday| button(format!("📅 {}", short_day_name(weekday)), CallbackAction::PanelDay(weekday)))
    .collect();
  let mut rows: Vec<Vec<InlineKeyboardButton>> = days.chunks(4).map(<[_]>::to_vec).collect();
  rows.push(vec![
    button("📅 Today", CallbackAction::PanelToday),
    button("📅 Tomorrow", CallbackAction::PanelTomorrow),
    button("🗓️ Week", CallbackAction::PanelWeek),
  ]);
  InlineKeyboardMarkup::new(rows)
}

fn back_row() -> Vec<InlineKeyboardButton> {
  vec![button("⬅️ Back", CallbackAction::PanelRoot)]
}

pub fn upload_date_keyboard(date: NaiveDate) -> InlineKeyboardMarkup {
  InlineKeyboardMarkup::new(vec![vec![button(
    format!("📤 Upload for {}", date.format("%d.%m")),
    CallbackAction::Upload(ImageSlot::Date { date }),
  )]])
}

pub fn describe_slot(slot: ImageSlot) -> String {
  match slot {
    ImageSlot::Day { weekday, variant } => format!("Day: <b>{}</b>\nWeeks: {}", day_name(weekday), variant.label()),
    ImageSlot::Date { date } => format!("Date: <b>{}</b>", date.format("%d.%m.%Y")),
    ImageSlot::Week { variant } => format!("<b>Whole week</b>\nWeeks: {}", variant.label()),
  }
}

/// Whether the exact slot has a row backed by a file on disk.
async fn slot_uploaded(ctx: &SharedContext, slot: ImageSlot) -> anyhow::Result<bool> {
  match ctx.db().find_image(slot).await? {
    Some(blob_ref) => Ok(ctx.photos().exists(&blob_ref).await),
    None => Ok(false),
  }
}

fn mark(uploaded: bool) -> &'static str {
  if uploaded { "✅" } else { "❌" }
}

#[instrument(skip(bot, msg))]
pub async fn handle_admin_panel(bot: Bot, msg: Message) -> HandlerResult {
  send_panel(&bot, msg.chat.id).await
}

pub async fn send_panel(bot: &Bot, chat: ChatId) -> HandlerResult {
  bot
    .send_message(chat, PANEL_TEXT)
    .parse_mode(ParseMode::Html)
    .reply_markup(panel_keyboard())
    .await?;
  info!(chat_id = %chat, "sent schedule editor panel");
  Ok(())
}

pub async fn show_panel_root(bot: &Bot, chat: ChatId, message_id: MessageId) -> HandlerResult {
  edit_or_send(bot, chat, message_id, PANEL_TEXT.to_string(), panel_keyboard()).await
}

#[instrument(skip(bot, ctx))]
pub async fn show_panel_day(
  bot: &Bot,
  ctx: &SharedContext,
  chat: ChatId,
  message_id: MessageId,
  weekday: Weekday,
) -> HandlerResult {
  let mut text = format!("📅 <b>{}</b>\n\n", day_name(weekday));
  let mut rows = Vec::new();
  for variant in WeekVariant::ALL {
    let uploaded = slot_uploaded(ctx, ImageSlot::Day { weekday, variant }).await?;
    text.push_str(&format!("{} {}\n", mark(uploaded), variant.label()));

    let mut row = Vec::new();
    if uploaded {
      row.push(button(
        format!("👁️ Show ({variant})"),
        CallbackAction::ShowDay(weekday, variant),
      ));
    }
    row.push(button(
      format!("📤 Upload ({variant})"),
      CallbackAction::Upload(ImageSlot::Day { weekday, variant }),
    ));
    rows.push(row);
  }
  rows.push(back_row());
  edit_or_send(bot, chat, message_id, text, InlineKeyboardMarkup::new(rows)).await
}

#[instrument(skip(bot, ctx))]
pub async fn show_panel_week(bot: &Bot, ctx: &SharedContext, chat: ChatId, message_id: MessageId) -> HandlerResult {
  let mut text = String::from("🗓️ <b>Week overview</b>\n\nDays (all weeks):\n");
  for weekday in all_weekdays() {
    let uploaded = slot_uploaded(ctx, ImageSlot::Day {
      weekday,
      variant: WeekVariant::All,
    })
    .await?;
    text.push_str(&format!("{} {}\n", mark(uploaded), day_name(weekday)));
  }
  text.push_str("\nWhole-week photos:\n");
  for variant in WeekVariant::ALL {
    let uploaded = slot_uploaded(ctx, ImageSlot::Week { variant }).await?;
    text.push_str(&format!("{} {}\n", mark(uploaded), variant.label()));
  }

  let days: Vec<InlineKeyboardButton> = all_weekdays()
    .map(|weekday| button(short_day_name(weekday), CallbackAction::PanelDay(weekday)))
    .collect();
  let mut rows: Vec<Vec<InlineKeyboardButton>> = days.chunks(4).map(<[_]>::to_vec).collect();
  rows.push(vec![button("📤 Upload whole week", CallbackAction::PanelWeekUpload)]);
  rows.push(back_row());
  edit_or_send(bot, chat, message_id, text, InlineKeyboardMarkup::new(rows)).await
}

pub async fn show_week_upload_menu(bot: &Bot, chat: ChatId, message_id: MessageId) -> HandlerResult {
  let rows = vec![
    WeekVariant::ALL
      .into_iter()
      .map(|variant| button(variant.label(), CallbackAction::Upload(ImageSlot::Week { variant })))
      .collect(),
    vec![button("⬅️ Back", CallbackAction::PanelWeek)],
  ];
  edit_or_send(
    bot,
    chat,
    message_id,
    "📤 <b>Upload a whole-week photo</b>\n\nWhich weeks does it apply to?".to_string(),
    InlineKeyboardMarkup::new(rows),
  )
  .await
}

/// Sends the date override if one exists, otherwise its status with an upload button.
#[instrument(skip(bot, ctx))]
pub async fn show_panel_date(bot: &Bot, ctx: &SharedContext, chat: ChatId, date: NaiveDate, label: &str) -> HandlerResult {
  let heading = format!("📅 <b>Schedule for {label} ({})</b>", date.format("%d.%m.%Y"));
  if let Some(blob_ref) = ctx.db().get_actual_schedule_image(date).await? {
    let caption = format!("{heading}\nStatus: ✅ uploaded\n\nUse /upload_date {} to replace it.", date.format("%Y-%m-%d"));
    if ctx.photos().exists(&blob_ref).await && send_photo(bot, chat, &blob_ref, caption).await {
      return Ok(());
    }
  }
  bot
    .send_message(chat, format!("{heading}\n\nStatus: ❌ not uploaded"))
    .parse_mode(ParseMode::Html)
    .reply_markup(upload_date_keyboard(date))
    .await?;
  Ok(())
}

/// Returns `false` when no photo could be found for the day.
#[instrument(skip(bot, ctx))]
pub async fn show_day_image(
  bot: &Bot,
  ctx: &SharedContext,
  chat: ChatId,
  weekday: Weekday,
  variant: WeekVariant,
) -> anyhow::Result<bool> {
  let Some(blob_ref) = ctx.db().get_schedule_image(weekday, variant).await? else {
    return Ok(false);
  };
  if !ctx.photos().exists(&blob_ref).await {
    warn!(?weekday, %variant, %blob_ref, "schedule image row points to a missing file");
    return Ok(false);
  }
  let caption = format!("📅 {}", describe_slot(ImageSlot::Day { weekday, variant }));
  Ok(send_photo(bot, chat, &blob_ref, caption).await)
}

#[instrument(skip(bot, ctx))]
pub async fn begin_upload(bot: &Bot, ctx: &SharedContext, chat: ChatId, owner: i64, slot: ImageSlot) -> HandlerResult {
  ctx.sessions().begin(owner, slot).await?;
  ctx.db().add_log(owner, &format!("upload started {}", slot.file_name())).await?;
  bot
    .send_message(
      chat,
      format!(
        "📤 <b>Uploading a schedule</b>\n\n{}\n\n<i>Send the schedule photo now.</i>",
        describe_slot(slot)
      ),
    )
    .parse_mode(ParseMode::Html)
    .await?;
  Ok(())
}

#[instrument(skip(bot, msg))]
pub async fn handle_upload_help(bot: Bot, msg: Message) -> HandlerResult {
  let text = "📤 <b>Uploading schedules</b>\n\n\
    /upload_day 0 [all|even|odd]: photo for a weekday (0 = Monday .. 6 = Sunday)\n\
    /upload_date 2024-01-15: photo for one date, shown instead of the weekday photo\n\
    /upload_week [all|even|odd]: photo for the whole week\n\n\
    After the command, send the photo as the next message. /admin opens the editor panel.";
  bot.send_message(msg.chat.id, text).parse_mode(ParseMode::Html).await?;
  Ok(())
}

#[instrument(skip(bot, ctx, msg))]
pub async fn handle_upload_day(bot: Bot, ctx: SharedContext, msg: Message, arg: String) -> HandlerResult {
  match parse_upload_day_args(&arg) {
    Ok((weekday, variant)) => {
      begin_upload(&bot, &ctx, msg.chat.id, sender_id(&msg)?, ImageSlot::Day { weekday, variant }).await
    },
    Err(err) => {
      bot.send_message(msg.chat.id, format!("❌ {err}")).await?;
      Ok(())
    },
  }
}

#[instrument(skip(bot, ctx, msg))]
pub async fn handle_upload_date(bot: Bot, ctx: SharedContext, msg: Message, arg: String) -> HandlerResult {
  match parse_date(&arg) {
    Ok(date) => begin_upload(&bot, &ctx, msg.chat.id, sender_id(&msg)?, ImageSlot::Date { date }).await,
    Err(err) => {
      bot.send_message(msg.chat.id, format!("❌ {err}")).await?;
      Ok(())
    },
  }
}

#[instrument(skip(bot, ctx, msg))]
pub async fn handle_upload_week(bot: Bot, ctx: SharedContext, msg: Message, arg: String) -> HandlerResult {
  match parse_variant_or_all(Some(&arg)) {
    Ok(variant) => begin_upload(&bot, &ctx, msg.chat.id, sender_id(&msg)?, ImageSlot::Week { variant }).await,
    Err(err) => {
      bot.send_message(msg.chat.id, format!("❌ {err}")).await?;
      Ok(())
    },
  }
}

/// Completes the sender's upload session with the largest size of the photo.
/// Photos from non-admins or without a pending session are dropped.
#[instrument(skip(bot, ctx, msg))]
pub async fn handle_photo(bot: Bot, ctx: SharedContext, msg: Message) -> HandlerResult {
  let owner = sender_id(&msg)?;
  if !ctx.is_admin(owner) {
    return Ok(());
  }
  let Some(slot) = ctx.sessions().pending(owner).await? else {
    info!(owner, "photo without a pending upload, ignoring");
    return Ok(());
  };
  let Some(photo) = msg.photo().and_then(|sizes| sizes.last()) else {
    return Ok(());
  };

  let blob_ref = match ctx.photos().download(&bot, &photo.file.id, slot).await {
    Ok(blob_ref) => blob_ref,
    Err(err) => {
      warn!(owner, ?slot, error = %err, "failed to download schedule photo");
      bot
        .send_message(
          msg.chat.id,
          format!("❌ <b>Upload failed:</b>\n{}\n\nSend the photo again.", html::escape(&err.to_string())),
        )
        .parse_mode(ParseMode::Html)
        .await?;
      return Ok(());
    },
  };

  let Some(stored) = ctx.sessions().consume_on_image(owner, ctx.db(), &blob_ref).await? else {
    return Ok(());
  };
  ctx.db().add_log(owner, &format!("upload {}", stored.blob_ref)).await?;

  let mut text = format!("✅ <b>Schedule uploaded!</b>\n\n{}", describe_slot(stored.slot));
  let keyboard = match stored.slot {
    ImageSlot::Day { weekday, variant } => Some(InlineKeyboardMarkup::new(vec![vec![
      button("👁️ Show", CallbackAction::ShowDay(weekday, variant)),
      button("⚙️ Manage day", CallbackAction::PanelDay(weekday)),
    ]])),
    ImageSlot::Date { .. } => {
      text.push_str("\n\nUsers will now see it when they ask for this date.");
      None
    },
    ImageSlot::Week { .. } => {
      text.push_str("\n\nUsers can now view it with /week.");
      None
    },
  };

  let request = bot.send_message(msg.chat.id, text).parse_mode(ParseMode::Html);
  match keyboard {
    Some(keyboard) => request.reply_markup(keyboard).await?,
    None => request.await?,
  };
  Ok(())
}

fn render_users_list(users: &[UserRow]) -> String {
  if users.is_empty() {
    return "📭 No users yet.".to_string();
  }
  let approved = users.iter().filter(|user| user.status == UserStatus::Approved).count();
  let mut text = format!(
    "👥 <b>Users</b>\n\nTotal: {}\n✅ Approved: {approved}\n⏳ Pending: {}\n\n",
    users.len(),
    users.len() - approved,
  );
  for user in users {
    let mark = match user.status {
      UserStatus::Approved => "✅",
      UserStatus::Pending => "⏳",
    };
    let username = user
      .username
      .as_deref()
      .map(|name| format!(" @{}", html::escape(name)))
      .unwrap_or_default();
    text.push_str(&format!(
      "{mark} {}{username} <code>{}</code>",
      html::escape(&user.full_name),
      user.user_id
    ));
    if user.status == UserStatus::Pending {
      text.push_str(&format!(" /approve_{}", user.user_id));
    }
    text.push('\n');
  }
  text
}

#[instrument(skip(bot, ctx, msg))]
pub async fn handle_users(bot: Bot, ctx: SharedContext, msg: Message) -> HandlerResult {
  send_users_list(&bot, &ctx, msg.chat.id).await
}

pub async fn send_users_list(bot: &Bot, ctx: &SharedContext, chat: ChatId) -> HandlerResult {
  let users = ctx.db().list_users().await?;
  bot
    .send_message(chat, render_users_list(&users))
    .parse_mode(ParseMode::Html)
    .await?;
  Ok(())
}

pub async fn notify_admins_about_new_user(bot: &Bot, ctx: &SharedContext, user_id: i64, full_name: &str) {
  let text = format!(
    "🆕 <b>New access request</b>\n\n{} <code>{user_id}</code>\n\nApprove: /approve_{user_id}",
    html::escape(full_name)
  );
  let keyboard = InlineKeyboardMarkup::new(vec![vec![button("✅ Approve", CallbackAction::Approve(user_id))]]);
  for admin_id in ctx.admin_ids() {
    let request = bot
      .send_message(ChatId(admin_id), text.clone())
      .parse_mode(ParseMode::Html)
      .reply_markup(keyboard.clone());
    if let Err(err) = request.await {
      warn!(error = %err, admin_id, user_id, "failed to notify admin about new user");
    }
  }
}

/// Approves `target`, tells the admin chat and the user. Returns a short status line.
#[instrument(skip(bot, ctx))]
pub async fn approve_and_notify(
  bot: &Bot,
  ctx: &SharedContext,
  chat: ChatId,
  admin_id: i64,
  target: i64,
) -> anyhow::Result<String> {
  let Some(user) = ctx.db().get_user(target).await? else {
    let text = format!("❓ User {target} is not registered.");
    bot.send_message(chat, text.clone()).await?;
    return Ok(text);
  };
  if user.status == UserStatus::Approved {
    let text = format!("ℹ️ User {target} is already approved.");
    bot.send_message(chat, text.clone()).await?;
    return Ok(text);
  }
  ctx.db().approve_user(target).await?;
  ctx.db().add_log(admin_id, &format!("approve {target}")).await?;
  info!(admin_id, target, "approved user");

  bot
    .send_message(
      chat,
      format!("✅ {} <code>{target}</code> approved.", html::escape(&user.full_name)),
    )
    .parse_mode(ParseMode::Html)
    .await?;
  if let Err(err) = bot
    .send_message(ChatId(target), "✅ Your request has been approved!\n\nUse /start to open the menu.")
    .await
  {
    warn!(error = %err, target, "failed to notify approved user");
  }
  Ok(format!("✅ User {target} approved"))
}

async fn approve_from_text(bot: &Bot, ctx: &SharedContext, msg: &Message, raw: &str) -> HandlerResult {
  let Ok(target) = raw.trim().parse::<i64>() else {
    bot
      .send_message(msg.chat.id, "❌ Invalid format. Use /approve <id>.")
      .await?;
    return Ok(());
  };
  approve_and_notify(bot, ctx, msg.chat.id, sender_id(msg)?, target).await?;
  Ok(())
}

pub async fn handle_approve(bot: Bot, ctx: SharedContext, msg: Message, arg: String) -> HandlerResult {
  approve_from_text(&bot, &ctx, &msg, &arg).await
}

pub async fn handle_approve_shortcut(
  bot: Bot,
  ctx: SharedContext,
  msg: Message,
  shortcut: ApproveShortcut,
) -> HandlerResult {
  approve_from_text(&bot, &ctx, &msg, &shortcut.0).await
}

#[instrument(skip(bot, ctx, msg))]
pub async fn handle_add_day(bot: Bot, ctx: SharedContext, msg: Message, arg: String) -> HandlerResult {
  if !require_admin(&bot, &ctx, &msg).await? {
    return Ok(());
  }
  let (weekday, lesson) = match parse_lesson_args(&arg) {
    Ok(parsed) => parsed,
    Err(err) => {
      bot.send_message(msg.chat.id, format!("❌ {err}")).await?;
      return Ok(());
    },
  };
  ctx.db().upsert_base_lesson(weekday, &lesson).await?;
  ctx
    .db()
    .add_log(sender_id(&msg)?, &format!("add lesson {} #{}", day_name(weekday), lesson.number))
    .await?;

  let time = if lesson.time_end.is_empty() {
    lesson.time_start.clone()
  } else {
    format!("{}-{}", lesson.time_start, lesson.time_end)
  };
  bot
    .send_message(
      msg.chat.id,
      format!(
        "✅ Lesson saved\n\n{}: #{} <b>{}</b>\n🕐 {}\n🚪 {}",
        day_name(weekday),
        lesson.number,
        html::escape(&lesson.subject),
        html::escape(&time),
        html::escape(&lesson.classroom),
      ),
    )
    .parse_mode(ParseMode::Html)
    .await?;
  Ok(())
}

fn lessons_summary(heading: &str, lessons: &[Lesson], when_empty: &str) -> String {
  if lessons.is_empty() {
    format!("✅ {heading}: {when_empty}")
  } else {
    format!("✅ {heading}\n\n{}", format_lessons(lessons))
  }
}

#[instrument(skip(bot, ctx, msg))]
pub async fn handle_set_day(bot: Bot, ctx: SharedContext, msg: Message, arg: String) -> HandlerResult {
  if !require_admin(&bot, &ctx, &msg).await? {
    return Ok(());
  }
  let (weekday, lessons) = match parse_set_day_args(&arg) {
    Ok(parsed) => parsed,
    Err(err) => {
      bot.send_message(msg.chat.id, format!("❌ {err}")).await?;
      return Ok(());
    },
  };
  ctx.db().add_base_schedule(weekday, &lessons).await?;
  ctx
    .db()
    .add_log(sender_id(&msg)?, &format!("set lessons {} ({})", day_name(weekday), lessons.len()))
    .await?;
  bot
    .send_message(msg.chat.id, lessons_summary(day_name(weekday), &lessons, "no lessons"))
    .parse_mode(ParseMode::Html)
    .await?;
  Ok(())
}

/// Date lessons replace the weekday's lessons for that date and are purged once it has passed.
#[instrument(skip(bot, ctx, msg))]
pub async fn handle_set_date(bot: Bot, ctx: SharedContext, msg: Message, arg: String) -> HandlerResult {
  if !require_admin(&bot, &ctx, &msg).await? {
    return Ok(());
  }
  let (date, lessons) = match parse_set_date_args(&arg) {
    Ok(parsed) => parsed,
    Err(err) => {
      bot.send_message(msg.chat.id, format!("❌ {err}")).await?;
      return Ok(());
    },
  };
  ctx.db().add_actual_schedule(date, &lessons, None).await?;
  let heading = date.format("%Y-%m-%d").to_string();
  ctx
    .db()
    .add_log(sender_id(&msg)?, &format!("set lessons {heading} ({})", lessons.len()))
    .await?;
  bot
    .send_message(msg.chat.id, lessons_summary(&heading, &lessons, "back to the weekday lessons"))
    .parse_mode(ParseMode::Html)
    .await?;
  Ok(())
}

#[instrument(skip(bot, ctx, msg))]
pub async fn handle_add_homework(bot: Bot, ctx: SharedContext, msg: Message, arg: String) -> HandlerResult {
  if !require_admin(&bot, &ctx, &msg).await? {
    return Ok(());
  }
  let (subject, due, task) = match parse_homework_args(&arg) {
    Ok(parsed) => parsed,
    Err(err) => {
      bot.send_message(msg.chat.id, format!("❌ {err}")).await?;
      return Ok(());
    },
  };
  let id = ctx.db().add_homework(&subject, &task, today(), due).await?;
  ctx.db().add_log(sender_id(&msg)?, &format!("add homework {id}")).await?;
  bot
    .send_message(
      msg.chat.id,
      format!(
        "✅ Homework saved\n\n<b>{}</b> (due {}): {}",
        html::escape(&subject),
        due.format("%d.%m.%Y"),
        html::escape(&task),
      ),
    )
    .parse_mode(ParseMode::Html)
    .await?;
  Ok(())
}

#[instrument(skip(bot, ctx, msg))]
pub async fn handle_broadcast(bot: Bot, ctx: SharedContext, msg: Message, arg: String) -> HandlerResult {
  if !require_admin(&bot, &ctx, &msg).await? {
    return Ok(());
  }
  let text = arg.trim();
  if text.is_empty() {
    bot.send_message(msg.chat.id, "Usage: /broadcast <message>").await?;
    return Ok(());
  }
  let recipients = ctx.db().list_approved_user_ids().await?;
  let delivered = broadcast_text(&bot, &recipients, text).await;
  ctx.db().add_log(sender_id(&msg)?, "broadcast").await?;
  bot
    .send_message(msg.chat.id, format!("📢 Broadcast sent to {delivered} user(s)."))
    .await?;
  Ok(())
}

async fn broadcast_text(bot: &Bot, user_ids: &[i64], text: &str) -> usize {
  let mut delivered = 0usize;
  for user_id in user_ids {
    match bot.send_message(ChatId(*user_id), text.to_string()).await {
      Ok(_) => {
        delivered += 1;
      },
      Err(err) => {
        warn!(error = %err, target_user_id = user_id, "failed to deliver broadcast");
      },
    }
  }
  delivered
}
