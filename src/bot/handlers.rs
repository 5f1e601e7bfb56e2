use anyhow::Context;
use chrono::NaiveDate;
use teloxide::dispatching::UpdateHandler;
use teloxide::dptree;
use teloxide::prelude::*;
use teloxide::types::CallbackQuery;
use teloxide::types::ChatId;
use teloxide::types::InlineKeyboardMarkup;
use teloxide::types::InputFile;
use teloxide::types::Message;
use teloxide::types::ParseMode;
use teloxide::utils::command::BotCommands;
use teloxide::utils::html;
use tracing::error;
use tracing::info;
use tracing::instrument;
use tracing::warn;

use crate::bot::Command;
use crate::bot::HandlerResult;
use crate::bot::SharedContext;
use crate::bot::access;
use crate::bot::access::Access;
use crate::bot::admin;
use crate::bot::admin::ApproveShortcut;
use crate::bot::callback::CallbackAction;
use crate::bot::callback::MenuItem;
use crate::bot::callback::button;
use crate::models::HomeworkRow;
use crate::models::ImageSlot;
use crate::models::WeekVariant;
use crate::util::all_weekdays;
use crate::util::day_name;
use crate::util::format_lessons;
use crate::util::parse_date;
use crate::util::parse_weekday;
use crate::util::today;
use crate::util::tomorrow;

pub fn build_schema() -> UpdateHandler<anyhow::Error> {
  let message_handler = Update::filter_message()
    .filter_map_async(resolve_message_access)
    .branch(dptree::filter(|access: Access| !access.is_allowed()).endpoint(send_access_notice))
    .branch(command_branch())
    .branch(dptree::filter_map(ApproveShortcut::from_message).endpoint(admin::handle_approve_shortcut))
    .branch(dptree::filter(|msg: Message| msg.photo().is_some()).endpoint(admin::handle_photo))
    .branch(dptree::endpoint(handle_other_message));

  let callback_handler = Update::filter_callback_query().endpoint(handle_callback_query);

  dptree::entry().branch(message_handler).branch(callback_handler)
}

fn command_branch() -> UpdateHandler<anyhow::Error> {
  dptree::entry()
    .filter_command::<Command>()
    .branch(dptree::case![Command::Start].endpoint(handle_start))
    .branch(dptree::case![Command::Help].endpoint(handle_help))
    .branch(dptree::case![Command::Myid].endpoint(handle_myid))
    .branch(dptree::case![Command::Schedule].endpoint(handle_schedule))
    .branch(dptree::case![Command::Today].endpoint(handle_today))
    .branch(dptree::case![Command::Week].endpoint(handle_week))
    .branch(dptree::case![Command::Day(arg)].endpoint(handle_day))
    .branch(dptree::case![Command::Homework(arg)].endpoint(handle_homework))
    .branch(dptree::case![Command::Admin].endpoint(admin::handle_admin_panel))
    .branch(dptree::case![Command::Users].endpoint(admin::handle_users))
    .branch(dptree::case![Command::Approve(arg)].endpoint(admin::handle_approve))
    .branch(dptree::case![Command::UploadSchedule].endpoint(admin::handle_upload_help))
    .branch(dptree::case![Command::UploadDay(arg)].endpoint(admin::handle_upload_day))
    .branch(dptree::case![Command::UploadDate(arg)].endpoint(admin::handle_upload_date))
    .branch(dptree::case![Command::UploadWeek(arg)].endpoint(admin::handle_upload_week))
    .branch(dptree::case![Command::AddDay(arg)].endpoint(admin::handle_add_day))
    .branch(dptree::case![Command::SetDay(arg)].endpoint(admin::handle_set_day))
    .branch(dptree::case![Command::SetDate(arg)].endpoint(admin::handle_set_date))
    .branch(dptree::case![Command::AddHomework(arg)].endpoint(admin::handle_add_homework))
    .branch(dptree::case![Command::Broadcast(arg)].endpoint(admin::handle_broadcast))
}

/// Runs the access gate for every inbound message. Messages without a sender,
/// or whose access cannot be resolved, are dropped.
async fn resolve_message_access(ctx: SharedContext, msg: Message) -> Option<Access> {
  let user = msg.from.as_ref()?;
  let user_id = user.id.0 as i64;
  let command = msg.text().and_then(access::command_name);
  match ctx.access_for(user_id, command.as_deref(), msg.photo().is_some()).await {
    Ok(access) => Some(access),
    Err(err) => {
      error!(user_id, error = %err, "failed to resolve access");
      None
    },
  }
}

#[instrument(skip(bot, msg))]
async fn send_access_notice(bot: Bot, msg: Message, access: Access) -> HandlerResult {
  if let Some(notice) = access.notice() {
    info!(chat_id = %msg.chat.id, ?access, "blocked message");
    bot.send_message(msg.chat.id, notice).await?;
  }
  Ok(())
}

#[instrument(skip(bot, ctx, msg))]
async fn handle_start(bot: Bot, ctx: SharedContext, msg: Message) -> HandlerResult {
  let user = msg.from.as_ref().context("message missing sender")?;
  let user_id = user.id.0 as i64;
  let full_name = user.full_name();
  info!(user_id, chat_id = %msg.chat.id, "received /start command");
  ctx.db().add_log(user_id, "start").await?;

  if !ctx.db().user_exists(user_id).await? {
    // A concurrent /start may have registered the user already; only the winner notifies.
    let registered = ctx.db().add_user(user_id, user.username.as_deref(), &full_name).await?;
    bot
      .send_message(
        msg.chat.id,
        "📝 Your request has been sent.\nPlease wait for an admin to approve it.",
      )
      .await?;
    if registered && !ctx.is_admin(user_id) {
      admin::notify_admins_about_new_user(&bot, &ctx, user_id, &full_name).await;
    }
    return Ok(());
  }

  if ctx.db().is_user_approved(user_id).await? {
    send_main_menu_message(&bot, &ctx, msg.chat.id, user_id, &full_name).await
  } else {
    bot.send_message(msg.chat.id, "⏳ Your request is still under review.").await?;
    Ok(())
  }
}

#[instrument(skip(bot, msg))]
async fn handle_help(bot: Bot, msg: Message) -> HandlerResult {
  info!(chat_id = %msg.chat.id, "received /help command");
  let mut text = Command::descriptions().to_string();
  text.push_str("\n\nSchedules and homework are also available from the menu. Use /start to open it again.");
  bot.send_message(msg.chat.id, text).await?;
  Ok(())
}

async fn handle_myid(bot: Bot, msg: Message) -> HandlerResult {
  let user = msg.from.as_ref().context("message missing sender")?;
  bot
    .send_message(msg.chat.id, format!("🆔 Your id: <code>{}</code>", user.id.0))
    .parse_mode(ParseMode::Html)
    .await?;
  Ok(())
}

async fn send_main_menu_message(
  bot: &Bot,
  ctx: &SharedContext,
  chat: ChatId,
  user_id: i64,
  full_name: &str,
) -> HandlerResult {
  let is_admin = ctx.is_admin(user_id);
  let mut text = format!("👋 Good day, {}! What would you like to see?", html::escape(full_name));
  if is_admin {
    text.push_str("\n\n👑 <b>Admin</b>: /admin for the schedule panel, /users for the user list, /upload_schedule for upload help.");
  }
  bot
    .send_message(chat, text)
    .parse_mode(ParseMode::Html)
    .reply_markup(main_menu_keyboard(is_admin))
    .await?;
  info!(user_id, chat_id = %chat, "sent main menu message");
  Ok(())
}

pub(super) fn main_menu_keyboard(is_admin: bool) -> InlineKeyboardMarkup {
  let mut rows = vec![
    vec![
      button("📅 Tomorrow", CallbackAction::Menu(MenuItem::Schedule)),
      button("📅 Today", CallbackAction::Menu(MenuItem::Today)),
    ],
    vec![
      button("🗓️ Week", CallbackAction::Menu(MenuItem::Week)),
      button("📚 Homework", CallbackAction::Menu(MenuItem::Homework)),
    ],
  ];
  if is_admin {
    rows.push(vec![
      button("👥 Users", CallbackAction::Menu(MenuItem::Users)),
      button("⚙️ Schedule editor", CallbackAction::Menu(MenuItem::Admin)),
    ]);
  }
  InlineKeyboardMarkup::new(rows)
}

#[instrument(skip(bot, ctx, msg))]
async fn handle_schedule(bot: Bot, ctx: SharedContext, msg: Message) -> HandlerResult {
  let user_id = msg.from.as_ref().map(|user| user.id.0 as i64).unwrap_or_default();
  send_schedule_for(&bot, &ctx, msg.chat.id, user_id, tomorrow(), "Schedule for tomorrow").await
}

#[instrument(skip(bot, ctx, msg))]
async fn handle_today(bot: Bot, ctx: SharedContext, msg: Message) -> HandlerResult {
  let user_id = msg.from.as_ref().map(|user| user.id.0 as i64).unwrap_or_default();
  send_schedule_for(&bot, &ctx, msg.chat.id, user_id, today(), "Schedule for today").await
}

#[instrument(skip(bot, ctx, msg))]
async fn handle_week(bot: Bot, ctx: SharedContext, msg: Message) -> HandlerResult {
  send_week_schedule(&bot, &ctx, msg.chat.id).await
}

#[instrument(skip(bot, ctx, msg))]
async fn handle_day(bot: Bot, ctx: SharedContext, msg: Message, arg: String) -> HandlerResult {
  if arg.trim().is_empty() {
    let mut text = String::from("📅 <b>Usage:</b> /day [0-6]\n\n");
    for weekday in all_weekdays() {
      text.push_str(&format!("{} — {}\n", weekday.num_days_from_monday(), day_name(weekday)));
    }
    bot.send_message(msg.chat.id, text).parse_mode(ParseMode::Html).await?;
    return Ok(());
  }

  let weekday = match parse_weekday(&arg) {
    Ok(weekday) => weekday,
    Err(err) => {
      bot.send_message(msg.chat.id, format!("❌ {err}")).await?;
      return Ok(());
    },
  };

  let variant = WeekVariant::for_date(today());
  let title = format!("📅 <b>Schedule for {}</b>", day_name(weekday));
  let chain = ImageSlot::Day { weekday, variant }.lookup_chain();
  if let Some((_, blob_ref)) = resolve_photo(&ctx, chain).await? {
    if send_photo(&bot, msg.chat.id, &blob_ref, format!("{title}\nWeek: {}", variant.label())).await {
      return Ok(());
    }
  }

  let lessons = ctx.db().get_schedule_for_day(weekday).await?;
  let text = if lessons.is_empty() {
    format!("{title}\n\nNo schedule has been uploaded for this day yet.")
  } else {
    format!("{title}\n\n{}", format_lessons(&lessons))
  };
  bot.send_message(msg.chat.id, text).parse_mode(ParseMode::Html).await?;
  Ok(())
}

#[instrument(skip(bot, ctx, msg))]
async fn handle_homework(bot: Bot, ctx: SharedContext, msg: Message, arg: String) -> HandlerResult {
  let query = arg.trim();
  if query.is_empty() {
    return send_homework_for(&bot, &ctx, msg.chat.id, tomorrow()).await;
  }
  if let Ok(date) = parse_date(query) {
    return send_homework_for(&bot, &ctx, msg.chat.id, date).await;
  }

  let text = match ctx.db().get_latest_homework_by_subject(query).await? {
    Some(homework) => format!("📚 <b>Latest homework</b>\n\n{}", render_homework(&[homework])),
    None => format!("📚 No homework found for <b>{}</b>.", html::escape(query)),
  };
  bot.send_message(msg.chat.id, text).parse_mode(ParseMode::Html).await?;
  Ok(())
}

#[instrument(skip(bot, msg))]
async fn handle_other_message(bot: Bot, msg: Message) -> HandlerResult {
  if let Some(text) = msg.text() {
    let reply = if text.starts_with('/') {
      "❓ Unknown command. See /help."
    } else {
      "I did not understand that. Use the menu buttons or /help."
    };
    info!(chat_id = %msg.chat.id, "received unrecognized message");
    bot.send_message(msg.chat.id, reply).await?;
  }
  Ok(())
}

#[instrument(skip(bot, ctx, query))]
async fn handle_callback_query(bot: Bot, ctx: SharedContext, query: CallbackQuery) -> HandlerResult {
  let user_id = query.from.id.0 as i64;
  let message_ctx = query.message.as_ref().map(|message| (message.chat().id, message.id()));
  let data = query.data.as_deref().unwrap_or_default();
  info!(user_id, callback = data, "handling callback query");

  let action = match data.parse::<CallbackAction>() {
    Ok(action) => action,
    Err(err) => {
      warn!(user_id, callback = data, error = %err, "rejected callback payload");
      bot
        .answer_callback_query(query.id.clone())
        .text(format!("❌ This button is not valid: {err}"))
        .show_alert(true)
        .await?;
      return Ok(());
    },
  };

  if let Some(notice) = ctx.access_for_class(user_id, action.class()).await?.notice() {
    bot.answer_callback_query(query.id.clone()).text(notice).await?;
    return Ok(());
  }

  let Some((chat_id, message_id)) = message_ctx else {
    bot.answer_callback_query(query.id.clone()).await?;
    return Ok(());
  };

  let mut alert = false;
  let callback_text: Option<String> = match action {
    CallbackAction::Menu(item) => {
      handle_menu(&bot, &ctx, chat_id, user_id, item).await?;
      None
    },
    CallbackAction::PanelRoot => {
      admin::show_panel_root(&bot, chat_id, message_id).await?;
      Some("⬅️ Back to the panel".to_string())
    },
    CallbackAction::PanelToday => {
      admin::show_panel_date(&bot, &ctx, chat_id, today(), "today").await?;
      None
    },
    CallbackAction::PanelTomorrow => {
      admin::show_panel_date(&bot, &ctx, chat_id, tomorrow(), "tomorrow").await?;
      None
    },
    CallbackAction::PanelWeek => {
      admin::show_panel_week(&bot, &ctx, chat_id, message_id).await?;
      None
    },
    CallbackAction::PanelWeekUpload => {
      admin::show_week_upload_menu(&bot, chat_id, message_id).await?;
      None
    },
    CallbackAction::PanelDay(weekday) => {
      admin::show_panel_day(&bot, &ctx, chat_id, message_id, weekday).await?;
      None
    },
    CallbackAction::ShowDay(weekday, variant) => {
      let missing = !admin::show_day_image(&bot, &ctx, chat_id, weekday, variant).await?;
      alert = missing;
      missing.then(|| "❌ File not found".to_string())
    },
    CallbackAction::Upload(slot) => {
      admin::begin_upload(&bot, &ctx, chat_id, user_id, slot).await?;
      Some("📤 Waiting for the photo".to_string())
    },
    CallbackAction::Approve(target) => Some(admin::approve_and_notify(&bot, &ctx, chat_id, user_id, target).await?),
  };

  if let Some(text) = callback_text {
    bot.answer_callback_query(query.id).text(text).show_alert(alert).await?;
  } else {
    bot.answer_callback_query(query.id).await?;
  }
  Ok(())
}

async fn handle_menu(bot: &Bot, ctx: &SharedContext, chat: ChatId, user_id: i64, item: MenuItem) -> HandlerResult {
  match item {
    MenuItem::Schedule => send_schedule_for(bot, ctx, chat, user_id, tomorrow(), "Schedule for tomorrow").await,
    MenuItem::Today => send_schedule_for(bot, ctx, chat, user_id, today(), "Schedule for today").await,
    MenuItem::Week => send_week_schedule(bot, ctx, chat).await,
    MenuItem::Homework => send_homework_for(bot, ctx, chat, tomorrow()).await,
    MenuItem::Users => admin::send_users_list(bot, ctx, chat).await,
    MenuItem::Admin => admin::send_panel(bot, chat).await,
  }
}

/// First slot in `chain` that has a row and whose file is still on disk.
async fn resolve_photo(
  ctx: &SharedContext,
  chain: Vec<ImageSlot>,
) -> anyhow::Result<Option<(ImageSlot, String)>> {
  for slot in chain {
    let Some(blob_ref) = ctx.db().find_image(slot).await? else {
      continue;
    };
    if ctx.photos().exists(&blob_ref).await {
      return Ok(Some((slot, blob_ref)));
    }
    warn!(?slot, %blob_ref, "schedule image row points to a missing file");
  }
  Ok(None)
}

/// Returns `false` when Telegram refused the photo; callers fall back to text.
pub(super) async fn send_photo(bot: &Bot, chat: ChatId, blob_ref: &str, caption: String) -> bool {
  let request = bot
    .send_photo(chat, InputFile::file(blob_ref))
    .caption(caption)
    .parse_mode(ParseMode::Html);
  match request.await {
    Ok(_) => true,
    Err(err) => {
      error!(chat_id = %chat, blob_ref, error = %err, "failed to send schedule photo");
      false
    },
  }
}

#[instrument(skip(bot, ctx))]
async fn send_schedule_for(
  bot: &Bot,
  ctx: &SharedContext,
  chat: ChatId,
  user_id: i64,
  date: NaiveDate,
  title: &str,
) -> HandlerResult {
  let heading = format!("📅 <b>{title} ({})</b>", date.format("%d.%m.%Y"));

  if let Some((slot, blob_ref)) = resolve_photo(ctx, ImageSlot::schedule_chain_for(date)).await? {
    let caption = match slot {
      ImageSlot::Date { .. } => format!("{heading}\nUpdated for this date"),
      _ => heading.clone(),
    };
    if send_photo(bot, chat, &blob_ref, caption).await {
      return Ok(());
    }
  }

  let (lessons, is_actual) = ctx.db().schedule_for_date(date).await?;
  if !lessons.is_empty() {
    let note = if is_actual { "\n<i>Updated for this date</i>" } else { "" };
    bot
      .send_message(chat, format!("{heading}{note}\n\n{}", format_lessons(&lessons)))
      .parse_mode(ParseMode::Html)
      .await?;
    return Ok(());
  }

  if ctx.is_admin(user_id) {
    bot
      .send_message(
        chat,
        format!("{heading}\n\nStatus: ❌ not uploaded\n\nTap below to upload it:"),
      )
      .parse_mode(ParseMode::Html)
      .reply_markup(admin::upload_date_keyboard(date))
      .await?;
  } else {
    bot
      .send_message(
        chat,
        format!("{heading}\n\nThe schedule photo has not been uploaded yet.\nAn admin will add it soon!"),
      )
      .parse_mode(ParseMode::Html)
      .await?;
  }
  Ok(())
}

#[instrument(skip(bot, ctx))]
async fn send_week_schedule(bot: &Bot, ctx: &SharedContext, chat: ChatId) -> HandlerResult {
  let variant = WeekVariant::for_date(today());
  let chain = ImageSlot::Week { variant }.lookup_chain();
  if let Some((_, blob_ref)) = resolve_photo(ctx, chain).await? {
    if send_photo(bot, chat, &blob_ref, "🗓️ <b>Schedule for the week</b>".to_string()).await {
      return Ok(());
    }
  }

  let mut text = String::from("🗓️ <b>Schedule for the week:</b>\n\n");
  for weekday in all_weekdays() {
    let chain = ImageSlot::Day { weekday, variant }.lookup_chain();
    let uploaded = resolve_photo(ctx, chain).await?.is_some();
    let mark = if uploaded { "✅" } else { "❌" };
    let status = if uploaded { "uploaded" } else { "no schedule" };
    text.push_str(&format!("{mark} {} — {status}\n", day_name(weekday)));
  }
  text.push_str("\nUse /day [0-6] for a specific day (0 = Monday).");
  bot.send_message(chat, text).parse_mode(ParseMode::Html).await?;
  Ok(())
}

#[instrument(skip(bot, ctx))]
async fn send_homework_for(bot: &Bot, ctx: &SharedContext, chat: ChatId, date: NaiveDate) -> HandlerResult {
  let homework = ctx.db().get_homework_for_date(date).await?;
  let heading = format!("📚 <b>Homework due {}</b>", date.format("%d.%m.%Y"));
  let text = if homework.is_empty() {
    format!("{heading}\n\nNothing is due. 🎉")
  } else {
    format!("{heading}\n\n{}", render_homework(&homework))
  };
  bot.send_message(chat, text).parse_mode(ParseMode::Html).await?;
  Ok(())
}

fn render_homework(rows: &[HomeworkRow]) -> String {
  rows
    .iter()
    .map(|homework| {
      format!(
        "• <b>{}</b> (due {}): {}",
        html::escape(&homework.subject),
        homework.date_due.format("%d.%m.%Y"),
        html::escape(&homework.task),
      )
    })
    .collect::<Vec<_>>()
    .join("\n")
}
