use std::collections::HashSet;

use anyhow::Result;

use crate::bot::access;
use crate::bot::access::Access;
use crate::bot::access::CommandClass;
use crate::bot::upload::UploadSessions;
use crate::db::Db;
use crate::photos::PhotoStore;

#[derive(Clone)]
pub struct AppContext {
  db: Db,
  admins: HashSet<i64>,
  sessions: UploadSessions,
  photos: PhotoStore,
}

impl AppContext {
  pub fn new(db: Db, admins: Vec<i64>, photos: PhotoStore) -> Self {
    Self {
      db,
      admins: admins.into_iter().collect(),
      sessions: UploadSessions::new(),
      photos,
    }
  }

  pub fn db(&self) -> &Db {
    &self.db
  }

  pub fn sessions(&self) -> &UploadSessions {
    &self.sessions
  }

  pub fn photos(&self) -> &PhotoStore {
    &self.photos
  }

  pub fn is_admin(&self, tg_id: i64) -> bool {
    self.admins.contains(&tg_id)
  }

  pub fn admin_ids(&self) -> impl Iterator<Item = i64> + '_ {
    self.admins.iter().copied()
  }

  /// Gate decision for `user_id` sending a message whose command (if any) is `command`.
  pub async fn access_for(&self, user_id: i64, command: Option<&str>, has_photo: bool) -> Result<Access> {
    self.access_for_class(user_id, access::classify(command, has_photo)).await
  }

  pub async fn access_for_class(&self, user_id: i64, class: CommandClass) -> Result<Access> {
    let is_admin = self.is_admin(user_id);
    let status = match class {
      CommandClass::Restricted => self.db.get_user_status(user_id).await?,
      CommandClass::Photo if !is_admin => self.db.get_user_status(user_id).await?,
      CommandClass::Open | CommandClass::AdminOnly | CommandClass::Photo => None,
    };
    Ok(access::decide(class, is_admin, status))
  }
}

#[cfg(test)]
mod tests {
  use chrono::Weekday;

  use super::AppContext;
  use crate::bot::access::Access;
  use crate::bot::callback::CallbackAction;
  use crate::db::Db;
  use crate::models::ImageSlot;
  use crate::models::WeekVariant;
  use crate::photos::PhotoStore;

  const ADMIN: i64 = 900;

  async fn context() -> AppContext {
    let db = Db::in_memory().await.unwrap();
    AppContext::new(db, vec![ADMIN], PhotoStore::new("schedules"))
  }

  #[tokio::test]
  async fn registration_then_approval_unlocks_schedule() {
    let ctx = context().await;
    assert_eq!(
      ctx.access_for(42, Some("schedule"), false).await.unwrap(),
      Access::BlockUnregistered
    );

    assert_eq!(ctx.access_for(42, Some("start"), false).await.unwrap(), Access::Allow);
    assert!(ctx.db().add_user(42, None, "Pupil").await.unwrap());
    assert_eq!(
      ctx.access_for(42, Some("schedule"), false).await.unwrap(),
      Access::BlockPendingApproval
    );

    assert_eq!(ctx.access_for(ADMIN, Some("approve"), false).await.unwrap(), Access::Allow);
    assert!(ctx.db().approve_user(42).await.unwrap());
    assert_eq!(ctx.access_for(42, Some("schedule"), false).await.unwrap(), Access::Allow);
  }

  #[tokio::test]
  async fn unregistered_admin_can_finish_an_upload() {
    let ctx = context().await;
    let slot = ImageSlot::Day {
      weekday: Weekday::Mon,
      variant: WeekVariant::All,
    };
    let upload = CallbackAction::Upload(slot);

    assert_eq!(ctx.access_for_class(ADMIN, upload.class()).await.unwrap(), Access::Allow);
    assert_eq!(ctx.access_for(ADMIN, Some("upload_day"), false).await.unwrap(), Access::Allow);
    ctx.sessions().begin(ADMIN, slot).await.unwrap();
    assert_eq!(ctx.access_for(ADMIN, None, true).await.unwrap(), Access::Allow);

    assert!(ctx.db().add_user(ADMIN, None, "Class Admin").await.unwrap());
    assert_eq!(ctx.access_for(ADMIN, None, true).await.unwrap(), Access::Allow);
    assert_eq!(ctx.sessions().pending(ADMIN).await.unwrap(), Some(slot));
  }

  #[tokio::test]
  async fn photos_from_users_need_approval() {
    let ctx = context().await;
    assert_eq!(ctx.access_for(42, None, true).await.unwrap(), Access::BlockUnregistered);
    assert_eq!(
      ctx.access_for(42, Some("upload_week"), false).await.unwrap(),
      Access::BlockNoPermission
    );
  }

  #[tokio::test]
  async fn plain_messages_follow_the_restricted_rules() {
    let ctx = context().await;
    assert_eq!(ctx.access_for(42, None, false).await.unwrap(), Access::BlockUnregistered);
  }

  #[tokio::test]
  async fn admin_only_commands_skip_the_user_table() {
    let ctx = context().await;
    assert_eq!(ctx.access_for(ADMIN, Some("users"), false).await.unwrap(), Access::Allow);
    assert_eq!(ctx.access_for(42, Some("users"), false).await.unwrap(), Access::BlockNoPermission);
    assert_eq!(
      ctx.access_for(ADMIN, Some("schedule"), false).await.unwrap(),
      Access::BlockUnregistered
    );
  }
}
