use std::sync::Arc;

use anyhow::Result;
use teloxide::dispatching::dialogue::InMemStorage;
use teloxide::dispatching::dialogue::Storage;
use teloxide::types::ChatId;
use tracing::info;
use tracing::instrument;

use crate::db::Db;
use crate::models::ImageSlot;
use crate::models::StoredImage;

pub type SessionStorage = InMemStorage<ImageSlot>;

/// Per-admin pending upload: the slot the next received photo is filed under.
///
/// One session per owner; a new `begin` replaces an unconsumed one. Sessions
/// have no expiry and live until consumed or the process restarts.
#[derive(Clone)]
pub struct UploadSessions {
  storage: Arc<SessionStorage>,
}

impl Default for UploadSessions {
  fn default() -> Self {
    Self::new()
  }
}

impl UploadSessions {
  pub fn new() -> Self {
    Self {
      storage: InMemStorage::new(),
    }
  }

  /// Starts (or replaces) the owner's session. Returns the session it replaced, if any.
  #[instrument(skip(self))]
  pub async fn begin(&self, owner_id: i64, slot: ImageSlot) -> Result<Option<ImageSlot>> {
    let replaced = self.pending(owner_id).await?;
    Arc::clone(&self.storage).update_dialogue(ChatId(owner_id), slot).await?;
    if let Some(previous) = replaced {
      info!(owner_id, ?previous, "replaced unconsumed upload session");
    }
    Ok(replaced)
  }

  pub async fn pending(&self, owner_id: i64) -> Result<Option<ImageSlot>> {
    Ok(Arc::clone(&self.storage).get_dialogue(ChatId(owner_id)).await?)
  }

  /// Files `blob_ref` under the owner's pending slot and ends the session.
  /// Without a session nothing is stored and `None` is returned.
  #[instrument(skip(self, db))]
  pub async fn consume_on_image(&self, owner_id: i64, db: &Db, blob_ref: &str) -> Result<Option<StoredImage>> {
    let Some(slot) = self.pending(owner_id).await? else {
      return Ok(None);
    };
    db.store_image(slot, blob_ref).await?;
    Arc::clone(&self.storage).remove_dialogue(ChatId(owner_id)).await?;
    info!(owner_id, ?slot, blob_ref, "stored uploaded schedule image");
    Ok(Some(StoredImage {
      slot,
      blob_ref: blob_ref.to_string(),
    }))
  }
}

#[cfg(test)]
mod tests {
  use chrono::NaiveDate;
  use chrono::Weekday;

  use super::UploadSessions;
  use crate::db::Db;
  use crate::models::ImageSlot;
  use crate::models::WeekVariant;

  const ADMIN: i64 = 1;

  fn monday_all() -> ImageSlot {
    ImageSlot::Day {
      weekday: Weekday::Mon,
      variant: WeekVariant::All,
    }
  }

  #[tokio::test]
  async fn consume_without_session_is_a_no_op() {
    let db = Db::in_memory().await.unwrap();
    let sessions = UploadSessions::new();
    let stored = sessions.consume_on_image(ADMIN, &db, "schedules/x.jpg").await.unwrap();
    assert!(stored.is_none());
    assert_eq!(db.count_rows("schedule_images").await.unwrap(), 0);
    assert_eq!(db.count_rows("actual_schedule_images").await.unwrap(), 0);
    assert_eq!(db.count_rows("week_schedule").await.unwrap(), 0);
  }

  #[tokio::test]
  async fn last_begin_wins() {
    let db = Db::in_memory().await.unwrap();
    let sessions = UploadSessions::new();
    let week = ImageSlot::Week {
      variant: WeekVariant::Even,
    };

    assert_eq!(sessions.begin(ADMIN, monday_all()).await.unwrap(), None);
    assert_eq!(sessions.begin(ADMIN, week).await.unwrap(), Some(monday_all()));

    let stored = sessions.consume_on_image(ADMIN, &db, "schedules/week_even.jpg").await.unwrap().unwrap();
    assert_eq!(stored.slot, week);
    assert_eq!(
      db.find_image(week).await.unwrap().as_deref(),
      Some("schedules/week_even.jpg")
    );
    assert_eq!(db.get_schedule_image(Weekday::Mon, WeekVariant::All).await.unwrap(), None);
  }

  #[tokio::test]
  async fn uploaded_photo_lands_in_the_store_and_clears_the_session() {
    let db = Db::in_memory().await.unwrap();
    let sessions = UploadSessions::new();
    sessions.begin(ADMIN, monday_all()).await.unwrap();

    let stored = sessions.consume_on_image(ADMIN, &db, "schedules/day_0_all.jpg").await.unwrap();
    assert_eq!(stored.map(|s| s.blob_ref).as_deref(), Some("schedules/day_0_all.jpg"));
    assert_eq!(
      db.get_schedule_image(Weekday::Mon, WeekVariant::All).await.unwrap().as_deref(),
      Some("schedules/day_0_all.jpg")
    );
    assert_eq!(sessions.pending(ADMIN).await.unwrap(), None);

    let second = sessions.consume_on_image(ADMIN, &db, "schedules/other.jpg").await.unwrap();
    assert!(second.is_none());
    assert_eq!(
      db.get_schedule_image(Weekday::Mon, WeekVariant::All).await.unwrap().as_deref(),
      Some("schedules/day_0_all.jpg")
    );
    assert_eq!(db.count_rows("schedule_images").await.unwrap(), 1);
  }

  #[tokio::test]
  async fn sessions_are_kept_per_owner() {
    let db = Db::in_memory().await.unwrap();
    let sessions = UploadSessions::new();
    let date = ImageSlot::Date {
      date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
    };
    sessions.begin(ADMIN, date).await.unwrap();

    assert!(sessions.consume_on_image(2, &db, "schedules/y.jpg").await.unwrap().is_none());
    assert_eq!(sessions.pending(ADMIN).await.unwrap(), Some(date));
  }
}
