use std::str::FromStr;

use anyhow::Result;
use chrono::Datelike;
use chrono::NaiveDate;
use chrono::Weekday;
use sqlx::Pool;
use sqlx::Row;
use sqlx::Sqlite;
use sqlx::migrate::Migrator;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::sqlite::SqliteRow;
use tracing::info;
use tracing::instrument;

use crate::models::HomeworkRow;
use crate::models::ImageSlot;
use crate::models::Lesson;
use crate::models::PurgeReport;
use crate::models::UserRow;
use crate::models::UserStatus;
use crate::models::WeekVariant;
use crate::util::weekday_index;

pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

#[derive(Clone)]
pub struct Db {
  pool: Pool<Sqlite>,
}

impl Db {
  pub async fn connect(database_url: &str) -> Result<Self> {
    let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
    let pool = SqlitePoolOptions::new().max_connections(5).connect_with(options).await?;
    MIGRATOR.run(&pool).await?;
    info!(database_url, "database ready");
    Ok(Self { pool })
  }

  /// Single-connection in-memory database; every new connection would get an empty schema.
  #[cfg(test)]
  pub async fn in_memory() -> Result<Self> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
    let pool = SqlitePoolOptions::new()
      .max_connections(1)
      .idle_timeout(None)
      .max_lifetime(None)
      .connect_with(options)
      .await?;
    MIGRATOR.run(&pool).await?;
    Ok(Self { pool })
  }

  // users

  #[instrument(skip(self))]
  pub async fn user_exists(&self, user_id: i64) -> Result<bool> {
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE user_id = ?")
      .bind(user_id)
      .fetch_one(&self.pool)
      .await?;
    Ok(count > 0)
  }

  /// Registers a pending user. Returns `false` when the user is already known.
  #[instrument(skip(self))]
  pub async fn add_user(&self, user_id: i64, username: Option<&str>, full_name: &str) -> Result<bool> {
    let result = sqlx::query("INSERT INTO users (user_id, username, full_name, status) VALUES (?, ?, ?, 'pending')")
      .bind(user_id)
      .bind(username)
      .bind(full_name)
      .execute(&self.pool)
      .await;
    match result {
      Ok(_) => {
        info!(user_id, "registered user");
        Ok(true)
      },
      Err(sqlx::Error::Database(err)) if err.is_unique_violation() => Ok(false),
      Err(err) => Err(err.into()),
    }
  }

  #[instrument(skip(self))]
  pub async fn get_user(&self, user_id: i64) -> Result<Option<UserRow>> {
    let row = sqlx::query(
      r#"
      SELECT user_id, username, full_name, status, registered_at
      FROM users
      WHERE user_id = ?
      "#,
    )
    .bind(user_id)
    .fetch_optional(&self.pool)
    .await?;
    row.as_ref().map(user_from_row).transpose()
  }

  #[instrument(skip(self))]
  pub async fn get_user_status(&self, user_id: i64) -> Result<Option<UserStatus>> {
    let status = sqlx::query_scalar::<_, String>("SELECT status FROM users WHERE user_id = ?")
      .bind(user_id)
      .fetch_optional(&self.pool)
      .await?;
    Ok(status.map(|value| value.parse::<UserStatus>()).transpose()?)
  }

  pub async fn is_user_approved(&self, user_id: i64) -> Result<bool> {
    Ok(self.get_user_status(user_id).await? == Some(UserStatus::Approved))
  }

  /// Returns `false` when no such user is registered.
  #[instrument(skip(self))]
  pub async fn approve_user(&self, user_id: i64) -> Result<bool> {
    let result = sqlx::query("UPDATE users SET status = 'approved' WHERE user_id = ?")
      .bind(user_id)
      .execute(&self.pool)
      .await?;
    Ok(result.rows_affected() > 0)
  }

  #[instrument(skip(self))]
  pub async fn list_users(&self) -> Result<Vec<UserRow>> {
    let rows = sqlx::query(
      r#"
      SELECT user_id, username, full_name, status, registered_at
      FROM users
      ORDER BY registered_at ASC, id ASC
      "#,
    )
    .fetch_all(&self.pool)
    .await?;
    rows.iter().map(user_from_row).collect()
  }

  #[instrument(skip(self))]
  pub async fn list_approved_user_ids(&self) -> Result<Vec<i64>> {
    let ids = sqlx::query_scalar::<_, i64>("SELECT user_id FROM users WHERE status = 'approved'")
      .fetch_all(&self.pool)
      .await?;
    Ok(ids)
  }

  // schedule images

  #[instrument(skip(self))]
  pub async fn add_schedule_image(&self, weekday: Weekday, image_path: &str, variant: WeekVariant) -> Result<()> {
    let mut tx = self.pool.begin().await?;
    sqlx::query("DELETE FROM schedule_images WHERE day_of_week = ? AND week_type = ?")
      .bind(weekday_index(weekday))
      .bind(variant.as_str())
      .execute(&mut *tx)
      .await?;
    sqlx::query("INSERT INTO schedule_images (day_of_week, image_path, week_type) VALUES (?, ?, ?)")
      .bind(weekday_index(weekday))
      .bind(image_path)
      .bind(variant.as_str())
      .execute(&mut *tx)
      .await?;
    tx.commit().await?;
    Ok(())
  }

  /// Image for the day, falling back from a specific week variant to `all`.
  pub async fn get_schedule_image(&self, weekday: Weekday, variant: WeekVariant) -> Result<Option<String>> {
    self.find_first(ImageSlot::Day { weekday, variant }.lookup_chain()).await
  }

  #[instrument(skip(self))]
  pub async fn add_actual_schedule_image(
    &self,
    date: NaiveDate,
    image_path: &str,
    expires_at: Option<NaiveDate>,
  ) -> Result<()> {
    let mut tx = self.pool.begin().await?;
    sqlx::query("DELETE FROM actual_schedule_images WHERE date = ?")
      .bind(date)
      .execute(&mut *tx)
      .await?;
    sqlx::query("INSERT INTO actual_schedule_images (date, image_path, expires_at) VALUES (?, ?, ?)")
      .bind(date)
      .bind(image_path)
      .bind(expires_at.unwrap_or(date))
      .execute(&mut *tx)
      .await?;
    tx.commit().await?;
    Ok(())
  }

  pub async fn get_actual_schedule_image(&self, date: NaiveDate) -> Result<Option<String>> {
    self.find_image(ImageSlot::Date { date }).await
  }

  #[instrument(skip(self))]
  pub async fn add_week_schedule(&self, image_path: &str, variant: WeekVariant) -> Result<()> {
    let mut tx = self.pool.begin().await?;
    sqlx::query("DELETE FROM week_schedule WHERE week_type = ?")
      .bind(variant.as_str())
      .execute(&mut *tx)
      .await?;
    sqlx::query("INSERT INTO week_schedule (image_path, week_type) VALUES (?, ?)")
      .bind(image_path)
      .bind(variant.as_str())
      .execute(&mut *tx)
      .await?;
    tx.commit().await?;
    Ok(())
  }

  /// Stores `image_path` under `slot`, replacing whatever was there.
  pub async fn store_image(&self, slot: ImageSlot, image_path: &str) -> Result<()> {
    match slot {
      ImageSlot::Day { weekday, variant } => self.add_schedule_image(weekday, image_path, variant).await,
      ImageSlot::Date { date } => self.add_actual_schedule_image(date, image_path, None).await,
      ImageSlot::Week { variant } => self.add_week_schedule(image_path, variant).await,
    }
  }

  /// Exact lookup of a single slot, no fallback.
  #[instrument(skip(self))]
  pub async fn find_image(&self, slot: ImageSlot) -> Result<Option<String>> {
    let query = match slot {
      ImageSlot::Day { weekday, variant } => {
        sqlx::query_scalar::<_, String>(
          "SELECT image_path FROM schedule_images WHERE day_of_week = ? AND week_type = ? LIMIT 1",
        )
        .bind(weekday_index(weekday))
        .bind(variant.as_str())
      },
      ImageSlot::Date { date } => {
        sqlx::query_scalar::<_, String>("SELECT image_path FROM actual_schedule_images WHERE date = ? LIMIT 1")
          .bind(date)
      },
      ImageSlot::Week { variant } => {
        sqlx::query_scalar::<_, String>("SELECT image_path FROM week_schedule WHERE week_type = ? LIMIT 1")
          .bind(variant.as_str())
      },
    };
    Ok(query.fetch_optional(&self.pool).await?)
  }

  async fn find_first(&self, chain: Vec<ImageSlot>) -> Result<Option<String>> {
    for slot in chain {
      if let Some(path) = self.find_image(slot).await? {
        return Ok(Some(path));
      }
    }
    Ok(None)
  }

  // lessons

  /// Replaces every lesson of `weekday` with `lessons`.
  #[instrument(skip(self, lessons))]
  pub async fn add_base_schedule(&self, weekday: Weekday, lessons: &[Lesson]) -> Result<()> {
    let mut tx = self.pool.begin().await?;
    sqlx::query("DELETE FROM base_schedule WHERE day_of_week = ?")
      .bind(weekday_index(weekday))
      .execute(&mut *tx)
      .await?;
    for lesson in lessons {
      sqlx::query(
        r#"
        INSERT INTO base_schedule (day_of_week, lesson_number, subject, classroom, time_start, time_end)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
      )
      .bind(weekday_index(weekday))
      .bind(lesson.number)
      .bind(&lesson.subject)
      .bind(&lesson.classroom)
      .bind(&lesson.time_start)
      .bind(&lesson.time_end)
      .execute(&mut *tx)
      .await?;
    }
    tx.commit().await?;
    Ok(())
  }

  /// Adds or replaces a single lesson slot of the base schedule.
  #[instrument(skip(self))]
  pub async fn upsert_base_lesson(&self, weekday: Weekday, lesson: &Lesson) -> Result<()> {
    sqlx::query(
      r#"
      INSERT INTO base_schedule (day_of_week, lesson_number, subject, classroom, time_start, time_end)
      VALUES (?, ?, ?, ?, ?, ?)
      ON CONFLICT (day_of_week, lesson_number) DO UPDATE SET
        subject = excluded.subject,
        classroom = excluded.classroom,
        time_start = excluded.time_start,
        time_end = excluded.time_end
      "#,
    )
    .bind(weekday_index(weekday))
    .bind(lesson.number)
    .bind(&lesson.subject)
    .bind(&lesson.classroom)
    .bind(&lesson.time_start)
    .bind(&lesson.time_end)
    .execute(&self.pool)
    .await?;
    Ok(())
  }

  #[instrument(skip(self))]
  pub async fn get_schedule_for_day(&self, weekday: Weekday) -> Result<Vec<Lesson>> {
    let rows = sqlx::query(
      r#"
      SELECT lesson_number, subject, classroom, time_start, time_end
      FROM base_schedule
      WHERE day_of_week = ?
      ORDER BY lesson_number
      "#,
    )
    .bind(weekday_index(weekday))
    .fetch_all(&self.pool)
    .await?;
    rows.iter().map(lesson_from_row).collect()
  }

  /// Replaces the date override with `lessons`; rows expire after `expires_at` (the date itself by default).
  #[instrument(skip(self, lessons))]
  pub async fn add_actual_schedule(
    &self,
    date: NaiveDate,
    lessons: &[Lesson],
    expires_at: Option<NaiveDate>,
  ) -> Result<()> {
    let mut tx = self.pool.begin().await?;
    sqlx::query("DELETE FROM actual_schedule WHERE date = ?")
      .bind(date)
      .execute(&mut *tx)
      .await?;
    for lesson in lessons {
      sqlx::query(
        r#"
        INSERT INTO actual_schedule
          (date, day_of_week, lesson_number, subject, classroom, time_start, time_end, expires_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
      )
      .bind(date)
      .bind(weekday_index(date.weekday()))
      .bind(lesson.number)
      .bind(&lesson.subject)
      .bind(&lesson.classroom)
      .bind(&lesson.time_start)
      .bind(&lesson.time_end)
      .bind(expires_at.unwrap_or(date))
      .execute(&mut *tx)
      .await?;
    }
    tx.commit().await?;
    Ok(())
  }

  #[instrument(skip(self))]
  pub async fn get_actual_schedule_for_date(&self, date: NaiveDate) -> Result<Vec<Lesson>> {
    let rows = sqlx::query(
      r#"
      SELECT lesson_number, subject, classroom, time_start, time_end
      FROM actual_schedule
      WHERE date = ? AND is_active = 1
      ORDER BY lesson_number
      "#,
    )
    .bind(date)
    .fetch_all(&self.pool)
    .await?;
    rows.iter().map(lesson_from_row).collect()
  }

  /// Lessons for `date`; the flag is `true` when they come from a date override.
  pub async fn schedule_for_date(&self, date: NaiveDate) -> Result<(Vec<Lesson>, bool)> {
    let actual = self.get_actual_schedule_for_date(date).await?;
    if !actual.is_empty() {
      return Ok((actual, true));
    }
    Ok((self.get_schedule_for_day(date.weekday()).await?, false))
  }

  // homework

  #[instrument(skip(self))]
  pub async fn add_homework(
    &self,
    subject: &str,
    task: &str,
    date_assigned: NaiveDate,
    date_due: NaiveDate,
  ) -> Result<i64> {
    let result = sqlx::query("INSERT INTO homework (subject, task, date_assigned, date_due) VALUES (?, ?, ?, ?)")
      .bind(subject)
      .bind(task)
      .bind(date_assigned)
      .bind(date_due)
      .execute(&self.pool)
      .await?;
    Ok(result.last_insert_rowid())
  }

  #[instrument(skip(self))]
  pub async fn get_homework_for_date(&self, date_due: NaiveDate) -> Result<Vec<HomeworkRow>> {
    let rows = sqlx::query(
      r#"
      SELECT id, subject, task, date_assigned, date_due
      FROM homework
      WHERE date_due = ? AND is_active = 1
      ORDER BY subject
      "#,
    )
    .bind(date_due)
    .fetch_all(&self.pool)
    .await?;
    rows.iter().map(homework_from_row).collect()
  }

  #[instrument(skip(self))]
  pub async fn get_latest_homework_by_subject(&self, subject: &str) -> Result<Option<HomeworkRow>> {
    let row = sqlx::query(
      r#"
      SELECT id, subject, task, date_assigned, date_due
      FROM homework
      WHERE LOWER(subject) = LOWER(?) AND is_active = 1
      ORDER BY date_due DESC, id DESC
      LIMIT 1
      "#,
    )
    .bind(subject)
    .fetch_optional(&self.pool)
    .await?;
    row.as_ref().map(homework_from_row).transpose()
  }

  // maintenance

  #[instrument(skip(self))]
  pub async fn add_log(&self, user_id: i64, action: &str) -> Result<()> {
    sqlx::query("INSERT INTO logs (user_id, action) VALUES (?, ?)")
      .bind(user_id)
      .bind(action)
      .execute(&self.pool)
      .await?;
    Ok(())
  }

  /// Drops date overrides that expired before `today`. The caller owns deleting the returned photo files.
  #[instrument(skip(self))]
  pub async fn purge_expired(&self, today: NaiveDate) -> Result<PurgeReport> {
    let mut tx = self.pool.begin().await?;
    let blob_refs =
      sqlx::query_scalar::<_, String>("SELECT image_path FROM actual_schedule_images WHERE expires_at < ?")
        .bind(today)
        .fetch_all(&mut *tx)
        .await?;
    let images = sqlx::query("DELETE FROM actual_schedule_images WHERE expires_at < ?")
      .bind(today)
      .execute(&mut *tx)
      .await?;
    let lessons = sqlx::query("DELETE FROM actual_schedule WHERE expires_at < ?")
      .bind(today)
      .execute(&mut *tx)
      .await?;
    tx.commit().await?;
    Ok(PurgeReport {
      rows: images.rows_affected() + lessons.rows_affected(),
      blob_refs,
    })
  }

  #[cfg(test)]
  pub async fn count_rows(&self, table: &str) -> Result<i64> {
    let count = sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM {table}"))
      .fetch_one(&self.pool)
      .await?;
    Ok(count)
  }
}

fn user_from_row(row: &SqliteRow) -> Result<UserRow> {
  Ok(UserRow {
    user_id: row.try_get("user_id")?,
    username: row.try_get("username")?,
    full_name: row.try_get("full_name")?,
    status: row.try_get::<String, _>("status")?.parse()?,
    registered_at: row.try_get("registered_at")?,
  })
}

fn lesson_from_row(row: &SqliteRow) -> Result<Lesson> {
  Ok(Lesson {
    number: row.try_get("lesson_number")?,
    subject: row.try_get("subject")?,
    classroom: row.try_get("classroom")?,
    time_start: row.try_get("time_start")?,
    time_end: row.try_get("time_end")?,
  })
}

fn homework_from_row(row: &SqliteRow) -> Result<HomeworkRow> {
  Ok(HomeworkRow {
    id: row.try_get("id")?,
    subject: row.try_get("subject")?,
    task: row.try_get("task")?,
    date_assigned: row.try_get("date_assigned")?,
    date_due: row.try_get("date_due")?,
  })
}

#[cfg(test)]
mod tests {
  use chrono::NaiveDate;
  use chrono::Weekday;

  use super::Db;
  use crate::models::ImageSlot;
  use crate::models::Lesson;
use crate::models::PurgeReport;
  use crate::models::UserStatus;
  use crate::models::WeekVariant;
  use crate::util::all_weekdays;

  fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
  }

  fn lesson(number: i64, subject: &str) -> Lesson {
    Lesson {
      number,
      subject: subject.to_string(),
      classroom: "101".to_string(),
      time_start: "9:00".to_string(),
      time_end: "9:45".to_string(),
    }
  }

  #[tokio::test]
  async fn replacing_a_day_image_keeps_one_row() {
    let db = Db::in_memory().await.unwrap();
    for weekday in all_weekdays() {
      for variant in WeekVariant::ALL {
        db.add_schedule_image(weekday, "x.jpg", variant).await.unwrap();
        assert_eq!(
          db.get_schedule_image(weekday, variant).await.unwrap().as_deref(),
          Some("x.jpg")
        );
        db.add_schedule_image(weekday, "y.jpg", variant).await.unwrap();
        assert_eq!(
          db.get_schedule_image(weekday, variant).await.unwrap().as_deref(),
          Some("y.jpg")
        );
      }
    }
    assert_eq!(db.count_rows("schedule_images").await.unwrap(), 21);
  }

  #[tokio::test]
  async fn specific_variant_falls_back_to_all() {
    let db = Db::in_memory().await.unwrap();
    assert_eq!(db.get_schedule_image(Weekday::Mon, WeekVariant::Even).await.unwrap(), None);

    db.add_schedule_image(Weekday::Mon, "all.jpg", WeekVariant::All).await.unwrap();
    assert_eq!(
      db.get_schedule_image(Weekday::Mon, WeekVariant::Even).await.unwrap().as_deref(),
      Some("all.jpg")
    );

    db.add_schedule_image(Weekday::Mon, "even.jpg", WeekVariant::Even).await.unwrap();
    assert_eq!(
      db.get_schedule_image(Weekday::Mon, WeekVariant::Even).await.unwrap().as_deref(),
      Some("even.jpg")
    );
    assert_eq!(
      db.get_schedule_image(Weekday::Mon, WeekVariant::Odd).await.unwrap().as_deref(),
      Some("all.jpg")
    );
  }

  #[tokio::test]
  async fn all_variant_does_not_fall_back_to_specific() {
    let db = Db::in_memory().await.unwrap();
    db.add_week_schedule("odd.jpg", WeekVariant::Odd).await.unwrap();
    let week = |variant| ImageSlot::Week { variant }.lookup_chain();
    assert_eq!(db.find_first(week(WeekVariant::All)).await.unwrap(), None);
    assert_eq!(
      db.find_first(week(WeekVariant::Even)).await.unwrap(),
      None,
      "even must not borrow the odd image"
    );
  }

  #[tokio::test]
  async fn store_image_dispatches_by_slot() {
    let db = Db::in_memory().await.unwrap();
    let day = date(2024, 3, 4);
    db.store_image(ImageSlot::Date { date: day }, "d1.jpg").await.unwrap();
    db.store_image(ImageSlot::Date { date: day }, "d2.jpg").await.unwrap();
    db.store_image(
      ImageSlot::Week {
        variant: WeekVariant::All,
      },
      "w.jpg",
    )
    .await
    .unwrap();

    assert_eq!(db.get_actual_schedule_image(day).await.unwrap().as_deref(), Some("d2.jpg"));
    assert_eq!(db.count_rows("actual_schedule_images").await.unwrap(), 1);
    assert_eq!(
      db.find_first(
        ImageSlot::Week {
          variant: WeekVariant::Odd,
        }
        .lookup_chain()
      )
      .await
      .unwrap()
      .as_deref(),
      Some("w.jpg")
    );
  }

  #[tokio::test]
  async fn registration_is_idempotent_and_starts_pending() {
    let db = Db::in_memory().await.unwrap();
    assert!(!db.user_exists(42).await.unwrap());
    assert!(db.add_user(42, Some("pupil"), "Pupil One").await.unwrap());
    assert!(!db.add_user(42, Some("pupil"), "Pupil One").await.unwrap());
    assert_eq!(db.get_user_status(42).await.unwrap(), Some(UserStatus::Pending));
    assert!(!db.is_user_approved(42).await.unwrap());

    assert!(db.approve_user(42).await.unwrap());
    assert!(db.is_user_approved(42).await.unwrap());
    assert!(!db.approve_user(7).await.unwrap());

    let user = db.get_user(42).await.unwrap().unwrap();
    assert_eq!(user.username.as_deref(), Some("pupil"));
    assert_eq!(user.status, UserStatus::Approved);
    assert_eq!(db.list_users().await.unwrap().len(), 1);
    assert_eq!(db.list_approved_user_ids().await.unwrap(), vec![42]);
  }

  #[tokio::test]
  async fn date_override_wins_over_base_lessons() {
    let db = Db::in_memory().await.unwrap();
    let monday = date(2024, 3, 4);
    db.add_base_schedule(Weekday::Mon, &[lesson(2, "History"), lesson(1, "Math")])
      .await
      .unwrap();

    let (lessons, is_actual) = db.schedule_for_date(monday).await.unwrap();
    assert!(!is_actual);
    assert_eq!(lessons[0].subject, "Math");

    db.add_actual_schedule(monday, &[lesson(1, "Physics")], None).await.unwrap();
    let (lessons, is_actual) = db.schedule_for_date(monday).await.unwrap();
    assert!(is_actual);
    assert_eq!(lessons, vec![lesson(1, "Physics")]);

    let (next_monday, is_actual) = db.schedule_for_date(date(2024, 3, 11)).await.unwrap();
    assert!(!is_actual);
    assert_eq!(next_monday.len(), 2);
  }

  #[tokio::test]
  async fn replacing_lessons_with_nothing_clears_the_day() {
    let db = Db::in_memory().await.unwrap();
    let monday = date(2024, 3, 4);
    db.add_base_schedule(Weekday::Mon, &[lesson(1, "Math")]).await.unwrap();
    db.add_actual_schedule(monday, &[lesson(1, "Physics")], None).await.unwrap();

    db.add_actual_schedule(monday, &[], None).await.unwrap();
    let (lessons, is_actual) = db.schedule_for_date(monday).await.unwrap();
    assert!(!is_actual);
    assert_eq!(lessons, vec![lesson(1, "Math")]);

    db.add_base_schedule(Weekday::Mon, &[]).await.unwrap();
    assert!(db.get_schedule_for_day(Weekday::Mon).await.unwrap().is_empty());
  }

  #[tokio::test]
  async fn upserting_a_lesson_replaces_its_slot() {
    let db = Db::in_memory().await.unwrap();
    db.upsert_base_lesson(Weekday::Fri, &lesson(1, "Math")).await.unwrap();
    db.upsert_base_lesson(Weekday::Fri, &lesson(1, "Art")).await.unwrap();
    db.upsert_base_lesson(Weekday::Fri, &lesson(2, "Music")).await.unwrap();
    let lessons = db.get_schedule_for_day(Weekday::Fri).await.unwrap();
    assert_eq!(lessons, vec![lesson(1, "Art"), lesson(2, "Music")]);
  }

  #[tokio::test]
  async fn homework_queries() {
    let db = Db::in_memory().await.unwrap();
    let assigned = date(2024, 3, 1);
    db.add_homework("Math", "Ex. 1", assigned, date(2024, 3, 4)).await.unwrap();
    db.add_homework("Math", "Ex. 2", assigned, date(2024, 3, 6)).await.unwrap();
    db.add_homework("Art", "Sketch", assigned, date(2024, 3, 4)).await.unwrap();

    let due = db.get_homework_for_date(date(2024, 3, 4)).await.unwrap();
    let subjects: Vec<_> = due.iter().map(|hw| hw.subject.as_str()).collect();
    assert_eq!(subjects, vec!["Art", "Math"]);

    let latest = db.get_latest_homework_by_subject("math").await.unwrap().unwrap();
    assert_eq!(latest.task, "Ex. 2");
    assert!(db.get_latest_homework_by_subject("Biology").await.unwrap().is_none());
  }

  #[tokio::test]
  async fn purge_drops_only_expired_overrides() {
    let db = Db::in_memory().await.unwrap();
    db.add_actual_schedule_image(date(2024, 3, 1), "old.jpg", None).await.unwrap();
    db.add_actual_schedule_image(date(2024, 3, 5), "new.jpg", None).await.unwrap();
    db.add_actual_schedule(date(2024, 3, 1), &[lesson(1, "Math")], None).await.unwrap();

    let purged = db.purge_expired(date(2024, 3, 4)).await.unwrap();
    assert_eq!(purged.rows, 2);
    assert_eq!(purged.blob_refs, vec!["old.jpg".to_string()]);
    assert!(db.get_actual_schedule_image(date(2024, 3, 1)).await.unwrap().is_none());
    assert!(db.get_actual_schedule_image(date(2024, 3, 5)).await.unwrap().is_some());
  }

  #[tokio::test]
  async fn logs_actions() {
    let db = Db::in_memory().await.unwrap();
    db.add_log(1, "start").await.unwrap();
    assert_eq!(db.count_rows("logs").await.unwrap(), 1);
  }
}
