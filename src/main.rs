mod app;
mod bot;
mod config;
mod db;
mod liveness;
mod models;
mod photos;
mod telemetry;
mod util;

use anyhow::Result;
use teloxide::prelude::Bot;
use tracing::error;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
  dotenvy::dotenv().ok();
  telemetry::init()?;
  let config = config::Config::from_env()?;
  let admin_count = config.admins.len();
  info!(admin_count = admin_count, port = config.port, "starting bot");

  let db = db::Db::connect(&config.database_url).await?;
  let photos = photos::PhotoStore::new(config.schedule_dir.clone());
  let purged = db.purge_expired(util::today()).await?;
  let files = photos.remove_all(&purged.blob_refs).await;
  info!(rows = purged.rows, files, "removed expired date overrides");

  let port = config.port;
  tokio::spawn(async move {
    if let Err(err) = liveness::serve(port).await {
      error!(error = %err, "liveness endpoint stopped");
    }
  });

  let context = bot::AppContext::new(db, config.admins.clone(), photos);
  let bot = Bot::new(config.bot_token.clone());
  app::App::new(bot, context).run().await
}
