use std::future::Future;
use std::path::Path;
use std::path::PathBuf;

use anyhow::Context;
use anyhow::Result;
use teloxide::net::Download;
use teloxide::prelude::*;
use teloxide::types::FileId;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::info;
use tracing::instrument;
use tracing::warn;

use crate::models::ImageSlot;

/// Schedule photos on local disk. Blob references are the file paths.
#[derive(Debug, Clone)]
pub struct PhotoStore {
  root: PathBuf,
}

impl PhotoStore {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }

  pub fn blob_ref(&self, slot: ImageSlot) -> String {
    self.root.join(slot.file_name()).to_string_lossy().into_owned()
  }

  /// A reference whose file is gone counts as not uploaded.
  pub async fn exists(&self, blob_ref: &str) -> bool {
    tokio::fs::try_exists(Path::new(blob_ref)).await.unwrap_or(false)
  }

  /// Downloads a Telegram photo into the file backing `slot`.
  #[instrument(skip(self, bot))]
  pub async fn download(&self, bot: &Bot, file_id: &FileId, slot: ImageSlot) -> Result<String> {
    let file = bot.get_file(file_id.clone()).await?;
    let telegram_path = file.path;
    let blob_ref = self
      .replace_blob(slot, |mut destination| async move {
        bot.download_file(&telegram_path, &mut destination).await?;
        Ok::<_, anyhow::Error>(destination)
      })
      .await?;
    info!(%blob_ref, "downloaded schedule photo");
    Ok(blob_ref)
  }

  /// Writes the blob for `slot` through a sibling `.part` file renamed into
  /// place only after `fill` succeeds. The previous blob survives a failed write.
  pub async fn replace_blob<F, Fut>(&self, slot: ImageSlot, fill: F) -> Result<String>
  where
    F: FnOnce(File) -> Fut,
    Fut: Future<Output = Result<File>>,
  {
    tokio::fs::create_dir_all(&self.root)
      .await
      .with_context(|| format!("failed to create {}", self.root.display()))?;
    let blob_ref = self.blob_ref(slot);
    let tmp_path = format!("{blob_ref}.part");
    let destination = File::create(&tmp_path)
      .await
      .with_context(|| format!("failed to create {tmp_path}"))?;

    let written = async {
      let mut file = fill(destination).await?;
      file.flush().await?;
      Ok::<_, anyhow::Error>(())
    }
    .await;
    if let Err(err) = written {
      tokio::fs::remove_file(&tmp_path).await.ok();
      return Err(err);
    }

    tokio::fs::rename(&tmp_path, &blob_ref)
      .await
      .with_context(|| format!("failed to move {tmp_path} into place"))?;
    Ok(blob_ref)
  }

  /// Deletes a blob; an already missing file is not an error.
  pub async fn remove(&self, blob_ref: &str) -> Result<()> {
    match tokio::fs::remove_file(blob_ref).await {
      Ok(()) => Ok(()),
      Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
      Err(err) => Err(err).with_context(|| format!("failed to remove {blob_ref}")),
    }
  }

  /// Removes every blob, logging the ones that could not be deleted. Returns how many were handled.
  pub async fn remove_all(&self, blob_refs: &[String]) -> usize {
    let mut removed = 0;
    for blob_ref in blob_refs {
      match self.remove(blob_ref).await {
        Ok(()) => removed += 1,
        Err(err) => warn!(%blob_ref, error = %err, "failed to remove schedule photo"),
      }
    }
    removed
  }
}
