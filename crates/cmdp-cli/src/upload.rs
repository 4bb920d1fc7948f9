//! Chunked resumable upload
//!
//! A file is split into fixed-size chunks that are written to a scoped
//! temporary directory and sent one at a time, in order, as parts of a single
//! resumable transfer. The temporary directory is removed when the upload
//! returns, whether it succeeded or not.

use crate::api::{ChunkUpload, PublishingApi};
use crate::auth::Token;
use crate::error::{CmdError, Result};
use crate::events::{Observer, PublishEvent};
use chrono::Local;
use cmdp_common::chunking::{file_name_of, transfer_identifier, ChunkPlan, DEFAULT_CHUNK_SIZE};
use cmdp_common::types::StorageLocator;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, info, instrument};

/// Name prefix of the temporary chunk directory
const STAGING_PREFIX: &str = "cmdp-chunks-";

/// Uploads files to the staging bucket
#[derive(Clone)]
pub struct ChunkedUploader {
    api: Arc<dyn PublishingApi>,
    bucket_url: String,
    chunk_size: u64,
    /// Parent of the per-upload chunk directory; the system temp dir if unset
    staging_root: Option<PathBuf>,
}

impl ChunkedUploader {
    pub fn new(api: Arc<dyn PublishingApi>, bucket_url: impl Into<String>) -> Self {
        Self {
            api,
            bucket_url: bucket_url.into(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            staging_root: None,
        }
    }

    /// Override the chunk size (tests use small chunks)
    pub fn with_chunk_size(mut self, chunk_size: u64) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_staging_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.staging_root = Some(root.into());
        self
    }

    /// Upload `path` and return the locator of the finished transfer.
    #[instrument(skip(self, token, observer), fields(path = %path.display()))]
    pub async fn upload(
        &self,
        token: &Token,
        path: &Path,
        observer: &dyn Observer,
    ) -> Result<StorageLocator> {
        if !path.is_file() {
            return Err(CmdError::FileNotFound(path.display().to_string()));
        }

        let file_name = file_name_of(path)?;
        let plan = ChunkPlan::for_file(path, self.chunk_size)?;
        if plan.total_size() == 0 {
            return Err(CmdError::precondition(format!(
                "{} is empty; nothing to upload",
                path.display()
            )));
        }

        let transfer_id = transfer_identifier(&Local::now(), &file_name);
        observer.emit(PublishEvent::UploadStarted {
            file_name: file_name.clone(),
            transfer_id: transfer_id.clone(),
            total_bytes: plan.total_size(),
            chunks: plan.chunk_count(),
        });

        let mut builder = tempfile::Builder::new();
        builder.prefix(STAGING_PREFIX);
        let staging = match &self.staging_root {
            Some(root) => builder.tempdir_in(root)?,
            None => builder.tempdir()?,
        };
        let chunk_files = write_chunks(path, &plan, staging.path()).await?;
        debug!(chunks = chunk_files.len(), dir = %staging.path().display(), "Chunks staged");

        for (span, chunk_file) in plan.spans().zip(&chunk_files) {
            let content = tokio::fs::read(chunk_file).await?;
            let chunk = ChunkUpload {
                identifier: transfer_id.clone(),
                file_name: file_name.clone(),
                number: span.number,
                total_chunks: plan.chunk_count(),
                size: span.size,
                total_size: plan.total_size(),
            };

            // A rejected chunk aborts the transfer; `staging` is dropped on return
            self.api.upload_chunk(token, &chunk, content).await?;

            observer.emit(PublishEvent::ChunkUploaded {
                number: span.number,
                total: plan.chunk_count(),
                bytes: span.size,
            });
        }

        staging.close()?;

        let locator = StorageLocator::from_transfer(&self.bucket_url, &transfer_id);
        info!(locator = %locator, "Upload complete");
        observer.emit(PublishEvent::UploadCompleted {
            locator: locator.clone(),
        });

        Ok(locator)
    }
}

/// Split `source` into one file per chunk inside `dir`.
async fn write_chunks(source: &Path, plan: &ChunkPlan, dir: &Path) -> Result<Vec<PathBuf>> {
    let mut reader = tokio::fs::File::open(source).await?;
    let mut buffer = vec![0u8; plan.chunk_size() as usize];
    let mut files = Vec::with_capacity(plan.chunk_count() as usize);

    for span in plan.spans() {
        let chunk = &mut buffer[..span.size as usize];
        reader.read_exact(chunk).await?;

        let chunk_path = dir.join(format!("temp-file-part-{}", span.number));
        let mut writer = tokio::fs::File::create(&chunk_path).await?;
        writer.write_all(chunk).await?;
        writer.flush().await?;

        files.push(chunk_path);
    }

    Ok(files)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::events::RecordingObserver;
    use crate::testing::{token, FakeApi};

    fn uploader(api: &Arc<FakeApi>) -> ChunkedUploader {
        ChunkedUploader::new(api.clone(), "https://bucket/").with_chunk_size(5)
    }

    fn staged_dirs(root: &Path) -> usize {
        std::fs::read_dir(root)
            .unwrap()
            .filter_map(|entry| entry.ok())
            .filter(|entry| {
                entry
                    .file_name()
                    .to_string_lossy()
                    .starts_with(STAGING_PREFIX)
            })
            .count()
    }

    fn source(dir: &tempfile::TempDir, content: &[u8]) -> PathBuf {
        let path = dir.path().join("data.csv");
        std::fs::write(&path, content).unwrap();
        path
    }

    #[tokio::test]
    async fn test_write_chunks_splits_file() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("data.csv");
        std::fs::write(&source, b"0123456789abc").unwrap();

        let plan = ChunkPlan::new(13, 5).unwrap();
        let staging = tempfile::tempdir().unwrap();
        let files = write_chunks(&source, &plan, staging.path()).await.unwrap();

        assert_eq!(files.len(), 3);
        assert_eq!(std::fs::read(&files[0]).unwrap(), b"01234");
        assert_eq!(std::fs::read(&files[1]).unwrap(), b"56789");
        assert_eq!(std::fs::read(&files[2]).unwrap(), b"abc");
    }

    #[tokio::test]
    async fn test_upload_sends_chunks_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = source(&dir, b"0123456789abc");
        let api = Arc::new(FakeApi::new());
        let observer = RecordingObserver::new();

        let locator = uploader(&api).upload(&token(), &path, &observer).await.unwrap();

        assert_eq!(
            api.calls(),
            vec![
                "upload_chunk:data.csv:1/3",
                "upload_chunk:data.csv:2/3",
                "upload_chunk:data.csv:3/3",
            ]
        );
        assert!(locator.as_str().starts_with("https://bucket/"));
        assert!(locator.as_str().ends_with("-datacsv"));

        let chunk_bytes: Vec<u64> = observer
            .events()
            .into_iter()
            .filter_map(|(_, event)| match event {
                PublishEvent::ChunkUploaded { bytes, .. } => Some(bytes),
                _ => None,
            })
            .collect();
        assert_eq!(chunk_bytes, vec![5, 5, 3]);
    }

    #[tokio::test]
    async fn test_rejected_chunk_aborts_upload() {
        let dir = tempfile::tempdir().unwrap();
        let path = source(&dir, b"0123456789abc");
        let api = Arc::new(FakeApi::new().failing_on("upload_chunk:data.csv:2/3"));
        let observer = RecordingObserver::new();

        let err = uploader(&api)
            .upload(&token(), &path, &observer)
            .await
            .unwrap_err();

        assert!(matches!(err, CmdError::Transport { status: 500, .. }));
        assert_eq!(api.calls().len(), 2);
        assert!(!observer
            .events()
            .iter()
            .any(|(_, event)| matches!(event, PublishEvent::UploadCompleted { .. })));
    }

    #[tokio::test]
    async fn test_empty_file_is_rejected_before_any_request() {
        let dir = tempfile::tempdir().unwrap();
        let path = source(&dir, b"");
        let api = Arc::new(FakeApi::new());

        let err = uploader(&api)
            .upload(&token(), &path, &RecordingObserver::new())
            .await
            .unwrap_err();

        assert!(matches!(err, CmdError::PreconditionFailed(_)));
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_missing_file() {
        let api = Arc::new(FakeApi::new());
        let err = uploader(&api)
            .upload(&token(), Path::new("/no/such/data.csv"), &RecordingObserver::new())
            .await
            .unwrap_err();

        assert!(matches!(err, CmdError::FileNotFound(_)));
    }

    #[tokio::test]
    async fn test_chunk_files_removed_after_success_and_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = source(&dir, b"0123456789abc");
        let staging_root = tempfile::tempdir().unwrap();

        let api = Arc::new(FakeApi::new());
        uploader(&api)
            .with_staging_root(staging_root.path())
            .upload(&token(), &path, &RecordingObserver::new())
            .await
            .unwrap();
        assert_eq!(staged_dirs(staging_root.path()), 0);

        let failing = Arc::new(FakeApi::new().failing_on("upload_chunk:data.csv:2/3"));
        let err = uploader(&failing)
            .with_staging_root(staging_root.path())
            .upload(&token(), &path, &RecordingObserver::new())
            .await
            .unwrap_err();
        assert!(matches!(err, CmdError::Transport { .. }));
        assert_eq!(staged_dirs(staging_root.path()), 0);
        assert_eq!(std::fs::read_dir(staging_root.path()).unwrap().count(), 0);
    }
}
