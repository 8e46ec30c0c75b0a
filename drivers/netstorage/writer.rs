//! Staged upload session / 暂存上传会话
//!
//! Bytes land in a temporary file; commit uploads the file as a whole and
//! the temporary file is removed on every terminal path.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use anyhow::Result;
use async_trait::async_trait;
use tempfile::TempPath;
use tokio::io::{AsyncSeekExt, AsyncWrite, AsyncWriteExt};

use super::client::RemoteStore;
use crate::storage::{FileWriter, StorageError};

pub struct StagedWriter {
    remote: Arc<dyn RemoteStore>,
    file: tokio::fs::File,
    /// Removes the temporary file when dropped
    temp_path: TempPath,
    destination: String,
    append: bool,
}

impl StagedWriter {
    /// Open a session staging into `temp_dir`, or the system temp dir when `None`
    pub async fn create(remote: Arc<dyn RemoteStore>, temp_dir: Option<&Path>, destination: &str, append: bool) -> Result<Self> {
        let dir: PathBuf = match temp_dir {
            Some(dir) => dir.to_path_buf(),
            None => std::env::temp_dir(),
        };
        tokio::fs::create_dir_all(&dir).await.map_err(StorageError::LocalIo)?;

        let named = tempfile::Builder::new()
            .prefix("nsd")
            .tempfile_in(&dir)
            .map_err(StorageError::LocalIo)?;
        let (file, temp_path) = named.into_parts();

        tracing::debug!("Staging upload of {} in {:?}", destination, temp_path);

        Ok(Self {
            remote,
            file: tokio::fs::File::from_std(file),
            temp_path,
            destination: destination.to_string(),
            append,
        })
    }

    pub fn temp_path(&self) -> &Path {
        &self.temp_path
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    /// Whether the session was opened in append mode
    pub fn append(&self) -> bool {
        self.append
    }
}

impl AsyncWrite for StagedWriter {
    fn poll_write(mut self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<std::io::Result<usize>> {
        Pin::new(&mut self.file).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.file).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.file).poll_shutdown(cx)
    }
}

#[async_trait]
impl FileWriter for StagedWriter {
    async fn size(&mut self) -> u64 {
        if self.file.flush().await.is_err() {
            return 0;
        }
        self.file.seek(SeekFrom::End(0)).await.unwrap_or(0)
    }

    async fn cancel(self: Box<Self>) -> Result<()> {
        let StagedWriter { file, temp_path, destination, .. } = *self;
        drop(file);
        if let Err(e) = temp_path.close() {
            tracing::warn!("Failed to remove staging file for {}: {}", destination, e);
        }
        tracing::debug!("Upload of {} cancelled", destination);
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let StagedWriter { remote, mut file, temp_path, destination, .. } = *self;

        let prepared = async {
            file.flush().await?;
            file.seek(SeekFrom::Start(0)).await?;
            Ok::<_, std::io::Error>(())
        }
        .await;

        let result = match prepared {
            Ok(()) => remote.write(&destination, Box::new(file)).await,
            Err(e) => Err(StorageError::LocalIo(e).into()),
        };

        if let Err(e) = temp_path.close() {
            tracing::warn!("Failed to remove staging file for {}: {}", destination, e);
        }
        if result.is_ok() {
            tracing::debug!("Upload of {} committed", destination);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::netstorage::types::{DuData, StatData};
    use crate::storage::{BoxReader, UploadSource};
    use parking_lot::Mutex;
    use tokio::io::AsyncReadExt;

    /// Records uploads; every other operation is unused here
    #[derive(Default)]
    struct UploadSink {
        uploads: Mutex<Vec<(String, Vec<u8>)>>,
        fail: bool,
    }

    #[async_trait]
    impl RemoteStore for UploadSink {
        async fn stat(&self, _path: &str) -> Result<StatData> { unimplemented!() }
        async fn dir(&self, _path: &str) -> Result<StatData> { unimplemented!() }
        async fn du(&self, _path: &str) -> Result<DuData> { unimplemented!() }
        async fn read(&self, _path: &str) -> Result<BoxReader> { unimplemented!() }

        async fn write(&self, path: &str, mut source: UploadSource) -> Result<()> {
            if self.fail {
                return Err(StorageError::Status("500 Internal Server Error".to_string()).into());
            }
            let mut body = Vec::new();
            source.read_to_end(&mut body).await?;
            self.uploads.lock().push((path.to_string(), body));
            Ok(())
        }

        async fn mkdir(&self, _path: &str) -> Result<()> { unimplemented!() }
        async fn rmdir(&self, _path: &str) -> Result<()> { unimplemented!() }
        async fn delete(&self, _path: &str) -> Result<()> { unimplemented!() }
        async fn quick_delete(&self, _path: &str) -> Result<()> { unimplemented!() }
        async fn rename(&self, _src: &str, _dst: &str) -> Result<()> { unimplemented!() }
        async fn symlink(&self, _target: &str, _dst: &str) -> Result<()> { unimplemented!() }
        async fn set_mtime(&self, _path: &str, _mtime: i64) -> Result<()> { unimplemented!() }
    }

    #[tokio::test]
    async fn test_commit_uploads_and_cleans_up() {
        let sink = Arc::new(UploadSink::default());
        let dir = tempfile::tempdir().unwrap();
        let mut writer = StagedWriter::create(sink.clone(), Some(dir.path()), "/123/out.bin", false).await.unwrap();
        let staged = writer.temp_path().to_path_buf();
        assert!(staged.starts_with(dir.path()));

        writer.write_all(b"abc").await.unwrap();
        writer.write_all(b"def").await.unwrap();
        assert_eq!(writer.size().await, 6);

        Box::new(writer).commit().await.unwrap();
        assert!(!staged.exists());
        assert_eq!(*sink.uploads.lock(), vec![("/123/out.bin".to_string(), b"abcdef".to_vec())]);
    }

    #[tokio::test]
    async fn test_cancel_discards() {
        let sink = Arc::new(UploadSink::default());
        let dir = tempfile::tempdir().unwrap();
        let mut writer = StagedWriter::create(sink.clone(), Some(dir.path()), "/123/out.bin", false).await.unwrap();
        let staged = writer.temp_path().to_path_buf();
        writer.write_all(b"partial").await.unwrap();

        Box::new(writer).cancel().await.unwrap();
        assert!(!staged.exists());
        assert!(sink.uploads.lock().is_empty());
    }

    #[tokio::test]
    async fn test_failed_upload_still_cleans_up() {
        let sink = Arc::new(UploadSink { fail: true, ..Default::default() });
        let dir = tempfile::tempdir().unwrap();
        let mut writer = StagedWriter::create(sink, Some(dir.path()), "/123/out.bin", false).await.unwrap();
        let staged = writer.temp_path().to_path_buf();
        writer.write_all(b"data").await.unwrap();

        let err = Box::new(writer).commit().await.unwrap_err();
        assert!(matches!(err.downcast_ref::<StorageError>(), Some(StorageError::Status(_))));
        assert!(!staged.exists());
    }

    #[tokio::test]
    async fn test_dropped_session_removes_staging_file() {
        let sink = Arc::new(UploadSink::default());
        let dir = tempfile::tempdir().unwrap();
        let writer = StagedWriter::create(sink.clone(), Some(dir.path()), "/123/out.bin", true).await.unwrap();
        assert!(writer.append());
        let staged = writer.temp_path().to_path_buf();
        drop(writer);
        assert!(!staged.exists());
        assert!(sink.uploads.lock().is_empty());
    }

    #[tokio::test]
    async fn test_creates_missing_temp_dir() {
        let sink = Arc::new(UploadSink::default());
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a/b");
        let writer = StagedWriter::create(sink, Some(&nested), "/123/x", false).await.unwrap();
        assert!(writer.temp_path().starts_with(&nested));
        assert_eq!(writer.destination(), "/123/x");
    }
}
