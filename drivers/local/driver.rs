use async_trait::async_trait;
use anyhow::Result;
use std::io::SeekFrom;
use std::path::PathBuf;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncSeekExt, AsyncWrite, AsyncWriteExt};

use crate::storage::{BoxReader, FileInfo, FileWriter, StorageDriver, StorageError, UrlOptions};

/// Root used when the filesystem driver is configured without options
pub const DEFAULT_ROOT: &str = "/var/lib/nsdriver";

pub struct LocalDriver {
    root: PathBuf,
}

impl LocalDriver {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Get root directory / 获取根目录
    pub fn root(&self) -> &PathBuf {
        &self.root
    }

    /// Normalize path to prevent directory traversal attacks / 规范化路径
    fn normalize_path(&self, path: &str) -> Result<PathBuf> {
        let path = path.trim_start_matches('/').replace('\\', "/");

        let normalized: Vec<&str> = path.split('/').filter(|s| !s.is_empty() && *s != ".").collect();
        for component in &normalized {
            if *component == ".." {
                return Err(StorageError::InvalidPath(format!("{} escapes the storage root", path)).into());
            }
        }

        Ok(self.root.join(normalized.join("/")))
    }
}

#[async_trait]
impl StorageDriver for LocalDriver {
    fn name(&self) -> &str {
        "filesystem"
    }

    async fn reader(&self, path: &str, offset: u64) -> Result<BoxReader> {
        let full_path = self.normalize_path(path)?;
        let mut file = tokio::fs::File::open(&full_path).await?;
        if offset > 0 {
            file.seek(SeekFrom::Start(offset)).await?;
        }
        Ok(Box::new(file))
    }

    async fn writer(&self, path: &str, append: bool) -> Result<Box<dyn FileWriter>> {
        let full_path = self.normalize_path(path)?;

        // Ensure parent directory exists / 确保父目录存在
        if let Some(parent) = full_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let file = tokio::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .append(append)
            .truncate(!append)
            .open(&full_path)
            .await?;

        Ok(Box::new(LocalFileWriter { path: full_path, file }))
    }

    async fn stat(&self, path: &str) -> Result<FileInfo> {
        let full_path = self.normalize_path(path)?;
        let metadata = tokio::fs::metadata(&full_path).await?;
        let is_dir = metadata.is_dir();

        Ok(FileInfo {
            path: path.to_string(),
            size: if is_dir { 0 } else { metadata.len() },
            modified: metadata.modified().ok().map(Into::into),
            is_dir,
        })
    }

    async fn list(&self, path: &str) -> Result<Vec<String>> {
        let full_path = self.normalize_path(path)?;
        let mut entries = tokio::fs::read_dir(full_path).await?;
        let mut result = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            result.push(format!(
                "{}/{}",
                path.trim_end_matches('/'),
                entry.file_name().to_string_lossy()
            ));
        }

        result.sort();
        Ok(result)
    }

    async fn move_item(&self, src_path: &str, dst_path: &str) -> Result<()> {
        let src_full = self.normalize_path(src_path)?;
        let dst_full = self.normalize_path(dst_path)?;

        // Ensure target directory exists / 确保目标目录存在
        if let Some(parent) = dst_full.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        tokio::fs::rename(src_full, dst_full).await?;
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let full_path = self.normalize_path(path)?;

        if full_path.is_dir() {
            tokio::fs::remove_dir_all(full_path).await?;
        } else {
            tokio::fs::remove_file(full_path).await?;
        }

        Ok(())
    }

    async fn url_for(&self, path: &str, _options: &UrlOptions) -> Result<String> {
        Err(StorageError::Unsupported(format!("url_for {} on filesystem driver", path)).into())
    }

    fn get_local_path(&self, path: &str) -> Option<PathBuf> {
        self.normalize_path(path).ok()
    }
}

/// Writes straight into the destination file / 直接写入目标文件
struct LocalFileWriter {
    path: PathBuf,
    file: tokio::fs::File,
}

impl AsyncWrite for LocalFileWriter {
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
impl FileWriter for LocalFileWriter {
    async fn size(&mut self) -> u64 {
        if self.file.flush().await.is_err() {
            return 0;
        }
        self.file.seek(SeekFrom::End(0)).await.unwrap_or(0)
    }

    async fn cancel(mut self: Box<Self>) -> Result<()> {
        let _ = self.file.flush().await;
        let path = self.path.clone();
        drop(self);
        if let Err(e) = tokio::fs::remove_file(&path).await {
            tracing::warn!("Failed to remove cancelled file {:?}: {}", path, e);
        }
        Ok(())
    }

    async fn commit(mut self: Box<Self>) -> Result<()> {
        self.file.flush().await?;
        self.file.sync_all().await?;
        Ok(())
    }
}
