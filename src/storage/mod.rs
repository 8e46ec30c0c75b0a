use async_trait::async_trait;
use anyhow::Result;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Byte stream returned by `reader` / 读取流
pub type BoxReader = Box<dyn AsyncRead + Unpin + Send>;

/// Byte stream accepted as an upload body (must be `Sync` for reqwest) / 上传数据源
pub type UploadSource = Box<dyn AsyncRead + Unpin + Send + Sync>;

/// Extra options passed to `url_for` / URL解析选项
pub type UrlOptions = HashMap<String, serde_json::Value>;

/// File information / 文件信息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileInfo {
    pub path: String,
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
    pub is_dir: bool,
}

/// Write session returned by `StorageDriver::writer` / 写入会话
///
/// Bytes are written through `AsyncWrite`. A session ends with exactly one
/// of `commit` or `cancel`; both consume it. Dropping a session without
/// either discards what was written.
#[async_trait]
pub trait FileWriter: AsyncWrite + Unpin + Send {
    /// Current number of bytes held by the session / 当前已写入字节数
    async fn size(&mut self) -> u64;

    /// Discard written data / 取消写入
    async fn cancel(self: Box<Self>) -> Result<()>;

    /// Make written data visible at the destination / 提交写入
    async fn commit(self: Box<Self>) -> Result<()>;
}

/// Storage driver interface / 存储驱动接口
#[async_trait]
pub trait StorageDriver: Send + Sync {
    /// Driver name / 驱动名称
    fn name(&self) -> &str;

    /// Read the whole object / 读取完整内容
    async fn get_content(&self, path: &str) -> Result<Bytes> {
        let mut reader = self.reader(path, 0).await?;
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).await?;
        Ok(Bytes::from(buf))
    }

    /// Store the whole object / 写入完整内容
    async fn put_content(&self, path: &str, content: Bytes) -> Result<()> {
        let mut writer = self.writer(path, false).await?;
        if let Err(e) = writer.write_all(&content).await {
            writer.cancel().await?;
            return Err(e.into());
        }
        if let Err(e) = writer.flush().await {
            writer.cancel().await?;
            return Err(e.into());
        }
        writer.commit().await
    }

    /// Open a reader starting at `offset` / 从偏移量开始读取
    async fn reader(&self, path: &str, offset: u64) -> Result<BoxReader>;

    /// Open a write session / 打开写入会话
    async fn writer(&self, path: &str, append: bool) -> Result<Box<dyn FileWriter>>;

    async fn stat(&self, path: &str) -> Result<FileInfo>;

    /// List direct children, as full paths / 列出直接子项
    async fn list(&self, path: &str) -> Result<Vec<String>>;

    /// Move an object, removing the original / 移动
    async fn move_item(&self, src_path: &str, dst_path: &str) -> Result<()>;

    /// Delete an object and everything below it / 递归删除
    async fn delete(&self, path: &str) -> Result<()>;

    /// URL from which the object may be fetched / 获取访问URL
    async fn url_for(&self, path: &str, options: &UrlOptions) -> Result<String>;

    /// Get local filesystem path (only local drivers support) / 获取本地文件系统路径
    fn get_local_path(&self, path: &str) -> Option<PathBuf> {
        let _ = path;
        None
    }
}

pub mod error;
pub mod manager;
pub mod local_factory;

pub use error::StorageError;
pub use manager::{DriverBox, DriverFactory, StorageManager};
pub use local_factory::LocalDriverFactory;
