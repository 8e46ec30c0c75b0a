//! NetStorage object client / NetStorage 对象客户端
//!
//! One signed HTTP exchange per operation. 2xx is success, anything else is
//! a `StorageError::Status` carrying the status line. Nothing is retried.

use std::time::Duration;

use anyhow::{Context as _, Result};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Body, Client, Method, Response, StatusCode};
use tokio_util::io::{ReaderStream, StreamReader};

use super::signer::{Credentials, RequestSigner};
use super::types::{DuData, StatData};
use crate::storage::{BoxReader, StorageError, UploadSource};

/// Object store operations used by the hybrid driver / 远程存储操作
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Stat of a single object
    async fn stat(&self, path: &str) -> Result<StatData>;

    /// Direct children of a directory
    async fn dir(&self, path: &str) -> Result<StatData>;

    /// Disk usage below a directory
    async fn du(&self, path: &str) -> Result<DuData>;

    /// Streamed download of a whole object
    async fn read(&self, path: &str) -> Result<BoxReader>;

    /// Streamed upload replacing the whole object
    async fn write(&self, path: &str, source: UploadSource) -> Result<()>;

    async fn mkdir(&self, path: &str) -> Result<()>;

    async fn rmdir(&self, path: &str) -> Result<()>;

    /// Delete an object or symlink
    async fn delete(&self, path: &str) -> Result<()>;

    /// Recursive delete of a directory tree
    async fn quick_delete(&self, path: &str) -> Result<()>;

    async fn rename(&self, src_path: &str, dst_path: &str) -> Result<()>;

    /// Create `dst_path` as a symlink pointing to `target`
    async fn symlink(&self, target: &str, dst_path: &str) -> Result<()>;

    async fn set_mtime(&self, path: &str, mtime: i64) -> Result<()>;
}

/// Classify a response status
pub fn check_status(status: StatusCode) -> Result<(), StorageError> {
    if status.is_success() {
        Ok(())
    } else {
        Err(StorageError::Status(status.to_string()))
    }
}

/// HTTP client for the NetStorage API
pub struct NetStorageClient {
    signer: RequestSigner,
    client: Client,
}

impl NetStorageClient {
    /// `timeout` bounds every request; `None` leaves requests unbounded
    pub fn new(credentials: Credentials, timeout: Option<Duration>) -> Result<Self> {
        let mut builder = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(4);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().context("创建HTTP客户端失败")?;

        Ok(Self { signer: RequestSigner::new(credentials), client })
    }

    pub fn credentials(&self) -> &Credentials {
        self.signer.credentials()
    }

    async fn submit(&self, action: &str, method: Method, path: &str, body: Option<Body>) -> Result<Response> {
        let request = self.signer.build(action, method, path)?;
        tracing::debug!("NetStorage {} {} ({})", request.method, request.url, action);

        let mut builder = self.client
            .request(request.method, &request.url)
            .headers(request.headers);
        if let Some(body) = body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(StorageError::Transport)?;
        if let Err(e) = check_status(response.status()) {
            tracing::debug!("NetStorage {} {} failed: {}", action, path, e);
            return Err(e.into());
        }
        Ok(response)
    }

    async fn submit_text(&self, action: &str, path: &str) -> Result<String> {
        let response = self.submit(action, Method::GET, path, None).await?;
        Ok(response.text().await.map_err(StorageError::Transport)?)
    }
}

#[async_trait]
impl RemoteStore for NetStorageClient {
    async fn stat(&self, path: &str) -> Result<StatData> {
        let xml = self.submit_text("stat&format=xml", path).await?;
        Ok(StatData::parse(&xml)?)
    }

    async fn dir(&self, path: &str) -> Result<StatData> {
        let xml = self.submit_text("dir&format=xml", path).await?;
        Ok(StatData::parse(&xml)?)
    }

    async fn du(&self, path: &str) -> Result<DuData> {
        let xml = self.submit_text("du&format=xml", path).await?;
        Ok(DuData::parse(&xml)?)
    }

    async fn read(&self, path: &str) -> Result<BoxReader> {
        if path.ends_with('/') {
            return Err(StorageError::InvalidPath(format!("download path must not be a directory: {}", path)).into());
        }

        let response = self.submit("download", Method::GET, path, None).await?;

        // Stream the body back to the caller / 流式返回响应体
        let stream = response
            .bytes_stream()
            .map(|result| result.map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e)));
        Ok(Box::new(StreamReader::new(stream)))
    }

    async fn write(&self, path: &str, source: UploadSource) -> Result<()> {
        let body = Body::wrap_stream(ReaderStream::new(source));
        self.submit("upload", Method::PUT, path, Some(body)).await?;
        Ok(())
    }

    async fn mkdir(&self, path: &str) -> Result<()> {
        self.submit("mkdir", Method::POST, path, None).await?;
        Ok(())
    }

    async fn rmdir(&self, path: &str) -> Result<()> {
        self.submit("rmdir", Method::POST, path, None).await?;
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.submit("delete", Method::POST, path, None).await?;
        Ok(())
    }

    async fn quick_delete(&self, path: &str) -> Result<()> {
        // The confirmation token is required verbatim by the service
        self.submit("quick-delete&quick-delete=imreallyreallysure", Method::POST, path, None).await?;
        Ok(())
    }

    async fn rename(&self, src_path: &str, dst_path: &str) -> Result<()> {
        let action = format!("rename&destination={}", urlencoding::encode(dst_path));
        self.submit(&action, Method::POST, src_path, None).await?;
        Ok(())
    }

    async fn symlink(&self, target: &str, dst_path: &str) -> Result<()> {
        let action = format!("symlink&target={}", urlencoding::encode(target));
        self.submit(&action, Method::POST, dst_path, None).await?;
        Ok(())
    }

    async fn set_mtime(&self, path: &str, mtime: i64) -> Result<()> {
        let action = format!("mtime&format=xml&mtime={}", mtime);
        self.submit(&action, Method::POST, path, None).await?;
        Ok(())
    }
}
