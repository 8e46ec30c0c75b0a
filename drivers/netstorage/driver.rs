//! Hybrid NetStorage driver / 混合驱动
//!
//! Every call classifies its path(s) first and then talks either to the
//! local backend or to the object store.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{Map, Value};

use super::client::RemoteStore;
use super::reader::OffsetReader;
use super::types::DuData;
use super::writer::StagedWriter;
use crate::storage::{
    BoxReader, DriverBox, FileInfo, FileWriter, StorageDriver, StorageError, UploadSource, UrlOptions,
};
use crate::utils::join_path;

/// Where a logical path is served from, with its mapped storage name
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placement {
    Local(String),
    Remote(String),
}

/// Path classification, evaluated on every call
pub type Classifier = Arc<dyn Fn(&str) -> Placement + Send + Sync>;

/// URL rewriting for `url_for`
pub type UrlMapper = Arc<dyn Fn(&NetStorageDriver, &str, &UrlOptions) -> Result<String> + Send + Sync>;

/// One construction-time customization step
pub type Customizer = Arc<dyn Fn(NetStorageDriverBuilder) -> NetStorageDriverBuilder + Send + Sync>;

/// Opens write sessions for remote destinations / 远程写入会话工厂
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn open(&self, driver: &NetStorageDriver, path: &str, append: bool) -> Result<Box<dyn FileWriter>>;
}

/// Stages writes in a temporary file under the configured `tmp` directory
pub struct StagedSessionFactory;

#[async_trait]
impl SessionFactory for StagedSessionFactory {
    async fn open(&self, driver: &NetStorageDriver, path: &str, append: bool) -> Result<Box<dyn FileWriter>> {
        let temp_dir = driver.temp_dir();
        let writer = StagedWriter::create(driver.remote().clone(), temp_dir.as_deref(), path, append).await?;
        Ok(Box::new(writer))
    }
}

/// Everything is remote under its own name
pub fn remote_only() -> Classifier {
    Arc::new(|path: &str| Placement::Remote(path.to_string()))
}

pub struct NetStorageDriver {
    remote: Arc<dyn RemoteStore>,
    local: Option<DriverBox>,
    classifier: Classifier,
    url_mapper: Option<UrlMapper>,
    sessions: Arc<dyn SessionFactory>,
    options: Map<String, Value>,
}

impl NetStorageDriver {
    pub fn builder(remote: Arc<dyn RemoteStore>) -> NetStorageDriverBuilder {
        NetStorageDriverBuilder::new(remote)
    }

    pub fn remote(&self) -> &Arc<dyn RemoteStore> {
        &self.remote
    }

    pub fn local(&self) -> Option<&DriverBox> {
        self.local.as_ref()
    }

    /// Parameter bag the driver was built from
    pub fn options(&self) -> &Map<String, Value> {
        &self.options
    }

    /// Staging directory override (`tmp`)
    pub fn temp_dir(&self) -> Option<PathBuf> {
        self.options
            .get("tmp")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
    }

    pub fn classify(&self, path: &str) -> Placement {
        (self.classifier)(path)
    }

    fn local_backend(&self, path: &str) -> Result<&DriverBox> {
        self.local
            .as_ref()
            .ok_or_else(|| StorageError::NoLocalBackend(path.to_string()).into())
    }

    /// Mapped remote name of `path`; remote-only operations reject local paths
    fn remote_name(&self, path: &str, op: &str) -> Result<String> {
        match self.classify(path) {
            Placement::Remote(name) => Ok(name),
            Placement::Local(_) => Err(StorageError::Unsupported(format!("{} on local path {}", op, path)).into()),
        }
    }

    /// Disk usage of a remote directory
    pub async fn du(&self, path: &str) -> Result<DuData> {
        let name = self.remote_name(path, "du")?;
        self.remote.du(&name).await
    }

    pub async fn mkdir(&self, path: &str) -> Result<()> {
        let name = self.remote_name(path, "mkdir")?;
        self.remote.mkdir(&name).await
    }

    pub async fn rmdir(&self, path: &str) -> Result<()> {
        let name = self.remote_name(path, "rmdir")?;
        self.remote.rmdir(&name).await
    }

    /// Create `link` pointing at `target`; both must be remote
    pub async fn symlink(&self, target: &str, link: &str) -> Result<()> {
        let target = self.remote_name(target, "symlink")?;
        let link = self.remote_name(link, "symlink")?;
        self.remote.symlink(&target, &link).await
    }

    pub async fn set_mtime(&self, path: &str, mtime: i64) -> Result<()> {
        let name = self.remote_name(path, "mtime")?;
        self.remote.set_mtime(&name, mtime).await
    }

    /// Copy a local object to the object store, then remove the local source
    async fn upload_local(&self, local: &DriverBox, src: &str, dst: &str) -> Result<()> {
        match local.get_local_path(src) {
            Some(file_path) => {
                let file = tokio::fs::File::open(&file_path).await.map_err(StorageError::LocalIo)?;
                let source: UploadSource = Box::new(file);
                self.remote.write(dst, source).await?;
            }
            None => {
                // Backend without a filesystem path: stage through a temp file
                let mut reader = local.reader(src, 0).await?;
                let mut staged = StagedWriter::create(self.remote.clone(), self.temp_dir().as_deref(), dst, false).await?;
                if let Err(e) = tokio::io::copy(&mut reader, &mut staged).await {
                    Box::new(staged).cancel().await?;
                    return Err(StorageError::LocalIo(e).into());
                }
                Box::new(staged).commit().await?;
            }
        }
        local.delete(src).await
    }
}

#[async_trait]
impl StorageDriver for NetStorageDriver {
    fn name(&self) -> &str {
        "netstorage"
    }

    async fn reader(&self, path: &str, offset: u64) -> Result<BoxReader> {
        match self.classify(path) {
            Placement::Local(name) => self.local_backend(path)?.reader(&name, offset).await,
            Placement::Remote(name) => {
                let body = self.remote.read(&name).await?;
                if offset == 0 {
                    Ok(body)
                } else {
                    Ok(Box::new(OffsetReader::new(body, offset)))
                }
            }
        }
    }

    async fn writer(&self, path: &str, append: bool) -> Result<Box<dyn FileWriter>> {
        match self.classify(path) {
            Placement::Local(name) => self.local_backend(path)?.writer(&name, append).await,
            Placement::Remote(name) => self.sessions.open(self, &name, append).await,
        }
    }

    async fn stat(&self, path: &str) -> Result<FileInfo> {
        match self.classify(path) {
            Placement::Local(name) => self.local_backend(path)?.stat(&name).await,
            Placement::Remote(name) => {
                let stat = self.remote.stat(&name).await?;
                let entry = stat.files.first().ok_or_else(|| {
                    StorageError::Parse(quick_xml::DeError::Custom(format!("no entry in stat response for {}", name)))
                })?;
                Ok(FileInfo {
                    path: path.to_string(),
                    size: entry.file_size(),
                    modified: entry.modified(),
                    is_dir: !entry.is_file(),
                })
            }
        }
    }

    async fn list(&self, path: &str) -> Result<Vec<String>> {
        match self.classify(path) {
            Placement::Local(name) => self.local_backend(path)?.list(&name).await,
            Placement::Remote(name) => {
                let listing = self.remote.dir(&name).await?;
                Ok(listing.files.iter().map(|entry| join_path(path, &entry.name)).collect())
            }
        }
    }

    async fn move_item(&self, src_path: &str, dst_path: &str) -> Result<()> {
        match (self.classify(src_path), self.classify(dst_path)) {
            (Placement::Local(src), Placement::Local(dst)) => {
                self.local_backend(src_path)?.move_item(&src, &dst).await
            }
            (Placement::Local(src), Placement::Remote(dst)) => {
                tracing::debug!("Moving local {} to remote {}", src, dst);
                let local = self.local_backend(src_path)?;
                self.upload_local(local, &src, &dst).await
            }
            (Placement::Remote(_), Placement::Local(_)) => {
                Err(StorageError::UnsupportedMove(src_path.to_string()).into())
            }
            (Placement::Remote(src), Placement::Remote(dst)) => self.remote.rename(&src, &dst).await,
        }
    }

    async fn delete(&self, path: &str) -> Result<()> {
        match self.classify(path) {
            Placement::Local(name) => self.local_backend(path)?.delete(&name).await,
            Placement::Remote(name) => self.remote.quick_delete(&name).await,
        }
    }

    async fn url_for(&self, path: &str, options: &UrlOptions) -> Result<String> {
        if let Some(mapper) = &self.url_mapper {
            return mapper(self, path, options);
        }
        // Without a mapper the local backend resolves the logical path
        self.local_backend(path)?.url_for(path, options).await
    }

    fn get_local_path(&self, path: &str) -> Option<PathBuf> {
        match self.classify(path) {
            Placement::Local(name) => self.local.as_ref()?.get_local_path(&name),
            Placement::Remote(_) => None,
        }
    }
}

/// Assembles a driver once, before it is handed out / 驱动构造器
pub struct NetStorageDriverBuilder {
    remote: Arc<dyn RemoteStore>,
    local: Option<DriverBox>,
    classifier: Classifier,
    url_mapper: Option<UrlMapper>,
    sessions: Arc<dyn SessionFactory>,
    options: Map<String, Value>,
}

impl NetStorageDriverBuilder {
    pub fn new(remote: Arc<dyn RemoteStore>) -> Self {
        Self {
            remote,
            local: None,
            classifier: remote_only(),
            url_mapper: None,
            sessions: Arc::new(StagedSessionFactory),
            options: Map::new(),
        }
    }

    pub fn local(mut self, local: DriverBox) -> Self {
        self.local = Some(local);
        self
    }

    pub fn classifier<F>(mut self, classifier: F) -> Self
    where
        F: Fn(&str) -> Placement + Send + Sync + 'static,
    {
        self.classifier = Arc::new(classifier);
        self
    }

    pub fn url_mapper<F>(mut self, mapper: F) -> Self
    where
        F: Fn(&NetStorageDriver, &str, &UrlOptions) -> Result<String> + Send + Sync + 'static,
    {
        self.url_mapper = Some(Arc::new(mapper));
        self
    }

    pub fn session_factory(mut self, sessions: Arc<dyn SessionFactory>) -> Self {
        self.sessions = sessions;
        self
    }

    pub fn options(mut self, options: Map<String, Value>) -> Self {
        self.options = options;
        self
    }

    pub fn temp_dir(mut self, dir: impl Into<String>) -> Self {
        self.options.insert("tmp".to_string(), Value::String(dir.into()));
        self
    }

    /// Apply customization steps in order
    pub fn customize(self, steps: &[Customizer]) -> Self {
        steps.iter().fold(self, |builder, step| step(builder))
    }

    pub fn build(self) -> NetStorageDriver {
        NetStorageDriver {
            remote: self.remote,
            local: self.local,
            classifier: self.classifier,
            url_mapper: self.url_mapper,
            sessions: self.sessions,
            options: self.options,
        }
    }
}
