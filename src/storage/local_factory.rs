use anyhow::Result;
use serde_json::Value;
use std::path::PathBuf;

use super::{DriverFactory, StorageDriver, StorageManager};
use crate::drivers::local;

/// Filesystem driver factory / 本地文件系统驱动工厂
pub struct LocalDriverFactory;

impl DriverFactory for LocalDriverFactory {
    fn driver_type(&self) -> &'static str {
        "filesystem"
    }

    fn create_driver(&self, config: Value, _manager: &StorageManager) -> Result<Box<dyn StorageDriver>> {
        // A missing options block means "use the default root"
        let root_path = config.get("rootdirectory")
            .and_then(|v| v.as_str())
            .unwrap_or(local::DEFAULT_ROOT);

        let root = PathBuf::from(root_path);
        if !root.exists() {
            std::fs::create_dir_all(&root)?;
        }
        let canonical_root = root.canonicalize()?;

        tracing::info!("Local driver initialized, root: {:?}", canonical_root);

        Ok(Box::new(local::LocalDriver::new(canonical_root)))
    }
}
