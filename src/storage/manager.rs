use std::collections::HashMap;
use std::sync::Arc;
use parking_lot::RwLock;
use anyhow::{anyhow, Result};
use serde_json::Value;

use super::StorageDriver;

pub type DriverBox = Arc<Box<dyn StorageDriver>>;

/// Driver factory trait / 驱动工厂 trait
pub trait DriverFactory: Send + Sync {
    /// Driver type name / 驱动类型名称
    fn driver_type(&self) -> &'static str;

    /// Create driver instance from a parameter bag / 根据参数创建驱动实例
    ///
    /// `manager` resolves nested driver configurations (e.g. a local backend).
    fn create_driver(&self, config: Value, manager: &StorageManager) -> Result<Box<dyn StorageDriver>>;
}

/// Storage manager (registry of driver factories) / 存储管理器
#[derive(Clone, Default)]
pub struct StorageManager {
    factories: Arc<RwLock<HashMap<String, Arc<Box<dyn DriverFactory>>>>>,
}

impl StorageManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register driver factory / 注册驱动工厂
    pub fn register_factory(&self, factory: Box<dyn DriverFactory>) {
        let driver_type = factory.driver_type().to_string();
        self.factories.write().insert(driver_type.clone(), Arc::new(factory));
        tracing::info!("Driver factory registered: {}", driver_type);
    }

    /// Create driver instance / 创建驱动实例
    pub fn create_driver(&self, driver_type: &str, config: Value) -> Result<DriverBox> {
        // Release the lock before creating: factories may call back into the manager
        let factory = self.factories.read()
            .get(driver_type)
            .cloned()
            .ok_or_else(|| anyhow!("Driver type not found: {}", driver_type))?;

        match factory.create_driver(config, self) {
            Ok(driver) => {
                tracing::info!("Driver created: {}", driver_type);
                Ok(Arc::new(driver))
            }
            Err(e) => {
                tracing::error!("Driver creation failed: {} - {}", driver_type, e);
                Err(e)
            }
        }
    }

    /// List all available driver types / 列出所有可用的驱动类型
    pub fn list_driver_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.factories.read().keys().cloned().collect();
        types.sort();
        types
    }
}
