// Driver package / 驱动包
pub mod local;
pub mod netstorage;

use crate::storage::StorageManager;

/// Register all drivers to StorageManager / 注册所有驱动
pub fn register_all(manager: &StorageManager) {
    // Filesystem driver, also the usual local backend of netstorage / 注册本地驱动
    manager.register_factory(Box::new(crate::storage::LocalDriverFactory));
    // Akamai NetStorage driver / 注册NetStorage驱动
    manager.register_factory(Box::new(netstorage::NetStorageDriverFactory::new()));
}
