pub mod config;
pub mod utils;
pub mod storage;

// Driver modules (point to project root drivers via path attribute) / 驱动模块
#[path = "../drivers/mod.rs"]
pub mod drivers;

/// Register all storage drivers / 注册所有存储驱动
pub fn register_storage_drivers(manager: &storage::StorageManager) {
    drivers::register_all(manager)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registered_driver_types() {
        let manager = storage::StorageManager::new();
        register_storage_drivers(&manager);
        assert_eq!(manager.list_driver_types(), vec!["filesystem".to_string(), "netstorage".to_string()]);
    }
}
