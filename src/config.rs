//! Application configuration module / 应用配置模块
//!
//! Loaded from config.json; a default file is written on first run.
//! 首次运行时创建默认配置文件

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};

/// Application configuration / 应用配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Log filter used when RUST_LOG is unset / 日志级别
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Driver configuration / 驱动配置
    pub driver: DriverSection,
    /// Logical paths below this prefix are served by the local driver / 本地路径前缀
    #[serde(default)]
    pub local_prefix: Option<String>,
    /// Public base URL of remote objects, used by `url` / 远程对象公开访问地址
    #[serde(default)]
    pub public_base_url: Option<String>,
}

/// Driver type and its parameter bag / 驱动类型及参数
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverSection {
    #[serde(rename = "type")]
    pub driver_type: String,
    #[serde(default)]
    pub config: Value,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            driver: DriverSection::default(),
            local_prefix: None,
            public_base_url: None,
        }
    }
}

impl Default for DriverSection {
    fn default() -> Self {
        Self {
            driver_type: "netstorage".to_string(),
            config: json!({
                "hostname": "",
                "keyname": "",
                "key": "",
                "ssl": true
            }),
        }
    }
}

/// Default config file path / 获取默认配置文件路径
pub fn default_config_path() -> PathBuf {
    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join("config.json")
}

/// Load configuration from file, or create default if not exists / 加载配置文件，不存在则创建默认配置
pub fn load_config(config_path: &Path) -> Result<AppConfig, String> {
    if config_path.exists() {
        let content = std::fs::read_to_string(config_path)
            .map_err(|e| format!("Failed to read config file: {}", e))?;

        let config: AppConfig = serde_json::from_str(&content)
            .map_err(|e| format!("Failed to parse config file: {}", e))?;

        tracing::info!("Loaded configuration from {:?}", config_path);
        Ok(config)
    } else {
        let config = AppConfig::default();
        save_config(config_path, &config)?;
        tracing::info!("Created default configuration at {:?}", config_path);
        Ok(config)
    }
}

/// Save configuration to file / 保存配置到文件
pub fn save_config(config_path: &Path, config: &AppConfig) -> Result<(), String> {
    let content = serde_json::to_string_pretty(config)
        .map_err(|e| format!("Failed to serialize config: {}", e))?;

    std::fs::write(config_path, content)
        .map_err(|e| format!("Failed to write config file: {}", e))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_created() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let config = load_config(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.log_level, "info");
        assert_eq!(config.driver.driver_type, "netstorage");
        assert_eq!(config.driver.config["ssl"], Value::Bool(true));
    }

    #[test]
    fn test_load_existing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{
            "driver": {
                "type": "netstorage",
                "config": { "hostname": "h", "keyname": "kn", "key": "k", "ssl": "false" }
            },
            "local_prefix": "/cache"
        }"#).unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.log_level, "info");
        assert_eq!(config.local_prefix.as_deref(), Some("/cache"));
        assert!(config.public_base_url.is_none());
        assert_eq!(config.driver.config["hostname"], "h");
    }

    #[test]
    fn test_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(load_config(&path).unwrap_err().starts_with("Failed to parse config file"));
    }
}
