//! Akamai NetStorage 驱动
//!
//! Signed HTTP client for the NetStorage object store, combined with an
//! optional local backend chosen per path.

pub mod client;
pub mod driver;
pub mod reader;
pub mod signer;
pub mod types;
pub mod writer;

pub use client::{check_status, NetStorageClient, RemoteStore};
pub use driver::{
    remote_only, Classifier, Customizer, NetStorageDriver, NetStorageDriverBuilder, Placement,
    SessionFactory, StagedSessionFactory, UrlMapper,
};
pub use signer::{Credentials, RequestSigner, SignedRequest};
pub use types::{DuData, EntryKind, StatData, StatEntry};

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::storage::{DriverFactory, StorageDriver, StorageError, StorageManager};

/// Driver parameters / 驱动参数
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NetStorageConfig {
    #[serde(default, deserialize_with = "scalar_string")]
    pub hostname: String,
    #[serde(default, deserialize_with = "scalar_string")]
    pub keyname: String,
    #[serde(default, deserialize_with = "scalar_string")]
    pub key: String,
    /// Boolean or boolean string
    #[serde(default)]
    pub ssl: Option<Value>,
    /// Staging directory for uploads
    #[serde(default)]
    pub tmp: Option<String>,
    /// HTTP timeout in seconds
    #[serde(default)]
    pub timeout: Option<u64>,
    /// `{driverName: options}`
    #[serde(default, rename = "localDriver")]
    pub local_driver: Option<Value>,
}

impl NetStorageConfig {
    pub fn secure(&self) -> Result<bool> {
        match &self.ssl {
            None | Some(Value::Null) => Ok(false),
            Some(Value::Bool(b)) => Ok(*b),
            Some(Value::String(s)) => parse_bool(s)
                .ok_or_else(|| StorageError::Config(format!("invalid ssl value {}", s)).into()),
            Some(other) => Err(StorageError::Config(format!("invalid ssl value {}", other)).into()),
        }
    }

    /// Name and options of the nested local driver, if one is configured
    pub fn local_driver_entry(&self) -> Result<Option<(String, Value)>> {
        let block = match &self.local_driver {
            None | Some(Value::Null) => return Ok(None),
            Some(Value::Object(block)) => block,
            Some(_) => return Err(StorageError::Config("localDriver must be an object".to_string()).into()),
        };

        let mut entries = block.iter();
        match (entries.next(), entries.next()) {
            (Some((name, options)), None) => match options {
                Value::Null | Value::Object(_) => Ok(Some((name.clone(), options.clone()))),
                _ => Err(StorageError::Config(format!("invalid options for local driver {}", name)).into()),
            },
            _ => Err(StorageError::Config("there can be only one local driver".to_string()).into()),
        }
    }

    /// Remote client for these credentials
    pub fn client(&self) -> Result<NetStorageClient> {
        let credentials = Credentials::new(self.hostname.clone(), self.keyname.clone(), self.key.clone(), self.secure()?)?;
        NetStorageClient::new(credentials, self.timeout.map(Duration::from_secs))
    }
}

/// Credential fields may be given as strings, numbers or booleans
fn scalar_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(String::new()),
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(serde::de::Error::custom(format!("expected a scalar, got {}", other))),
    }
}

/// Boolean spellings accepted for `ssl`
pub fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}

/// NetStorage driver factory / NetStorage 驱动工厂
#[derive(Default)]
pub struct NetStorageDriverFactory {
    customizers: Vec<Customizer>,
}

impl NetStorageDriverFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a customization step, applied after the ones already added
    pub fn with_customizer<F>(mut self, step: F) -> Self
    where
        F: Fn(NetStorageDriverBuilder) -> NetStorageDriverBuilder + Send + Sync + 'static,
    {
        self.customizers.push(Arc::new(step));
        self
    }

    pub fn build_driver(&self, config: Value, manager: &StorageManager) -> Result<NetStorageDriver> {
        let options = match config {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            _ => return Err(StorageError::Config("driver parameters must be an object".to_string()).into()),
        };

        let parsed: NetStorageConfig = serde_json::from_value(Value::Object(options.clone()))
            .map_err(|e| StorageError::Config(format!("配置解析失败: {}", e)))?;

        let client = parsed.client()?;
        let hostname = client.credentials().hostname().to_string();
        let mut builder = NetStorageDriver::builder(Arc::new(client)).options(options);

        if let Some((name, local_options)) = parsed.local_driver_entry()? {
            builder = builder.local(manager.create_driver(&name, local_options)?);
        }

        let driver = builder.customize(&self.customizers).build();
        tracing::info!("NetStorage driver initialized, host: {}, local backend: {}", hostname, driver.local().is_some());
        Ok(driver)
    }
}

impl DriverFactory for NetStorageDriverFactory {
    fn driver_type(&self) -> &'static str {
        "netstorage"
    }

    fn create_driver(&self, config: Value, manager: &StorageManager) -> Result<Box<dyn StorageDriver>> {
        Ok(Box::new(self.build_driver(config, manager)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::LocalDriverFactory;
    use serde_json::json;

    fn config_error(err: anyhow::Error) -> String {
        match err.downcast_ref::<StorageError>() {
            Some(StorageError::Config(msg)) => msg.clone(),
            other => panic!("expected configuration error, got {:?}", other),
        }
    }

    #[test]
    fn test_create() {
        let config: NetStorageConfig = serde_json::from_value(json!({
            "hostname": "host", "keyname": "kn", "key": "k", "ssl": true
        }))
        .unwrap();
        let client = config.client().unwrap();
        assert_eq!(client.credentials().hostname(), "host");
        assert_eq!(client.credentials().keyname(), "kn");
        assert_eq!(client.credentials().scheme(), "https");

        let driver = NetStorageDriverFactory::new()
            .build_driver(json!({ "hostname": "host", "keyname": "kn", "key": "k", "ssl": true }), &StorageManager::new())
            .unwrap();
        assert_eq!(driver.name(), "netstorage");
        assert!(driver.local().is_none());
        assert_eq!(driver.classify("/a"), Placement::Remote("/a".to_string()));
    }

    #[test]
    fn test_missing_credentials() {
        let factory = NetStorageDriverFactory::new();
        let manager = StorageManager::new();
        for (missing, config) in [
            ("hostname", json!({ "keyname": "kn", "key": "k" })),
            ("keyname", json!({ "hostname": "h", "key": "k" })),
            ("key", json!({ "hostname": "h", "keyname": "kn" })),
        ] {
            let err = factory.build_driver(config, &manager).err().unwrap();
            assert_eq!(config_error(err), format!("{} required", missing));
        }
        assert!(factory.build_driver(Value::Null, &manager).is_err());
        assert!(factory.build_driver(json!("host"), &manager).is_err());
    }

    #[test]
    fn test_numeric_credentials() {
        let config: NetStorageConfig = serde_json::from_value(json!({
            "hostname": "host", "keyname": 42, "key": 12345
        }))
        .unwrap();
        assert_eq!(config.keyname, "42");
        assert_eq!(config.key, "12345");
        assert_eq!(config.client().unwrap().credentials().keyname(), "42");

        let driver = NetStorageDriverFactory::new()
            .build_driver(json!({ "hostname": "host", "keyname": "kn", "key": 12345 }), &StorageManager::new());
        assert!(driver.is_ok());

        let err = NetStorageDriverFactory::new()
            .build_driver(json!({ "hostname": "host", "keyname": "kn", "key": ["k"] }), &StorageManager::new())
            .err()
            .unwrap();
        assert!(config_error(err).contains("expected a scalar"));
    }

    #[test]
    fn test_ssl_values() {
        let secure = |ssl: Value| {
            let config: NetStorageConfig = serde_json::from_value(json!({ "ssl": ssl })).unwrap();
            config.secure()
        };
        assert!(!secure(Value::Null).unwrap());
        assert!(secure(json!(true)).unwrap());
        assert!(secure(json!("T")).unwrap());
        assert!(secure(json!("1")).unwrap());
        assert!(!secure(json!("False")).unwrap());
        assert!(config_error(secure(json!("yes")).unwrap_err()).contains("invalid ssl value"));
        assert!(secure(json!(1)).is_err());
    }

    #[test]
    fn test_parse_bool() {
        for s in ["1", "t", "T", "TRUE", "true", "True"] {
            assert_eq!(parse_bool(s), Some(true), "{}", s);
        }
        for s in ["0", "f", "F", "FALSE", "false", "False"] {
            assert_eq!(parse_bool(s), Some(false), "{}", s);
        }
        assert_eq!(parse_bool("tRuE"), None);
        assert_eq!(parse_bool(""), None);
    }

    #[test]
    fn test_local_driver() {
        let manager = StorageManager::new();
        manager.register_factory(Box::new(LocalDriverFactory));
        let dir = tempfile::tempdir().unwrap();

        let driver = NetStorageDriverFactory::new()
            .build_driver(
                json!({
                    "hostname": "host", "keyname": "kn", "key": "k",
                    "tmp": dir.path().join("staging"),
                    "localDriver": { "filesystem": { "rootdirectory": dir.path().join("root") } }
                }),
                &manager,
            )
            .unwrap();
        assert_eq!(driver.local().unwrap().name(), "filesystem");
        assert_eq!(driver.temp_dir(), Some(dir.path().join("staging")));
    }

    #[test]
    fn test_local_driver_errors() {
        let manager = StorageManager::new();
        manager.register_factory(Box::new(LocalDriverFactory));
        let factory = NetStorageDriverFactory::new();
        let with_local = |local: Value| json!({ "hostname": "h", "keyname": "kn", "key": "k", "localDriver": local });

        let err = factory.build_driver(with_local(json!({ "filesystem": null, "other": null })), &manager).err().unwrap();
        assert_eq!(config_error(err), "there can be only one local driver");

        let err = factory.build_driver(with_local(json!({ "filesystem": "bad" })), &manager).err().unwrap();
        assert!(config_error(err).contains("invalid options"));

        let err = factory.build_driver(with_local(json!({ "nope": {} })), &manager).err().unwrap();
        assert!(err.to_string().contains("Driver type not found"));
    }

    #[test]
    fn test_customizers_in_order() {
        let factory = NetStorageDriverFactory::new()
            .with_customizer(|b| b.classifier(|p: &str| Placement::Local(p.to_string())))
            .with_customizer(|b| {
                b.classifier(|p: &str| match p.strip_prefix("/cache") {
                    Some(rest) => Placement::Local(rest.to_string()),
                    None => Placement::Remote(p.to_string()),
                })
            });
        let driver = factory
            .build_driver(json!({ "hostname": "h", "keyname": "kn", "key": "k" }), &StorageManager::new())
            .unwrap();
        assert_eq!(driver.classify("/cache/x"), Placement::Local("/x".to_string()));
        assert_eq!(driver.classify("/y"), Placement::Remote("/y".to_string()));
    }

    #[test]
    fn test_registered_by_name() {
        let manager = StorageManager::new();
        manager.register_factory(Box::new(NetStorageDriverFactory::new()));
        let driver = manager
            .create_driver("netstorage", json!({ "hostname": "h", "keyname": "kn", "key": "k", "ssl": "false" }))
            .unwrap();
        assert_eq!(driver.name(), "netstorage");
    }
}
