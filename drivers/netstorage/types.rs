//! XML documents returned by the stat / dir / du actions

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::storage::StorageError;
use crate::utils::join_path;

/// Kind of a remote entry / 条目类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
    Symlink,
}

/// `<stat directory="..."><file .../>...</stat>`, also used for `dir`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatData {
    #[serde(rename = "@directory", default)]
    pub directory: String,
    #[serde(rename = "file", default)]
    pub files: Vec<StatEntry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatEntry {
    #[serde(rename = "@type", default)]
    pub kind: String,
    #[serde(rename = "@name", default)]
    pub name: String,
    /// Seconds since epoch
    #[serde(rename = "@mtime", default)]
    pub mtime: u64,
    #[serde(rename = "@size", default)]
    pub size: u64,
    #[serde(rename = "@md5", default)]
    pub md5: String,
    /// Symlink target
    #[serde(rename = "@target", default)]
    pub target: String,
}

/// `<du directory="..."><du-info files="N" bytes="N"/></du>`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DuData {
    #[serde(rename = "@directory", default)]
    pub directory: String,
    #[serde(rename = "du-info", default)]
    pub info: DuInfo,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DuInfo {
    #[serde(rename = "@files", default)]
    pub files: u64,
    #[serde(rename = "@bytes", default)]
    pub bytes: u64,
}

impl StatData {
    pub fn parse(xml: &str) -> Result<Self, StorageError> {
        Ok(quick_xml::de::from_str(xml)?)
    }

    /// Full path of one of the entries / 条目完整路径
    pub fn entry_path(&self, entry: &StatEntry) -> String {
        join_path(&self.directory, &entry.name)
    }
}

impl DuData {
    pub fn parse(xml: &str) -> Result<Self, StorageError> {
        Ok(quick_xml::de::from_str(xml)?)
    }
}

impl StatEntry {
    /// Anything that is not a file or a symlink is treated as a directory
    pub fn entry_kind(&self) -> EntryKind {
        match self.kind.as_str() {
            "file" => EntryKind::File,
            "symlink" => EntryKind::Symlink,
            _ => EntryKind::Directory,
        }
    }

    pub fn is_file(&self) -> bool {
        self.entry_kind() == EntryKind::File
    }

    /// Size in bytes; only files carry one
    pub fn file_size(&self) -> u64 {
        if self.is_file() { self.size } else { 0 }
    }

    pub fn modified(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(i64::try_from(self.mtime).ok()?, 0)
    }
}
