//! 本地文件系统驱动

mod driver;

pub use driver::{LocalDriver, DEFAULT_ROOT};
