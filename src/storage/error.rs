use thiserror::Error;

/// Error taxonomy of the storage layer / 存储层错误类型
///
/// Operations return `anyhow::Result`; these variants travel inside and can
/// be recovered with `err.downcast_ref::<StorageError>()`.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Remote answered with a non-2xx status; carries the status line
    #[error("remote error: {0}")]
    Status(String),

    #[error("malformed response: {0}")]
    Parse(#[from] quick_xml::DeError),

    #[error("cannot move remote object {0} to local storage")]
    UnsupportedMove(String),

    #[error("no local backend configured for {0}")]
    NoLocalBackend(String),

    #[error("operation not supported: {0}")]
    Unsupported(String),

    #[error("local I/O error: {0}")]
    LocalIo(#[from] std::io::Error),
}
