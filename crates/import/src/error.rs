use thiserror::Error;

/// Error type a storage sink reports when it refuses a record.
pub type SinkError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),
    #[error("Malformed document: {0}")]
    MalformedDocument(#[from] csv::Error),
    #[error("Storage rejected record {index}: {source}")]
    StorageRejected {
        /// Zero-based position of the record in import order.
        index: usize,
        #[source]
        source: SinkError,
    },
    #[error("Storage error: {0}")]
    Storage(#[source] SinkError),
    #[error("Invalid configuration: {0}")]
    Config(#[from] toml::de::Error),
    #[error("Invalid rule for category {category:?}: {reason}")]
    InvalidRule { category: String, reason: String },
}

pub type Result<T> = std::result::Result<T, ImportError>;
