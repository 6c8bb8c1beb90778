use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Feed error: {0}")]
    Feed(String),
}

/// The ad id or price could not be read from the listing.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LookupFailure {
    #[error("ad id missing or unreadable: {0}")]
    Id(String),

    #[error("unreadable price {1:?} for ad {0}")]
    Price(i64, String),
}

/// A single gallery image could not be scored.
#[derive(Error, Debug)]
pub enum ClassificationError {
    #[error("corrupt image: {0}")]
    CorruptImage(String),

    #[error("classifier failed: {0}")]
    Model(String),

    #[error("probability {0} is outside [0, 1]")]
    OutOfRange(f64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A single ad row could not be written to the store.
#[derive(Error, Debug)]
#[error("failed to store row for ad {ad_id} ({image_ref}): {source}")]
pub struct StorageError {
    pub ad_id: i64,
    pub image_ref: String,
    #[source]
    pub source: rusqlite::Error,
}

#[derive(Error, Debug)]
#[error("notification failed: {0}")]
pub struct NotificationError(pub String);
