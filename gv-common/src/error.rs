//! GrabVault error type
//!
//! Shared by the config loader, the schema bootstrap and the song record
//! queries in gv-dl.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Song store query or connection failed
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Root folder or media directory could not be prepared
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Config file unreadable or malformed
    #[error("Configuration error: {0}")]
    Config(String),

    /// Stored value outside the accepted set (e.g. an unknown link status)
    #[error("Invalid value: {0}")]
    InvalidInput(String),
}
