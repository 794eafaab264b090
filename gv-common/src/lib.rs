//! # GrabVault Common Library
//!
//! Shared code for the GrabVault crates:
//! - Song record models and database bootstrap
//! - Job event types and the broadcast EventBus
//! - Configuration loading and root folder resolution
//! - SSE helpers

pub mod config;
#[cfg(feature = "sqlx")]
pub mod db;
pub mod error;
pub mod events;
pub mod sse;

pub use error::{Error, Result};
