//! Data models for gv-dl

pub mod download_job;

pub use download_job::{DownloadJob, JobSnapshot, StateTransition};
