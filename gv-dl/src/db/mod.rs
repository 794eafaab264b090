//! Database access for gv-dl
//!
//! Schema bootstrap lives in `gv_common::db::init`; this module holds the
//! song record queries used by the pipeline and the HTTP API.

pub mod songs;
