//! Service configuration for gv-dl
//!
//! Combines the resolved root folder with the TOML `[downloader]` section
//! into the concrete paths and settings the service runs with.

use gv_common::config::{CompiledDefaults, DownloaderConfig, RootFolderInitializer, TomlConfig};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use crate::services::CoordinatorSettings;

/// Fully resolved service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub root_folder: PathBuf,
    pub database_path: PathBuf,
    pub media_dir: PathBuf,
    pub diagnostic_log: PathBuf,
    pub downloader: DownloaderConfig,
    pub bind: SocketAddr,
}

impl ServiceConfig {
    /// Resolve paths under `root`; `port` and `bind_ip` override the TOML file
    pub fn resolve(
        root: &RootFolderInitializer,
        toml: &TomlConfig,
        port: Option<u16>,
        bind_ip: Option<IpAddr>,
    ) -> Self {
        let port = port
            .or(toml.port)
            .unwrap_or_else(|| CompiledDefaults::for_current_platform().port);
        let ip = bind_ip.unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST));

        Self {
            root_folder: root.root().to_path_buf(),
            database_path: root.database_path(),
            media_dir: root.media_dir(&toml.downloader),
            diagnostic_log: root.diagnostic_log_path(&toml.downloader),
            downloader: toml.downloader.clone(),
            bind: SocketAddr::new(ip, port),
        }
    }

    /// Create the media directory if missing
    pub fn ensure_media_dir(&self) -> gv_common::Result<()> {
        std::fs::create_dir_all(&self.media_dir)?;
        Ok(())
    }

    pub fn coordinator_settings(&self) -> CoordinatorSettings {
        CoordinatorSettings {
            media_dir: self.media_dir.clone(),
            settle_delay: self.downloader.settle_delay(),
            max_concurrent_downloads: self.downloader.max_concurrent_downloads,
        }
    }
}
