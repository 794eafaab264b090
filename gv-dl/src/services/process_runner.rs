//! External downloader process runner
//!
//! Runs the configured downloader once per job and hands back everything it
//! printed. The returned future completes when the process exits, which is
//! the pipeline's signal that the download has finished.

use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, warn};

use gv_common::config::{DownloaderConfig, MEDIA_DIR_PLACEHOLDER, URL_PLACEHOLDER};

/// Downloader process errors
#[derive(Debug, Error)]
pub enum SpawnError {
    /// Process could not be started (missing binary, permissions, ...)
    #[error("Failed to start {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Process ran but reported failure
    #[error("{program} exited with {}", describe_exit(.exit_code))]
    ExitStatus {
        program: String,
        exit_code: Option<i32>,
        /// Captured stdout + stderr, kept for diagnostics
        output: String,
    },

    /// No downloader slot can be acquired any more
    #[error("Downloader pool is shut down")]
    PoolClosed,
}

impl SpawnError {
    /// Text captured before the failure, if any
    pub fn captured_output(&self) -> Option<&str> {
        match self {
            SpawnError::ExitStatus { output, .. } => Some(output),
            _ => None,
        }
    }
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {}", code),
        None => "no status (terminated by signal)".to_string(),
    }
}

/// Result of a successful downloader run
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub exit_code: Option<i32>,
    /// stdout followed by stderr
    pub text: String,
}

/// Spawns the external downloader for one URL
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Run the downloader to completion
    ///
    /// No timeout is applied; the call returns when the process exits.
    async fn run(&self, url: &str, media_dir: &Path) -> Result<ProcessOutput, SpawnError>;
}

/// Downloader invoked through `tokio::process`
///
/// Arguments come from a template where `{media_dir}` and `{url}` are
/// substituted per job. The URL is always passed as its own argument so it
/// never reaches a shell.
#[derive(Debug, Clone)]
pub struct ExternalDownloader {
    program: String,
    args: Vec<String>,
}

impl ExternalDownloader {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    pub fn from_config(config: &DownloaderConfig) -> Self {
        Self::new(config.program.clone(), config.args.clone())
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Expand the argument template for one job
    pub fn build_args(&self, url: &str, media_dir: &Path) -> Vec<String> {
        let media_dir = media_dir.to_string_lossy();
        self.args
            .iter()
            .map(|arg| {
                arg.replace(MEDIA_DIR_PLACEHOLDER, &media_dir)
                    .replace(URL_PLACEHOLDER, url)
            })
            .collect()
    }
}

#[async_trait]
impl ProcessRunner for ExternalDownloader {
    async fn run(&self, url: &str, media_dir: &Path) -> Result<ProcessOutput, SpawnError> {
        let args = self.build_args(url, media_dir);
        debug!(program = %self.program, ?args, "Spawning downloader");

        let output = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| SpawnError::Launch {
                program: self.program.clone(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        debug!("Downloader stdout:\n{}", stdout);
        if !stderr.trim().is_empty() {
            warn!("Downloader stderr:\n{}", stderr);
        }

        let mut text = String::with_capacity(stdout.len() + stderr.len() + 1);
        text.push_str(&stdout);
        if !stderr.is_empty() {
            if !text.is_empty() && !text.ends_with('\n') {
                text.push('\n');
            }
            text.push_str(&stderr);
        }

        let exit_code = output.status.code();
        if !output.status.success() {
            return Err(SpawnError::ExitStatus {
                program: self.program.clone(),
                exit_code,
                output: text,
            });
        }

        Ok(ProcessOutput { exit_code, text })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_default_template_expansion() {
        let runner = ExternalDownloader::from_config(&DownloaderConfig::default());
        let args = runner.build_args("https://example.com/track/1", Path::new("/srv/media"));

        assert_eq!(runner.program(), "freyr");
        assert_eq!(args, vec!["-d", "/srv/media", "https://example.com/track/1"]);
    }

    #[test]
    fn test_url_with_shell_metacharacters_stays_one_argument() {
        let runner = ExternalDownloader::new("freyr", vec!["{url}".to_string()]);
        let url = "https://example.com/?a=1&b=\"2\"; rm -rf /";
        let args = runner.build_args(url, &PathBuf::from("/m"));

        assert_eq!(args, vec![url.to_string()]);
    }

    #[test]
    fn test_embedded_placeholder() {
        let runner = ExternalDownloader::new("dl", vec!["--out={media_dir}/x".to_string()]);
        let args = runner.build_args("u", Path::new("/m"));
        assert_eq!(args, vec!["--out=/m/x"]);
    }

    #[tokio::test]
    async fn test_missing_program_is_launch_error() {
        let runner = ExternalDownloader::new("gv-definitely-not-installed-xyz", vec![]);
        let err = runner.run("u", Path::new("/tmp")).await.unwrap_err();

        assert!(matches!(err, SpawnError::Launch { .. }));
        assert!(err.captured_output().is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_captures_stdout_and_stderr() {
        let runner = ExternalDownloader::new(
            "sh",
            vec![
                "-c".to_string(),
                "echo \"url=$1\"; echo \"dir=$2\"; echo oops >&2".to_string(),
                "sh".to_string(),
                "{url}".to_string(),
                "{media_dir}".to_string(),
            ],
        );

        let output = runner.run("https://x.test/a", Path::new("/m")).await.unwrap();

        assert_eq!(output.exit_code, Some(0));
        assert_eq!(output.text, "url=https://x.test/a\ndir=/m\noops\n");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_non_zero_exit_keeps_output() {
        let runner = ExternalDownloader::new(
            "sh",
            vec!["-c".to_string(), "echo partial; exit 3".to_string()],
        );

        let err = runner.run("u", Path::new("/m")).await.unwrap_err();

        match &err {
            SpawnError::ExitStatus { exit_code, .. } => assert_eq!(*exit_code, Some(3)),
            other => panic!("Expected ExitStatus, got {:?}", other),
        }
        assert_eq!(err.captured_output(), Some("partial\n"));
        assert_eq!(err.to_string(), "sh exited with status 3");
    }
}
