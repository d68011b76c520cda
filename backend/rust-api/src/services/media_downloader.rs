use std::path::Path;

use async_trait::async_trait;
use tokio::process::Command;

/// Fetches the audio track of a video to a local file.
///
/// The production implementation shells out to yt-dlp; tests substitute a
/// stub so the pipeline can run without network access.
#[async_trait]
pub trait AudioFetcher: Send + Sync {
    async fn fetch(&self, video_url: &str, dest: &Path) -> Result<(), DownloadError>;
}

#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("could not prepare audio destination: {0}")]
    Prepare(#[source] std::io::Error),
    #[error("could not launch yt-dlp: {0}")]
    Launch(#[source] std::io::Error),
    #[error("yt-dlp failed: {0}")]
    Failed(String),
}

pub struct YtDlpDownloader {
    bin: String,
}

impl YtDlpDownloader {
    pub fn new(bin: impl Into<String>) -> Self {
        Self { bin: bin.into() }
    }
}

#[async_trait]
impl AudioFetcher for YtDlpDownloader {
    async fn fetch(&self, video_url: &str, dest: &Path) -> Result<(), DownloadError> {
        let output = Command::new(&self.bin)
            .arg("-f")
            .arg("bestaudio/best")
            .arg("-o")
            .arg(dest)
            .arg("--no-playlist")
            .arg("--quiet")
            .arg("--")
            .arg(video_url)
            .output()
            .await
            .map_err(DownloadError::Launch)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let detail = stderr.trim();
            let detail = if detail.is_empty() {
                format!("exited with {}", output.status)
            } else {
                detail.to_string()
            };
            return Err(DownloadError::Failed(detail));
        }

        // yt-dlp can exit zero without producing a file for some URL shapes.
        if !dest.exists() {
            return Err(DownloadError::Failed(
                "no audio file was produced".to_string(),
            ));
        }

        Ok(())
    }
}
