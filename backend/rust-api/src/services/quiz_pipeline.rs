use std::path::{Path, PathBuf};
use std::sync::Arc;

use uuid::Uuid;

use crate::metrics::track_pipeline_stage;
use crate::models::quiz::QuizDraft;
use crate::services::media_downloader::{AudioFetcher, DownloadError};
use crate::services::quiz_generator::{GenerationError, QuizGenerator};
use crate::services::transcriber::{Transcriber, TranscriptionError};

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Download(#[from] DownloadError),
    #[error(transparent)]
    Transcription(#[from] TranscriptionError),
    #[error(transparent)]
    Generation(#[from] GenerationError),
}

impl PipelineError {
    pub fn stage(&self) -> &'static str {
        match self {
            PipelineError::Download(_) => "download",
            PipelineError::Transcription(_) => "transcription",
            PipelineError::Generation(_) => "generation",
        }
    }
}

/// Unique on-disk location for one request's downloaded audio. The file is
/// removed when the guard drops, whether or not the pipeline completed.
struct ScopedAudioPath {
    path: PathBuf,
    removed: bool,
}

impl ScopedAudioPath {
    async fn new(media_dir: &Path) -> Result<Self, DownloadError> {
        tokio::fs::create_dir_all(media_dir)
            .await
            .map_err(DownloadError::Prepare)?;

        let path = media_dir.join(format!("audio-{}.m4a", Uuid::new_v4()));

        // yt-dlp refuses to overwrite an existing output file.
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => return Err(DownloadError::Prepare(err)),
        }

        Ok(Self {
            path,
            removed: false,
        })
    }

    fn path(&self) -> &Path {
        &self.path
    }

    async fn remove(&mut self) {
        if self.removed {
            return;
        }

        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %err,
                    "Failed to remove audio file"
                );
            }
        }

        self.removed = true;
    }
}

impl Drop for ScopedAudioPath {
    fn drop(&mut self) {
        if !self.removed {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

/// Runs the download, transcription and generation stages for one video URL.
pub struct QuizPipeline {
    fetcher: Arc<dyn AudioFetcher>,
    transcriber: Arc<dyn Transcriber>,
    generator: Arc<dyn QuizGenerator>,
    media_dir: PathBuf,
}

impl QuizPipeline {
    pub fn new(
        fetcher: Arc<dyn AudioFetcher>,
        transcriber: Arc<dyn Transcriber>,
        generator: Arc<dyn QuizGenerator>,
        media_dir: PathBuf,
    ) -> Self {
        Self {
            fetcher,
            transcriber,
            generator,
            media_dir,
        }
    }

    pub async fn run(&self, video_url: &str) -> Result<QuizDraft, PipelineError> {
        let mut audio = ScopedAudioPath::new(&self.media_dir).await?;

        track_pipeline_stage("download", self.fetcher.fetch(video_url, audio.path())).await?;

        let transcript =
            track_pipeline_stage("transcription", self.transcriber.transcribe(audio.path()))
                .await?;

        // The audio file is no longer needed once transcribed.
        audio.remove().await;

        let draft =
            track_pipeline_stage("generation", self.generator.generate(&transcript)).await?;

        tracing::info!(video_url = %video_url, title = %draft.title, "Quiz draft generated");

        Ok(draft)
    }
}
