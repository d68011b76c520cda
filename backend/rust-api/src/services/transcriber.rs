use std::path::Path;

use async_trait::async_trait;
use tokio::process::Command;

/// Turns a downloaded audio file into a plain-text transcript.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio_path: &Path) -> Result<String, TranscriptionError>;
}

#[derive(Debug, thiserror::Error)]
pub enum TranscriptionError {
    #[error("could not launch whisper: {0}")]
    Launch(#[source] std::io::Error),
    #[error("whisper failed: {0}")]
    Failed(String),
    #[error("could not read transcript: {0}")]
    Output(String),
}

/// Runs the whisper CLI against a local audio file. Whisper writes its
/// transcript next to the input file, so the output lands in the same
/// directory as the audio and is removed once read.
pub struct WhisperTranscriber {
    bin: String,
    model: String,
    use_cuda: bool,
}

impl WhisperTranscriber {
    pub fn new(bin: impl Into<String>, model: impl Into<String>, use_cuda: bool) -> Self {
        Self {
            bin: bin.into(),
            model: model.into(),
            use_cuda,
        }
    }
}

#[async_trait]
impl Transcriber for WhisperTranscriber {
    async fn transcribe(&self, audio_path: &Path) -> Result<String, TranscriptionError> {
        let output_dir = audio_path.parent().unwrap_or_else(|| Path::new("."));
        let device = if self.use_cuda { "cuda" } else { "cpu" };

        let output = Command::new(&self.bin)
            .arg(audio_path)
            .arg("--model")
            .arg(&self.model)
            .arg("--device")
            .arg(device)
            .arg("--output_format")
            .arg("txt")
            .arg("--output_dir")
            .arg(output_dir)
            .output()
            .await
            .map_err(TranscriptionError::Launch)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let detail = stderr.trim();
            let detail = if detail.is_empty() {
                format!("exited with {}", output.status)
            } else {
                detail.to_string()
            };
            return Err(TranscriptionError::Failed(detail));
        }

        let transcript_path = audio_path.with_extension("txt");
        let transcript = tokio::fs::read_to_string(&transcript_path)
            .await
            .map_err(|err| {
                TranscriptionError::Output(format!(
                    "missing transcript {}: {}",
                    transcript_path.display(),
                    err
                ))
            })?;

        if let Err(err) = tokio::fs::remove_file(&transcript_path).await {
            tracing::warn!(
                path = %transcript_path.display(),
                error = %err,
                "Failed to remove transcript file"
            );
        }

        Ok(transcript.trim().to_string())
    }
}
