use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;
use validator::Validate;

/// Every generated quiz carries this many questions.
pub const QUESTIONS_PER_QUIZ: usize = 10;
/// Each question carries this many distinct options.
pub const OPTIONS_PER_QUESTION: usize = 4;

/// A question belonging to exactly one quiz. Written once by the generation
/// pipeline, never mutated afterward.
#[derive(Debug, Clone)]
pub struct Question {
    pub id: String,
    pub question_title: String,
    pub question_options: Vec<String>,
    pub answer: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A quiz aggregate with its questions. `creator_id` scopes every read and
/// mutation; only `title` and `description` are mutable after creation.
#[derive(Debug, Clone)]
pub struct Quiz {
    pub id: String,
    pub title: String,
    pub description: String,
    pub video_url: String,
    pub creator_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub questions: Vec<Question>,
}

/// Unpersisted output of the generation stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizDraft {
    pub title: String,
    pub description: String,
    pub questions: Vec<DraftQuestion>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftQuestion {
    pub question_title: String,
    pub question_options: Vec<String>,
    pub answer: String,
}

/// Store input for quiz creation; ids and timestamps are assigned by the
/// store so the whole aggregate lands in one write.
#[derive(Debug, Clone)]
pub struct NewQuiz {
    pub title: String,
    pub description: String,
    pub video_url: String,
    pub creator_id: String,
    pub questions: Vec<DraftQuestion>,
}

/// Owner-editable fields. Everything else is server-computed.
#[derive(Debug, Clone, Default)]
pub struct QuizChanges {
    pub title: Option<String>,
    pub description: Option<String>,
}

/// Request to create a quiz from a video URL
#[derive(Debug, Deserialize, Validate)]
pub struct CreateQuizRequest {
    #[validate(length(min = 1, message = "This field may not be blank."))]
    pub url: String,
}

/// Request to update a quiz; unknown fields are ignored
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateQuizRequest {
    #[validate(length(
        max = 63,
        message = "Ensure this field has no more than 63 characters."
    ))]
    pub title: Option<String>,
    pub description: Option<String>,
}

impl From<UpdateQuizRequest> for QuizChanges {
    fn from(req: UpdateQuizRequest) -> Self {
        QuizChanges {
            title: req.title,
            description: req.description,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct QuestionResponse {
    pub id: String,
    pub question_title: String,
    pub question_options: Vec<String>,
    pub answer: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Question> for QuestionResponse {
    fn from(question: Question) -> Self {
        QuestionResponse {
            id: question.id,
            question_title: question.question_title,
            question_options: question.question_options,
            answer: question.answer,
            created_at: format_timestamp(&question.created_at),
            updated_at: format_timestamp(&question.updated_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct QuizResponse {
    pub id: String,
    pub title: String,
    pub description: String,
    pub created_at: String,
    pub updated_at: String,
    pub video_url: String,
    pub questions: Vec<QuestionResponse>,
}

impl From<Quiz> for QuizResponse {
    fn from(quiz: Quiz) -> Self {
        QuizResponse {
            id: quiz.id,
            title: quiz.title,
            description: quiz.description,
            created_at: format_timestamp(&quiz.created_at),
            updated_at: format_timestamp(&quiz.updated_at),
            video_url: quiz.video_url,
            questions: quiz.questions.into_iter().map(Into::into).collect(),
        }
    }
}

// ISO-8601 with millisecond precision and a literal Z, e.g.
// 2024-01-02T03:04:05.500Z
fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

#[derive(Debug, PartialEq, Eq, Error)]
pub enum VideoUrlError {
    #[error("Enter a valid URL.")]
    Malformed,
    #[error("Invalid YouTube URL")]
    UnsupportedHost,
}

/// Canonicalizes a video URL before any network work happens.
///
/// Long-form links pass through unchanged so the stored URL is byte-for-byte
/// what the client sent; `youtu.be/<id>` short links are rewritten to the
/// canonical watch URL; anything else is rejected.
pub fn normalize_video_url(raw: &str) -> Result<String, VideoUrlError> {
    Url::parse(raw).map_err(|_| VideoUrlError::Malformed)?;

    if raw.contains("youtube.com") {
        return Ok(raw.to_string());
    }

    if let Some((_, rest)) = raw.split_once("youtu.be/") {
        let id = rest.split('?').next().unwrap_or("");
        if !id.is_empty() {
            return Ok(format!("https://www.youtube.com/watch?v={}", id));
        }
    }

    Err(VideoUrlError::UnsupportedHost)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn long_form_urls_pass_through_unchanged() {
        let url = "https://www.youtube.com/watch?v=P8zzrqLEvoI";
        assert_eq!(normalize_video_url(url).unwrap(), url);
    }

    #[test]
    fn short_links_are_rewritten_to_the_watch_url() {
        assert_eq!(
            normalize_video_url("https://youtu.be/P8zzrqLEvoI").unwrap(),
            "https://www.youtube.com/watch?v=P8zzrqLEvoI"
        );
    }

    #[test]
    fn short_link_query_strings_are_dropped() {
        assert_eq!(
            normalize_video_url("https://youtu.be/P8zzrqLEvoI?t=42").unwrap(),
            "https://www.youtube.com/watch?v=P8zzrqLEvoI"
        );
    }

    #[test]
    fn foreign_hosts_are_rejected() {
        assert_eq!(
            normalize_video_url("https://vimeo.com/12345"),
            Err(VideoUrlError::UnsupportedHost)
        );
    }

    #[test]
    fn short_link_without_an_id_is_rejected() {
        assert_eq!(
            normalize_video_url("https://youtu.be/"),
            Err(VideoUrlError::UnsupportedHost)
        );
    }

    #[test]
    fn non_urls_are_rejected_before_host_checks() {
        assert_eq!(
            normalize_video_url("invalid_url"),
            Err(VideoUrlError::Malformed)
        );
    }

    #[test]
    fn timestamps_carry_milliseconds_and_a_z_suffix() {
        let dt = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap()
            + chrono::Duration::milliseconds(500);
        assert_eq!(format_timestamp(&dt), "2024-01-02T03:04:05.500Z");
    }
}
