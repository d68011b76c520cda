use std::collections::HashSet;
use std::time::Duration;

use anyhow::Context as _;
use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::models::quiz::{QuizDraft, OPTIONS_PER_QUESTION, QUESTIONS_PER_QUIZ};

const GEMINI_TIMEOUT_SECS: u64 = 120;

const PROMPT_PREAMBLE: &str = "You are generating a multiple-choice quiz from a video transcript.\n\
Respond with a single JSON object and nothing else: no markdown fences, no commentary.\n\
The object must have exactly these fields:\n\
  \"title\": a short title for the quiz\n\
  \"description\": a summary of the video in under 150 characters, without mentioning the questions\n\
  \"questions\": a list of exactly 10 questions\n\
Each question must have exactly these fields:\n\
  \"question_title\": the question text\n\
  \"question_options\": exactly 4 distinct answer choices\n\
  \"answer\": the correct choice, copied verbatim from \"question_options\"\n";

lazy_static! {
    static ref CODE_FENCE: Regex = Regex::new(r"(?s)^```(?:json)?\s*(.*?)\s*```$").unwrap();
}

/// Produces a quiz draft from a transcript.
///
/// The production implementation calls the Gemini API; tests substitute a
/// stub that returns a canned draft.
#[async_trait]
pub trait QuizGenerator: Send + Sync {
    async fn generate(&self, transcript: &str) -> Result<QuizDraft, GenerationError>;
}

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("quiz generation request failed: {0}")]
    Request(String),
    #[error("model returned unusable output: {reason}")]
    InvalidOutput { reason: String, raw: String },
}

pub struct GeminiGenerator {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiGenerator {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(GEMINI_TIMEOUT_SECS))
            .build()
            .context("Failed to build Gemini HTTP client")?;

        Ok(Self {
            http,
            api_key: api_key.into(),
            model: model.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[derive(Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

#[async_trait]
impl QuizGenerator for GeminiGenerator {
    async fn generate(&self, transcript: &str) -> Result<QuizDraft, GenerationError> {
        if self.api_key.is_empty() {
            return Err(GenerationError::Request(
                "GEMINI_API_KEY is not configured".to_string(),
            ));
        }

        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );
        let prompt = build_prompt(transcript);
        let body = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part { text: &prompt }],
            }],
        };

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|err| GenerationError::Request(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(GenerationError::Request(format!(
                "Gemini returned {status}: {}",
                detail.trim()
            )));
        }

        let payload: GenerateContentResponse = response.json().await.map_err(|err| {
            GenerationError::Request(format!("could not decode Gemini response: {err}"))
        })?;

        let text = payload
            .candidates
            .into_iter()
            .next()
            .map(|candidate| {
                candidate
                    .content
                    .parts
                    .into_iter()
                    .map(|part| part.text)
                    .collect::<String>()
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(GenerationError::InvalidOutput {
                reason: "response contained no candidate text".to_string(),
                raw: String::new(),
            });
        }

        parse_quiz_draft(&text)
    }
}

fn build_prompt(transcript: &str) -> String {
    format!("{PROMPT_PREAMBLE}\nThe transcript follows between the --- markers.\n---\n{transcript}\n---\n")
}

/// Models wrap JSON in markdown fences often enough that stripping them is
/// cheaper than re-prompting.
fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    match CODE_FENCE.captures(trimmed) {
        Some(caps) => caps.get(1).map_or(trimmed, |inner| inner.as_str()),
        None => trimmed,
    }
}

fn parse_quiz_draft(raw: &str) -> Result<QuizDraft, GenerationError> {
    let json = strip_code_fences(raw);
    let draft: QuizDraft =
        serde_json::from_str(json).map_err(|err| GenerationError::InvalidOutput {
            reason: format!("not valid JSON: {err}"),
            raw: raw.to_string(),
        })?;

    validate_draft(&draft).map_err(|reason| GenerationError::InvalidOutput {
        reason,
        raw: raw.to_string(),
    })?;

    Ok(draft)
}

fn validate_draft(draft: &QuizDraft) -> Result<(), String> {
    if draft.questions.len() != QUESTIONS_PER_QUIZ {
        return Err(format!(
            "expected {} questions, got {}",
            QUESTIONS_PER_QUIZ,
            draft.questions.len()
        ));
    }

    for (index, question) in draft.questions.iter().enumerate() {
        if question.question_options.len() != OPTIONS_PER_QUESTION {
            return Err(format!(
                "question {} has {} options, expected {}",
                index + 1,
                question.question_options.len(),
                OPTIONS_PER_QUESTION
            ));
        }

        let distinct: HashSet<&str> = question
            .question_options
            .iter()
            .map(String::as_str)
            .collect();
        if distinct.len() != OPTIONS_PER_QUESTION {
            return Err(format!("question {} has duplicate options", index + 1));
        }

        if !question.question_options.contains(&question.answer) {
            return Err(format!(
                "question {} answer is not among its options",
                index + 1
            ));
        }
    }

    Ok(())
}
