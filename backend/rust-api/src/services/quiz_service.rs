use std::sync::Arc;

use crate::models::quiz::{NewQuiz, Quiz, QuizChanges, QuizDraft};
use crate::services::AppState;
use crate::store::{QuizStore, StoreError};

/// Outcome of checking a quiz against a requester. Existence is decided
/// before ownership: a quiz that is not there is NotFound for everyone,
/// a quiz that is there but owned by someone else is Forbidden.
#[derive(Debug, thiserror::Error)]
pub enum QuizAccessError {
    #[error("quiz not found")]
    NotFound,
    #[error("requester does not own this quiz")]
    Forbidden,
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct QuizService {
    quizzes: Arc<dyn QuizStore>,
}

impl QuizService {
    pub fn new(quizzes: Arc<dyn QuizStore>) -> Self {
        Self { quizzes }
    }

    pub fn from_state(state: &AppState) -> Self {
        Self::new(state.quizzes.clone())
    }

    /// Loads the quiz and checks ownership, in that order.
    async fn authorize(&self, quiz_id: &str, requester_id: &str) -> Result<Quiz, QuizAccessError> {
        let quiz = self
            .quizzes
            .get_by_id(quiz_id)
            .await?
            .ok_or(QuizAccessError::NotFound)?;

        if quiz.creator_id != requester_id {
            return Err(QuizAccessError::Forbidden);
        }

        Ok(quiz)
    }

    pub async fn create_from_draft(
        &self,
        draft: QuizDraft,
        video_url: &str,
        creator_id: &str,
    ) -> Result<Quiz, StoreError> {
        let new_quiz = NewQuiz {
            title: draft.title,
            description: draft.description,
            video_url: video_url.to_string(),
            creator_id: creator_id.to_string(),
            questions: draft.questions,
        };

        let quiz = self.quizzes.insert(new_quiz).await?;

        tracing::info!(
            quiz_id = %quiz.id,
            creator_id = %creator_id,
            "Quiz created"
        );

        Ok(quiz)
    }

    pub async fn list_for(&self, owner_id: &str) -> Result<Vec<Quiz>, StoreError> {
        self.quizzes.list_by_owner(owner_id).await
    }

    pub async fn retrieve(
        &self,
        quiz_id: &str,
        requester_id: &str,
    ) -> Result<Quiz, QuizAccessError> {
        self.authorize(quiz_id, requester_id).await
    }

    pub async fn update(
        &self,
        quiz_id: &str,
        requester_id: &str,
        changes: QuizChanges,
    ) -> Result<Quiz, QuizAccessError> {
        self.authorize(quiz_id, requester_id).await?;

        self.quizzes
            .update(quiz_id, changes)
            .await?
            .ok_or(QuizAccessError::NotFound)
    }

    pub async fn delete(&self, quiz_id: &str, requester_id: &str) -> Result<(), QuizAccessError> {
        self.authorize(quiz_id, requester_id).await?;

        if !self.quizzes.delete(quiz_id).await? {
            return Err(QuizAccessError::NotFound);
        }

        tracing::info!(quiz_id = %quiz_id, "Quiz deleted");

        Ok(())
    }
}
