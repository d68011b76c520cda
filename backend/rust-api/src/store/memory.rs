use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{QuizStore, StoreError, TokenBlacklist, UserStore};
use crate::models::quiz::{NewQuiz, Question, Quiz, QuizChanges};
use crate::models::user::{NewUser, User};

/// In-process stores for local development and the test suites. Same
/// contracts as the MongoDB/Redis implementations, nothing survives a
/// restart.
#[derive(Default)]
pub struct MemoryUserStore {
    users: RwLock<HashMap<String, User>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn insert(&self, user: NewUser) -> Result<User, StoreError> {
        let mut users = self.users.write().await;

        if users.values().any(|u| u.username == user.username) {
            return Err(StoreError::Duplicate { field: "username" });
        }
        if users.values().any(|u| u.email == user.email) {
            return Err(StoreError::Duplicate { field: "email" });
        }

        let user = User {
            id: Uuid::new_v4().to_string(),
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
            created_at: Utc::now(),
        };
        users.insert(user.id.clone(), user.clone());
        Ok(user)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.username == username).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<User>, StoreError> {
        let users = self.users.read().await;
        Ok(users.get(id).cloned())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryQuizStore {
    quizzes: RwLock<HashMap<String, Quiz>>,
}

impl MemoryQuizStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QuizStore for MemoryQuizStore {
    async fn insert(&self, quiz: NewQuiz) -> Result<Quiz, StoreError> {
        let now = Utc::now();
        let quiz = Quiz {
            id: Uuid::new_v4().to_string(),
            title: quiz.title,
            description: quiz.description,
            video_url: quiz.video_url,
            creator_id: quiz.creator_id,
            created_at: now,
            updated_at: now,
            questions: quiz
                .questions
                .into_iter()
                .map(|q| Question {
                    id: Uuid::new_v4().to_string(),
                    question_title: q.question_title,
                    question_options: q.question_options,
                    answer: q.answer,
                    created_at: now,
                    updated_at: now,
                })
                .collect(),
        };

        let mut quizzes = self.quizzes.write().await;
        quizzes.insert(quiz.id.clone(), quiz.clone());
        Ok(quiz)
    }

    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<Quiz>, StoreError> {
        let quizzes = self.quizzes.read().await;
        let mut owned: Vec<Quiz> = quizzes
            .values()
            .filter(|q| q.creator_id == owner_id)
            .cloned()
            .collect();
        owned.sort_by_key(|q| q.created_at);
        Ok(owned)
    }

    async fn get_by_id(&self, quiz_id: &str) -> Result<Option<Quiz>, StoreError> {
        let quizzes = self.quizzes.read().await;
        Ok(quizzes.get(quiz_id).cloned())
    }

    async fn update(
        &self,
        quiz_id: &str,
        changes: QuizChanges,
    ) -> Result<Option<Quiz>, StoreError> {
        let mut quizzes = self.quizzes.write().await;
        let Some(quiz) = quizzes.get_mut(quiz_id) else {
            return Ok(None);
        };

        if let Some(title) = changes.title {
            quiz.title = title;
        }
        if let Some(description) = changes.description {
            quiz.description = description;
        }
        quiz.updated_at = Utc::now();

        Ok(Some(quiz.clone()))
    }

    async fn delete(&self, quiz_id: &str) -> Result<bool, StoreError> {
        let mut quizzes = self.quizzes.write().await;
        Ok(quizzes.remove(quiz_id).is_some())
    }
}

#[derive(Default)]
pub struct MemoryTokenBlacklist {
    revoked: RwLock<HashMap<String, DateTime<Utc>>>,
}

impl MemoryTokenBlacklist {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenBlacklist for MemoryTokenBlacklist {
    async fn revoke(&self, jti: &str, expires_at: DateTime<Utc>) -> Result<bool, StoreError> {
        let mut revoked = self.revoked.write().await;

        // Entries for tokens that already expired no longer revoke anything
        let now = Utc::now();
        revoked.retain(|_, expiry| *expiry > now);

        if revoked.contains_key(jti) {
            return Ok(false);
        }
        revoked.insert(jti.to_string(), expires_at);
        Ok(true)
    }

    async fn is_revoked(&self, jti: &str) -> Result<bool, StoreError> {
        let revoked = self.revoked.read().await;
        Ok(revoked.contains_key(jti))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
