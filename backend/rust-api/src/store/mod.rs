use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::quiz::{NewQuiz, Quiz, QuizChanges};
use crate::models::user::{NewUser, User};

pub mod memory;
pub mod mongo;
pub mod redis;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Unique-constraint violation on the named field.
    #[error("duplicate {field}")]
    Duplicate { field: &'static str },

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

/// Persisted user records.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn insert(&self, user: NewUser) -> Result<User, StoreError>;
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    async fn find_by_id(&self, id: &str) -> Result<Option<User>, StoreError>;
    /// Connectivity probe for the health endpoint.
    async fn ping(&self) -> Result<(), StoreError>;
}

/// Quiz repository. Ownership decisions live above this seam; the store only
/// answers by-id and by-owner questions. A malformed id is treated as absent,
/// never as an error.
#[async_trait]
pub trait QuizStore: Send + Sync {
    /// Persists the quiz with its questions as one atomic write.
    async fn insert(&self, quiz: NewQuiz) -> Result<Quiz, StoreError>;
    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<Quiz>, StoreError>;
    async fn get_by_id(&self, quiz_id: &str) -> Result<Option<Quiz>, StoreError>;
    /// Applies the changes and bumps `updated_at`; `None` when no such quiz.
    async fn update(&self, quiz_id: &str, changes: QuizChanges)
        -> Result<Option<Quiz>, StoreError>;
    /// Removes the quiz and its embedded questions; false when no such quiz.
    async fn delete(&self, quiz_id: &str) -> Result<bool, StoreError>;
}

/// Explicit revocation set consulted on every refresh and verify.
#[async_trait]
pub trait TokenBlacklist: Send + Sync {
    /// Records a token id as revoked until `expires_at`. Returns false when
    /// the id was already present.
    async fn revoke(&self, jti: &str, expires_at: DateTime<Utc>) -> Result<bool, StoreError>;
    async fn is_revoked(&self, jti: &str) -> Result<bool, StoreError>;
    async fn ping(&self) -> Result<(), StoreError>;
}
