use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId, Document};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::{IndexOptions, ReturnDocument};
use mongodb::{Database, IndexModel};
use serde::{Deserialize, Serialize};

use super::{QuizStore, StoreError, UserStore};
use crate::models::quiz::{NewQuiz, Question, Quiz, QuizChanges};
use crate::models::user::{NewUser, User};

const USERS_COLLECTION: &str = "users";
const QUIZZES_COLLECTION: &str = "quizzes";

/// User document stored in the MongoDB "users" collection
#[derive(Debug, Serialize, Deserialize)]
struct UserDocument {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    id: Option<ObjectId>,
    username: String,
    email: String,
    password_hash: String,
    #[serde(with = "bson_datetime_as_chrono")]
    created_at: DateTime<Utc>,
}

impl UserDocument {
    fn into_domain(self) -> User {
        User {
            id: self.id.map(|id| id.to_hex()).unwrap_or_default(),
            username: self.username,
            email: self.email,
            password_hash: self.password_hash,
            created_at: self.created_at,
        }
    }
}

/// Quiz document with its questions embedded, so the aggregate is written
/// and removed as one unit.
#[derive(Debug, Serialize, Deserialize)]
struct QuizDocument {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    id: Option<ObjectId>,
    title: String,
    description: String,
    video_url: String,
    creator_id: ObjectId,
    #[serde(with = "bson_datetime_as_chrono")]
    created_at: DateTime<Utc>,
    #[serde(with = "bson_datetime_as_chrono")]
    updated_at: DateTime<Utc>,
    questions: Vec<QuestionDocument>,
}

#[derive(Debug, Serialize, Deserialize)]
struct QuestionDocument {
    #[serde(rename = "_id")]
    id: ObjectId,
    question_title: String,
    question_options: Vec<String>,
    answer: String,
    #[serde(with = "bson_datetime_as_chrono")]
    created_at: DateTime<Utc>,
    #[serde(with = "bson_datetime_as_chrono")]
    updated_at: DateTime<Utc>,
}

impl QuizDocument {
    fn into_domain(self) -> Quiz {
        Quiz {
            id: self.id.map(|id| id.to_hex()).unwrap_or_default(),
            title: self.title,
            description: self.description,
            video_url: self.video_url,
            creator_id: self.creator_id.to_hex(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            questions: self
                .questions
                .into_iter()
                .map(|q| Question {
                    id: q.id.to_hex(),
                    question_title: q.question_title,
                    question_options: q.question_options,
                    answer: q.answer,
                    created_at: q.created_at,
                    updated_at: q.updated_at,
                })
                .collect(),
        }
    }
}

// Serde converters for chrono::DateTime <-> mongodb::bson::DateTime
mod bson_datetime_as_chrono {
    use chrono::{DateTime, Utc};
    use mongodb::bson;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let bson_dt = bson::DateTime::from_millis(date.timestamp_millis());
        bson_dt.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bson_dt = bson::DateTime::deserialize(deserializer)?;
        DateTime::from_timestamp_millis(bson_dt.timestamp_millis())
            .ok_or_else(|| serde::de::Error::custom("timestamp out of range"))
    }
}

/// Creates the unique indexes the registration contract depends on.
pub async fn ensure_indexes(db: &Database) -> anyhow::Result<()> {
    let users = db.collection::<UserDocument>(USERS_COLLECTION);

    let username_index = IndexModel::builder()
        .keys(doc! { "username": 1 })
        .options(IndexOptions::builder().unique(true).build())
        .build();
    users
        .create_index(username_index)
        .await
        .context("Failed to create unique username index")?;

    let email_index = IndexModel::builder()
        .keys(doc! { "email": 1 })
        .options(IndexOptions::builder().unique(true).build())
        .build();
    users
        .create_index(email_index)
        .await
        .context("Failed to create unique email index")?;

    let quizzes = db.collection::<QuizDocument>(QUIZZES_COLLECTION);
    let creator_index = IndexModel::builder()
        .keys(doc! { "creator_id": 1 })
        .build();
    quizzes
        .create_index(creator_index)
        .await
        .context("Failed to create quiz creator index")?;

    Ok(())
}

fn duplicate_field(err: &mongodb::error::Error) -> Option<&'static str> {
    if let ErrorKind::Write(WriteFailure::WriteError(write_error)) = err.kind.as_ref() {
        if write_error.code == 11000 {
            if write_error.message.contains("username") {
                return Some("username");
            }
            if write_error.message.contains("email") {
                return Some("email");
            }
        }
    }
    None
}

#[derive(Clone)]
pub struct MongoUserStore {
    db: Database,
}

impl MongoUserStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    fn collection(&self) -> mongodb::Collection<UserDocument> {
        self.db.collection(USERS_COLLECTION)
    }

    async fn find_one(&self, filter: Document) -> Result<Option<User>, StoreError> {
        let found = self
            .collection()
            .find_one(filter)
            .await
            .context("Failed to query users")?;
        Ok(found.map(UserDocument::into_domain))
    }
}

#[async_trait]
impl UserStore for MongoUserStore {
    async fn insert(&self, user: NewUser) -> Result<User, StoreError> {
        let document = UserDocument {
            id: None, // MongoDB will generate
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
            created_at: Utc::now(),
        };

        let insert_result = match self.collection().insert_one(&document).await {
            Ok(result) => result,
            Err(err) => {
                if let Some(field) = duplicate_field(&err) {
                    return Err(StoreError::Duplicate { field });
                }
                return Err(anyhow::Error::new(err)
                    .context("Failed to insert user")
                    .into());
            }
        };

        let id = insert_result
            .inserted_id
            .as_object_id()
            .context("Failed to read inserted user id")?;

        let mut document = document;
        document.id = Some(id);
        Ok(document.into_domain())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        self.find_one(doc! { "username": username }).await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        self.find_one(doc! { "email": email }).await
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<User>, StoreError> {
        let Ok(object_id) = ObjectId::parse_str(id) else {
            return Ok(None);
        };
        self.find_one(doc! { "_id": object_id }).await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.db
            .run_command(doc! { "ping": 1 })
            .await
            .context("MongoDB ping failed")?;
        Ok(())
    }
}

#[derive(Clone)]
pub struct MongoQuizStore {
    db: Database,
}

impl MongoQuizStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    fn collection(&self) -> mongodb::Collection<QuizDocument> {
        self.db.collection(QUIZZES_COLLECTION)
    }
}

#[async_trait]
impl QuizStore for MongoQuizStore {
    async fn insert(&self, quiz: NewQuiz) -> Result<Quiz, StoreError> {
        let creator_id =
            ObjectId::parse_str(&quiz.creator_id).context("Invalid quiz creator id")?;

        let now = Utc::now();
        let document = QuizDocument {
            id: None,
            title: quiz.title,
            description: quiz.description,
            video_url: quiz.video_url,
            creator_id,
            created_at: now,
            updated_at: now,
            questions: quiz
                .questions
                .into_iter()
                .map(|q| QuestionDocument {
                    id: ObjectId::new(),
                    question_title: q.question_title,
                    question_options: q.question_options,
                    answer: q.answer,
                    created_at: now,
                    updated_at: now,
                })
                .collect(),
        };

        let insert_result = self
            .collection()
            .insert_one(&document)
            .await
            .context("Failed to insert quiz")?;

        let id = insert_result
            .inserted_id
            .as_object_id()
            .context("Failed to read inserted quiz id")?;

        let mut document = document;
        document.id = Some(id);
        Ok(document.into_domain())
    }

    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<Quiz>, StoreError> {
        let Ok(creator_id) = ObjectId::parse_str(owner_id) else {
            return Ok(Vec::new());
        };

        let documents: Vec<QuizDocument> = self
            .collection()
            .find(doc! { "creator_id": creator_id })
            .sort(doc! { "created_at": 1 })
            .await
            .context("Failed to query quizzes")?
            .try_collect()
            .await
            .context("Failed to read quiz cursor")?;

        Ok(documents
            .into_iter()
            .map(QuizDocument::into_domain)
            .collect())
    }

    async fn get_by_id(&self, quiz_id: &str) -> Result<Option<Quiz>, StoreError> {
        let Ok(object_id) = ObjectId::parse_str(quiz_id) else {
            return Ok(None);
        };

        let found = self
            .collection()
            .find_one(doc! { "_id": object_id })
            .await
            .context("Failed to query quiz")?;
        Ok(found.map(QuizDocument::into_domain))
    }

    async fn update(
        &self,
        quiz_id: &str,
        changes: QuizChanges,
    ) -> Result<Option<Quiz>, StoreError> {
        let Ok(object_id) = ObjectId::parse_str(quiz_id) else {
            return Ok(None);
        };

        let mut set = doc! {
            "updated_at": mongodb::bson::DateTime::from_millis(Utc::now().timestamp_millis()),
        };
        if let Some(title) = changes.title {
            set.insert("title", title);
        }
        if let Some(description) = changes.description {
            set.insert("description", description);
        }

        let updated = self
            .collection()
            .find_one_and_update(doc! { "_id": object_id }, doc! { "$set": set })
            .return_document(ReturnDocument::After)
            .await
            .context("Failed to update quiz")?;

        Ok(updated.map(QuizDocument::into_domain))
    }

    async fn delete(&self, quiz_id: &str) -> Result<bool, StoreError> {
        let Ok(object_id) = ObjectId::parse_str(quiz_id) else {
            return Ok(false);
        };

        let result = self
            .collection()
            .delete_one(doc! { "_id": object_id })
            .await
            .context("Failed to delete quiz")?;
        Ok(result.deleted_count == 1)
    }
}
