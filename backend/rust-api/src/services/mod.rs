use std::sync::Arc;

use mongodb::Client as MongoClient;
use redis::aio::ConnectionManager;

use crate::config::{Config, StorageBackend};
use crate::services::media_downloader::YtDlpDownloader;
use crate::services::quiz_generator::GeminiGenerator;
use crate::services::quiz_pipeline::QuizPipeline;
use crate::services::transcriber::WhisperTranscriber;
use crate::store::memory::{MemoryQuizStore, MemoryTokenBlacklist, MemoryUserStore};
use crate::store::mongo::{ensure_indexes, MongoQuizStore, MongoUserStore};
use crate::store::redis::RedisTokenBlacklist;
use crate::store::{QuizStore, TokenBlacklist, UserStore};

/// Everything the handlers share: configuration, the persistence seams and
/// the generation pipeline. Stores are trait objects so the Mongo/Redis
/// wiring and the in-memory wiring are interchangeable.
pub struct AppState {
    pub config: Config,
    pub users: Arc<dyn UserStore>,
    pub quizzes: Arc<dyn QuizStore>,
    pub blacklist: Arc<dyn TokenBlacklist>,
    pub pipeline: Arc<QuizPipeline>,
}

impl AppState {
    /// Wires stores and the generation pipeline for the configured backend.
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let (users, quizzes, blacklist): (
            Arc<dyn UserStore>,
            Arc<dyn QuizStore>,
            Arc<dyn TokenBlacklist>,
        ) = match config.storage_backend {
            StorageBackend::Mongo => {
                let client = MongoClient::with_uri_str(&config.mongo_uri).await?;
                let db = client.database(&config.mongo_database);
                ensure_indexes(&db).await?;

                tracing::info!("Attempting to connect to Redis...");

                let redis_client = redis::Client::open(config.redis_uri.as_str())?;
                let redis = tokio::time::timeout(
                    std::time::Duration::from_secs(30),
                    ConnectionManager::new(redis_client),
                )
                .await
                .map_err(|_| anyhow::anyhow!("Redis connection timeout after 30s"))??;

                let mut conn = redis.clone();
                tokio::time::timeout(
                    std::time::Duration::from_secs(5),
                    redis::cmd("PING").query_async::<String>(&mut conn),
                )
                .await
                .map_err(|_| anyhow::anyhow!("Redis PING timeout after 5s"))??;

                tracing::info!("Redis connection established successfully");

                (
                    Arc::new(MongoUserStore::new(db.clone())) as Arc<dyn UserStore>,
                    Arc::new(MongoQuizStore::new(db)) as Arc<dyn QuizStore>,
                    Arc::new(RedisTokenBlacklist::new(redis)) as Arc<dyn TokenBlacklist>,
                )
            }
            StorageBackend::Memory => {
                tracing::warn!("Using in-memory storage; all data is lost on restart");
                (
                    Arc::new(MemoryUserStore::new()) as Arc<dyn UserStore>,
                    Arc::new(MemoryQuizStore::new()) as Arc<dyn QuizStore>,
                    Arc::new(MemoryTokenBlacklist::new()) as Arc<dyn TokenBlacklist>,
                )
            }
        };

        let pipeline = Arc::new(QuizPipeline::new(
            Arc::new(YtDlpDownloader::new(&config.ytdlp_bin)),
            Arc::new(WhisperTranscriber::new(
                &config.whisper_bin,
                &config.whisper_model,
                config.whisper_use_cuda,
            )),
            Arc::new(GeminiGenerator::new(
                &config.gemini_api_key,
                &config.gemini_model,
                &config.gemini_base_url,
            )?),
            config.media_dir.clone(),
        ));

        Ok(Self {
            config,
            users,
            quizzes,
            blacklist,
            pipeline,
        })
    }

    /// Assembles a state from explicit parts. Tests use this to swap in stub
    /// pipeline stages and in-memory stores.
    pub fn with_components(
        config: Config,
        users: Arc<dyn UserStore>,
        quizzes: Arc<dyn QuizStore>,
        blacklist: Arc<dyn TokenBlacklist>,
        pipeline: Arc<QuizPipeline>,
    ) -> Self {
        Self {
            config,
            users,
            quizzes,
            blacklist,
            pipeline,
        }
    }
}

pub mod auth_service;
pub mod media_downloader;
pub mod quiz_generator;
pub mod quiz_pipeline;
pub mod quiz_service;
pub mod transcriber;
