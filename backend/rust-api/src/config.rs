use serde::Deserialize;
use std::env;
use std::path::PathBuf;

/// Which persistence backend the stores are built on. `Memory` keeps
/// everything in-process and is meant for local development and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Mongo,
    Memory,
}

impl StorageBackend {
    fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "mongo" | "mongodb" => Some(Self::Mongo),
            "memory" | "in-memory" => Some(Self::Memory),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub storage_backend: StorageBackend,
    pub mongo_uri: String,
    pub mongo_database: String,
    pub redis_uri: String,
    pub jwt_secret: String,
    pub access_token_ttl_seconds: i64,
    pub refresh_token_ttl_seconds: i64,
    pub media_dir: PathBuf,
    pub ytdlp_bin: String,
    pub whisper_bin: String,
    pub whisper_model: String,
    pub whisper_use_cuda: bool,
    pub gemini_api_key: String,
    pub gemini_model: String,
    pub gemini_base_url: String,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        // Prefer the repo-root .env (two levels up), then fall back to a local one
        if dotenvy::from_path("../../.env").is_err() {
            dotenvy::dotenv().ok();
        }

        // Determine environment (defaults to dev)
        let env = env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string());

        // Build configuration from config/*.toml + ENV overrides
        let config_builder = config::Config::builder()
            // Load base config from TOML file
            .add_source(
                config::File::with_name(&format!("config/{}", env)).required(false), // Allow missing config file, fallback to ENV
            )
            // Override with environment variables (prefix: APP_)
            .add_source(config::Environment::with_prefix("APP").separator("__"));

        let settings = config_builder.build()?;

        let storage_backend = settings
            .get_string("storage.backend")
            .or_else(|_| env::var("STORAGE_BACKEND"))
            .ok()
            .and_then(|raw| {
                let parsed = StorageBackend::parse(&raw);
                if parsed.is_none() {
                    eprintln!("WARNING: Unknown STORAGE_BACKEND '{}', using mongo", raw);
                }
                parsed
            })
            .unwrap_or(StorageBackend::Mongo);

        let mongo_uri = settings
            .get_string("database.mongo_uri")
            .or_else(|_| env::var("MONGO_URI"))
            .unwrap_or_else(|_| "mongodb://localhost:27017".to_string());

        let mongo_database = settings
            .get_string("database.mongo_database")
            .or_else(|_| env::var("MONGO_DATABASE"))
            .unwrap_or_else(|_| "vidquiz".to_string());

        let redis_uri = settings
            .get_string("redis.uri")
            .or_else(|_| env::var("REDIS_URI"))
            .unwrap_or_else(|_| "redis://127.0.0.1:6379/0".to_string());

        let jwt_secret = settings
            .get_string("auth.jwt_secret")
            .or_else(|_| env::var("JWT_SECRET"))
            .unwrap_or_else(|_| {
                if env == "prod" {
                    panic!("FATAL: JWT_SECRET must be set in production!");
                }
                eprintln!("WARNING: Using default JWT_SECRET (dev mode only!)");
                "dev-secret-only-for-local-testing".to_string()
            });

        let access_token_ttl_seconds = settings
            .get_int("auth.access_token_ttl_seconds")
            .ok()
            .or_else(|| parse_env_int("JWT_ACCESS_TOKEN_TTL_SECONDS"))
            .unwrap_or(300);

        let refresh_token_ttl_seconds = settings
            .get_int("auth.refresh_token_ttl_seconds")
            .ok()
            .or_else(|| parse_env_int("JWT_REFRESH_TOKEN_TTL_SECONDS"))
            .unwrap_or(86_400);

        let media_dir = settings
            .get_string("media.dir")
            .or_else(|_| env::var("MEDIA_DIR"))
            .unwrap_or_else(|_| "media".to_string());

        let ytdlp_bin = settings
            .get_string("media.ytdlp_bin")
            .or_else(|_| env::var("YTDLP_BIN"))
            .unwrap_or_else(|_| "yt-dlp".to_string());

        let whisper_bin = settings
            .get_string("whisper.bin")
            .or_else(|_| env::var("WHISPER_BIN"))
            .unwrap_or_else(|_| "whisper".to_string());

        let whisper_model = settings
            .get_string("whisper.model")
            .or_else(|_| env::var("WHISPER_MODEL"))
            .unwrap_or_else(|_| "tiny".to_string());

        // Original convention: the flag is the literal string "1"
        let whisper_use_cuda = settings.get_bool("whisper.use_cuda").unwrap_or_else(|_| {
            env::var("WHISPER_USE_CUDA")
                .map(|v| v == "1")
                .unwrap_or(false)
        });

        let gemini_api_key = settings
            .get_string("gemini.api_key")
            .or_else(|_| env::var("GEMINI_API_KEY"))
            .unwrap_or_else(|_| {
                eprintln!("WARNING: GEMINI_API_KEY is not set; quiz generation will fail");
                String::new()
            });

        let gemini_model = settings
            .get_string("gemini.model")
            .or_else(|_| env::var("GEMINI_MODEL"))
            .unwrap_or_else(|_| "gemini-2.5-flash".to_string());

        let gemini_base_url = settings
            .get_string("gemini.base_url")
            .or_else(|_| env::var("GEMINI_BASE_URL"))
            .unwrap_or_else(|_| "https://generativelanguage.googleapis.com".to_string());

        Ok(Config {
            storage_backend,
            mongo_uri,
            mongo_database,
            redis_uri,
            jwt_secret,
            access_token_ttl_seconds,
            refresh_token_ttl_seconds,
            media_dir: PathBuf::from(media_dir),
            ytdlp_bin,
            whisper_bin,
            whisper_model,
            whisper_use_cuda,
            gemini_api_key,
            gemini_model,
            gemini_base_url,
        })
    }
}

fn parse_env_int(name: &str) -> Option<i64> {
    env::var(name).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const CONFIG_ENV_VARS: &[&str] = &[
        "APP_ENV",
        "STORAGE_BACKEND",
        "MONGO_URI",
        "MONGO_DATABASE",
        "REDIS_URI",
        "JWT_SECRET",
        "JWT_ACCESS_TOKEN_TTL_SECONDS",
        "JWT_REFRESH_TOKEN_TTL_SECONDS",
        "MEDIA_DIR",
        "YTDLP_BIN",
        "WHISPER_BIN",
        "WHISPER_MODEL",
        "WHISPER_USE_CUDA",
        "GEMINI_API_KEY",
        "GEMINI_MODEL",
        "GEMINI_BASE_URL",
    ];

    fn clear_config_env() {
        for var in CONFIG_ENV_VARS {
            env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn load_uses_defaults_when_env_is_empty() {
        clear_config_env();

        let config = Config::load().unwrap();

        assert_eq!(config.storage_backend, StorageBackend::Mongo);
        assert_eq!(config.mongo_database, "vidquiz");
        assert_eq!(config.access_token_ttl_seconds, 300);
        assert_eq!(config.refresh_token_ttl_seconds, 86_400);
        assert_eq!(config.media_dir, PathBuf::from("media"));
        assert_eq!(config.ytdlp_bin, "yt-dlp");
        assert_eq!(config.whisper_model, "tiny");
        assert!(!config.whisper_use_cuda);
        assert_eq!(config.gemini_model, "gemini-2.5-flash");
    }

    #[test]
    #[serial]
    fn load_respects_env_overrides() {
        clear_config_env();
        env::set_var("STORAGE_BACKEND", "memory");
        env::set_var("JWT_ACCESS_TOKEN_TTL_SECONDS", "120");
        env::set_var("WHISPER_USE_CUDA", "1");
        env::set_var("GEMINI_MODEL", "gemini-2.0-flash");

        let config = Config::load().unwrap();

        assert_eq!(config.storage_backend, StorageBackend::Memory);
        assert_eq!(config.access_token_ttl_seconds, 120);
        assert!(config.whisper_use_cuda);
        assert_eq!(config.gemini_model, "gemini-2.0-flash");

        clear_config_env();
    }

    #[test]
    #[serial]
    fn cuda_flag_requires_the_literal_one() {
        clear_config_env();
        env::set_var("WHISPER_USE_CUDA", "true");

        let config = Config::load().unwrap();
        assert!(!config.whisper_use_cuda);

        clear_config_env();
    }

    #[test]
    fn storage_backend_parses_known_names() {
        assert_eq!(StorageBackend::parse("mongo"), Some(StorageBackend::Mongo));
        assert_eq!(
            StorageBackend::parse("Memory"),
            Some(StorageBackend::Memory)
        );
        assert_eq!(StorageBackend::parse("postgres"), None);
    }
}
