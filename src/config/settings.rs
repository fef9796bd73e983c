use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::config::env::{self, EnvKey};
use crate::media::profile::WebmInput;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StorageConfig {
    Local {
        root: PathBuf,
        public_base_url: String,
    },
    S3 {
        endpoint: String,
        bucket: String,
        access_key: String,
        secret_key: String,
    },
}

#[derive(Clone, Debug, Deserialize)]
pub struct TranscodeConfig {
    pub work_dir: PathBuf,
    pub output_prefix: String,
    pub ffmpeg_path: String,
    pub ffprobe_path: String,
    pub max_concurrent_encodes: usize,
    pub task_timeout: Option<Duration>,
    pub parallel_renditions: bool,
    pub purge_source: bool,
    pub webm_input: WebmInput,
}

impl Default for TranscodeConfig {
    fn default() -> Self {
        Self {
            work_dir: std::env::temp_dir().join("transcoder"),
            output_prefix: "videos".to_string(),
            ffmpeg_path: "ffmpeg".to_string(),
            ffprobe_path: "ffprobe".to_string(),
            max_concurrent_encodes: default_encode_slots(),
            task_timeout: None,
            parallel_renditions: false,
            purge_source: false,
            webm_input: WebmInput::Source,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    pub server_port: u16,
    pub storage: StorageConfig,
    pub transcode: TranscodeConfig,
    pub upload_max_bytes: usize,
}

impl AppConfig {
    pub fn new() -> Result<Self, ConfigError> {
        Ok(Self {
            server_port: env::get_parsed(EnvKey::ServerPort, 3000),
            storage: Self::storage_from_env()?,
            transcode: Self::transcode_from_env(),
            upload_max_bytes: env::get_parsed(EnvKey::UploadMaxBytes, 2 * 1024 * 1024 * 1024),
        })
    }

    fn storage_from_env() -> Result<StorageConfig, ConfigError> {
        let backend = env::get_or(EnvKey::StorageBackend, "local");
        match backend.to_ascii_lowercase().as_str() {
            "local" => Ok(StorageConfig::Local {
                root: PathBuf::from(env::get_or(EnvKey::StorageLocalRoot, "uploads")),
                public_base_url: env::get_or(EnvKey::PublicBaseUrl, "http://localhost:3000/files"),
            }),
            "s3" => Ok(StorageConfig::S3 {
                endpoint: required(EnvKey::MinioUrl)?,
                bucket: required(EnvKey::MinioBucket)?,
                access_key: required(EnvKey::MinioAccessKey)?,
                secret_key: required(EnvKey::MinioSecretKey)?,
            }),
            _ => Err(ConfigError::Invalid {
                key: EnvKey::StorageBackend.as_str(),
                value: backend,
            }),
        }
    }

    fn transcode_from_env() -> TranscodeConfig {
        let defaults = TranscodeConfig::default();
        TranscodeConfig {
            work_dir: env::get_optional::<String>(EnvKey::WorkDir)
                .map(PathBuf::from)
                .unwrap_or(defaults.work_dir),
            output_prefix: env::get_or(EnvKey::OutputPrefix, &defaults.output_prefix),
            ffmpeg_path: env::get_or(EnvKey::FfmpegPath, &defaults.ffmpeg_path),
            ffprobe_path: env::get_or(EnvKey::FfprobePath, &defaults.ffprobe_path),
            max_concurrent_encodes: env::get_parsed(
                EnvKey::MaxConcurrentEncodes,
                defaults.max_concurrent_encodes,
            )
            .max(1),
            task_timeout: env::get_optional::<u64>(EnvKey::TaskTimeoutSecs)
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
            parallel_renditions: env::get_parsed(EnvKey::ParallelRenditions, false),
            purge_source: env::get_parsed(EnvKey::PurgeSource, false),
            webm_input: match env::get_or(EnvKey::WebmInput, "source").as_str() {
                "chain_from_mp4" => WebmInput::ChainFromMp4,
                _ => WebmInput::Source,
            },
        }
    }
}

fn required(key: EnvKey) -> Result<String, ConfigError> {
    let name = key.as_str();
    env::get(key).map_err(|_| ConfigError::Missing(name))
}

fn default_encode_slots() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(2)
}
