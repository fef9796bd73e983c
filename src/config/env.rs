use std::env;
use std::str::FromStr;

pub enum EnvKey {
    ServerPort,
    StorageBackend,
    StorageLocalRoot,
    PublicBaseUrl,
    MinioUrl,
    MinioBucket,
    MinioAccessKey,
    MinioSecretKey,
    WorkDir,
    OutputPrefix,
    FfmpegPath,
    FfprobePath,
    MaxConcurrentEncodes,
    TaskTimeoutSecs,
    ParallelRenditions,
    PurgeSource,
    WebmInput,
    UploadMaxBytes,
}

impl EnvKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvKey::ServerPort => "APP_PORT",
            EnvKey::StorageBackend => "STORAGE_BACKEND",
            EnvKey::StorageLocalRoot => "STORAGE_LOCAL_ROOT",
            EnvKey::PublicBaseUrl => "PUBLIC_BASE_URL",
            EnvKey::MinioUrl => "MINIO_ENDPOINT",
            EnvKey::MinioBucket => "MINIO_BUCKET_VIDEOS",
            EnvKey::MinioAccessKey => "AWS_ACCESS_KEY_ID",
            EnvKey::MinioSecretKey => "AWS_SECRET_ACCESS_KEY",
            EnvKey::WorkDir => "TRANSCODE_WORK_DIR",
            EnvKey::OutputPrefix => "TRANSCODE_OUTPUT_PREFIX",
            EnvKey::FfmpegPath => "FFMPEG_PATH",
            EnvKey::FfprobePath => "FFPROBE_PATH",
            EnvKey::MaxConcurrentEncodes => "TRANSCODE_MAX_CONCURRENT_ENCODES",
            EnvKey::TaskTimeoutSecs => "TRANSCODE_TASK_TIMEOUT_SECS",
            EnvKey::ParallelRenditions => "TRANSCODE_PARALLEL_RENDITIONS",
            EnvKey::PurgeSource => "TRANSCODE_PURGE_SOURCE",
            EnvKey::WebmInput => "TRANSCODE_WEBM_INPUT",
            EnvKey::UploadMaxBytes => "UPLOAD_MAX_BYTES",
        }
    }
}

pub fn get(key: EnvKey) -> Result<String, env::VarError> {
    env::var(key.as_str())
}

pub fn get_or(key: EnvKey, default: &str) -> String {
    env::var(key.as_str()).unwrap_or_else(|_| default.to_string())
}

pub fn get_parsed<T: FromStr>(key: EnvKey, default: T) -> T {
    match get(key) {
        Ok(val) => val.parse::<T>().unwrap_or(default),
        Err(_) => default,
    }
}

/// Like `get_parsed`, but an unset or unparsable value yields `None`.
pub fn get_optional<T: FromStr>(key: EnvKey) -> Option<T> {
    get(key).ok().and_then(|val| val.parse::<T>().ok())
}
