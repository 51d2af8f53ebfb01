use crate::domain::model::FilingRecord;
use thiserror::Error;

/// 單一資料來源呼叫失敗的原因
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("credential rejected: {message}")]
    Auth { message: String },

    #[error("quota exhausted: {message}")]
    RateLimited { message: String },

    #[error("request timed out after {attempts} attempt(s)")]
    Timeout { attempts: u32 },

    #[error("transient upstream failure: {message}")]
    Transient { message: String },

    #[error("no entity matches '{query}'")]
    NotFound { query: String },

    #[error("request rejected by provider (code {code}): {message}")]
    Rejected { code: i64, message: String },

    #[error("malformed provider response: {message}")]
    Malformed { message: String },
}

impl ProviderError {
    /// 只有網路/5xx 類的暫時性錯誤才值得重試
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Transient { .. })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Auth { .. } => "PROVIDER_AUTH_ERROR",
            Self::RateLimited { .. } => "PROVIDER_RATE_LIMITED",
            Self::Timeout { .. } => "PROVIDER_TIMEOUT",
            Self::Transient { .. } => "PROVIDER_TRANSIENT",
            Self::NotFound { .. } => "PROVIDER_NOT_FOUND",
            Self::Rejected { .. } => "PROVIDER_REJECTED",
            Self::Malformed { .. } => "PROVIDER_MALFORMED",
        }
    }

    pub(crate) fn transient(message: impl Into<String>) -> Self {
        Self::Transient {
            message: message.into(),
        }
    }

    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed {
            message: message.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum LookupError {
    #[error("Validation error: {message}")]
    ValidationError { message: String },

    #[error("All providers unavailable: {}", summarize(.failures))]
    ProviderUnavailable { failures: Vec<(String, ProviderError)> },

    #[error("Cache write failed: {message}")]
    CacheWriteError {
        message: String,
        records: Vec<FilingRecord>,
    },

    #[error("Cache read failed: {message}")]
    CacheReadError { message: String },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid configuration value for {field}: {value} ({reason})")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing configuration field: {field}")]
    MissingConfigError { field: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpClientError(#[from] reqwest::Error),
}

fn summarize(failures: &[(String, ProviderError)]) -> String {
    if failures.is_empty() {
        return "no configured provider supports this query".to_string();
    }
    failures
        .iter()
        .map(|(provider, err)| format!("{}: {}", provider, err))
        .collect::<Vec<_>>()
        .join("; ")
}

impl LookupError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    /// 回應信封中的 status 欄位
    pub fn status_code(&self) -> i32 {
        match self {
            Self::ValidationError { .. } => 1,
            Self::ProviderUnavailable { .. } => 2,
            Self::CacheWriteError { .. } => 3,
            _ => 4,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::ValidationError { .. } => "VALIDATION_ERROR",
            Self::ProviderUnavailable { .. } => "PROVIDER_UNAVAILABLE",
            Self::CacheWriteError { .. } => "CACHE_WRITE_ERROR",
            Self::CacheReadError { .. } => "CACHE_READ_ERROR",
            Self::ConfigError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::MissingConfigError { .. } => "CONFIG_ERROR",
            Self::IoError(_) | Self::SerializationError(_) | Self::HttpClientError(_) => {
                "INTERNAL_ERROR"
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, LookupError>;
