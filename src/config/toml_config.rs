use crate::adapters::chinaz::{ChinazConfig, ChinazProvider, CHINAZ_PROVIDER, DEFAULT_CHINAZ_ENDPOINT};
use crate::adapters::http::RetryPolicy;
use crate::adapters::tianyancha::{
    TianyanchaConfig, TianyanchaProvider, DEFAULT_RECORDS_ENDPOINT, DEFAULT_SEARCH_ENDPOINT,
    TIANYANCHA_PROVIDER,
};
use crate::adapters::{FileCacheStore, MemoryCacheStore};
use crate::core::history::HistoryInference;
use crate::core::orchestrator::{LookupService, ServiceConfig};
use crate::domain::ports::{CacheStore, ProviderAdapter};
use crate::utils::error::{LookupError, Result};
use crate::utils::validation::{
    validate_non_empty_string, validate_path, validate_positive_number, validate_range,
    validate_url, Validate,
};
use chrono::TimeDelta;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

static ENV_VAR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([^}]+)\}").expect("env var pattern is a valid regex")
});

const KNOWN_PROVIDERS: &[&str] = &[CHINAZ_PROVIDER, TIANYANCHA_PROVIDER];
const MAX_TTL_DAYS: u64 = 3650;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub lookup: LookupConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// `/icp/*` 路由要求的 `AuthKey` 標頭值
    pub auth_key: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            auth_key: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_ttl_days")]
    pub ttl_days: u64,
    /// 快照檔路徑；未設定時使用記憶體快取
    pub path: Option<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_days: default_ttl_days(),
            path: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookupConfig {
    #[serde(default = "default_true")]
    pub concurrent_fanout: bool,
    /// 從上一筆快取推斷消失的域名為歷史備案
    #[serde(default)]
    pub infer_history: bool,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            concurrent_fanout: true,
            infer_history: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_format")]
    pub format: String,
    #[serde(default)]
    pub verbose: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: default_log_format(),
            verbose: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidersConfig {
    /// 優先順序，排前面的資料來源在合併時勝出
    #[serde(default = "default_provider_order")]
    pub order: Vec<String>,
    #[serde(default)]
    pub chinaz: ChinazSettings,
    #[serde(default)]
    pub tianyancha: TianyanchaSettings,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            order: default_provider_order(),
            chinaz: ChinazSettings::default(),
            tianyancha: TianyanchaSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChinazSettings {
    pub api_key: Option<String>,
    #[serde(default = "default_chinaz_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

impl Default for ChinazSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: default_chinaz_endpoint(),
            timeout_secs: default_timeout_secs(),
            retry_attempts: default_retry_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TianyanchaSettings {
    pub api_key: Option<String>,
    #[serde(default = "default_search_endpoint")]
    pub search_endpoint: String,
    #[serde(default = "default_records_endpoint")]
    pub records_endpoint: String,
    pub history_endpoint: Option<String>,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

impl Default for TianyanchaSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            search_endpoint: default_search_endpoint(),
            records_endpoint: default_records_endpoint(),
            history_endpoint: None,
            page_size: default_page_size(),
            max_pages: default_max_pages(),
            timeout_secs: default_timeout_secs(),
            retry_attempts: default_retry_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_ttl_days() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

fn default_log_format() -> String {
    "compact".to_string()
}

fn default_provider_order() -> Vec<String> {
    KNOWN_PROVIDERS.iter().map(|name| name.to_string()).collect()
}

fn default_chinaz_endpoint() -> String {
    DEFAULT_CHINAZ_ENDPOINT.to_string()
}

fn default_search_endpoint() -> String {
    DEFAULT_SEARCH_ENDPOINT.to_string()
}

fn default_records_endpoint() -> String {
    DEFAULT_RECORDS_ENDPOINT.to_string()
}

fn default_timeout_secs() -> u64 {
    8
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_page_size() -> u32 {
    10
}

fn default_max_pages() -> u32 {
    5
}

/// 空字串的金鑰視同未設定；未被替換的 `${VAR}` 也一樣
fn usable_key(key: &Option<String>) -> Option<&str> {
    key.as_deref()
        .map(str::trim)
        .filter(|key| !key.is_empty() && !ENV_VAR_PATTERN.is_match(key))
}

impl ServerConfig {
    /// 可用的 `auth_key`；空字串或未替換的 `${VAR}` 視同未設定
    pub fn usable_auth_key(&self) -> Option<&str> {
        usable_key(&self.auth_key)
    }
}

impl AppConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        // 處理環境變數替換
        let processed_content = Self::substitute_env_vars(content);

        toml::from_str(&processed_content)
            .map_err(|e| LookupError::config(format!("TOML parsing error: {}", e)))
    }

    /// 替換環境變數 (例如 ${CHINAZ_API_KEY})，找不到的變數保留原樣
    fn substitute_env_vars(content: &str) -> String {
        ENV_VAR_PATTERN
            .replace_all(content, |caps: &regex::Captures| {
                let var_name = &caps[1];
                std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
            })
            .into_owned()
    }

    pub fn service_config(&self) -> Result<ServiceConfig> {
        let ttl = i64::try_from(self.cache.ttl_days)
            .ok()
            .and_then(TimeDelta::try_days)
            .ok_or_else(|| LookupError::InvalidConfigValueError {
                field: "cache.ttl_days".to_string(),
                value: self.cache.ttl_days.to_string(),
                reason: "TTL is out of range".to_string(),
            })?;

        Ok(ServiceConfig {
            ttl,
            concurrent_fanout: self.lookup.concurrent_fanout,
            history_inference: if self.lookup.infer_history {
                HistoryInference::CarryForward
            } else {
                HistoryInference::ProviderAsserted
            },
        })
    }

    /// 依 `providers.order` 建立資料來源；沒有金鑰的資料來源略過
    pub fn build_providers(&self) -> Result<Vec<Arc<dyn ProviderAdapter>>> {
        let mut providers: Vec<Arc<dyn ProviderAdapter>> = Vec::new();

        for name in &self.providers.order {
            match name.as_str() {
                CHINAZ_PROVIDER => {
                    let settings = &self.providers.chinaz;
                    let Some(api_key) = usable_key(&settings.api_key) else {
                        tracing::warn!("⚠️ providers.chinaz.api_key is not set, chinaz disabled");
                        continue;
                    };
                    providers.push(Arc::new(ChinazProvider::new(ChinazConfig {
                        api_key: api_key.to_string(),
                        endpoint: settings.endpoint.clone(),
                        timeout: Duration::from_secs(settings.timeout_secs),
                        retry: RetryPolicy {
                            attempts: settings.retry_attempts,
                            base_delay: Duration::from_millis(settings.retry_delay_ms),
                        },
                    })?));
                }
                TIANYANCHA_PROVIDER => {
                    let settings = &self.providers.tianyancha;
                    let Some(api_key) = usable_key(&settings.api_key) else {
                        tracing::warn!(
                            "⚠️ providers.tianyancha.api_key is not set, tianyancha disabled"
                        );
                        continue;
                    };
                    providers.push(Arc::new(TianyanchaProvider::new(TianyanchaConfig {
                        api_key: api_key.to_string(),
                        search_endpoint: settings.search_endpoint.clone(),
                        records_endpoint: settings.records_endpoint.clone(),
                        history_endpoint: settings.history_endpoint.clone(),
                        page_size: settings.page_size,
                        max_pages: settings.max_pages,
                        timeout: Duration::from_secs(settings.timeout_secs),
                        retry: RetryPolicy {
                            attempts: settings.retry_attempts,
                            base_delay: Duration::from_millis(settings.retry_delay_ms),
                        },
                    })?));
                }
                other => {
                    return Err(LookupError::InvalidConfigValueError {
                        field: "providers.order".to_string(),
                        value: other.to_string(),
                        reason: format!("Unknown provider. Valid providers: {}", KNOWN_PROVIDERS.join(", ")),
                    })
                }
            }
        }

        if providers.is_empty() {
            tracing::warn!("No provider is enabled, every refresh will fail");
        }
        Ok(providers)
    }

    pub async fn build_store(&self) -> Result<Arc<dyn CacheStore>> {
        match self.cache.path.as_deref().filter(|path| !path.trim().is_empty()) {
            Some(path) => Ok(Arc::new(FileCacheStore::open(path).await?)),
            None => {
                tracing::info!("cache.path is not set, using in-memory cache");
                Ok(Arc::new(MemoryCacheStore::new()))
            }
        }
    }

    pub async fn build_service(&self) -> Result<LookupService> {
        let providers = self.build_providers()?;
        let store = self.build_store().await?;
        let service = LookupService::new(providers, store, self.service_config()?);
        tracing::info!(
            "🚀 Lookup service ready with providers [{}], ttl {} days",
            service.provider_names().join(", "),
            self.cache.ttl_days
        );
        Ok(service)
    }
}

impl Validate for AppConfig {
    fn validate(&self) -> Result<()> {
        validate_non_empty_string("server.host", &self.server.host)?;
        validate_positive_number("server.port", u64::from(self.server.port), 1)?;
        if let Some(auth_key) = &self.server.auth_key {
            if self.server.usable_auth_key().is_none() {
                return Err(LookupError::InvalidConfigValueError {
                    field: "server.auth_key".to_string(),
                    value: auth_key.clone(),
                    reason: "Key is empty or an unresolved environment variable".to_string(),
                });
            }
        }

        validate_range("cache.ttl_days", self.cache.ttl_days, 1, MAX_TTL_DAYS)?;
        if let Some(path) = &self.cache.path {
            validate_path("cache.path", path)?;
        }

        let valid_formats = ["compact", "json"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            return Err(LookupError::InvalidConfigValueError {
                field: "logging.format".to_string(),
                value: self.logging.format.clone(),
                reason: format!(
                    "Unsupported format. Valid formats: {}",
                    valid_formats.join(", ")
                ),
            });
        }

        for (index, name) in self.providers.order.iter().enumerate() {
            if !KNOWN_PROVIDERS.contains(&name.as_str()) {
                return Err(LookupError::InvalidConfigValueError {
                    field: "providers.order".to_string(),
                    value: name.clone(),
                    reason: format!("Unknown provider. Valid providers: {}", KNOWN_PROVIDERS.join(", ")),
                });
            }
            if self.providers.order[..index].contains(name) {
                return Err(LookupError::InvalidConfigValueError {
                    field: "providers.order".to_string(),
                    value: name.clone(),
                    reason: "Provider listed twice".to_string(),
                });
            }
        }

        let chinaz = &self.providers.chinaz;
        validate_url("providers.chinaz.endpoint", &chinaz.endpoint)?;
        validate_range("providers.chinaz.timeout_secs", chinaz.timeout_secs, 1, 120)?;
        validate_range("providers.chinaz.retry_attempts", chinaz.retry_attempts, 1, 10)?;

        let tianyancha = &self.providers.tianyancha;
        validate_url("providers.tianyancha.search_endpoint", &tianyancha.search_endpoint)?;
        validate_url("providers.tianyancha.records_endpoint", &tianyancha.records_endpoint)?;
        if let Some(endpoint) = &tianyancha.history_endpoint {
            validate_url("providers.tianyancha.history_endpoint", endpoint)?;
        }
        validate_range("providers.tianyancha.page_size", tianyancha.page_size, 1, 100)?;
        validate_range("providers.tianyancha.max_pages", tianyancha.max_pages, 1, 50)?;
        validate_range("providers.tianyancha.timeout_secs", tianyancha.timeout_secs, 1, 120)?;
        validate_range("providers.tianyancha.retry_attempts", tianyancha.retry_attempts, 1, 10)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    #[test]
    fn test_parse_full_toml_config() {
        let toml_content = r#"
[server]
host = "127.0.0.1"
port = 9000
auth_key = "secret"

[cache]
ttl_days = 7
path = "./data/icp-cache.json"

[lookup]
concurrent_fanout = false
infer_history = true

[logging]
format = "json"

[providers]
order = ["tianyancha", "chinaz"]

[providers.chinaz]
api_key = "cz-key"
retry_attempts = 2

[providers.tianyancha]
api_key = "tyc-key"
history_endpoint = "https://api.example.com/icp/history"
page_size = 20
"#;

        let config = AppConfig::from_toml_str(toml_content).unwrap();
        config.validate().unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.auth_key.as_deref(), Some("secret"));
        assert_eq!(config.cache.ttl_days, 7);
        assert_eq!(config.providers.order, vec!["tianyancha", "chinaz"]);
        assert_eq!(config.providers.chinaz.endpoint, DEFAULT_CHINAZ_ENDPOINT);
        assert_eq!(config.providers.tianyancha.max_pages, 5);

        let service = config.service_config().unwrap();
        assert_eq!(service.ttl, TimeDelta::days(7));
        assert!(!service.concurrent_fanout);
        assert_eq!(service.history_inference, HistoryInference::CarryForward);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = AppConfig::from_toml_str("").unwrap();
        config.validate().unwrap();

        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.cache.ttl_days, 30);
        assert!(config.cache.path.is_none());
        assert!(config.lookup.concurrent_fanout);
        assert!(!config.lookup.infer_history);
        assert_eq!(config.providers.order, vec!["chinaz", "tianyancha"]);
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("ICP_TEST_CHINAZ_KEY", "from-env");

        let toml_content = r#"
[providers.chinaz]
api_key = "${ICP_TEST_CHINAZ_KEY}"

[providers.tianyancha]
api_key = "${ICP_TEST_UNSET_KEY}"
"#;

        let config = AppConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(config.providers.chinaz.api_key.as_deref(), Some("from-env"));
        assert_eq!(
            config.providers.tianyancha.api_key.as_deref(),
            Some("${ICP_TEST_UNSET_KEY}")
        );

        // 未替換的變數不算金鑰
        let providers = config.build_providers().unwrap();
        assert_eq!(providers.len(), 1);
        assert_eq!(providers[0].name(), CHINAZ_PROVIDER);

        std::env::remove_var("ICP_TEST_CHINAZ_KEY");
    }

    #[test]
    fn test_unresolved_auth_key_is_rejected() {
        let config =
            AppConfig::from_toml_str("[server]\nauth_key = \"${ICP_TEST_UNSET_AUTH_KEY}\"\n").unwrap();
        assert_eq!(
            config.server.auth_key.as_deref(),
            Some("${ICP_TEST_UNSET_AUTH_KEY}")
        );
        assert_eq!(config.server.usable_auth_key(), None);
        assert!(matches!(
            config.validate(),
            Err(LookupError::InvalidConfigValueError { ref field, .. }) if field == "server.auth_key"
        ));

        let blank = AppConfig::from_toml_str("[server]\nauth_key = \"  \"\n").unwrap();
        assert!(blank.validate().is_err());

        let set = AppConfig::from_toml_str("[server]\nauth_key = \"k-123\"\n").unwrap();
        set.validate().unwrap();
        assert_eq!(set.server.usable_auth_key(), Some("k-123"));
    }

    #[test]
    fn test_config_validation() {
        let bad_endpoint = AppConfig::from_toml_str(
            r#"
[providers.chinaz]
endpoint = "invalid-url"
"#,
        )
        .unwrap();
        assert!(bad_endpoint.validate().is_err());

        let unknown_provider = AppConfig::from_toml_str(
            r#"
[providers]
order = ["chinaz", "icp-ninja"]
"#,
        )
        .unwrap();
        assert!(matches!(
            unknown_provider.validate(),
            Err(LookupError::InvalidConfigValueError { .. })
        ));
        assert!(unknown_provider.build_providers().is_err());

        let duplicated = AppConfig::from_toml_str(
            r#"
[providers]
order = ["chinaz", "chinaz"]
"#,
        )
        .unwrap();
        assert!(duplicated.validate().is_err());

        let zero_ttl = AppConfig::from_toml_str("[cache]\nttl_days = 0\n").unwrap();
        assert!(zero_ttl.validate().is_err());

        let huge_ttl = AppConfig::from_toml_str("[cache]\nttl_days = 200000000000000\n").unwrap();
        assert!(huge_ttl.validate().is_err());
        assert!(matches!(
            huge_ttl.service_config(),
            Err(LookupError::InvalidConfigValueError { .. })
        ));

        let bad_format = AppConfig::from_toml_str("[logging]\nformat = \"xml\"\n").unwrap();
        assert!(bad_format.validate().is_err());
    }

    #[test]
    fn test_providers_follow_order_and_skip_missing_keys() {
        let config = AppConfig::from_toml_str(
            r#"
[providers]
order = ["tianyancha", "chinaz"]

[providers.chinaz]
api_key = "cz"

[providers.tianyancha]
api_key = "tyc"
"#,
        )
        .unwrap();
        let names: Vec<String> = config
            .build_providers()
            .unwrap()
            .iter()
            .map(|p| p.name().to_string())
            .collect();
        assert_eq!(names, vec!["tianyancha", "chinaz"]);

        let no_keys = AppConfig::default();
        assert!(no_keys.build_providers().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_build_file_store() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        let mut config = AppConfig::default();
        config.cache.path = Some(path.to_string_lossy().into_owned());

        let store = config.build_store().await.unwrap();
        assert_eq!(store.stats().await.unwrap().cache_entries, 0);
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(b"[server]\nport = 8123\nauth_key = \"k\"\n")
            .unwrap();

        let config = AppConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.server.port, 8123);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = AppConfig::from_file("/definitely/not/here/icp.toml");
        assert!(matches!(result, Err(LookupError::IoError(_))));
    }
}
