use crate::adapters::http::{ProviderHttp, RetryPolicy};
use crate::adapters::parse::{is_superseded, parse_timestamp, text_field};
use crate::domain::model::{ProviderOutcome, ProviderResult};
use crate::domain::ports::{ProviderAdapter, ProviderCall};
use crate::utils::error::{ProviderError, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

pub const CHINAZ_PROVIDER: &str = "chinaz";
pub const DEFAULT_CHINAZ_ENDPOINT: &str = "http://openapiu67.chinaz.net/v1/1001/sponsorunit";

const AUTH_MARKERS: &[&str] = &["key", "密钥", "密鑰", "权限", "權限", "未授权"];
const QUOTA_MARKERS: &[&str] = &["次数", "次數", "余额", "餘額", "频繁", "頻繁", "上限"];

#[derive(Debug, Clone)]
pub struct ChinazConfig {
    pub api_key: String,
    pub endpoint: String,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl ChinazConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            endpoint: DEFAULT_CHINAZ_ENDPOINT.to_string(),
            timeout: Duration::from_secs(8),
            retry: RetryPolicy::default(),
        }
    }
}

/// 站長之家備案 API：單次呼叫即回傳備案記錄
///
/// 企業名稱與域名共用同一個 `sponsorunit` 端點；沒有歷史備案查詢。
pub struct ChinazProvider {
    http: ProviderHttp,
    config: ChinazConfig,
}

impl ChinazProvider {
    pub fn new(config: ChinazConfig) -> Result<Self> {
        Ok(Self {
            http: ProviderHttp::new(config.timeout)?,
            config,
        })
    }

    async fn query(&self, term: &str, query_type: &str) -> ProviderCall {
        let label = format!("chinaz {} query '{}'", query_type, term);
        let results = self.config.retry.run(&label, move || self.fetch(term)).await?;
        tracing::info!("{} returned {} records", label, results.len());
        Ok(ProviderOutcome::Records(results))
    }

    async fn fetch(&self, term: &str) -> std::result::Result<Vec<ProviderResult>, ProviderError> {
        let body = self
            .http
            .get_json(
                &self.config.endpoint,
                &[
                    ("companyname", term),
                    ("APIKey", self.config.api_key.as_str()),
                    ("ChinazVer", "1.0"),
                ],
                &[],
            )
            .await?;

        let reason = text_field(&body, &["Reason"]);
        match body.get("StateCode").and_then(Value::as_i64) {
            Some(1) => parse_records(&body),
            // 上游暫時異常，值得重試
            Some(-1) => Err(ProviderError::transient(format!("StateCode -1: {}", reason))),
            Some(code) => Err(classify_state_code(code, reason)),
            None => Err(ProviderError::malformed("response has no StateCode")),
        }
    }
}

fn parse_records(body: &Value) -> std::result::Result<Vec<ProviderResult>, ProviderError> {
    let items = match body.get("Result") {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(items)) => items,
        // 單筆結果有時直接回傳物件
        Some(item @ Value::Object(_)) => std::slice::from_ref(item),
        Some(other) => {
            return Err(ProviderError::malformed(format!(
                "unexpected Result type: {}",
                other
            )))
        }
    };

    Ok(items
        .iter()
        .map(|item| ProviderResult {
            provider: CHINAZ_PROVIDER.to_string(),
            entity_name: text_field(item, &["UnitName", "CompanyName"]),
            domain: text_field(item, &["Domain", "SiteDomain"]),
            license_number: text_field(item, &["ServiceLicence", "SiteLicense"]),
            last_update: item.get("VerifyTime").and_then(parse_timestamp),
            superseded: is_superseded(item),
        })
        .collect())
}

/// 非 1/-1 的狀態碼依 Reason 文字判斷是否為憑證或額度問題
fn classify_state_code(code: i64, reason: String) -> ProviderError {
    let lowered = reason.to_lowercase();
    if AUTH_MARKERS.iter().any(|marker| lowered.contains(marker)) {
        ProviderError::Auth {
            message: format!("StateCode {}: {}", code, reason),
        }
    } else if QUOTA_MARKERS.iter().any(|marker| lowered.contains(marker)) {
        ProviderError::RateLimited {
            message: format!("StateCode {}: {}", code, reason),
        }
    } else {
        ProviderError::Rejected {
            code,
            message: reason,
        }
    }
}

#[async_trait]
impl ProviderAdapter for ChinazProvider {
    fn name(&self) -> &str {
        CHINAZ_PROVIDER
    }

    async fn search_by_entity(&self, name: &str) -> ProviderCall {
        self.query(name, "entity").await
    }

    async fn search_by_domain(&self, domain: &str) -> ProviderCall {
        self.query(domain, "domain").await
    }

    async fn search_history(&self, _name: &str) -> ProviderCall {
        Ok(ProviderOutcome::Unsupported)
    }
}
