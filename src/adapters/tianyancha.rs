use crate::adapters::http::{ProviderHttp, RetryPolicy};
use crate::adapters::parse::{is_superseded, parse_timestamp, text_field};
use crate::domain::model::{ProviderOutcome, ProviderResult};
use crate::domain::ports::{ProviderAdapter, ProviderCall};
use crate::utils::error::{ProviderError, Result};
use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;
use std::time::Duration;

pub const TIANYANCHA_PROVIDER: &str = "tianyancha";
pub const DEFAULT_SEARCH_ENDPOINT: &str = "http://open.api.tianyancha.com/services/open/search/2.0";
pub const DEFAULT_RECORDS_ENDPOINT: &str =
    "https://api9.tianyancha.com/cloud-intellectual-property/intellectualProperty/icpRecordList";

const SEARCH_PAGE_SIZE: &str = "20";

static HIGHLIGHT_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"</?em>").expect("highlight pattern is a valid regex"));

#[derive(Debug, Clone)]
pub struct TianyanchaConfig {
    pub api_key: String,
    pub search_endpoint: String,
    pub records_endpoint: String,
    /// 沒設定時不支援歷史備案查詢
    pub history_endpoint: Option<String>,
    pub page_size: u32,
    pub max_pages: u32,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl TianyanchaConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            search_endpoint: DEFAULT_SEARCH_ENDPOINT.to_string(),
            records_endpoint: DEFAULT_RECORDS_ENDPOINT.to_string(),
            history_endpoint: None,
            page_size: 10,
            max_pages: 5,
            timeout: Duration::from_secs(8),
            retry: RetryPolicy::default(),
        }
    }
}

/// 天眼查：先用企業名稱換到企業 id，再以 id 分頁抓備案記錄
pub struct TianyanchaProvider {
    http: ProviderHttp,
    config: TianyanchaConfig,
}

impl TianyanchaProvider {
    pub fn new(config: TianyanchaConfig) -> Result<Self> {
        Ok(Self {
            http: ProviderHttp::new(config.timeout)?,
            config,
        })
    }

    fn auth_header(&self) -> [(&str, &str); 1] {
        [("Authorization", self.config.api_key.as_str())]
    }

    async fn two_step(&self, name: &str, endpoint: &str, superseded: bool) -> ProviderCall {
        let label = format!("tianyancha resolve '{}'", name);
        let company_id = self.config.retry.run(&label, move || self.resolve(name)).await?;
        tracing::debug!("tianyancha resolved '{}' to id {}", name, company_id);

        let mut results = Vec::new();
        for page in 1..=self.config.max_pages.max(1) {
            let label = format!("tianyancha records for '{}' page {}", name, page);
            let company_id = company_id.as_str();
            let items = self
                .config
                .retry
                .run(&label, move || self.fetch_page(endpoint, company_id, page))
                .await?;

            let count = items.len();
            results.extend(
                items
                    .iter()
                    .map(|item| to_result(item, name, superseded)),
            );

            if count < self.config.page_size as usize {
                break;
            }
            if page == self.config.max_pages {
                tracing::warn!(
                    "tianyancha records for '{}' truncated at {} pages",
                    name,
                    self.config.max_pages
                );
            }
        }

        tracing::info!("tianyancha returned {} records for '{}'", results.len(), name);
        Ok(ProviderOutcome::Records(results))
    }

    /// 第一步：名稱完全相符的企業 id
    async fn resolve(&self, name: &str) -> std::result::Result<String, ProviderError> {
        let body = self
            .http
            .get_json(
                &self.config.search_endpoint,
                &[("word", name), ("pageSize", SEARCH_PAGE_SIZE), ("pageNum", "1")],
                &self.auth_header(),
            )
            .await?;

        let code = body.get("error_code").and_then(Value::as_i64).unwrap_or(0);
        match code {
            0 => {}
            300000 => {
                return Err(ProviderError::NotFound {
                    query: name.to_string(),
                })
            }
            code => return Err(classify_error_code(code, text_field(&body, &["reason"]))),
        }

        let items = body
            .pointer("/result/items")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();

        items
            .iter()
            .find(|item| strip_highlight(&text_field(item, &["name"])) == name)
            .map(|item| text_field(item, &["id"]))
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ProviderError::NotFound {
                query: name.to_string(),
            })
    }

    /// 第二步：單頁備案記錄
    async fn fetch_page(
        &self,
        endpoint: &str,
        company_id: &str,
        page: u32,
    ) -> std::result::Result<Vec<Value>, ProviderError> {
        let page_num = page.to_string();
        let page_size = self.config.page_size.to_string();
        let body = self
            .http
            .get_json(
                endpoint,
                &[
                    ("id", company_id),
                    ("pageNum", page_num.as_str()),
                    ("pageSize", page_size.as_str()),
                ],
                &self.auth_header(),
            )
            .await?;

        let code = body
            .get("errorCode")
            .or_else(|| body.get("error_code"))
            .and_then(Value::as_i64)
            .unwrap_or(0);
        if code != 0 {
            return Err(classify_error_code(
                code,
                text_field(&body, &["message", "reason"]),
            ));
        }
        if let Some(state) = body.get("state").and_then(Value::as_str) {
            if state != "ok" {
                return Err(ProviderError::transient(format!("state {}", state)));
            }
        }

        match body.pointer("/data/item") {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::Array(items)) => Ok(items.clone()),
            Some(other) => Err(ProviderError::malformed(format!(
                "unexpected data.item type: {}",
                other
            ))),
        }
    }
}

fn to_result(item: &Value, queried_name: &str, superseded: bool) -> ProviderResult {
    let entity_name = match text_field(item, &["companyName"]) {
        name if name.is_empty() => queried_name.to_string(),
        name => name,
    };
    ProviderResult {
        provider: TIANYANCHA_PROVIDER.to_string(),
        entity_name,
        domain: text_field(item, &["ym"]),
        license_number: text_field(item, &["liscense", "license"]),
        last_update: item.get("examineDate").and_then(parse_timestamp),
        superseded: superseded || is_superseded(item),
    }
}

pub fn strip_highlight(name: &str) -> String {
    HIGHLIGHT_TAG.replace_all(name, "").trim().to_string()
}

pub fn classify_error_code(code: i64, reason: String) -> ProviderError {
    match code {
        300002 | 300003 | 300005 | 300009 | 300011 => ProviderError::Auth {
            message: format!("error_code {}: {}", code, reason),
        },
        300004 | 300006 | 300007 => ProviderError::RateLimited {
            message: format!("error_code {}: {}", code, reason),
        },
        300001 => ProviderError::transient(format!("error_code {}: {}", code, reason)),
        code => ProviderError::Rejected {
            code,
            message: reason,
        },
    }
}

#[async_trait]
impl ProviderAdapter for TianyanchaProvider {
    fn name(&self) -> &str {
        TIANYANCHA_PROVIDER
    }

    async fn search_by_entity(&self, name: &str) -> ProviderCall {
        self.two_step(name, &self.config.records_endpoint, false).await
    }

    async fn search_by_domain(&self, _domain: &str) -> ProviderCall {
        Ok(ProviderOutcome::Unsupported)
    }

    async fn search_history(&self, name: &str) -> ProviderCall {
        match &self.config.history_endpoint {
            Some(endpoint) => self.two_step(name, endpoint, true).await,
            None => Ok(ProviderOutcome::Unsupported),
        }
    }
}
