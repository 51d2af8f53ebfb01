use crate::utils::error::{ProviderError, Result};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::future::Future;
use std::time::Duration;

const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// 暫時性錯誤的重試策略：總共嘗試 `attempts` 次，間隔指數成長
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(MAX_BACKOFF)
    }

    pub async fn run<T, F, Fut>(&self, label: &str, mut operation: F) -> std::result::Result<T, ProviderError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, ProviderError>>,
    {
        let attempts = self.attempts.max(1);
        let mut attempt = 1;

        loop {
            tracing::debug!("{}: attempt {}/{}", label, attempt, attempts);
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < attempts => {
                    let delay = self.delay_for(attempt);
                    tracing::warn!(
                        "{}: attempt {}/{} failed ({}), retrying in {:?}",
                        label,
                        attempt,
                        attempts,
                        err,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(ProviderError::Timeout { .. }) => {
                    return Err(ProviderError::Timeout { attempts: attempt })
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// 帶逾時的 JSON GET 呼叫，並把 HTTP 層錯誤分類成 [`ProviderError`]
#[derive(Debug, Clone)]
pub struct ProviderHttp {
    client: Client,
}

impl ProviderHttp {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("icp-lookup/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }

    pub async fn get_json(
        &self,
        url: &str,
        query: &[(&str, &str)],
        headers: &[(&str, &str)],
    ) -> std::result::Result<Value, ProviderError> {
        let mut request = self.client.get(url).query(query);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }

        let response = request.send().await.map_err(classify_transport_error)?;
        let status = response.status();
        tracing::debug!("GET {} -> {}", url, status);

        if !status.is_success() {
            return Err(classify_status(status));
        }

        let body = response.bytes().await.map_err(classify_transport_error)?;
        serde_json::from_slice(&body)
            .map_err(|e| ProviderError::malformed(format!("invalid JSON body: {}", e)))
    }
}

pub fn classify_status(status: StatusCode) -> ProviderError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ProviderError::Auth {
            message: format!("HTTP {}", status),
        },
        StatusCode::TOO_MANY_REQUESTS => ProviderError::RateLimited {
            message: format!("HTTP {}", status),
        },
        StatusCode::REQUEST_TIMEOUT => ProviderError::transient(format!("HTTP {}", status)),
        status if status.is_server_error() => ProviderError::transient(format!("HTTP {}", status)),
        status => ProviderError::Rejected {
            code: i64::from(status.as_u16()),
            message: format!("HTTP {}", status),
        },
    }
}

fn classify_transport_error(err: reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Timeout { attempts: 1 }
    } else if err.is_decode() {
        ProviderError::malformed(err.to_string())
    } else {
        ProviderError::transient(err.to_string())
    }
}
