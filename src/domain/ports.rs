use crate::domain::model::{CacheEntry, CacheStats, ProviderOutcome, QueryKey};
use crate::utils::error::{ProviderError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub type ProviderCall = std::result::Result<ProviderOutcome, ProviderError>;

/// 外部備案資料來源的統一介面
///
/// 不支援的能力回傳 [`ProviderOutcome::Unsupported`]，而不是錯誤。
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn name(&self) -> &str;
    async fn search_by_entity(&self, name: &str) -> ProviderCall;
    async fn search_by_domain(&self, domain: &str) -> ProviderCall;
    async fn search_history(&self, name: &str) -> ProviderCall;
}

/// 以查詢鍵為主鍵的快取存儲；`upsert` 必須對單一鍵是原子的
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &QueryKey) -> Result<Option<CacheEntry>>;
    async fn upsert(&self, entry: CacheEntry) -> Result<()>;
    async fn stats(&self) -> Result<CacheStats>;
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
