#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use icp_lookup::adapters::MemoryCacheStore;
use icp_lookup::domain::model::{CacheEntry, CacheStats, ProviderOutcome, ProviderResult, QueryKey};
use icp_lookup::domain::ports::{CacheStore, Clock, ProviderAdapter, ProviderCall};
use icp_lookup::utils::error::{LookupError, ProviderError, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const BAIDU: &str = "北京百度网讯科技有限公司";

pub fn result(provider: &str, entity: &str, domain: &str, license: &str) -> ProviderResult {
    ProviderResult {
        provider: provider.to_string(),
        entity_name: entity.to_string(),
        domain: domain.to_string(),
        license_number: license.to_string(),
        last_update: Some(Utc.with_ymd_and_hms(2023, 3, 1, 0, 0, 0).unwrap()),
        superseded: false,
    }
}

pub fn undated(provider: &str, entity: &str, domain: &str, license: &str) -> ProviderResult {
    ProviderResult {
        last_update: None,
        ..result(provider, entity, domain, license)
    }
}

pub fn superseded(provider: &str, entity: &str, domain: &str, license: &str) -> ProviderResult {
    ProviderResult {
        superseded: true,
        ..result(provider, entity, domain, license)
    }
}

/// 各能力的預設回應
#[derive(Clone)]
pub enum Reply {
    Records(Vec<ProviderResult>),
    Unsupported,
    Fail(ProviderError),
}

impl Reply {
    fn to_call(&self) -> ProviderCall {
        match self {
            Reply::Records(records) => Ok(ProviderOutcome::Records(records.clone())),
            Reply::Unsupported => Ok(ProviderOutcome::Unsupported),
            Reply::Fail(err) => Err(err.clone()),
        }
    }
}

/// 可設定回應、記錄呼叫次數的測試用資料來源
pub struct MockProvider {
    name: String,
    entity: Mutex<Reply>,
    history: Mutex<Reply>,
    domains: Mutex<HashMap<String, Reply>>,
    other_domains: Reply,
    delay: Duration,
    calls: AtomicUsize,
    order_log: Option<Arc<Mutex<Vec<String>>>>,
}

impl MockProvider {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            entity: Mutex::new(Reply::Records(Vec::new())),
            history: Mutex::new(Reply::Unsupported),
            domains: Mutex::new(HashMap::new()),
            other_domains: Reply::Records(Vec::new()),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            order_log: None,
        }
    }

    pub fn with_entity(self, reply: Reply) -> Self {
        *self.entity.lock().unwrap() = reply;
        self
    }

    pub fn with_history(self, reply: Reply) -> Self {
        *self.history.lock().unwrap() = reply;
        self
    }

    pub fn with_domain(self, domain: &str, reply: Reply) -> Self {
        self.domains.lock().unwrap().insert(domain.to_string(), reply);
        self
    }

    /// 沒有個別設定的域名用這個回應
    pub fn with_other_domains(mut self, reply: Reply) -> Self {
        self.other_domains = reply;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_order_log(mut self, log: Arc<Mutex<Vec<String>>>) -> Self {
        self.order_log = Some(log);
        self
    }

    pub fn set_entity(&self, reply: Reply) {
        *self.entity.lock().unwrap() = reply;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn answer(&self, reply: Reply, label: &str) -> ProviderCall {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(log) = &self.order_log {
            log.lock().unwrap().push(format!("{}:start:{}", self.name, label));
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if let Some(log) = &self.order_log {
            log.lock().unwrap().push(format!("{}:end:{}", self.name, label));
        }
        reply.to_call()
    }
}

#[async_trait]
impl ProviderAdapter for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn search_by_entity(&self, name: &str) -> ProviderCall {
        let reply = self.entity.lock().unwrap().clone();
        self.answer(reply, name).await
    }

    async fn search_by_domain(&self, domain: &str) -> ProviderCall {
        let reply = self
            .domains
            .lock()
            .unwrap()
            .get(domain)
            .cloned()
            .unwrap_or_else(|| self.other_domains.clone());
        self.answer(reply, domain).await
    }

    async fn search_history(&self, name: &str) -> ProviderCall {
        let reply = self.history.lock().unwrap().clone();
        self.answer(reply, name).await
    }
}

/// 手動推進的時鐘
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap()),
        }
    }

    pub fn advance(&self, delta: TimeDelta) {
        let mut now = self.now.lock().unwrap();
        *now += delta;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// 包一層記憶體快取，可以讓讀或寫失敗
#[derive(Default)]
pub struct FlakyStore {
    inner: MemoryCacheStore,
    pub fail_reads: AtomicBool,
    pub fail_writes: AtomicBool,
    pub writes: AtomicUsize,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStore for FlakyStore {
    async fn get(&self, key: &QueryKey) -> Result<Option<CacheEntry>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(LookupError::CacheReadError {
                message: "store offline".to_string(),
            });
        }
        self.inner.get(key).await
    }

    async fn upsert(&self, entry: CacheEntry) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(LookupError::CacheWriteError {
                message: "disk full".to_string(),
                records: Vec::new(),
            });
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.upsert(entry).await
    }

    async fn stats(&self) -> Result<CacheStats> {
        self.inner.stats().await
    }
}
