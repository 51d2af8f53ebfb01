use crate::core::freshness::{decide, Freshness};
use crate::core::history::{carry_forward_superseded, HistoryInference};
use crate::core::merger::{merge, MergeMode};
use crate::core::single_flight::RefreshGate;
use crate::domain::model::{
    CacheEntry, CacheStats, FilingRecord, LookupOutcome, LookupQuery, LookupStatus, ProviderOutcome,
    ProviderResult, QueryKey, QueryKind,
};
use crate::domain::ports::{CacheStore, Clock, ProviderAdapter, ProviderCall, SystemClock};
use crate::utils::domain::{domain_hierarchy, extract_root_domain};
use crate::utils::error::{LookupError, ProviderError, Result};
use chrono::TimeDelta;
use futures::future::join_all;
use std::collections::HashSet;
use std::sync::Arc;

/// 查詢服務的執行參數
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub ttl: TimeDelta,
    /// 同時送出各資料來源的請求；合併順序不受影響
    pub concurrent_fanout: bool,
    pub history_inference: HistoryInference,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            ttl: TimeDelta::days(30),
            concurrent_fanout: true,
            history_inference: HistoryInference::ProviderAsserted,
        }
    }
}

#[derive(Debug)]
enum ProviderReport {
    Answered(Vec<ProviderResult>),
    Unsupported,
    Failed(ProviderError),
}

/// 快取優先的備案查詢協調器
pub struct LookupService {
    providers: Vec<Arc<dyn ProviderAdapter>>,
    store: Arc<dyn CacheStore>,
    clock: Arc<dyn Clock>,
    config: ServiceConfig,
    gate: RefreshGate,
}

impl LookupService {
    /// `providers` 的順序即優先順序
    pub fn new(
        providers: Vec<Arc<dyn ProviderAdapter>>,
        store: Arc<dyn CacheStore>,
        config: ServiceConfig,
    ) -> Self {
        Self {
            providers,
            store,
            clock: Arc::new(SystemClock),
            config,
            gate: RefreshGate::new(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    pub async fn stats(&self) -> Result<CacheStats> {
        self.store.stats().await
    }

    pub async fn lookup(&self, query: &LookupQuery) -> Result<LookupOutcome> {
        let key = query.key()?;
        if key.kind == QueryKind::ByEntity && key.history {
            return self.entity_history(&key, query.force).await;
        }
        self.resolve(&key, query.force).await
    }

    async fn resolve(&self, key: &QueryKey, force: bool) -> Result<LookupOutcome> {
        let cached = self.read_cache(key).await;
        let now = self.clock.now();

        let freshness = decide(
            cached.as_ref().map(|entry| entry.fetched_at),
            self.config.ttl,
            force,
            now,
        );

        if let (Freshness::ServeCached, Some(entry)) = (freshness, &cached) {
            tracing::info!("Cache hit for {} ({} records)", key, entry.records.len());
            return Ok(Self::served(entry.clone()));
        }

        let ticket = self.gate.ticket(key);
        let guard = ticket.lock().await;

        // 等待期間已有人刷新過同一個 key，連 force 也直接用那份結果
        if guard.coalesced() {
            if let Some(entry) = self.read_cache(key).await {
                tracing::info!("Refresh for {} finished while waiting, serving it", key);
                return Ok(Self::served(entry));
            }
        }

        tracing::info!(
            "🔄 Refreshing {} (force: {}, cached: {})",
            key,
            force,
            cached.is_some()
        );
        let outcome = self.refresh(key, cached.as_ref()).await?;
        guard.complete();
        Ok(outcome)
    }

    /// 企業歷史備案：資料來源的歷史查詢結果，再接上目前視圖中已標示為歷史的記錄
    ///
    /// 目前視圖過期時會先刷新；沒有資料來源支援歷史查詢時只用本地記錄回答。
    async fn entity_history(&self, key: &QueryKey, force: bool) -> Result<LookupOutcome> {
        let current_key = QueryKey {
            history: false,
            ..key.clone()
        };
        let current = match self.resolve(&current_key, force).await {
            Ok(outcome) => Ok(outcome),
            Err(LookupError::CacheWriteError { records, .. }) => Ok(LookupOutcome {
                query_key: current_key.clone(),
                records,
                status: LookupStatus::Ok,
                fetched_at: self.clock.now(),
                failed_providers: Vec::new(),
            }),
            Err(e) => Err(e),
        };

        match (self.resolve(key, force).await, current) {
            (Ok(outcome), Ok(current)) => Ok(with_local_history(outcome, &current.records)),
            (Ok(outcome), Err(e)) => {
                tracing::warn!(
                    "Current view for {} unavailable, skipping local history: {}",
                    key,
                    e
                );
                Ok(outcome)
            }
            (Err(LookupError::CacheWriteError { message, mut records }), Ok(current)) => {
                append_historical(&mut records, &current.records);
                Err(LookupError::CacheWriteError { message, records })
            }
            (Err(LookupError::ProviderUnavailable { failures }), Ok(current)) => {
                tracing::info!(
                    "No provider answered history for {}, using {} locally known record(s)",
                    key,
                    current.records.iter().filter(|r| r.is_historical).count()
                );
                Ok(local_history(key, failures, current))
            }
            (Err(LookupError::ProviderUnavailable { failures }), Err(e)) if failures.is_empty() => {
                Err(e)
            }
            (Err(e), _) => Err(e),
        }
    }

    fn served(entry: CacheEntry) -> LookupOutcome {
        LookupOutcome {
            query_key: entry.query_key,
            records: entry.records,
            status: LookupStatus::Cached,
            fetched_at: entry.fetched_at,
            failed_providers: Vec::new(),
        }
    }

    /// 讀取失敗時記錄並視為沒有快取
    async fn read_cache(&self, key: &QueryKey) -> Option<CacheEntry> {
        match self.store.get(key).await {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("Cache read for {} failed, treating as miss: {}", key, e);
                None
            }
        }
    }

    async fn refresh(
        &self,
        key: &QueryKey,
        previous: Option<&CacheEntry>,
    ) -> Result<LookupOutcome> {
        let reports = self.fan_out(key).await;

        let mut batches = Vec::new();
        let mut failures = Vec::new();
        for (provider, report) in reports {
            match report {
                ProviderReport::Answered(results) => {
                    tracing::info!("{} answered {} with {} entries", provider, key, results.len());
                    batches.push(results);
                }
                ProviderReport::Unsupported => {
                    tracing::debug!("{} does not support {} queries, skipped", provider, key.kind);
                }
                ProviderReport::Failed(err) => {
                    tracing::warn!("⚠️ {} failed for {} [{}]: {}", provider, key, err.kind(), err);
                    failures.push((provider, err));
                }
            }
        }

        if batches.is_empty() {
            tracing::error!("No provider could answer {}", key);
            return Err(LookupError::ProviderUnavailable { failures });
        }

        let now = self.clock.now();
        let mode = if key.history {
            MergeMode::History
        } else {
            MergeMode::Current
        };
        let mut records = merge(&batches, mode);

        if self.config.history_inference == HistoryInference::CarryForward
            && key.kind == QueryKind::ByEntity
            && !key.history
        {
            if let Some(previous) = previous {
                records = carry_forward_superseded(&previous.records, records);
            }
        }

        let status = if !failures.is_empty() {
            LookupStatus::Partial
        } else if records.is_empty() {
            LookupStatus::Empty
        } else {
            LookupStatus::Ok
        };

        let entry = CacheEntry {
            query_key: key.clone(),
            records: records.clone(),
            fetched_at: now,
        };
        if let Err(e) = self.store.upsert(entry).await {
            tracing::error!("Cache write for {} failed: {}", key, e);
            return Err(LookupError::CacheWriteError {
                message: e.to_string(),
                records,
            });
        }

        tracing::info!("✅ Cached {} records for {} ({:?})", records.len(), key, status);
        Ok(LookupOutcome {
            query_key: key.clone(),
            records,
            status,
            fetched_at: now,
            failed_providers: failures.into_iter().map(|(name, _)| name).collect(),
        })
    }

    /// 依優先順序呼叫每個資料來源，回傳順序與 `providers` 相同
    async fn fan_out(&self, key: &QueryKey) -> Vec<(String, ProviderReport)> {
        let calls = self
            .providers
            .iter()
            .map(|provider| self.call_provider(provider.as_ref(), key));

        if self.config.concurrent_fanout {
            join_all(calls).await
        } else {
            let mut reports = Vec::with_capacity(self.providers.len());
            for call in calls {
                reports.push(call.await);
            }
            reports
        }
    }

    async fn call_provider(
        &self,
        provider: &dyn ProviderAdapter,
        key: &QueryKey,
    ) -> (String, ProviderReport) {
        let call = match (key.kind, key.history) {
            (QueryKind::ByEntity, false) => provider.search_by_entity(&key.term).await,
            (QueryKind::ByEntity, true) => provider.search_history(&key.term).await,
            (QueryKind::ByDomain, history) => {
                search_domain(provider, &key.term, history).await
            }
        };

        let report = match call {
            Ok(ProviderOutcome::Records(results)) => ProviderReport::Answered(results),
            Ok(ProviderOutcome::Unsupported) => ProviderReport::Unsupported,
            // 查無此單位是確定的答案，不是故障
            Err(ProviderError::NotFound { query }) => {
                tracing::info!("{} has no entity matching '{}'", provider.name(), query);
                ProviderReport::Answered(Vec::new())
            }
            Err(err) => ProviderReport::Failed(err),
        };

        (provider.name().to_string(), report)
    }
}

/// 把 `current` 中的歷史記錄接在 `records` 後面，`(domain, license_number)` 已有的略過
fn append_historical(records: &mut Vec<FilingRecord>, current: &[FilingRecord]) -> usize {
    let mut seen: HashSet<(String, String)> = records
        .iter()
        .map(|record| (record.domain.clone(), record.license_number.clone()))
        .collect();

    let mut added = 0;
    for record in current.iter().filter(|record| record.is_historical) {
        if seen.insert((record.domain.clone(), record.license_number.clone())) {
            records.push(record.clone());
            added += 1;
        }
    }
    added
}

fn with_local_history(mut outcome: LookupOutcome, current: &[FilingRecord]) -> LookupOutcome {
    let added = append_historical(&mut outcome.records, current);
    if added > 0 && outcome.status == LookupStatus::Empty {
        outcome.status = LookupStatus::Ok;
    }
    outcome
}

/// 沒有資料來源回答歷史查詢時，以目前視圖的歷史記錄組成結果
fn local_history(
    key: &QueryKey,
    failures: Vec<(String, ProviderError)>,
    current: LookupOutcome,
) -> LookupOutcome {
    let mut records = Vec::new();
    append_historical(&mut records, &current.records);

    let mut failed_providers = current.failed_providers;
    for (name, _) in failures {
        if !failed_providers.contains(&name) {
            failed_providers.push(name);
        }
    }

    let status = if !failed_providers.is_empty() {
        LookupStatus::Partial
    } else if current.status == LookupStatus::Cached {
        LookupStatus::Cached
    } else if records.is_empty() {
        LookupStatus::Empty
    } else {
        LookupStatus::Ok
    };

    LookupOutcome {
        query_key: key.clone(),
        records,
        status,
        fetched_at: current.fetched_at,
        failed_providers,
    }
}

/// 域名查詢：政府域名逐級往上查，只保留根域名相符的條目
async fn search_domain(
    provider: &dyn ProviderAdapter,
    domain: &str,
    history: bool,
) -> ProviderCall {
    let root = extract_root_domain(domain);
    let levels = domain_hierarchy(domain);
    let last = levels.len().saturating_sub(1);

    for (index, level) in levels.iter().enumerate() {
        let results = match provider.search_by_domain(level).await? {
            ProviderOutcome::Unsupported => return Ok(ProviderOutcome::Unsupported),
            ProviderOutcome::Records(results) => results,
        };

        let (matching, skipped): (Vec<_>, Vec<_>) = results
            .into_iter()
            .partition(|result| extract_root_domain(&result.domain) == root);
        for result in &skipped {
            tracing::debug!(
                "{} returned unrelated domain {} for {}",
                result.provider,
                result.domain,
                level
            );
        }

        if matching.is_empty() && index < last {
            continue;
        }

        let kept = if history {
            matching.into_iter().filter(|result| result.superseded).collect()
        } else {
            matching
        };
        return Ok(ProviderOutcome::Records(kept));
    }

    Ok(ProviderOutcome::Records(Vec::new()))
}
