use crate::domain::model::{CacheEntry, CacheStats, QueryKey};
use crate::domain::ports::CacheStore;
use crate::utils::error::Result;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;

/// 行程內的快取，重啟即清空
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    entries: RwLock<HashMap<QueryKey, CacheEntry>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &QueryKey) -> Result<Option<CacheEntry>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn upsert(&self, entry: CacheEntry) -> Result<()> {
        self.entries
            .write()
            .await
            .insert(entry.query_key.clone(), entry);
        Ok(())
    }

    async fn stats(&self) -> Result<CacheStats> {
        Ok(compute_stats(self.entries.read().await.values()))
    }
}

/// 彙總快取內容；各存儲實作共用
pub fn compute_stats<'a>(entries: impl IntoIterator<Item = &'a CacheEntry>) -> CacheStats {
    let mut stats = CacheStats::default();
    let mut entities = HashSet::new();
    let mut domains = HashSet::new();

    for entry in entries {
        stats.cache_entries += 1;
        for record in &entry.records {
            stats.total_records += 1;
            if record.is_historical {
                stats.historical_records += 1;
            }
            entities.insert(record.entity_name.as_str());
            domains.insert(record.domain.as_str());

            let source = if record.source.is_empty() {
                "unknown"
            } else {
                record.source.as_str()
            };
            *stats.data_sources.entry(source.to_string()).or_default() += 1;
        }
    }

    stats.unique_entities = entities.len();
    stats.unique_domains = domains.len();
    stats
}
