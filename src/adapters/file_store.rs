use crate::adapters::memory_store::compute_stats;
use crate::domain::model::{CacheEntry, CacheStats, QueryKey};
use crate::domain::ports::CacheStore;
use crate::utils::error::{LookupError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::RwLock;

/// 以單一 JSON 快照檔保存的快取
///
/// 讀取走記憶體；每次寫入都先寫暫存檔再 rename，避免半寫入的快照。
#[derive(Debug)]
pub struct FileCacheStore {
    path: PathBuf,
    entries: RwLock<HashMap<QueryKey, CacheEntry>>,
}

impl FileCacheStore {
    /// 開啟快照；檔案不存在時從空快取開始
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = match fs::read(&path).await {
            Ok(raw) if raw.iter().all(u8::is_ascii_whitespace) => HashMap::new(),
            Ok(raw) => {
                let snapshot: Vec<CacheEntry> = serde_json::from_slice(&raw).map_err(|e| {
                    LookupError::CacheReadError {
                        message: format!("corrupt cache snapshot {}: {}", path.display(), e),
                    }
                })?;
                snapshot
                    .into_iter()
                    .map(|entry| (entry.query_key.clone(), entry))
                    .collect()
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => {
                return Err(LookupError::CacheReadError {
                    message: format!("cannot read {}: {}", path.display(), e),
                })
            }
        };

        tracing::info!(
            "📂 Opened cache snapshot {} with {} entries",
            path.display(),
            entries.len()
        );
        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, entries: &HashMap<QueryKey, CacheEntry>) -> Result<()> {
        // 依鍵排序，快照內容才穩定
        let mut snapshot: Vec<&CacheEntry> = entries.values().collect();
        snapshot.sort_by(|a, b| a.query_key.cmp(&b.query_key));
        let raw = serde_json::to_vec_pretty(&snapshot)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        fs::write(&tmp, &raw).await?;
        fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl CacheStore for FileCacheStore {
    async fn get(&self, key: &QueryKey) -> Result<Option<CacheEntry>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn upsert(&self, entry: CacheEntry) -> Result<()> {
        let mut entries = self.entries.write().await;
        let key = entry.query_key.clone();
        let previous = entries.insert(key.clone(), entry);

        if let Err(e) = self.persist(&entries).await {
            // 寫檔失敗就還原，記憶體與快照保持一致
            match previous {
                Some(previous) => entries.insert(key, previous),
                None => entries.remove(&key),
            };
            return Err(LookupError::CacheWriteError {
                message: format!("cannot write {}: {}", self.path.display(), e),
                records: Vec::new(),
            });
        }
        Ok(())
    }

    async fn stats(&self) -> Result<CacheStats> {
        Ok(compute_stats(self.entries.read().await.values()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory_store::tests::{entry, record};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_file_starts_empty() {
        let dir = TempDir::new().unwrap();
        let store = FileCacheStore::open(dir.path().join("cache.json")).await.unwrap();
        assert_eq!(store.stats().await.unwrap().cache_entries, 0);
    }

    #[tokio::test]
    async fn test_entries_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("cache.json");
        let saved = entry("甲公司", vec![record("甲公司", "a.com", "chinaz", false)]);

        {
            let store = FileCacheStore::open(&path).await.unwrap();
            store.upsert(saved.clone()).await.unwrap();
        }
        assert!(path.exists());

        let reopened = FileCacheStore::open(&path).await.unwrap();
        assert_eq!(reopened.get(&saved.query_key).await.unwrap(), Some(saved));
        assert_eq!(reopened.stats().await.unwrap().total_records, 1);
    }

    #[tokio::test]
    async fn test_corrupt_snapshot_is_read_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        std::fs::write(&path, b"{not json").unwrap();

        let result = FileCacheStore::open(&path).await;
        assert!(matches!(result, Err(LookupError::CacheReadError { .. })));
    }

    #[tokio::test]
    async fn test_failed_write_keeps_previous_state() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        let store = FileCacheStore::open(&path).await.unwrap();

        // 目標路徑變成目錄，rename 必定失敗
        std::fs::create_dir(&path).unwrap();
        let attempted = entry("甲公司", vec![record("甲公司", "a.com", "chinaz", false)]);
        let result = store.upsert(attempted.clone()).await;

        assert!(matches!(result, Err(LookupError::CacheWriteError { .. })));
        assert!(store.get(&attempted.query_key).await.unwrap().is_none());
    }
}
