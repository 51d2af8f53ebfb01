//! 同一查詢鍵的並發刷新合併。
//!
//! 每個鍵對應一把非同步鎖與一個刷新世代編號。呼叫端先取得票券（記下當時的世代），
//! 再排隊取鎖；拿到鎖時若世代已變，代表等待期間已有人完成刷新，直接讀快取即可。

use crate::domain::model::QueryKey;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, MutexGuard};

#[derive(Default)]
struct Slot {
    lock: AsyncMutex<()>,
    generation: AtomicU64,
}

type SlotMap = Arc<Mutex<HashMap<QueryKey, Arc<Slot>>>>;

#[derive(Default, Clone)]
pub struct RefreshGate {
    slots: SlotMap,
}

impl RefreshGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ticket(&self, key: &QueryKey) -> RefreshTicket {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            slots.entry(key.clone()).or_default().clone()
        };
        let observed = slot.generation.load(Ordering::Acquire);

        RefreshTicket {
            key: key.clone(),
            slot,
            observed,
            slots: self.slots.clone(),
        }
    }

    /// 目前仍有人持有票券的鍵數量
    pub fn in_flight(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

pub struct RefreshTicket {
    key: QueryKey,
    slot: Arc<Slot>,
    observed: u64,
    slots: SlotMap,
}

impl RefreshTicket {
    pub async fn lock(&self) -> RefreshGuard<'_> {
        let guard = self.slot.lock.lock().await;
        let coalesced = self.slot.generation.load(Ordering::Acquire) != self.observed;
        RefreshGuard {
            _guard: guard,
            slot: &*self.slot,
            coalesced,
        }
    }
}

impl Drop for RefreshTicket {
    fn drop(&mut self) {
        let mut slots = self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        // map 與本票券各持有一份時，代表沒有其他人在等這個鍵
        if slots
            .get(&self.key)
            .is_some_and(|slot| Arc::ptr_eq(slot, &self.slot) && Arc::strong_count(slot) == 2)
        {
            slots.remove(&self.key);
        }
    }
}

pub struct RefreshGuard<'a> {
    _guard: MutexGuard<'a, ()>,
    slot: &'a Slot,
    coalesced: bool,
}

impl RefreshGuard<'_> {
    /// 等待期間是否已有其他呼叫端完成同一鍵的刷新
    pub fn coalesced(&self) -> bool {
        self.coalesced
    }

    /// 刷新成功落地後呼叫，讓排隊中的呼叫端改讀快取
    pub fn complete(self) {
        self.slot.generation.fetch_add(1, Ordering::AcqRel);
    }
}
