use chrono::{DateTime, TimeDelta, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Refresh,
    ServeCached,
}

/// 決定快取是否仍可直接使用
///
/// 沒有快取或強制刷新一律刷新；否則年齡達到 TTL 即刷新。
pub fn decide(
    fetched_at: Option<DateTime<Utc>>,
    ttl: TimeDelta,
    force: bool,
    now: DateTime<Utc>,
) -> Freshness {
    match fetched_at {
        None => Freshness::Refresh,
        Some(_) if force => Freshness::Refresh,
        Some(fetched_at) if now - fetched_at >= ttl => Freshness::Refresh,
        Some(_) => Freshness::ServeCached,
    }
}
