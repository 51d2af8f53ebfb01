//! 本地推斷的歷史備案。
//!
//! 資料來源沒有明確標示、但上一次快取中存在、這一次刷新卻消失的域名，
//! 在啟用此策略時會以歷史備案的身分留在新的快取條目中。

use crate::domain::model::FilingRecord;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HistoryInference {
    /// 只相信資料來源的標示
    #[default]
    ProviderAsserted,
    /// 另外把消失的舊記錄標成歷史備案
    CarryForward,
}

/// 把 `previous` 中已不在 `fresh` 裡的記錄以歷史備案身分接在後面
pub fn carry_forward_superseded(
    previous: &[FilingRecord],
    mut fresh: Vec<FilingRecord>,
) -> Vec<FilingRecord> {
    let present: HashSet<(String, String)> = fresh
        .iter()
        .map(|record| (record.domain.clone(), record.license_number.clone()))
        .collect();

    let mut carried = 0usize;
    for record in previous {
        if present.contains(&(record.domain.clone(), record.license_number.clone())) {
            continue;
        }
        let mut superseded = record.clone();
        superseded.is_historical = true;
        fresh.push(superseded);
        carried += 1;
    }

    if carried > 0 {
        tracing::info!("Marked {} previously cached record(s) as historical", carried);
    }
    fresh
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn record(domain: &str, license: &str, historical: bool) -> FilingRecord {
        FilingRecord {
            entity_name: "北京百度网讯科技有限公司".to_string(),
            domain: domain.to_string(),
            license_number: license.to_string(),
            last_update: Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()),
            is_historical: historical,
            source: "chinaz".to_string(),
        }
    }

    #[test]
    fn test_disappeared_records_become_historical() {
        let previous = vec![record("baidu.com", "1", false), record("old.com", "2", false)];
        let fresh = vec![record("baidu.com", "1", false)];

        let merged = carry_forward_superseded(&previous, fresh);

        assert_eq!(merged.len(), 2);
        assert_eq!(merged[1].domain, "old.com");
        assert!(merged[1].is_historical);
        assert!(!merged[0].is_historical);
    }

    #[test]
    fn test_reappearing_record_is_current_again() {
        let previous = vec![record("old.com", "2", true)];
        let fresh = vec![record("old.com", "2", false)];

        let merged = carry_forward_superseded(&previous, fresh);

        assert_eq!(merged.len(), 1);
        assert!(!merged[0].is_historical);
    }

    #[test]
    fn test_carry_forward_is_idempotent() {
        let previous = vec![record("baidu.com", "1", false), record("old.com", "2", false)];
        let fresh = vec![record("baidu.com", "1", false)];

        let once = carry_forward_superseded(&previous, fresh.clone());
        let twice = carry_forward_superseded(&once, fresh);

        assert_eq!(once, twice);
    }
}
