use crate::domain::model::{FilingRecord, ProviderResult};
use crate::utils::domain::normalize_domain;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeMode {
    /// 一般查詢：只有資料來源明確標示的記錄才是歷史備案
    Current,
    /// 歷史查詢：所有記錄都標示為歷史備案
    History,
}

/// 依資料來源優先順序合併並去重
///
/// `batches` 的順序即優先順序；`(domain, license_number)` 重複時保留先出現者。
pub fn merge(batches: &[Vec<ProviderResult>], mode: MergeMode) -> Vec<FilingRecord> {
    let mut seen: HashSet<(String, String)> = HashSet::new();
    let mut merged = Vec::new();

    for result in batches.iter().flatten() {
        let domain = normalize_domain(&result.domain);
        if domain.is_empty() {
            tracing::debug!(
                "Dropping {} entry for '{}' without a domain",
                result.provider,
                result.entity_name
            );
            continue;
        }

        let license_number = result.license_number.trim().to_string();
        if !seen.insert((domain.clone(), license_number.clone())) {
            continue;
        }

        merged.push(FilingRecord {
            entity_name: result.entity_name.trim().to_string(),
            domain,
            license_number,
            last_update: result.last_update,
            is_historical: match mode {
                MergeMode::History => true,
                MergeMode::Current => result.superseded,
            },
            source: result.provider.clone(),
        });
    }

    merged
}
