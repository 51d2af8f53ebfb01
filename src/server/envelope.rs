use crate::domain::model::{CacheStats, FilingRecord, LookupOutcome, LookupStatus};
use crate::utils::error::LookupError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const WIRE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// 對外輸出的備案記錄欄位
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireRecord {
    pub name: String,
    pub domain: String,
    pub service_licence: String,
    pub last_update: String,
    pub is_historical: bool,
}

impl From<&FilingRecord> for WireRecord {
    fn from(record: &FilingRecord) -> Self {
        Self {
            name: record.entity_name.clone(),
            domain: record.domain.clone(),
            service_licence: record.license_number.clone(),
            last_update: record
                .last_update
                .map(|at| at.format(WIRE_TIME_FORMAT).to_string())
                .unwrap_or_default(),
            is_historical: record.is_historical,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupSummary {
    pub status: LookupStatus,
    pub query_key: String,
    pub fetched_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed_providers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupResponse {
    pub status: i32,
    pub error_message: String,
    pub data: Vec<WireRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<LookupSummary>,
}

impl LookupResponse {
    pub fn success(outcome: &LookupOutcome) -> Self {
        Self {
            status: 0,
            error_message: String::new(),
            data: outcome.records.iter().map(WireRecord::from).collect(),
            summary: Some(LookupSummary {
                status: outcome.status,
                query_key: outcome.query_key.to_string(),
                fetched_at: outcome.fetched_at,
                failed_providers: outcome.failed_providers.clone(),
            }),
        }
    }

    /// 失敗時 `data` 為空；唯一例外是寫快取失敗，仍附上剛合併的記錄
    pub fn failure(error: &LookupError) -> Self {
        let data = match error {
            LookupError::CacheWriteError { records, .. } => {
                records.iter().map(WireRecord::from).collect()
            }
            _ => Vec::new(),
        };
        Self {
            status: error.status_code(),
            error_message: error.to_string(),
            data,
            summary: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsResponse {
    pub status: i32,
    pub error_message: String,
    pub data: Option<CacheStats>,
}

impl StatsResponse {
    pub fn success(stats: CacheStats) -> Self {
        Self {
            status: 0,
            error_message: String::new(),
            data: Some(stats),
        }
    }

    pub fn failure(error: &LookupError) -> Self {
        Self {
            status: error.status_code(),
            error_message: error.to_string(),
            data: None,
        }
    }
}
