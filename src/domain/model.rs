use crate::utils::domain::lookup_domain;
use crate::utils::error::{LookupError, Result};
use crate::utils::validation::{validate_domain_query, validate_entity_name, Validate};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// 合併後的標準備案記錄
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilingRecord {
    pub entity_name: String,
    pub domain: String,
    pub license_number: String,
    /// 資料來源沒給或無法解析時為 `None`
    pub last_update: Option<DateTime<Utc>>,
    pub is_historical: bool,
    /// 提供此記錄的資料來源名稱
    #[serde(default)]
    pub source: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QueryKind {
    ByEntity,
    ByDomain,
}

impl QueryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ByEntity => "by-entity",
            Self::ByDomain => "by-domain",
        }
    }
}

impl fmt::Display for QueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 呼叫端送進來的查詢
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupQuery {
    pub kind: QueryKind,
    pub term: String,
    pub history: bool,
    pub force: bool,
}

impl LookupQuery {
    pub fn by_entity(name: impl Into<String>) -> Self {
        Self {
            kind: QueryKind::ByEntity,
            term: name.into(),
            history: false,
            force: false,
        }
    }

    pub fn by_domain(domain: impl Into<String>) -> Self {
        Self {
            kind: QueryKind::ByDomain,
            term: domain.into(),
            history: false,
            force: false,
        }
    }

    pub fn with_history(mut self, history: bool) -> Self {
        self.history = history;
        self
    }

    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// 驗證後組出快取鍵；驗證失敗回傳 `ValidationError`
    pub fn key(&self) -> Result<QueryKey> {
        self.validate()?;
        let term = match self.kind {
            QueryKind::ByEntity => self.term.trim().to_string(),
            QueryKind::ByDomain => lookup_domain(&self.term),
        };
        Ok(QueryKey {
            kind: self.kind,
            term,
            history: self.history,
        })
    }
}

impl Validate for LookupQuery {
    fn validate(&self) -> Result<()> {
        match self.kind {
            QueryKind::ByEntity => validate_entity_name(&self.term),
            QueryKind::ByDomain => validate_domain_query(&self.term),
        }
    }
}

/// 快取條目的身分：正規化後的查詢字串 + 查詢類型 + 是否查歷史
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryKey {
    pub kind: QueryKind,
    pub term: String,
    pub history: bool,
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.kind,
            if self.history { 1 } else { 0 },
            self.term
        )
    }
}

impl FromStr for QueryKey {
    type Err = LookupError;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.splitn(3, ':');
        let kind = match parts.next() {
            Some("by-entity") => QueryKind::ByEntity,
            Some("by-domain") => QueryKind::ByDomain,
            _ => return Err(LookupError::validation(format!("bad query key: {}", s))),
        };
        let history = match parts.next() {
            Some("0") => false,
            Some("1") => true,
            _ => return Err(LookupError::validation(format!("bad query key: {}", s))),
        };
        let term = parts
            .next()
            .filter(|term| !term.is_empty())
            .ok_or_else(|| LookupError::validation(format!("bad query key: {}", s)))?;

        Ok(Self {
            kind,
            term: term.to_string(),
            history,
        })
    }
}

impl Serialize for QueryKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for QueryKey {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub query_key: QueryKey,
    pub records: Vec<FilingRecord>,
    pub fetched_at: DateTime<Utc>,
}

/// 單一資料來源回傳的原始條目，合併前使用
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderResult {
    pub provider: String,
    pub entity_name: String,
    pub domain: String,
    pub license_number: String,
    pub last_update: Option<DateTime<Utc>>,
    /// 資料來源自己標示為已注銷/歷史
    pub superseded: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderOutcome {
    Records(Vec<ProviderResult>),
    Unsupported,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LookupStatus {
    Cached,
    Ok,
    Empty,
    Partial,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupOutcome {
    pub query_key: QueryKey,
    pub records: Vec<FilingRecord>,
    pub status: LookupStatus,
    pub fetched_at: DateTime<Utc>,
    /// 本次刷新失敗的資料來源
    pub failed_providers: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub cache_entries: usize,
    pub total_records: usize,
    pub unique_entities: usize,
    pub unique_domains: usize,
    pub historical_records: usize,
    pub data_sources: BTreeMap<String, usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_key_is_trimmed() {
        let key = LookupQuery::by_entity("  北京百度网讯科技有限公司 ")
            .key()
            .unwrap();
        assert_eq!(key.term, "北京百度网讯科技有限公司");
        assert_eq!(key.to_string(), "by-entity:0:北京百度网讯科技有限公司");
    }

    #[test]
    fn test_domain_key_uses_root_domain() {
        let key = LookupQuery::by_domain("https://WWW.Baidu.com/index.html")
            .with_history(true)
            .key()
            .unwrap();
        assert_eq!(key.term, "baidu.com");
        assert_eq!(key.to_string(), "by-domain:1:baidu.com");
    }

    #[test]
    fn test_invalid_query_has_no_key() {
        assert!(LookupQuery::by_entity("").key().is_err());
        assert!(LookupQuery::by_domain("not a domain").key().is_err());
    }

    #[test]
    fn test_query_key_text_form_parses_back() {
        let key: QueryKey = "by-entity:1:某某公司:分部".parse().unwrap();
        assert_eq!(key.kind, QueryKind::ByEntity);
        assert!(key.history);
        assert_eq!(key.term, "某某公司:分部");

        assert!("by-nothing:0:x".parse::<QueryKey>().is_err());
        assert!("by-domain:2:x".parse::<QueryKey>().is_err());
        assert!("by-domain:0:".parse::<QueryKey>().is_err());
    }
}
