pub mod freshness;
pub mod history;
pub mod merger;
pub mod orchestrator;
pub mod single_flight;

pub use crate::domain::model::{
    CacheEntry, CacheStats, FilingRecord, LookupOutcome, LookupQuery, LookupStatus,
    ProviderOutcome, ProviderResult, QueryKey, QueryKind,
};
pub use crate::domain::ports::{CacheStore, Clock, ProviderAdapter, ProviderCall, SystemClock};
pub use crate::utils::error::Result;
