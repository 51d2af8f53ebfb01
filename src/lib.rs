pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod server;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliArgs;
pub use config::AppConfig;

pub use core::orchestrator::{LookupService, ServiceConfig};
pub use domain::model::{FilingRecord, LookupOutcome, LookupQuery, LookupStatus, QueryKey, QueryKind};
pub use utils::error::{LookupError, ProviderError, Result};
