// Adapters layer: concrete implementations of the domain ports (providers, cache stores, http)

pub mod chinaz;
pub mod file_store;
pub mod http;
pub mod memory_store;
pub mod parse;
pub mod tianyancha;

pub use chinaz::{ChinazConfig, ChinazProvider};
pub use file_store::FileCacheStore;
pub use http::RetryPolicy;
pub use memory_store::MemoryCacheStore;
pub use tianyancha::{TianyanchaConfig, TianyanchaProvider};
