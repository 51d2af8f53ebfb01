pub mod domain;
pub mod error;
pub mod logger;
pub mod validation;
