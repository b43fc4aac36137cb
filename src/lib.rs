pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use adapters::http::HttpVerifier;
pub use config::BrokerConfig;
pub use crate::core::{catalog::synthesize_catalog, lifecycle::Broker, registry::CatalogRegistry};
pub use utils::error::{BrokerError, Result};
