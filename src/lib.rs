use serde::{Deserialize, Serialize};

#[cfg(feature = "binary")]
pub mod cli;
pub mod config;
pub mod fetcher;
#[cfg(feature = "binary")]
pub mod logging;
pub mod orchestrator;
pub mod shoob;
pub mod store;

pub use config::ConfigError;
pub use fetcher::FetchError;
pub use store::StoreError;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Card {
    pub name: String,
    pub tier: String,
    pub series: String,
}

impl Card {
    pub fn new(
        name: impl Into<String>,
        tier: impl Into<String>,
        series: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            tier: tier.into(),
            series: series.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),
    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}
