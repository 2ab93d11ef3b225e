//! Configuration errors
//!
//! Only misconfiguration is an error value. Stale queue entries, duplicate
//! notifications and similar transient states are dropped where they are
//! found and never surface here.

use thiserror::Error;

use crate::sim::TierId;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("tier catalog is empty")]
    EmptyCatalog,

    #[error("unknown tier id {0}")]
    UnknownTier(TierId),

    #[error("tier {tier} has no visual/physical template")]
    MissingTemplate { tier: TierId },

    #[error("tier at index {index} declares id {id}")]
    IdIndexMismatch { index: usize, id: TierId },

    #[error("tier {tier} links to tier {next}, which is not a higher tier")]
    NonIncreasingChain { tier: TierId, next: TierId },

    #[error("tier {tier} links to missing tier {next}")]
    DanglingNextTier { tier: TierId, next: TierId },

    #[error("no spawnable tier in 0..={max_spawn_tier}")]
    EmptySpawnRange { max_spawn_tier: TierId },

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed json: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Failures of the high-score store backing file
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store file is not valid json: {0}")]
    Parse(#[from] serde_json::Error),
}
