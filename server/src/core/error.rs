// island_realm/server/src/core/error.rs
use crate::core::types::{IslandId, PlayerID};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Persistence error: {0}")]
    PersistenceError(String),

    #[error("Threading error: {0}")]
    ThreadingError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type ServerResult<T> = Result<T, ServerError>;

/// Why a registry mutation did not commit.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Unknown island {0}")]
    UnknownIsland(IslandId),

    #[error("Unknown dimension pair {0}")]
    UnknownPair(String),

    #[error("Mutation vetoed by listener '{listener}'")]
    Vetoed { listener: String },

    #[error("Player {0} already belongs to a team in this dimension pair")]
    AlreadyInTeam(PlayerID),

    #[error("The owner rank only changes through ownership transfer")]
    ReservedRank,

    #[error("Claim overlaps island {0}")]
    Overlap(IslandId),

    #[error("Invalid island: {0}")]
    InvalidIsland(String),
}
