// island_realm/server/src/lib.rs

pub mod core;
pub mod concurrent;
pub mod entities;
pub mod world;
pub mod server;
pub mod persistence;
pub mod operational;
pub mod systems;

pub use crate::core::config::ServerConfig;
pub use crate::server::instance::{Collaborators, IslandServer, ProvisionerSource};
