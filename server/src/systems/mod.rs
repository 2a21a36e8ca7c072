// island_realm/server/src/systems/mod.rs
pub mod portal;
pub mod provisioning;
pub mod safe_spot;
pub mod team;
