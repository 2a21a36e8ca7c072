// island_realm/server/src/world/mod.rs
pub mod dimensions;
