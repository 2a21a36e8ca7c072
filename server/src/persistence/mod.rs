// island_realm/server/src/persistence/mod.rs
pub mod store;
