// island_realm/server/src/operational/mod.rs
pub mod logging;
