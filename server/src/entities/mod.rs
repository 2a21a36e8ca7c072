// island_realm/server/src/entities/mod.rs
pub mod island;
