// island_realm/server/src/server/mod.rs
pub mod events;
pub mod game_loop;
pub mod instance;
pub mod islands;
pub mod team_commands;
