// island_realm/server/src/concurrent/mod.rs
pub mod island_grid;
pub mod task_queue;
pub mod thread_pools;
