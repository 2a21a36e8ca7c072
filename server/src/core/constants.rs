// island_realm/server/src/core/constants.rs
pub const SERVER_TICK_RATE: u64 = 20;
/// Ticks are scheduled in whole milliseconds.
pub const MAX_TICK_RATE: u64 = 1000;

// Island geometry
pub const DEFAULT_PROTECTION_RANGE: i32 = 50;
pub const DEFAULT_ISLAND_DISTANCE: i32 = 400;

// Shared spawns used when nether/end are not per-island
pub const DEFAULT_NETHER_SPAWN: [f64; 3] = [0.5, 64.0, 0.5];
pub const DEFAULT_END_SPAWN: [f64; 3] = [100.5, 49.0, 0.5];

// Blueprints pasted on demand
pub const NETHER_BLUEPRINT: &str = "nether-island";
pub const END_BLUEPRINT: &str = "end-island";

// Persistence
pub const DEFAULT_BACKUP_PERIOD_MINUTES: u64 = 5;
pub const ISLAND_FILE_EXTENSION: &str = "json";

// Team
pub const DEFAULT_INVITE_COOLDOWN_MINUTES: u64 = 60;

// Re-entry tasks drained per tick
pub const MAX_TASKS_PER_TICK: usize = 256;
