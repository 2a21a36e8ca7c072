// island_realm/server/src/main.rs
use island_realm_core::core::config::GameModeConfig;
use island_realm_core::core::error::ServerResult;
use island_realm_core::core::types::{IslandId, Location, PlayerID};
use island_realm_core::operational::logging::{init_logging, init_logging_with, DEFAULT_LOG_FILTER};
use island_realm_core::persistence::store::JsonFileStore;
use island_realm_core::systems::provisioning::{BlueprintPaster, PasteReport};
use island_realm_core::systems::safe_spot::{EntityMover, SafeSpotOptions, SafeSpotResolver};
use island_realm_core::{Collaborators, IslandServer, ProvisionerSource, ServerConfig};

use anyhow::Context;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};

const DEFAULT_CONFIG_PATH: &str = "config.yaml";
const DEFAULT_DATA_DIR: &str = "data/islands";

/// Without a world to search, the requested point is the answer.
struct PassThroughResolver;

impl SafeSpotResolver for PassThroughResolver {
    fn find_safe_spot(&self, point: &Location, _entity: PlayerID, _options: SafeSpotOptions) -> Location {
        point.clone()
    }
}

struct LoggingMover;

impl EntityMover for LoggingMover {
    fn teleport(&self, entity: PlayerID, to: &Location) {
        info!("Teleport {} -> {} ({:.1}, {:.1}, {:.1})", entity, to.world, to.x, to.y, to.z);
    }
}

struct LoggingPaster;

impl BlueprintPaster for LoggingPaster {
    fn paste_blocking(&self, blueprint: &str, island: IslandId, origin: &Location) -> ServerResult<PasteReport> {
        info!("Pasting '{}' for island {} at {} ({}, {}, {})", blueprint, island, origin.world, origin.x, origin.y, origin.z);
        Ok(PasteReport::default())
    }
}

fn load_config(path: &Path) -> anyhow::Result<ServerConfig> {
    if path.exists() {
        return ServerConfig::load(path).with_context(|| format!("Failed to load {:?}", path));
    }
    info!("No config at {:?}, using a single default skyblock pair", path);
    Ok(ServerConfig {
        game_modes: vec![GameModeConfig::with_defaults("skyblock")],
        ..ServerConfig::default()
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if std::env::var_os("ISLAND_REALM_LOG_JSON").is_some() {
        init_logging_with(DEFAULT_LOG_FILTER, true)?;
    } else {
        init_logging()?;
    }

    let config_path = std::env::args().nth(1).unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = load_config(Path::new(&config_path))?;
    let data_dir = std::env::var("ISLAND_REALM_DATA").unwrap_or_else(|_| DEFAULT_DATA_DIR.to_string());
    let store = JsonFileStore::new(&data_dir).with_context(|| format!("Failed to open store at {}", data_dir))?;

    let server = IslandServer::new(
        config,
        Collaborators {
            store: Arc::new(store),
            safe_spot: Arc::new(PassThroughResolver),
            mover: Arc::new(LoggingMover),
            provisioner: ProvisionerSource::Pooled(Arc::new(LoggingPaster)),
        },
    )?;
    let summary = server.load_all()?;
    info!("Loaded {} island(s), skipped {}", summary.loaded, summary.skipped);

    let server = Arc::new(server);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sim = tokio::spawn(Arc::clone(&server).run_simulation_loop(shutdown_rx));

    tokio::signal::ctrl_c().await.context("Failed to listen for ctrl-c")?;
    info!("Shutdown requested");
    let _ = shutdown_tx.send(true);
    if let Err(e) = sim.await {
        error!("Simulation loop task failed: {}", e);
    }
    Ok(())
}
