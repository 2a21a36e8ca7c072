// island_realm/server/src/persistence/store.rs
use crate::core::constants::ISLAND_FILE_EXTENSION;
use crate::core::error::{ServerError, ServerResult};
use crate::core::types::IslandId;
use crate::entities::island::Island;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;
use tracing::{debug, info, warn};

/// One stored island that could not be read back.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("record '{key}' is unreadable: {reason}")]
pub struct CorruptRecord {
    pub key: String,
    pub reason: String,
}

/// Keyed island storage. Calls come from the I/O pool and from shutdown.
pub trait IslandStore: Send + Sync {
    /// Every record of the pair; unreadable ones come back as errors individually.
    fn load(&self, pair: &str) -> ServerResult<Vec<Result<Island, CorruptRecord>>>;

    fn save(&self, island: &Island) -> ServerResult<()>;

    fn delete(&self, pair: &str, id: &IslandId) -> ServerResult<()>;

    /// Saves each island, returning the ids that failed.
    fn save_all(&self, islands: &[Island]) -> Vec<IslandId> {
        let mut failed = Vec::new();
        for island in islands {
            if let Err(e) = self.save(island) {
                warn!("[Island {}] Save failed: {}", island.id, e);
                failed.push(island.id);
            }
        }
        failed
    }
}

/// One JSON document per island under `<root>/<pair>/<id>.json`.
#[derive(Debug)]
pub struct JsonFileStore {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(root: impl Into<PathBuf>) -> ServerResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        info!("Island store rooted at {:?}", root);
        Ok(JsonFileStore { root, write_lock: Mutex::new(()) })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn pair_dir(&self, pair: &str) -> PathBuf {
        self.root.join(pair)
    }

    fn island_path(&self, pair: &str, id: &IslandId) -> PathBuf {
        self.pair_dir(pair).join(format!("{}.{}", id, ISLAND_FILE_EXTENSION))
    }
}

impl IslandStore for JsonFileStore {
    fn load(&self, pair: &str) -> ServerResult<Vec<Result<Island, CorruptRecord>>> {
        let dir = self.pair_dir(pair);
        if !dir.exists() {
            debug!("No stored islands for '{}'", pair);
            return Ok(Vec::new());
        }
        let mut records = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(ISLAND_FILE_EXTENSION) {
                continue;
            }
            let key = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let record = fs::read_to_string(&path)
                .map_err(|e| e.to_string())
                .and_then(|raw| serde_json::from_str::<Island>(&raw).map_err(|e| e.to_string()))
                .map_err(|reason| CorruptRecord { key, reason });
            records.push(record);
        }
        Ok(records)
    }

    fn save(&self, island: &Island) -> ServerResult<()> {
        let json = serde_json::to_string_pretty(island)?;
        let path = self.island_path(&island.pair, &island.id);
        let tmp = path.with_extension("tmp");

        let _guard = self.write_lock.lock();
        fs::create_dir_all(self.pair_dir(&island.pair))?;
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn delete(&self, pair: &str, id: &IslandId) -> ServerResult<()> {
        let path = self.island_path(pair, id);
        let _guard = self.write_lock.lock();
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ServerError::PersistenceError(format!("removing {:?}: {}", path, e))),
        }
    }
}

/// In-process store holding serialized records, for tests and embedding hosts.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: DashMap<(String, String), String>,
    saves: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores raw text under a key, bypassing serialization.
    pub fn insert_raw(&self, pair: &str, key: &str, raw: &str) {
        self.records.insert((pair.to_string(), key.to_string()), raw.to_string());
    }

    pub fn contains(&self, pair: &str, id: &IslandId) -> bool {
        self.records.contains_key(&(pair.to_string(), id.to_string()))
    }

    pub fn get(&self, pair: &str, id: &IslandId) -> Option<Island> {
        let raw = self.records.get(&(pair.to_string(), id.to_string()))?;
        serde_json::from_str(raw.value()).ok()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of successful `save` calls so far.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::Relaxed)
    }
}

impl IslandStore for MemoryStore {
    fn load(&self, pair: &str) -> ServerResult<Vec<Result<Island, CorruptRecord>>> {
        Ok(self
            .records
            .iter()
            .filter(|entry| entry.key().0 == pair)
            .map(|entry| {
                serde_json::from_str::<Island>(entry.value()).map_err(|e| CorruptRecord {
                    key: entry.key().1.clone(),
                    reason: e.to_string(),
                })
            })
            .collect())
    }

    fn save(&self, island: &Island) -> ServerResult<()> {
        let json = serde_json::to_string(island)?;
        self.records.insert((island.pair.to_string(), island.id.to_string()), json);
        self.saves.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn delete(&self, pair: &str, id: &IslandId) -> ServerResult<()> {
        self.records.remove(&(pair.to_string(), id.to_string()));
        Ok(())
    }
}
