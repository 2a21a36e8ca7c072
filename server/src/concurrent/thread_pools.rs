// island_realm/server/src/concurrent/thread_pools.rs
use crate::core::config::ThreadPoolConfig;
use crate::core::error::{ServerError, ServerResult};
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::sync::Arc;
use tracing::{debug, warn};

/// Background pools. The simulation thread itself is not part of this system.
pub struct ThreadPoolSystem {
    pub provisioning_pool: Arc<ThreadPool>,
    pub io_pool: Arc<ThreadPool>,
}

impl ThreadPoolSystem {
    pub fn new(config: &ThreadPoolConfig) -> Result<Self, anyhow::Error> {
        let provisioning_pool = Self::create_pool("provisioning", config.provisioning_threads)?;
        let io_pool = Self::create_pool("io", config.io_threads)?;

        Ok(Self {
            provisioning_pool: Arc::new(provisioning_pool),
            io_pool: Arc::new(io_pool),
        })
    }

    fn create_pool(name_str: &str, num_threads: usize) -> ServerResult<ThreadPool> {
        let name_for_thread_name = name_str.to_string();
        let threads = if num_threads == 0 {
            warn!("Thread pool '{}' configured with 0 threads. Creating a minimal pool.", name_str);
            1
        } else {
            num_threads
        };

        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(move |i| format!("{}-{}", name_for_thread_name, i))
            .build()
            .map_err(|e| ServerError::ThreadingError(format!("Failed to build {} pool: {}", name_str, e)))?;
        debug!("Thread pool '{}' ready with {} thread(s)", name_str, threads);
        Ok(pool)
    }
}
