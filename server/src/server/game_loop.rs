// island_realm/server/src/server/game_loop.rs
use super::instance::IslandServer;
use crate::core::constants::MAX_TASKS_PER_TICK;
use std::sync::atomic::Ordering as AtomicOrdering;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, trace, warn};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub tick: u64,
    pub tasks_processed: usize,
    pub queued_for_save: usize,
}

impl IslandServer {
    pub fn tick_duration(&self) -> Duration {
        Duration::from_millis(1000 / self.config.tick_rate.max(1))
    }

    /// One simulation step: apply background results, then maybe start a save.
    pub fn tick(&self) -> TickReport {
        let tick = self.tick_counter.fetch_add(1, AtomicOrdering::Relaxed) + 1;
        let tasks_processed = self.drain_tasks(MAX_TASKS_PER_TICK);

        let period = self.config.backup_period_ticks();
        let queued_for_save = if period > 0 && tick % period == 0 {
            self.save_in_background()
        } else {
            0
        };

        if tasks_processed > 0 || queued_for_save > 0 {
            trace!("Tick {}: {} task(s), {} queued for save", tick, tasks_processed, queued_for_save);
        }
        TickReport { tick, tasks_processed, queued_for_save }
    }

    /// Drives `tick()` until `shutdown` flips to true or its sender is dropped, then saves.
    pub async fn run_simulation_loop(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let tick_duration = self.tick_duration();
        let mut tick_timer = interval(tick_duration);
        tick_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!("Simulation loop started. Tick rate: {}ms", tick_duration.as_millis());

        loop {
            tokio::select! {
                _ = tick_timer.tick() => {
                    let frame_start_time = Instant::now();
                    let report = self.tick();
                    let frame_time = frame_start_time.elapsed();
                    if frame_time > tick_duration {
                        warn!("Tick {} took too long: {:?}", report.tick, frame_time);
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Simulation loop stopping after {} tick(s)", self.tick_counter.load(AtomicOrdering::Relaxed));
        if let Err(e) = self.shutdown() {
            error!("Shutdown failed: {}", e);
        }
    }
}
