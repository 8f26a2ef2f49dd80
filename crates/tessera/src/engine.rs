//! # TESSERA Engine
//!
//! Frame orchestration over one entity manager and one system manager:
//! ```text
//! Frame N:
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │ 1. BEGIN FRAME                                                      │
//! │    └─ Recompute the work order if registrations changed             │
//! │                                                                     │
//! │ 2. SYSTEM PASSES (work order, active and due systems only)          │
//! │    ├─ PreUpdate                                                     │
//! │    ├─ Update                                                        │
//! │    └─ PostUpdate                                                    │
//! │                                                                     │
//! │ 3. CLEANUP                                                          │
//! │    └─ Destroy entities marked for destruction                       │
//! │                                                                     │
//! │ 4. END FRAME                                                        │
//! │    └─ Record frame statistics                                       │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```

use std::path::Path;
use std::time::{Duration, Instant};

use tessera_core::{
    EcsResult, EngineConfig, EntityManager, GlobalMemory, SharedMemory, SystemManager,
};

/// Target frame time for 60 FPS.
pub const TARGET_FRAME_TIME: Duration = Duration::from_micros(16_666);

/// Statistics of one frame.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FrameStats {
    /// Frame number, starting at zero.
    pub frame: u64,
    /// Frame time handed to the systems, in milliseconds.
    pub dt_ms: f64,
    /// Wall time spent in the frame, in microseconds.
    pub wall_us: u64,
    /// Entities destroyed during cleanup.
    pub entities_destroyed: usize,
    /// Live entities at the end of the frame.
    pub live_entities: usize,
}

/// An engine context.
///
/// Engines share nothing; several may exist side by side. Dropping an engine
/// tears down its systems, then its entities, then its memory.
///
/// # Example
///
/// ```rust,ignore
/// let mut engine = Engine::new(EngineConfig::default())?;
/// engine.systems_mut().add_system(Movement::default())?;
/// engine.entities_mut().create_entity(Projectile { speed: 4.0 })?;
///
/// loop {
///     engine.update(16.6)?;
/// }
/// ```
pub struct Engine {
    // Fields drop in declaration order: systems, entities, memory.
    /// The system manager.
    systems: SystemManager,
    /// The entity manager.
    entities: EntityManager,
    /// Global memory shared by both managers.
    memory: SharedMemory,
    /// Configuration the engine was built with.
    config: EngineConfig,
    /// Frame counter.
    frame_count: u64,
    /// Accumulated frame statistics.
    stats: FrameStatsAccumulator,
}

impl Engine {
    /// Creates an engine.
    ///
    /// # Arguments
    ///
    /// * `config` - Memory, entity and scheduler configuration
    ///
    /// # Errors
    ///
    /// `InvalidConfig` if the configuration fails validation, `OutOfMemory`
    /// if global memory cannot hold the system arena.
    pub fn new(config: EngineConfig) -> EcsResult<Self> {
        config.validate()?;

        let memory = GlobalMemory::shared(config.memory.global_capacity_bytes);
        let entities = EntityManager::new(&config.entities, memory.clone());
        let systems = SystemManager::new(
            config.memory.system_arena_bytes,
            &config.systems,
            memory.clone(),
        )?;

        tracing::info!(
            "Engine initialized ({} bytes global memory, {} entities per chunk)",
            config.memory.global_capacity_bytes,
            config.entities.chunk_capacity
        );

        Ok(Self {
            systems,
            entities,
            memory,
            config,
            frame_count: 0,
            stats: FrameStatsAccumulator::new(),
        })
    }

    /// Creates an engine from a TOML configuration file.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` if the file cannot be loaded, otherwise as
    /// [`Engine::new`].
    pub fn from_config_file(path: impl AsRef<Path>) -> EcsResult<Self> {
        Self::new(EngineConfig::load(path)?)
    }

    /// Runs one frame.
    ///
    /// # Arguments
    ///
    /// * `dt_ms` - Frame time in milliseconds, handed to every system
    ///
    /// # Errors
    ///
    /// `DependencyCycle` if a stale work order cannot be recomputed under
    /// the reject policy; entity errors from the cleanup step.
    pub fn update(&mut self, dt_ms: f64) -> EcsResult<FrameStats> {
        let start = Instant::now();

        if self.systems.is_work_order_stale() {
            self.systems.update_system_work_order()?;
        }

        self.systems.pre_update(dt_ms);
        self.systems.update(dt_ms);
        self.systems.post_update(dt_ms);

        let entities_destroyed = self.entities.remove_destroyed_entities()?;

        let stats = FrameStats {
            frame: self.frame_count,
            dt_ms,
            wall_us: u64::try_from(start.elapsed().as_micros()).unwrap_or(u64::MAX),
            entities_destroyed,
            live_entities: self.entities.entity_count(),
        };
        self.frame_count += 1;
        self.stats.record(stats);

        if Duration::from_micros(stats.wall_us) > TARGET_FRAME_TIME {
            tracing::debug!("Frame {} exceeded budget: {} us", stats.frame, stats.wall_us);
        }

        Ok(stats)
    }

    /// Returns the number of frames run.
    #[inline]
    #[must_use]
    pub const fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Returns the accumulated statistics.
    #[must_use]
    pub const fn stats(&self) -> &FrameStatsAccumulator {
        &self.stats
    }

    /// Returns the configuration the engine was built with.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Returns the entity manager.
    #[must_use]
    pub const fn entities(&self) -> &EntityManager {
        &self.entities
    }

    /// Returns the entity manager mutably.
    pub fn entities_mut(&mut self) -> &mut EntityManager {
        &mut self.entities
    }

    /// Returns the system manager.
    #[must_use]
    pub const fn systems(&self) -> &SystemManager {
        &self.systems
    }

    /// Returns the system manager mutably.
    pub fn systems_mut(&mut self) -> &mut SystemManager {
        &mut self.systems
    }

    /// Returns the shared global memory.
    #[must_use]
    pub const fn memory(&self) -> &SharedMemory {
        &self.memory
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        tracing::info!(
            "Engine shutting down after {} frames ({} entities, {} systems)",
            self.frame_count,
            self.entities.entity_count(),
            self.systems.system_count()
        );
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("frame_count", &self.frame_count)
            .field("systems", &self.systems)
            .field("entities", &self.entities)
            .finish_non_exhaustive()
    }
}

/// Accumulator for frame statistics.
#[derive(Clone, Debug)]
pub struct FrameStatsAccumulator {
    /// Total frames recorded.
    pub frames_recorded: u64,
    /// Sum of wall frame times.
    pub wall_us_sum: u64,
    /// Min wall frame time.
    pub min_frame_us: u64,
    /// Max wall frame time.
    pub max_frame_us: u64,
    /// Frames that exceeded the budget.
    pub frames_over_budget: u64,
    /// Entities destroyed during cleanup, over all frames.
    pub entities_destroyed: usize,
}

impl FrameStatsAccumulator {
    /// Creates a new accumulator.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            frames_recorded: 0,
            wall_us_sum: 0,
            min_frame_us: u64::MAX,
            max_frame_us: 0,
            frames_over_budget: 0,
            entities_destroyed: 0,
        }
    }

    /// Records a frame's statistics.
    pub fn record(&mut self, stats: FrameStats) {
        self.frames_recorded += 1;
        self.wall_us_sum = self.wall_us_sum.saturating_add(stats.wall_us);
        self.min_frame_us = self.min_frame_us.min(stats.wall_us);
        self.max_frame_us = self.max_frame_us.max(stats.wall_us);
        self.entities_destroyed += stats.entities_destroyed;

        if Duration::from_micros(stats.wall_us) > TARGET_FRAME_TIME {
            self.frames_over_budget += 1;
        }
    }

    /// Returns the average wall frame time in milliseconds.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn avg_frame_ms(&self) -> f64 {
        if self.frames_recorded == 0 {
            return 0.0;
        }
        (self.wall_us_sum as f64 / self.frames_recorded as f64) / 1000.0
    }

    /// Returns the fraction of frames over budget.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn over_budget_ratio(&self) -> f64 {
        if self.frames_recorded == 0 {
            return 0.0;
        }
        self.frames_over_budget as f64 / self.frames_recorded as f64
    }
}

impl Default for FrameStatsAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_core::{EcsError, Entity, EntityTypeId, System};

    struct Counter {
        frames: u32,
    }

    impl System for Counter {
        fn update(&mut self, _dt: f64) {
            self.frames += 1;
        }
    }

    struct Spark;

    impl Entity for Spark {
        const TYPE_ID: EntityTypeId = 0;
    }

    fn small_config() -> EngineConfig {
        let mut config = EngineConfig::default();
        config.memory.global_capacity_bytes = 1024 * 1024;
        config.entities.chunk_capacity = 16;
        config
    }

    #[test]
    fn test_engine_creation() {
        let engine = Engine::new(small_config()).unwrap();
        assert_eq!(engine.frame_count(), 0);
        assert_eq!(engine.entities().entity_count(), 0);
        assert_eq!(engine.systems().system_count(), 0);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = small_config();
        config.entities.chunk_capacity = 0;
        assert!(matches!(Engine::new(config), Err(EcsError::InvalidConfig(_))));
    }

    #[test]
    fn test_frame_recomputes_stale_work_order() {
        let mut engine = Engine::new(small_config()).unwrap();
        engine.systems_mut().add_system(Counter { frames: 0 }).unwrap();

        engine.update(16.0).unwrap();
        engine.update(16.0).unwrap();

        assert!(!engine.systems().is_work_order_stale());
        assert_eq!(engine.systems().get_system::<Counter>().unwrap().frames, 2);
        assert_eq!(engine.frame_count(), 2);
        assert_eq!(engine.stats().frames_recorded, 2);
    }

    #[test]
    fn test_frame_flushes_marked_entities() {
        let mut engine = Engine::new(small_config()).unwrap();
        let a = engine.entities_mut().create_entity(Spark).unwrap();
        engine.entities_mut().create_entity(Spark).unwrap();
        engine.entities_mut().mark_for_destruction(a).unwrap();

        let stats = engine.update(16.0).unwrap();

        assert_eq!(stats.entities_destroyed, 1);
        assert_eq!(stats.live_entities, 1);
        assert!(!engine.entities().is_alive(a));
    }

    #[test]
    fn test_stats_accumulator() {
        let mut acc = FrameStatsAccumulator::new();
        for i in 0..10 {
            acc.record(FrameStats {
                frame: i,
                dt_ms: 16.0,
                wall_us: 1_000,
                entities_destroyed: 1,
                live_entities: 0,
            });
        }
        assert_eq!(acc.frames_recorded, 10);
        assert_eq!(acc.entities_destroyed, 10);
        assert!((acc.avg_frame_ms() - 1.0).abs() < f64::EPSILON);
        assert!(acc.over_budget_ratio().abs() < f64::EPSILON);
    }
}
