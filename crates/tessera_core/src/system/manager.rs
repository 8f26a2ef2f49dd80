//! # System Manager
//!
//! Owns every registered system, the dependency matrix between them and the
//! work order derived from it, and drives the three per-frame passes.
//!
//! ## Frame Flow
//!
//! ```text
//! pre_update(dt)   advance update timers, run PreUpdate of due systems
//! update(dt)       run Update of due systems
//! post_update(dt)  run PostUpdate of due systems, reset their timers
//! ```
//!
//! Every pass walks the work order once. Inactive systems keep their
//! position and are skipped.

use std::any::TypeId;
use std::collections::HashMap;

use super::dependency::DependencyMatrix;
use super::interface::{System, SystemObject, SystemPriority, SystemTypeId};
use super::schedule::{self, Schedule, SystemGroup};
use crate::config::{CyclePolicy, SystemConfig};
use crate::error::{EcsError, EcsResult};
use crate::memory::{ArenaRegion, LinearArena, SharedMemory};

/// Memory tag of the system arena.
pub const SYSTEM_MEMORY_TAG: &str = "SystemManager";

/// Active flags of the systems, in work order position.
pub type SystemWorkStateMask = Vec<bool>;

/// Book-keeping for one registered system.
struct SystemEntry {
    name: &'static str,
    system: Box<dyn SystemObject>,
    priority: SystemPriority,
    active: bool,
    /// Milliseconds between runs; `None` runs every frame.
    update_interval: Option<f64>,
    time_since_last_update: f64,
    needs_update: bool,
    /// Reservation backing this system in the arena.
    region: ArenaRegion,
}

impl SystemEntry {
    #[inline]
    const fn is_due(&self) -> bool {
        self.active && self.needs_update
    }
}

/// Registry and scheduler of systems.
///
/// # Example
///
/// ```rust,ignore
/// let mut systems = SystemManager::new(8 * 1024, &SystemConfig::default(), memory)?;
/// systems.add_system(Physics::default())?;
/// systems.add_system(Render::default())?;
/// systems.add_system_dependency::<Render, Physics>()?;
/// systems.update_system_work_order()?;
///
/// systems.pre_update(16.6);
/// systems.update(16.6);
/// systems.post_update(16.6);
/// ```
pub struct SystemManager {
    /// Systems indexed by `SystemTypeId`.
    systems: Vec<SystemEntry>,
    /// Rust type -> dense id.
    ids: HashMap<TypeId, SystemTypeId>,
    dependencies: DependencyMatrix,
    schedule: Schedule,
    work_order_stale: bool,
    cycle_policy: CyclePolicy,
    /// `None` only during teardown.
    arena: Option<LinearArena>,
    memory: SharedMemory,
}

impl SystemManager {
    /// Creates an empty manager with a system arena of `arena_bytes`.
    ///
    /// # Errors
    ///
    /// `OutOfMemory` if global memory cannot hold the arena.
    pub fn new(arena_bytes: usize, config: &SystemConfig, memory: SharedMemory) -> EcsResult<Self> {
        let block = {
            let mut global = memory.lock();
            let available = global.available();
            global
                .allocate(arena_bytes, SYSTEM_MEMORY_TAG)
                .ok_or(EcsError::OutOfMemory {
                    tag: SYSTEM_MEMORY_TAG,
                    requested: arena_bytes,
                    available,
                })?
        };

        tracing::info!(
            "Initialize SystemManager ({} byte arena, cycle policy {:?})",
            arena_bytes,
            config.cycle_policy
        );

        Ok(Self {
            systems: Vec::new(),
            ids: HashMap::new(),
            dependencies: DependencyMatrix::new(),
            schedule: Schedule::default(),
            work_order_stale: false,
            cycle_policy: config.cycle_policy,
            arena: Some(LinearArena::new(block)),
            memory,
        })
    }

    /// Number of registered systems.
    #[inline]
    #[must_use]
    pub fn system_count(&self) -> usize {
        self.systems.len()
    }

    /// Bytes of the system arena in use.
    #[must_use]
    pub fn arena_used(&self) -> usize {
        self.arena.as_ref().map_or(0, LinearArena::used)
    }

    /// The cycle policy applied by [`SystemManager::update_system_work_order`].
    #[inline]
    #[must_use]
    pub const fn cycle_policy(&self) -> CyclePolicy {
        self.cycle_policy
    }

    /// Changes the cycle policy for later work order updates.
    pub fn set_cycle_policy(&mut self, policy: CyclePolicy) {
        self.cycle_policy = policy;
    }

    /// Registers a system and returns its dense id.
    ///
    /// The system's `priority()` and `update_interval()` are read here. The
    /// work order is not recomputed.
    ///
    /// # Errors
    ///
    /// - `SystemAlreadyRegistered` if a system of type `S` exists
    /// - `OutOfMemory` if the system arena is exhausted
    pub fn add_system<S: System>(&mut self, system: S) -> EcsResult<SystemTypeId> {
        let name = system.name();
        if self.ids.contains_key(&TypeId::of::<S>()) {
            return Err(EcsError::SystemAlreadyRegistered(name));
        }

        let size = std::mem::size_of::<S>().max(1);
        let arena = self.arena.as_mut().ok_or(EcsError::OutOfMemory {
            tag: SYSTEM_MEMORY_TAG,
            requested: size,
            available: 0,
        })?;
        let available = arena.remaining();
        let region = arena
            .reserve(size, std::mem::align_of::<S>())
            .ok_or(EcsError::OutOfMemory {
                tag: SYSTEM_MEMORY_TAG,
                requested: size,
                available,
            })?;

        let index = self.dependencies.grow();
        let id = SystemTypeId::new(index as u32);
        let priority = system.priority();
        let update_interval = system.update_interval();

        self.systems.push(SystemEntry {
            name,
            system: Box::new(system),
            priority,
            active: true,
            update_interval,
            time_since_last_update: 0.0,
            needs_update: true,
            region,
        });
        self.ids.insert(TypeId::of::<S>(), id);
        self.work_order_stale = true;

        tracing::info!("Registered system {} as {} (priority {})", name, id, priority);
        Ok(id)
    }

    /// Declares that `Target` must run after `Dependency`.
    ///
    /// # Errors
    ///
    /// `SystemNotRegistered` if either type is unknown.
    pub fn add_system_dependency<Target: System, Dependency: System>(&mut self) -> EcsResult<()> {
        let target = self.require_id::<Target>()?;
        let dependency = self.require_id::<Dependency>()?;

        self.dependencies.set(target.index(), dependency.index(), true);
        self.work_order_stale = true;

        tracing::debug!(
            "System {} now runs after {}",
            self.systems[target.index()].name,
            self.systems[dependency.index()].name
        );
        Ok(())
    }

    /// Dense id of system type `S`, if registered.
    #[must_use]
    pub fn system_id<S: System>(&self) -> Option<SystemTypeId> {
        self.ids.get(&TypeId::of::<S>()).copied()
    }

    /// The registered system of type `S`.
    ///
    /// # Errors
    ///
    /// `SystemNotRegistered` if no such system exists.
    pub fn get_system<S: System>(&self) -> EcsResult<&S> {
        let id = self.require_id::<S>()?;
        self.systems[id.index()]
            .system
            .as_any()
            .downcast_ref::<S>()
            .ok_or(EcsError::SystemNotRegistered(std::any::type_name::<S>()))
    }

    /// Mutable variant of [`SystemManager::get_system`].
    ///
    /// # Errors
    ///
    /// `SystemNotRegistered` if no such system exists.
    pub fn get_system_mut<S: System>(&mut self) -> EcsResult<&mut S> {
        let id = self.require_id::<S>()?;
        self.systems[id.index()]
            .system
            .as_any_mut()
            .downcast_mut::<S>()
            .ok_or(EcsError::SystemNotRegistered(std::any::type_name::<S>()))
    }

    /// Activates system `S`.
    ///
    /// # Errors
    ///
    /// `SystemNotRegistered` if no such system exists.
    pub fn enable_system<S: System>(&mut self) -> EcsResult<()> {
        self.entry_mut::<S>()?.active = true;
        Ok(())
    }

    /// Deactivates system `S`. It keeps its work order position.
    ///
    /// # Errors
    ///
    /// `SystemNotRegistered` if no such system exists.
    pub fn disable_system<S: System>(&mut self) -> EcsResult<()> {
        self.entry_mut::<S>()?.active = false;
        Ok(())
    }

    /// Whether system `S` is active.
    ///
    /// # Errors
    ///
    /// `SystemNotRegistered` if no such system exists.
    pub fn is_system_active<S: System>(&self) -> EcsResult<bool> {
        let id = self.require_id::<S>()?;
        Ok(self.systems[id.index()].active)
    }

    /// Current priority of system `S`.
    ///
    /// # Errors
    ///
    /// `SystemNotRegistered` if no such system exists.
    pub fn system_priority<S: System>(&self) -> EcsResult<SystemPriority> {
        let id = self.require_id::<S>()?;
        Ok(self.systems[id.index()].priority)
    }

    /// Changes the priority of system `S`.
    ///
    /// Takes effect at the next work order update.
    ///
    /// # Errors
    ///
    /// `SystemNotRegistered` if no such system exists.
    pub fn set_system_priority<S: System>(&mut self, priority: SystemPriority) -> EcsResult<()> {
        let entry = self.entry_mut::<S>()?;
        if entry.priority != priority {
            entry.priority = priority;
            self.work_order_stale = true;
        }
        Ok(())
    }

    /// Changes how often system `S` runs; `None` runs it every frame.
    ///
    /// # Errors
    ///
    /// `SystemNotRegistered` if no such system exists.
    pub fn set_system_update_interval<S: System>(&mut self, interval_ms: Option<f64>) -> EcsResult<()> {
        let entry = self.entry_mut::<S>()?;
        entry.update_interval = interval_ms;
        entry.time_since_last_update = 0.0;
        Ok(())
    }

    /// Recomputes the work order from the dependency matrix and priorities.
    ///
    /// # Errors
    ///
    /// `DependencyCycle` if the matrix has a cycle and the policy is
    /// [`CyclePolicy::Reject`]. The previous work order stays in place.
    pub fn update_system_work_order(&mut self) -> EcsResult<()> {
        if let Some(cycle) = schedule::find_cycle(&self.dependencies) {
            let names: Vec<&'static str> = cycle.iter().map(|id| self.systems[id.index()].name).collect();
            match self.cycle_policy {
                CyclePolicy::Reject => {
                    tracing::error!("Rejected dependency cycle: {}", names.join(" -> "));
                    return Err(EcsError::DependencyCycle(names));
                }
                CyclePolicy::Ignore => {
                    tracing::warn!("Ignoring dependency cycle: {}", names.join(" -> "));
                }
            }
        }

        let priorities: Vec<SystemPriority> = self.systems.iter().map(|e| e.priority).collect();
        self.schedule = schedule::compute_schedule(&self.dependencies, &priorities);
        self.work_order_stale = false;

        tracing::info!("Update system work order:");
        for (position, name) in self.work_order_names().iter().enumerate() {
            tracing::info!("\t{}. {}", position, name);
        }
        Ok(())
    }

    /// The current work order.
    #[inline]
    #[must_use]
    pub fn work_order(&self) -> &[SystemTypeId] {
        &self.schedule.order
    }

    /// Names of the systems in work order.
    #[must_use]
    pub fn work_order_names(&self) -> Vec<&'static str> {
        self.schedule
            .order
            .iter()
            .map(|id| self.systems[id.index()].name)
            .collect()
    }

    /// Dependency groups in run order.
    #[inline]
    #[must_use]
    pub fn groups(&self) -> &[SystemGroup] {
        &self.schedule.groups
    }

    /// The dependency matrix.
    #[inline]
    #[must_use]
    pub const fn dependencies(&self) -> &DependencyMatrix {
        &self.dependencies
    }

    /// Whether registrations or priority changes happened since the last
    /// work order update.
    #[inline]
    #[must_use]
    pub const fn is_work_order_stale(&self) -> bool {
        self.work_order_stale
    }

    /// Runs the pre-update pass.
    ///
    /// Advances the update timer of every active system and decides which
    /// systems are due this frame.
    pub fn pre_update(&mut self, dt_ms: f64) {
        for id in &self.schedule.order {
            let entry = &mut self.systems[id.index()];
            if !entry.active {
                continue;
            }

            entry.time_since_last_update += dt_ms;
            entry.needs_update = match entry.update_interval {
                None => true,
                Some(interval) => entry.time_since_last_update > interval,
            };

            if entry.needs_update {
                entry.system.run_pre_update(dt_ms);
            }
        }
    }

    /// Runs the update pass over due systems.
    pub fn update(&mut self, dt_ms: f64) {
        for id in &self.schedule.order {
            let entry = &mut self.systems[id.index()];
            if entry.is_due() {
                entry.system.run_update(dt_ms);
            }
        }
    }

    /// Runs the post-update pass over due systems and resets their timers.
    pub fn post_update(&mut self, dt_ms: f64) {
        for id in &self.schedule.order {
            let entry = &mut self.systems[id.index()];
            if entry.is_due() {
                entry.system.run_post_update(dt_ms);
                entry.time_since_last_update = 0.0;
            }
        }
    }

    /// Snapshots the active flags in work order position.
    #[must_use]
    pub fn system_work_state(&self) -> SystemWorkStateMask {
        self.schedule
            .order
            .iter()
            .map(|id| self.systems[id.index()].active)
            .collect()
    }

    /// Restores active flags captured by [`SystemManager::system_work_state`].
    ///
    /// # Errors
    ///
    /// `WorkStateMismatch` if the mask length differs from the work order.
    pub fn set_system_work_state(&mut self, mask: &[bool]) -> EcsResult<()> {
        if mask.len() != self.schedule.order.len() {
            return Err(EcsError::WorkStateMismatch {
                mask: mask.len(),
                work_order: self.schedule.order.len(),
            });
        }

        for (id, &active) in self.schedule.order.iter().zip(mask) {
            self.systems[id.index()].active = active;
        }
        Ok(())
    }

    fn require_id<S: System>(&self) -> EcsResult<SystemTypeId> {
        self.system_id::<S>()
            .ok_or(EcsError::SystemNotRegistered(std::any::type_name::<S>()))
    }

    fn entry_mut<S: System>(&mut self) -> EcsResult<&mut SystemEntry> {
        let id = self.require_id::<S>()?;
        Ok(&mut self.systems[id.index()])
    }
}

impl Drop for SystemManager {
    fn drop(&mut self) {
        let count = self.systems.len();
        for entry in self.systems.drain(..) {
            tracing::trace!("Released system {} at {:#x}", entry.name, entry.region.address);
        }

        if let Some(arena) = self.arena.take() {
            self.memory.lock().free(arena.into_block());
        }
        tracing::info!("Release SystemManager ({} systems)", count);
    }
}

impl std::fmt::Debug for SystemManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemManager")
            .field("systems", &self.systems.len())
            .field("work_order", &self.work_order_names())
            .field("work_order_stale", &self.work_order_stale)
            .field("cycle_policy", &self.cycle_policy)
            .finish_non_exhaustive()
    }
}
