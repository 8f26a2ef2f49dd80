//! # TESSERA Core
//!
//! Runtime substrate of an Entity-Component-System engine:
//! - Typed entities in chunked, pool-backed containers with reusable ids
//! - A dependency-graph scheduler that orders systems every frame
//!
//! ## Architecture Rules
//!
//! 1. **One owner per resource** - Containers own entities, the system
//!    manager owns systems, both draw memory from one [`GlobalMemory`]
//! 2. **Stable identity** - An entity keeps its slot until it is destroyed
//! 3. **Deterministic scheduling** - Same registrations, same work order
//!
//! ## Example
//!
//! ```rust,ignore
//! use tessera_core::{EntityConfig, EntityManager, GlobalMemory};
//!
//! let memory = GlobalMemory::shared(64 * 1024 * 1024);
//! let mut entities = EntityManager::new(&EntityConfig::default(), memory);
//! let id = entities.create_entity(Projectile { speed: 4.0 })?;
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod ecs;
pub mod error;
pub mod memory;
pub mod system;

pub use config::{
    ChunkCapacityOverride, CyclePolicy, EngineConfig, EntityConfig, MemoryConfig, SystemConfig,
};
pub use ecs::{Entity, EntityContainer, EntityId, EntityManager, EntityObject, EntitySlot, EntityTypeId};
pub use error::{EcsError, EcsResult};
pub use memory::{GlobalMemory, LinearArena, MemoryBlock, PoolAllocator, PoolHandle, SharedMemory};
pub use system::{
    DependencyMatrix, System, SystemGroup, SystemManager, SystemPriority, SystemTypeId,
    SystemWorkStateMask,
};
