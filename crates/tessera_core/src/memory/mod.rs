//! # Memory Management
//!
//! The memory collaborators beneath the entity and system managers.
//!
//! ## Layout
//!
//! - [`GlobalMemory`]: fixed-capacity block provider, tag accounted
//! - [`PoolAllocator`]: fixed-slot allocator over one block (one per chunk)
//! - [`LinearArena`]: bump allocator over one block (the system arena)

mod arena;
mod global;
mod pool;

pub use arena::{ArenaRegion, LinearArena};
pub use global::{GlobalMemory, MemoryBlock, SharedMemory};
pub use pool::{PoolAllocator, PoolHandle};
