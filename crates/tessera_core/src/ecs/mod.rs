//! # Entities
//!
//! Typed entities stored in chunked, pool-backed containers.
//!
//! ## Design Philosophy
//!
//! - One container per entity type, created on first use
//! - Chunks are fixed-capacity pools carved from global memory
//! - Entity ids are dense indices, reused most-recently-released first
//! - Typed access is generic; erased access goes through [`EntityObject`]

mod container;
mod entity;
mod manager;

pub use container::{EntityContainer, EntitySlot, CHUNK_MEMORY_TAG};
pub use entity::{Entity, EntityId, EntityObject, EntityTypeId};
pub use manager::EntityManager;
