//! # Core Error Types
//!
//! Every fatal condition of the entity and system managers, surfaced at the
//! point of detection as a value instead of an abort.

use thiserror::Error;

use crate::ecs::{EntityId, EntityTypeId};

/// Errors that can occur in the entity manager, the system manager and their
/// memory collaborators.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EcsError {
    /// A memory request could not be satisfied.
    #[error("out of memory: {tag} requested {requested} bytes, {available} available")]
    OutOfMemory {
        /// Diagnostic label of the requester.
        tag: &'static str,
        /// Bytes requested.
        requested: usize,
        /// Bytes still available to the requester.
        available: usize,
    },

    /// A slot address lies outside every chunk of its container.
    #[error("slot {address:#x} is not owned by any chunk of {type_name}")]
    ForeignSlot {
        /// The offending slot address.
        address: usize,
        /// Entity type of the container.
        type_name: &'static str,
    },

    /// A slot inside a chunk was freed while empty.
    #[error("slot {address:#x} of {type_name} is not occupied")]
    SlotNotOccupied {
        /// The offending slot address.
        address: usize,
        /// Entity type of the container.
        type_name: &'static str,
    },

    /// The invalid sentinel id was used for a lookup.
    #[error("invalid entity id")]
    InvalidEntityId,

    /// An id past the lookup table bound was used.
    #[error("entity id {id} out of range (table holds {bound} ids)")]
    EntityIdOutOfRange {
        /// The offending id.
        id: EntityId,
        /// Current size of the lookup table.
        bound: usize,
    },

    /// The id is in range but no live entity is associated with it.
    #[error("entity {0} is not alive")]
    EntityNotAlive(EntityId),

    /// Every id below the invalid sentinel is in use.
    #[error("entity id space exhausted ({0} ids issued)")]
    EntityIdsExhausted(usize),

    /// The entity exists but is not of the requested type.
    #[error("entity {id} is a {actual}, not a {expected}")]
    TypeMismatch {
        /// The entity id.
        id: EntityId,
        /// The requested type.
        expected: &'static str,
        /// The stored type.
        actual: &'static str,
    },

    /// Two entity types declared the same type id.
    #[error("entity type id {type_id} is claimed by both {existing} and {requested}")]
    EntityTypeIdConflict {
        /// The contested id.
        type_id: EntityTypeId,
        /// Type that registered the id first.
        existing: &'static str,
        /// Type that tried to reuse it.
        requested: &'static str,
    },

    /// The system type has not been registered.
    #[error("system not registered: {0}")]
    SystemNotRegistered(&'static str),

    /// The system type is already registered.
    #[error("system already registered: {0}")]
    SystemAlreadyRegistered(&'static str),

    /// A work state mask was applied to a work order of another length.
    #[error("work state mask holds {mask} entries but the work order holds {work_order}")]
    WorkStateMismatch {
        /// Length of the provided mask.
        mask: usize,
        /// Length of the current work order.
        work_order: usize,
    },

    /// The dependency matrix contains a cycle and cycles are rejected.
    #[error("dependency cycle between systems: {}", .0.join(" -> "))]
    DependencyCycle(Vec<&'static str>),

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for core operations.
pub type EcsResult<T> = Result<T, EcsError>;
