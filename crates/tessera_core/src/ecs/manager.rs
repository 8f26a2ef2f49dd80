//! # Entity Manager
//!
//! The single point through which typed entities are created and destroyed.
//!
//! The manager owns:
//! - the entity registry (`EntityTypeId -> container`), filled lazily
//! - the id lookup table (`EntityId -> (type, slot)`)
//! - the free list of released ids, reused most-recently-released first
//! - the queue of entities marked for end-of-frame destruction
//!
//! Entity memory itself is owned by the containers; the lookup table only
//! records where each live entity sits.

use std::collections::{HashMap, HashSet};

use super::container::{EntityContainer, EntitySlot, ErasedContainer};
use super::entity::{Entity, EntityId, EntityObject, EntityTypeId};
use crate::config::EntityConfig;
use crate::error::{EcsError, EcsResult};
use crate::memory::SharedMemory;

/// Where a live entity is stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct EntityLocation {
    type_id: EntityTypeId,
    slot: EntitySlot,
}

/// Registry of entity containers plus the id bookkeeping.
///
/// # Example
///
/// ```rust,ignore
/// let mut entities = EntityManager::new(&EntityConfig::default(), GlobalMemory::shared(1 << 20));
///
/// let id = entities.create_entity(Projectile { speed: 4.0 })?;
/// assert_eq!(entities.get::<Projectile>(id)?.speed, 4.0);
///
/// entities.destroy_entity(id)?;
/// assert!(entities.get_entity(id)?.is_none());
/// ```
pub struct EntityManager {
    /// Containers keyed by entity type id.
    registry: HashMap<EntityTypeId, Box<dyn ErasedContainer>>,
    /// Id -> location; `None` for released ids.
    lookup: Vec<Option<EntityLocation>>,
    /// Released ids, most recent last.
    free_ids: Vec<EntityId>,
    /// Ids queued for destruction at the end of the frame.
    pending_destroy: Vec<EntityId>,
    /// Membership of `pending_destroy`.
    pending_set: HashSet<EntityId>,
    /// Number of live entities.
    alive_count: usize,
    /// Chunk sizing.
    config: EntityConfig,
    /// Backing memory for chunks.
    memory: SharedMemory,
}

impl EntityManager {
    /// Creates an empty manager drawing chunk memory from `memory`.
    #[must_use]
    pub fn new(config: &EntityConfig, memory: SharedMemory) -> Self {
        tracing::info!("Initialize EntityManager ({} entities per chunk)", config.chunk_capacity);
        Self {
            registry: HashMap::new(),
            lookup: Vec::new(),
            free_ids: Vec::new(),
            pending_destroy: Vec::new(),
            pending_set: HashSet::new(),
            alive_count: 0,
            config: config.clone(),
            memory,
        }
    }

    /// Number of live entities.
    #[inline]
    #[must_use]
    pub const fn entity_count(&self) -> usize {
        self.alive_count
    }

    /// Number of entity types that have a container.
    #[inline]
    #[must_use]
    pub fn container_count(&self) -> usize {
        self.registry.len()
    }

    /// Current bound of the id lookup table.
    ///
    /// Grows with the peak number of concurrently live entities, not with
    /// the number of entities ever created.
    #[inline]
    #[must_use]
    pub fn lookup_table_len(&self) -> usize {
        self.lookup.len()
    }

    /// Number of chunks allocated for entities of type `T`.
    #[must_use]
    pub fn chunk_count<T: Entity>(&self) -> usize {
        self.container::<T>().map_or(0, EntityContainer::chunk_count)
    }

    /// The container of `T`, if one has been created.
    #[must_use]
    pub fn container<T: Entity>(&self) -> Option<&EntityContainer<T>> {
        self.registry
            .get(&T::TYPE_ID)?
            .as_any()
            .downcast_ref::<EntityContainer<T>>()
    }

    /// Creates an entity of type `T` and returns its id.
    ///
    /// The value is placed in the newest chunk with a free slot; the id is
    /// acquired and registered only once the entity is placed.
    ///
    /// # Errors
    ///
    /// - `EntityTypeIdConflict` if another type already uses `T::TYPE_ID`
    /// - `InvalidConfig` if the chunk capacity configured for `T` is zero
    /// - `OutOfMemory` if no chunk can hold the entity
    /// - `EntityIdsExhausted` if no id is left to issue
    pub fn create_entity<T: Entity>(&mut self, entity: T) -> EcsResult<EntityId> {
        let slot = self.container_or_insert::<T>()?.create_entity(entity)?;

        let id = match self.acquire_entity_id() {
            Ok(id) => id,
            Err(error) => {
                if let Some(container) = self.registry.get_mut(&T::TYPE_ID) {
                    container.destroy(slot)?;
                }
                return Err(error);
            }
        };
        if let Some(container) = self.typed_container_mut::<T>() {
            container.assign_id(slot, id);
        }
        self.lookup[id.index()] = Some(EntityLocation {
            type_id: T::TYPE_ID,
            slot,
        });
        self.alive_count += 1;

        tracing::trace!("Created entity {} of type {}", id, T::type_name());
        Ok(id)
    }

    /// Destroys the entity behind `id`.
    ///
    /// The id is released first, then the container reclaims the slot and
    /// the entity is dropped. A pending mark for the id is cleared, so a
    /// later reissue of the id is not destroyed by the deferred queue.
    ///
    /// # Errors
    ///
    /// - `InvalidEntityId` / `EntityIdOutOfRange` for ids never issued
    /// - `EntityNotAlive` if the id is currently unassigned
    /// - `ForeignSlot` / `SlotNotOccupied` if the container's bookkeeping is corrupt
    pub fn destroy_entity(&mut self, id: EntityId) -> EcsResult<()> {
        let location = self.location(id)?.ok_or(EcsError::EntityNotAlive(id))?;

        self.release_entity_id(id);
        self.alive_count -= 1;
        if self.pending_set.remove(&id) {
            self.pending_destroy.retain(|&pending| pending != id);
        }

        let container = self
            .registry
            .get_mut(&location.type_id)
            .ok_or(EcsError::EntityNotAlive(id))?;
        container.destroy(location.slot)?;

        tracing::trace!("Destroyed entity {} of type {}", id, container.entity_type_name());
        Ok(())
    }

    /// Looks up an entity of any type.
    ///
    /// # Returns
    ///
    /// `None` if the id is currently unassigned (its entity was destroyed
    /// and the id has not been reissued).
    ///
    /// # Errors
    ///
    /// `InvalidEntityId` for the sentinel, `EntityIdOutOfRange` past the
    /// lookup table bound.
    pub fn get_entity(&self, id: EntityId) -> EcsResult<Option<&dyn EntityObject>> {
        let Some(location) = self.location(id)? else {
            return Ok(None);
        };
        Ok(self
            .registry
            .get(&location.type_id)
            .and_then(|c| c.object(location.slot)))
    }

    /// Mutable variant of [`EntityManager::get_entity`].
    ///
    /// # Errors
    ///
    /// Same as [`EntityManager::get_entity`].
    pub fn get_entity_mut(&mut self, id: EntityId) -> EcsResult<Option<&mut dyn EntityObject>> {
        let Some(location) = self.location(id)? else {
            return Ok(None);
        };
        Ok(self
            .registry
            .get_mut(&location.type_id)
            .and_then(|c| c.object_mut(location.slot)))
    }

    /// Looks up a live entity of type `T`.
    ///
    /// # Errors
    ///
    /// Id errors as in [`EntityManager::get_entity`], `EntityNotAlive` for an
    /// unassigned id, `TypeMismatch` if the entity is not a `T`.
    pub fn get<T: Entity>(&self, id: EntityId) -> EcsResult<&T> {
        let object = self.get_entity(id)?.ok_or(EcsError::EntityNotAlive(id))?;
        let actual = object.entity_type_name();
        object.downcast_ref::<T>().ok_or(EcsError::TypeMismatch {
            id,
            expected: T::type_name(),
            actual,
        })
    }

    /// Mutable variant of [`EntityManager::get`].
    ///
    /// # Errors
    ///
    /// Same as [`EntityManager::get`].
    pub fn get_mut<T: Entity>(&mut self, id: EntityId) -> EcsResult<&mut T> {
        let object = self
            .get_entity_mut(id)?
            .ok_or(EcsError::EntityNotAlive(id))?;
        let actual = object.entity_type_name();
        object.downcast_mut::<T>().ok_or(EcsError::TypeMismatch {
            id,
            expected: T::type_name(),
            actual,
        })
    }

    /// Checks whether `id` currently names a live entity.
    #[must_use]
    pub fn is_alive(&self, id: EntityId) -> bool {
        matches!(self.location(id), Ok(Some(_)))
    }

    /// Name of the concrete type of the entity behind `id`.
    #[must_use]
    pub fn type_name_of(&self, id: EntityId) -> Option<&'static str> {
        self.get_entity(id).ok().flatten().map(|e| e.entity_type_name())
    }

    /// Iterates over all live entities of type `T`.
    pub fn iter<T: Entity>(&self) -> impl Iterator<Item = (EntityId, &T)> {
        self.container::<T>().into_iter().flat_map(EntityContainer::iter)
    }

    /// Iterates mutably over all live entities of type `T`.
    pub fn iter_mut<T: Entity>(&mut self) -> impl Iterator<Item = (EntityId, &mut T)> {
        self.typed_container_mut::<T>()
            .into_iter()
            .flat_map(EntityContainer::iter_mut)
    }

    /// Queues an entity for destruction at the end of the frame.
    ///
    /// Marking an already queued entity again has no effect.
    ///
    /// # Errors
    ///
    /// Same as [`EntityManager::destroy_entity`] for ids that are not alive.
    pub fn mark_for_destruction(&mut self, id: EntityId) -> EcsResult<()> {
        self.location(id)?.ok_or(EcsError::EntityNotAlive(id))?;
        if self.pending_set.insert(id) {
            self.pending_destroy.push(id);
        }
        Ok(())
    }

    /// Number of entities queued for destruction.
    #[inline]
    #[must_use]
    pub fn pending_destruction(&self) -> usize {
        self.pending_destroy.len()
    }

    /// Destroys every queued entity, in the order they were marked.
    ///
    /// Entities destroyed directly after being marked are skipped.
    ///
    /// # Returns
    ///
    /// The number of entities destroyed.
    ///
    /// # Errors
    ///
    /// The first container error; the rest of the queue is still drained.
    pub fn remove_destroyed_entities(&mut self) -> EcsResult<usize> {
        let pending = std::mem::take(&mut self.pending_destroy);
        self.pending_set.clear();
        let mut destroyed = 0;
        let mut first_error = None;

        for id in pending {
            if !self.is_alive(id) {
                continue;
            }
            match self.destroy_entity(id) {
                Ok(()) => destroyed += 1,
                Err(error) => {
                    tracing::error!("Deferred destruction of entity {} failed: {}", id, error);
                    first_error.get_or_insert(error);
                }
            }
        }

        if destroyed > 0 {
            tracing::debug!("Removed {} destroyed entities", destroyed);
        }
        first_error.map_or(Ok(destroyed), Err)
    }

    /// Returns an unused id, reusing the most recently released one first.
    fn acquire_entity_id(&mut self) -> EcsResult<EntityId> {
        if let Some(id) = self.free_ids.pop() {
            return Ok(id);
        }
        let id = next_entity_id(self.lookup.len())?;
        self.lookup.push(None);
        Ok(id)
    }

    /// Releases an id for reuse.
    fn release_entity_id(&mut self, id: EntityId) {
        self.lookup[id.index()] = None;
        self.free_ids.push(id);
    }

    /// Validates `id` against the lookup table.
    fn location(&self, id: EntityId) -> EcsResult<Option<EntityLocation>> {
        if id.is_invalid() {
            return Err(EcsError::InvalidEntityId);
        }
        self.lookup
            .get(id.index())
            .copied()
            .ok_or(EcsError::EntityIdOutOfRange {
                id,
                bound: self.lookup.len(),
            })
    }

    /// Returns the container for `T`, creating it on first use.
    fn container_or_insert<T: Entity>(&mut self) -> EcsResult<&mut EntityContainer<T>> {
        if let Some(existing) = self.registry.get(&T::TYPE_ID) {
            if existing.rust_type_id() != std::any::TypeId::of::<T>() {
                return Err(EcsError::EntityTypeIdConflict {
                    type_id: T::TYPE_ID,
                    existing: existing.entity_type_name(),
                    requested: T::type_name(),
                });
            }
        } else {
            let capacity = self.config.chunk_capacity_for(T::TYPE_ID);
            if capacity == 0 {
                return Err(EcsError::InvalidConfig(format!(
                    "chunk capacity for {} (type id {}) must be greater than zero",
                    T::type_name(),
                    T::TYPE_ID
                )));
            }
            tracing::debug!(
                "Created container for {} (type id {}, {} entities per chunk)",
                T::type_name(),
                T::TYPE_ID,
                capacity
            );
            let container = EntityContainer::<T>::new(capacity, self.memory.clone());
            self.registry.insert(T::TYPE_ID, Box::new(container));
        }

        self.typed_container_mut::<T>()
            .ok_or(EcsError::EntityTypeIdConflict {
                type_id: T::TYPE_ID,
                existing: "unknown",
                requested: T::type_name(),
            })
    }

    fn typed_container_mut<T: Entity>(&mut self) -> Option<&mut EntityContainer<T>> {
        self.registry
            .get_mut(&T::TYPE_ID)?
            .as_any_mut()
            .downcast_mut::<EntityContainer<T>>()
    }
}

/// Id for a fresh lookup table entry at index `len`.
fn next_entity_id(len: usize) -> EcsResult<EntityId> {
    match u32::try_from(len) {
        Ok(index) if index != u32::MAX => Ok(EntityId::new(index)),
        _ => Err(EcsError::EntityIdsExhausted(len)),
    }
}

impl Drop for EntityManager {
    fn drop(&mut self) {
        tracing::info!(
            "Release EntityManager ({} entities in {} containers)",
            self.alive_count,
            self.registry.len()
        );
    }
}

impl std::fmt::Debug for EntityManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityManager")
            .field("containers", &self.registry.len())
            .field("alive_count", &self.alive_count)
            .field("lookup_table_len", &self.lookup.len())
            .field("free_ids", &self.free_ids.len())
            .field("pending_destroy", &self.pending_destroy.len())
            .finish_non_exhaustive()
    }
}
