//! # Entity Containers
//!
//! One container per concrete entity type. A container owns a list of
//! fixed-capacity memory chunks, each backed by one [`PoolAllocator`] laid
//! out over a block of global memory:
//!
//! ```text
//! EntityContainer<Projectile>
//!   ├── chunk 0  [0x0010, 0x4010)  512 slots  (oldest)
//!   ├── chunk 1  [0x4010, 0x8010)  512 slots
//!   └── chunk 2  [0x8010, 0xc010)  512 slots  (newest, searched first)
//! ```
//!
//! A slot is identified by its address. Freeing a slot finds the owning
//! chunk by address-range membership, so entities carry no back-pointer to
//! their chunk.

use std::any::{Any, TypeId};

use super::entity::{Entity, EntityId, EntityObject};
use crate::error::{EcsError, EcsResult};
use crate::memory::{PoolAllocator, SharedMemory};

/// Diagnostic tag for chunk blocks in global memory.
pub const CHUNK_MEMORY_TAG: &str = "EntityManager";

/// Address of an entity slot inside its container's chunks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntitySlot(usize);

impl EntitySlot {
    /// Creates a slot from a raw address.
    #[inline]
    #[must_use]
    pub const fn from_address(address: usize) -> Self {
        Self(address)
    }

    /// Returns the raw slot address.
    #[inline]
    #[must_use]
    pub const fn address(self) -> usize {
        self.0
    }
}

/// An entity together with the id the manager assigned to it.
#[derive(Debug)]
struct Resident<T> {
    id: EntityId,
    entity: T,
}

/// A contiguous slot range backed by one pool.
#[derive(Debug)]
struct EntityMemoryChunk<T> {
    pool: PoolAllocator<Resident<T>>,
    start: usize,
    end: usize,
}

impl<T> EntityMemoryChunk<T> {
    fn new(pool: PoolAllocator<Resident<T>>) -> Self {
        let start = pool.first_address();
        let end = pool.end_address();
        Self { pool, start, end }
    }

    #[inline]
    fn contains(&self, address: usize) -> bool {
        self.start <= address && address < self.end
    }

    #[inline]
    fn is_full(&self) -> bool {
        self.pool.free_count() == 0
    }
}

/// Manages the memory chunks of all entities of type `T`.
///
/// # Invariants
///
/// - Every live slot lies in exactly one chunk.
/// - Chunks are kept in creation order; since global memory hands out
///   ascending addresses, their ranges are ascending and disjoint.
/// - The newest chunk is searched first for a free slot.
#[derive(Debug)]
pub struct EntityContainer<T: Entity> {
    chunks: Vec<EntityMemoryChunk<T>>,
    chunk_capacity: usize,
    memory: SharedMemory,
}

impl<T: Entity> EntityContainer<T> {
    /// Creates an empty container. The first chunk is created on first use.
    ///
    /// # Panics
    ///
    /// Panics if `chunk_capacity` is zero.
    #[must_use]
    pub fn new(chunk_capacity: usize, memory: SharedMemory) -> Self {
        assert!(chunk_capacity > 0, "Chunk capacity must be greater than zero");
        Self {
            chunks: Vec::new(),
            chunk_capacity,
            memory,
        }
    }

    /// Maximum number of entities per chunk.
    #[inline]
    #[must_use]
    pub const fn chunk_capacity(&self) -> usize {
        self.chunk_capacity
    }

    /// Number of chunks owned by this container.
    #[inline]
    #[must_use]
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Number of live entities across all chunks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.chunks.iter().map(|c| c.pool.allocated_count()).sum()
    }

    /// Checks whether the container holds no entities.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Address ranges of all chunks, oldest first.
    pub fn chunk_ranges(&self) -> impl Iterator<Item = std::ops::Range<usize>> + '_ {
        self.chunks.iter().map(|c| c.start..c.end)
    }

    /// Places `entity` in a free slot and returns the slot.
    ///
    /// The entity carries [`EntityId::INVALID`] until the manager assigns
    /// its id through [`EntityContainer::assign_id`].
    ///
    /// # Errors
    ///
    /// `OutOfMemory` if every chunk is full and no new chunk can be created,
    /// or a freshly created chunk cannot hold a single entity.
    pub fn create_entity(&mut self, entity: T) -> EcsResult<EntitySlot> {
        let mut resident = Resident {
            id: EntityId::INVALID,
            entity,
        };

        // Newest chunk first
        for chunk in self.chunks.iter_mut().rev() {
            if chunk.is_full() {
                continue;
            }

            match chunk.pool.allocate(resident) {
                Ok(handle) => {
                    let address = chunk.pool.address_of(handle);
                    tracing::trace!("Allocated {} slot {:#x}", T::type_name(), address);
                    return Ok(EntitySlot(address));
                }
                Err(rejected) => resident = rejected,
            }
        }

        // All chunks are full, allocate a new one
        let mut chunk = self.allocate_chunk()?;
        let Ok(handle) = chunk.pool.allocate(resident) else {
            let available = chunk.pool.free_count();
            self.release_chunk(chunk);
            return Err(EcsError::OutOfMemory {
                tag: CHUNK_MEMORY_TAG,
                requested: PoolAllocator::<Resident<T>>::SLOT_STRIDE,
                available,
            });
        };
        let address = chunk.pool.address_of(handle);
        self.chunks.push(chunk);

        Ok(EntitySlot(address))
    }

    /// Writes the manager-assigned id into a freshly placed entity.
    pub(crate) fn assign_id(&mut self, slot: EntitySlot, id: EntityId) {
        if let Some(resident) = self.resident_mut(slot) {
            debug_assert!(resident.id.is_invalid(), "entity id is assigned exactly once");
            resident.id = id;
        }
    }

    /// Frees the slot and moves the entity out of it.
    ///
    /// # Errors
    ///
    /// `ForeignSlot` if no chunk owns the address, `SlotNotOccupied` if the
    /// slot is empty (double free).
    pub fn destroy_entity(&mut self, slot: EntitySlot) -> EcsResult<T> {
        let address = slot.address();
        let Some(chunk_index) = self.owning_chunk(address) else {
            return Err(EcsError::ForeignSlot {
                address,
                type_name: T::type_name(),
            });
        };

        let chunk = &mut self.chunks[chunk_index];
        let handle = chunk.pool.handle_at(address).ok_or(EcsError::ForeignSlot {
            address,
            type_name: T::type_name(),
        })?;
        let resident = chunk.pool.free(handle).ok_or(EcsError::SlotNotOccupied {
            address,
            type_name: T::type_name(),
        })?;

        tracing::trace!("Freed {} slot {:#x} in chunk {}", T::type_name(), address, chunk_index);
        Ok(resident.entity)
    }

    /// Gets the entity in `slot`.
    #[must_use]
    pub fn get(&self, slot: EntitySlot) -> Option<&T> {
        self.resident(slot).map(|r| &r.entity)
    }

    /// Gets the entity in `slot` mutably.
    pub fn get_mut(&mut self, slot: EntitySlot) -> Option<&mut T> {
        self.resident_mut(slot).map(|r| &mut r.entity)
    }

    /// Gets the id stored with the entity in `slot`.
    #[must_use]
    pub fn id_at(&self, slot: EntitySlot) -> Option<EntityId> {
        self.resident(slot).map(|r| r.id)
    }

    /// Iterates over all live entities, oldest chunk first.
    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &T)> {
        self.chunks
            .iter()
            .flat_map(|c| c.pool.iter().map(|(_, r)| (r.id, &r.entity)))
    }

    /// Iterates mutably over all live entities, oldest chunk first.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (EntityId, &mut T)> {
        self.chunks
            .iter_mut()
            .flat_map(|c| c.pool.iter_mut().map(|(_, r)| (r.id, &mut r.entity)))
    }

    /// Index of the chunk whose range holds `address`.
    fn owning_chunk(&self, address: usize) -> Option<usize> {
        let index = self.chunks.partition_point(|c| c.end <= address);
        let chunk = self.chunks.get(index)?;
        chunk.contains(address).then_some(index)
    }

    fn resident(&self, slot: EntitySlot) -> Option<&Resident<T>> {
        let chunk = &self.chunks[self.owning_chunk(slot.address())?];
        chunk.pool.get(chunk.pool.handle_at(slot.address())?)
    }

    fn resident_mut(&mut self, slot: EntitySlot) -> Option<&mut Resident<T>> {
        let index = self.owning_chunk(slot.address())?;
        let chunk = &mut self.chunks[index];
        let handle = chunk.pool.handle_at(slot.address())?;
        chunk.pool.get_mut(handle)
    }

    fn allocate_chunk(&self) -> EcsResult<EntityMemoryChunk<T>> {
        let size = PoolAllocator::<Resident<T>>::block_size(self.chunk_capacity);
        let mut memory = self.memory.lock();
        let block = memory
            .allocate(size, CHUNK_MEMORY_TAG)
            .ok_or(EcsError::OutOfMemory {
                tag: CHUNK_MEMORY_TAG,
                requested: size,
                available: memory.available(),
            })?;

        tracing::debug!(
            "Created chunk {} for {} ({} slots, {} bytes at {:#x})",
            self.chunks.len(),
            T::type_name(),
            self.chunk_capacity,
            size,
            block.address()
        );

        Ok(EntityMemoryChunk::new(PoolAllocator::new(
            block,
            self.chunk_capacity,
        )))
    }

    fn release_chunk(&self, chunk: EntityMemoryChunk<T>) -> usize {
        let dropped = chunk.pool.allocated_count();
        let block = chunk.pool.into_block();
        self.memory.lock().free(block);
        dropped
    }
}

impl<T: Entity> Drop for EntityContainer<T> {
    fn drop(&mut self) {
        let chunks = std::mem::take(&mut self.chunks);
        let chunk_count = chunks.len();
        let dropped: usize = chunks.into_iter().map(|c| self.release_chunk(c)).sum();

        tracing::debug!(
            "Released container for {} ({} chunks, {} entities)",
            T::type_name(),
            chunk_count,
            dropped
        );
    }
}

/// Type-erased capability interface over [`EntityContainer`].
pub(crate) trait ErasedContainer: Any {
    fn entity_type_name(&self) -> &'static str;
    fn rust_type_id(&self) -> TypeId;
    fn destroy(&mut self, slot: EntitySlot) -> EcsResult<()>;
    fn object(&self, slot: EntitySlot) -> Option<&dyn EntityObject>;
    fn object_mut(&mut self, slot: EntitySlot) -> Option<&mut dyn EntityObject>;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Entity> ErasedContainer for EntityContainer<T> {
    fn entity_type_name(&self) -> &'static str {
        T::type_name()
    }

    fn rust_type_id(&self) -> TypeId {
        TypeId::of::<T>()
    }

    fn destroy(&mut self, slot: EntitySlot) -> EcsResult<()> {
        // The entity is dropped here, after its slot was reclaimed
        self.destroy_entity(slot).map(drop)
    }

    fn object(&self, slot: EntitySlot) -> Option<&dyn EntityObject> {
        self.get(slot).map(|e| e as &dyn EntityObject)
    }

    fn object_mut(&mut self, slot: EntitySlot) -> Option<&mut dyn EntityObject> {
        self.get_mut(slot).map(|e| e as &mut dyn EntityObject)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::GlobalMemory;

    #[derive(Debug, PartialEq)]
    struct Marker(u32);

    impl Entity for Marker {
        const TYPE_ID: u32 = 0;
    }

    fn container(capacity: usize) -> EntityContainer<Marker> {
        EntityContainer::new(capacity, GlobalMemory::shared(1024 * 1024))
    }

    #[test]
    fn test_first_use_creates_chunk() {
        let mut container = container(4);
        assert_eq!(container.chunk_count(), 0);

        let slot = container.create_entity(Marker(1)).unwrap();
        assert_eq!(container.chunk_count(), 1);
        assert_eq!(container.get(slot), Some(&Marker(1)));
        assert_eq!(container.id_at(slot), Some(EntityId::INVALID));
    }

    #[test]
    fn test_full_chunk_grows_and_newest_is_searched_first() {
        let mut container = container(2);

        let a = container.create_entity(Marker(1)).unwrap();
        let _b = container.create_entity(Marker(2)).unwrap();
        let c = container.create_entity(Marker(3)).unwrap();
        assert_eq!(container.chunk_count(), 2);

        // Free a slot in the old chunk; the new chunk still has room and wins
        container.destroy_entity(a).unwrap();
        let d = container.create_entity(Marker(4)).unwrap();
        let newest = container.chunk_ranges().last().unwrap();
        assert!(newest.contains(&c.address()));
        assert!(newest.contains(&d.address()));

        // Newest is now full, so the freed slot in the old chunk is reused
        let e = container.create_entity(Marker(5)).unwrap();
        assert_eq!(e, a);
        assert_eq!(container.chunk_count(), 2);
    }

    #[test]
    fn test_destroy_routes_to_owning_chunk() {
        let mut container = container(3);
        let slots: Vec<_> = (0..10).map(|i| container.create_entity(Marker(i)).unwrap()).collect();
        assert_eq!(container.chunk_count(), 4);

        for (i, slot) in slots.iter().enumerate() {
            assert_eq!(container.destroy_entity(*slot).unwrap(), Marker(i as u32));
        }
        assert!(container.is_empty());
    }

    #[test]
    fn test_foreign_and_double_free() {
        let mut container = container(2);
        let slot = container.create_entity(Marker(1)).unwrap();

        let foreign = EntitySlot::from_address(usize::MAX - 1);
        assert!(matches!(
            container.destroy_entity(foreign),
            Err(EcsError::ForeignSlot { .. })
        ));

        container.destroy_entity(slot).unwrap();
        assert!(matches!(
            container.destroy_entity(slot),
            Err(EcsError::SlotNotOccupied { .. })
        ));
    }

    #[test]
    fn test_out_of_memory() {
        let stride = PoolAllocator::<Resident<Marker>>::SLOT_STRIDE;
        let memory = GlobalMemory::shared(stride * 2);
        let mut container = EntityContainer::<Marker>::new(2, memory);

        container.create_entity(Marker(1)).unwrap();
        container.create_entity(Marker(2)).unwrap();
        assert!(matches!(
            container.create_entity(Marker(3)),
            Err(EcsError::OutOfMemory { tag: CHUNK_MEMORY_TAG, .. })
        ));
    }

    #[test]
    fn test_teardown_drops_residents_and_returns_memory() {
        use std::rc::Rc;

        struct Tracked(#[allow(dead_code)] Rc<()>);
        impl Entity for Tracked {
            const TYPE_ID: u32 = 1;
        }

        let memory = GlobalMemory::shared(1024 * 1024);
        let token = Rc::new(());
        {
            let mut container = EntityContainer::<Tracked>::new(2, memory.clone());
            for _ in 0..5 {
                container.create_entity(Tracked(token.clone())).unwrap();
            }
            assert_eq!(Rc::strong_count(&token), 6);
            assert!(memory.lock().usage_of(CHUNK_MEMORY_TAG) > 0);
        }
        assert_eq!(Rc::strong_count(&token), 1);
        assert_eq!(memory.lock().usage_of(CHUNK_MEMORY_TAG), 0);
        assert_eq!(memory.lock().live_blocks(), 0);
    }
}
